use std::time::Duration;
use std::fs;

use acg::sso::{self, AccessToken, ClientCredential, HttpProvider, Provider, TokenPoll};
use acg::config::{self, Mode};
use acg::{Endpoints, Event, Generator, Handler};

use chrono::{DateTime, Utc};

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;


const START_URL: &str = "https://d-1234567890.awsapps.com/start";

struct TestProvider {
    inner: HttpProvider,
    server: ServerGuard,
}

impl TestProvider {

    pub fn new() -> Self {
        let server = Server::new();
        let inner = HttpProvider::with_endpoints(Endpoints::with_base(&server.url())).unwrap();
        Self { inner, server }
    }

}

fn client() -> ClientCredential {
    ClientCredential {
        client_id: "cid".to_string(),
        client_secret: "csecret".to_string(),
        expires_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
    }
}

fn token() -> AccessToken {
    AccessToken::new("tok", Duration::from_secs(28800))
}

/// Record a short name for each event, in order.
#[derive(Debug, Default)]
struct EventLog(Vec<String>);

impl Handler for EventLog {
    fn on_event(&mut self, event: Event) {
        self.0.push(match event {
            Event::RegisterClient { .. } => "register_client".to_string(),
            Event::RegisteredClient { .. } => "registered_client".to_string(),
            Event::StartDeviceAuthorization { .. } => "start_device_authorization".to_string(),
            Event::DeviceAuthorization { auth, .. } => format!("device_authorization:{}", auth.user_code),
            Event::BrowserOpened { .. } => "browser_opened".to_string(),
            Event::AuthorizationPending { .. } => "authorization_pending".to_string(),
            Event::SlowDown { .. } => "slow_down".to_string(),
            Event::Authorized { .. } => "authorized".to_string(),
            Event::ListAccounts => "list_accounts".to_string(),
            Event::ListedAccounts { accounts } => format!("listed_accounts:{}", accounts.len()),
            Event::ListedRoles { account, roles } => format!("listed_roles:{}:{}", account.id, roles.len()),
            Event::Rendered { records } => format!("rendered:{}", records.len()),
            Event::RemovedConfig { .. } => "removed_config".to_string(),
            _ => "other".to_string(),
        });
    }
}

#[test]
fn register_client() {

    let mut provider = TestProvider::new();
    let mock = provider.server.mock("POST", "/client/register")
        .match_body(Matcher::PartialJson(json!({
            "clientName": "acg-cli",
            "clientType": "public",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({
            "clientId": "cid",
            "clientSecret": "csecret",
            "clientIdIssuedAt": 1_690_000_000,
            "clientSecretExpiresAt": 1_700_000_000,
        }).to_string())
        .create();

    let client = provider.inner.register_client("acg-cli", "public").unwrap();
    mock.assert();

    assert_eq!(client.client_id, "cid");
    assert_eq!(client.client_secret, "csecret");
    assert_eq!(client.expires_at.timestamp(), 1_700_000_000);

}

#[test]
fn start_device_authorization() {

    let mut provider = TestProvider::new();
    let mock = provider.server.mock("POST", "/device_authorization")
        .match_body(Matcher::Json(json!({
            "clientId": "cid",
            "clientSecret": "csecret",
            "startUrl": START_URL,
        })))
        .with_status(200)
        .with_body(json!({
            "deviceCode": "dev",
            "userCode": "ABCD-EFGH",
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "verificationUriComplete": "https://device.sso.us-east-1.amazonaws.com/?user_code=ABCD-EFGH",
            "expiresIn": 600,
            "interval": 1,
        }).to_string())
        .create();

    let auth = provider.inner.start_device_authorization(&client(), START_URL).unwrap();
    mock.assert();

    assert_eq!(auth.device_code, "dev");
    assert_eq!(auth.user_code, "ABCD-EFGH");
    assert_eq!(auth.user_uri(), "https://device.sso.us-east-1.amazonaws.com/?user_code=ABCD-EFGH");
    assert_eq!(auth.expires_in, Duration::from_secs(600));
    assert_eq!(auth.interval, Some(Duration::from_secs(1)));

}

#[test]
fn start_device_authorization_zero_interval() {

    let mut provider = TestProvider::new();
    provider.server.mock("POST", "/device_authorization")
        .with_status(200)
        .with_body(json!({
            "deviceCode": "dev",
            "userCode": "ABCD-EFGH",
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "expiresIn": 600,
            "interval": 0,
        }).to_string())
        .create();

    let auth = provider.inner.start_device_authorization(&client(), START_URL).unwrap();
    assert_eq!(auth.interval, None);
    assert_eq!(auth.user_uri(), "https://device.sso.us-east-1.amazonaws.com/");

}

#[test]
fn create_token_success() {

    let mut provider = TestProvider::new();
    let mock = provider.server.mock("POST", "/token")
        .match_body(Matcher::Json(json!({
            "clientId": "cid",
            "clientSecret": "csecret",
            "grantType": "urn:ietf:params:oauth:grant-type:device_code",
            "deviceCode": "dev",
        })))
        .with_status(200)
        .with_body(json!({
            "accessToken": "tok",
            "tokenType": "Bearer",
            "expiresIn": 28800,
        }).to_string())
        .create();

    match provider.inner.create_token(&client(), "dev") {
        TokenPoll::Success(token) => {
            assert_eq!(token.value(), "tok");
            assert_eq!(token.expires_in(), Duration::from_secs(28800));
        }
        poll => panic!("{poll:?}"),
    }

    mock.assert();

}

#[test]
fn create_token_classification() {

    let mut provider = TestProvider::new();

    // OIDC style error in the body.
    provider.server.mock("POST", "/token")
        .with_status(400)
        .with_body(json!({ "error": "authorization_pending" }).to_string())
        .create();

    // Error type header only, with the usual suffix.
    provider.server.mock("POST", "/token")
        .with_status(400)
        .with_header("x-amzn-errortype", "SlowDownException:http://internal.amazon.com/coral/com.amazonaws.ssooidc/")
        .create();

    provider.server.mock("POST", "/token")
        .with_status(400)
        .with_body(json!({
            "error": "expired_token",
            "error_description": "Device code has expired",
        }).to_string())
        .create();

    assert!(matches!(provider.inner.create_token(&client(), "dev"), TokenPoll::Pending));
    assert!(matches!(provider.inner.create_token(&client(), "dev"), TokenPoll::SlowDown));

    match provider.inner.create_token(&client(), "dev") {
        TokenPoll::Fatal(sso::Error::Provider { code, description }) => {
            assert_eq!(code, "expired_token");
            assert_eq!(description.as_deref(), Some("Device code has expired"));
        }
        poll => panic!("{poll:?}"),
    }

}

#[test]
fn list_accounts_pages() {

    let mut provider = TestProvider::new();

    let first = provider.server.mock("GET", "/assignment/accounts")
        .match_query(Matcher::Exact("max_result=50".to_string()))
        .match_header("x-amz-sso_bearer_token", "tok")
        .with_status(200)
        .with_body(json!({
            "nextToken": "p1",
            "accountList": [
                { "accountId": "000000000001", "accountName": "Prod", "emailAddress": "prod@example.com" },
            ],
        }).to_string())
        .create();

    let second = provider.server.mock("GET", "/assignment/accounts")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("max_result".to_string(), "50".to_string()),
            Matcher::UrlEncoded("next_token".to_string(), "p1".to_string()),
        ]))
        .match_header("x-amz-sso_bearer_token", "tok")
        .with_status(200)
        .with_body(json!({
            "nextToken": "",
            "accountList": [
                { "accountId": "000000000002", "accountName": "Dev" },
            ],
        }).to_string())
        .create();

    let accounts = acg::access::list_accounts(&mut provider.inner, &token()).unwrap();
    first.assert();
    second.assert();

    let ids = accounts.iter().map(|a| a.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["000000000001", "000000000002"]);
    assert_eq!(accounts[0].email.as_deref(), Some("prod@example.com"));
    assert_eq!(accounts[1].email, None);

}

#[test]
fn list_account_roles() {

    let mut provider = TestProvider::new();
    let mock = provider.server.mock("GET", "/assignment/roles")
        .match_query(Matcher::UrlEncoded("account_id".to_string(), "000000000001".to_string()))
        .match_header("x-amz-sso_bearer_token", "tok")
        .with_status(200)
        .with_body(json!({
            "roleList": [
                { "roleName": "AdministratorAccess", "accountId": "000000000001" },
                { "roleName": "ReadOnly", "accountId": "000000000001" },
            ],
        }).to_string())
        .create();

    let page = provider.inner.list_account_roles(&token(), "000000000001", None, None).unwrap();
    mock.assert();

    let names = page.items.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["AdministratorAccess", "ReadOnly"]);
    assert!(page.next_token.is_none());

}

#[test]
fn portal_errors() {

    let mut provider = TestProvider::new();

    provider.server.mock("GET", "/assignment/accounts")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_header("x-amzn-errortype", "UnauthorizedException")
        .with_body(json!({ "message": "Session token not found or invalid" }).to_string())
        .create();

    provider.server.mock("GET", "/assignment/roles")
        .match_query(Matcher::Any)
        .with_status(500)
        .create();

    match provider.inner.list_accounts(&token(), None, Some(50)).unwrap_err() {
        sso::Error::Provider { code, description } => {
            assert_eq!(code, "UnauthorizedException");
            assert_eq!(description.as_deref(), Some("Session token not found or invalid"));
        }
        e => panic!("{e:?}"),
    }

    let error = provider.inner.list_account_roles(&token(), "000000000001", None, None).unwrap_err();
    assert!(matches!(error, sso::Error::InvalidStatus(500)), "{error:?}");

}

#[test]
fn malformed_success() {

    let mut provider = TestProvider::new();
    provider.server.mock("POST", "/client/register")
        .with_status(200)
        .with_body(json!({ "clientId": "cid" }).to_string())
        .create();

    let error = provider.inner.register_client("acg-cli", "public").unwrap_err();
    match error {
        sso::Error::Internal(e) => assert!(e.is::<serde_path_to_error::Error<serde_json::Error>>()),
        e => panic!("{e:?}"),
    }

}

#[test]
fn generate_and_write() {

    let mut provider = TestProvider::new();
    let server = &mut provider.server;

    server.mock("POST", "/client/register")
        .with_status(200)
        .with_body(json!({
            "clientId": "cid",
            "clientSecret": "csecret",
            "clientIdIssuedAt": 1_690_000_000,
            "clientSecretExpiresAt": 1_700_000_000,
        }).to_string())
        .create();

    server.mock("POST", "/device_authorization")
        .match_body(Matcher::PartialJson(json!({ "startUrl": START_URL })))
        .with_status(200)
        .with_body(json!({
            "deviceCode": "dev",
            "userCode": "ABCD-EFGH",
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "expiresIn": 600,
        }).to_string())
        .create();

    let pending = server.mock("POST", "/token")
        .with_status(400)
        .with_body(json!({ "error": "authorization_pending" }).to_string())
        .expect(2)
        .create();

    let success = server.mock("POST", "/token")
        .with_status(200)
        .with_body(json!({ "accessToken": "tok", "expiresIn": 28800 }).to_string())
        .expect(1)
        .create();

    server.mock("GET", "/assignment/accounts")
        .match_query(Matcher::Any)
        .match_header("x-amz-sso_bearer_token", "tok")
        .with_status(200)
        .with_body(json!({
            "accountList": [
                { "accountId": "000000000001", "accountName": "Prod" },
                { "accountId": "000000000002", "accountName": "Sandbox-Team" },
            ],
        }).to_string())
        .create();

    server.mock("GET", "/assignment/roles")
        .match_query(Matcher::UrlEncoded("account_id".to_string(), "000000000001".to_string()))
        .with_status(200)
        .with_body(json!({
            "roleList": [
                { "roleName": "Admin", "accountId": "000000000001" },
                { "roleName": "ReadOnly", "accountId": "000000000001" },
            ],
        }).to_string())
        .create();

    server.mock("GET", "/assignment/roles")
        .match_query(Matcher::UrlEncoded("account_id".to_string(), "000000000002".to_string()))
        .with_status(200)
        .with_body(json!({
            "roleList": [
                { "roleName": "Developer", "accountId": "000000000002" },
            ],
        }).to_string())
        .create();

    let mut generator = Generator::new(START_URL, "eu-west-1");
    generator.authorizer_mut().set_default_interval(Duration::from_millis(5));

    let mut events = EventLog::default();
    let records = generator.generate(&mut provider.inner, (), &mut events).unwrap();

    pending.assert();
    success.assert();

    let names = records.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["prod-admin", "prod-readonly", "sandbox-team-developer"]);
    assert!(records.iter().all(|r| r.region == "eu-west-1" && r.start_url == START_URL));

    assert_eq!(events.0, [
        "register_client",
        "registered_client",
        "start_device_authorization",
        "device_authorization:ABCD-EFGH",
        "authorization_pending",
        "authorization_pending",
        "authorized",
        "list_accounts",
        "listed_accounts:2",
        "listed_roles:000000000001:2",
        "listed_roles:000000000002:1",
        "rendered:3",
    ]);

    let dir = tempfile::Builder::new()
        .prefix("")
        .suffix(".config")
        .tempdir_in(env!("CARGO_TARGET_TMPDIR"))
        .unwrap();

    let file = dir.path().join(".aws").join("config");
    config::output(&Mode::Write(file.clone()), &records, std::io::sink(), ()).unwrap();

    assert_eq!(fs::read_to_string(&file).unwrap(), "\
[profile prod-admin]
sso_start_url=https://d-1234567890.awsapps.com/start
sso_region=eu-west-1
sso_account_id=000000000001
sso_role_name=Admin

[profile prod-readonly]
sso_start_url=https://d-1234567890.awsapps.com/start
sso_region=eu-west-1
sso_account_id=000000000001
sso_role_name=ReadOnly

[profile sandbox-team-developer]
sso_start_url=https://d-1234567890.awsapps.com/start
sso_region=eu-west-1
sso_account_id=000000000002
sso_role_name=Developer

");

}

#[test]
fn generate_denied() {

    let mut provider = TestProvider::new();
    let server = &mut provider.server;

    server.mock("POST", "/client/register")
        .with_status(200)
        .with_body(json!({ "clientId": "cid", "clientSecret": "csecret" }).to_string())
        .create();

    server.mock("POST", "/device_authorization")
        .with_status(200)
        .with_body(json!({
            "deviceCode": "dev",
            "userCode": "ABCD-EFGH",
            "verificationUri": "https://device.sso.us-east-1.amazonaws.com/",
            "expiresIn": 600,
        }).to_string())
        .create();

    server.mock("POST", "/token")
        .with_status(400)
        .with_body(json!({ "error": "access_denied" }).to_string())
        .create();

    let accounts = server.mock("GET", "/assignment/accounts")
        .match_query(Matcher::Any)
        .expect(0)
        .create();

    let mut generator = Generator::new(START_URL, "us-east-1");
    generator.authorizer_mut().set_default_interval(Duration::from_millis(5));

    let error = generator.generate(&mut provider.inner, (), ()).unwrap_err();
    assert!(!error.is_cancelled());
    match error {
        acg::Error::Sso(sso::Error::Provider { code, .. }) => assert_eq!(code, "access_denied"),
        e => panic!("{e:?}"),
    }

    accounts.assert();

}
