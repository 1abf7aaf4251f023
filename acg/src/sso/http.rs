//! Provider implementation for the real AWS OIDC and SSO portal services.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::runtime::Runtime;

use crate::http::Endpoints;

use super::{AccessToken, AccountInfo, ClientCredential, DeviceAuthorization, Page,
    Provider, Result, Error, RoleInfo, TokenPoll, DEVICE_CODE_GRANT_TYPE};


/// Header used by AWS services to carry the error type on failed requests.
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";
/// Header used by the SSO portal to carry the access token.
const BEARER_TOKEN_HEADER: &str = "x-amz-sso_bearer_token";

/// The AWS identity provider, talking JSON over HTTPS. Each call blocks the current
/// thread on an internal single-threaded runtime, so this must not be used from within
/// an async context.
#[derive(Debug)]
pub struct HttpProvider {
    endpoints: Endpoints,
    client: Client,
    rt: Runtime,
}

impl HttpProvider {

    /// Create a provider for the public AWS endpoints of the given region.
    pub fn new(region: &str) -> Result<Self> {
        Self::with_endpoints(Endpoints::for_region(region))
    }

    /// Create a provider with explicit endpoints.
    pub fn with_endpoints(endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            endpoints,
            client: crate::http::builder().build()?,
            rt: crate::tokio::runtime()?,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

}

impl Provider for HttpProvider {

    fn register_client(&mut self, name: &str, kind: &str) -> Result<ClientCredential> {

        let url = format!("{}/client/register", self.endpoints.oidc);
        tracing::debug!(%url, name, kind, "registering oidc client");

        let req = RegisterClientRequest {
            client_name: name,
            client_type: kind,
        };

        let res = self.rt.block_on(async {
            let res = self.client.post(&url).json(&req).send().await?;
            read_json::<RegisterClientSuccess>(res).await
        })?;

        Ok(ClientCredential {
            client_id: res.client_id,
            client_secret: res.client_secret,
            expires_at: DateTime::<Utc>::from_timestamp(res.client_secret_expires_at, 0)
                .unwrap_or_default(),
        })

    }

    fn start_device_authorization(&mut self, client: &ClientCredential, start_url: &str) -> Result<DeviceAuthorization> {

        let url = format!("{}/device_authorization", self.endpoints.oidc);
        tracing::debug!(%url, start_url, "starting device authorization");

        let req = StartDeviceAuthorizationRequest {
            client_id: &client.client_id,
            client_secret: &client.client_secret,
            start_url,
        };

        let res = self.rt.block_on(async {
            let res = self.client.post(&url).json(&req).send().await?;
            read_json::<StartDeviceAuthorizationSuccess>(res).await
        })?;

        Ok(DeviceAuthorization {
            device_code: res.device_code,
            user_code: res.user_code,
            verification_uri: res.verification_uri,
            verification_uri_complete: res.verification_uri_complete,
            expires_in: Duration::from_secs(res.expires_in),
            interval: res.interval.filter(|&secs| secs > 0).map(Duration::from_secs),
        })

    }

    fn create_token(&mut self, client: &ClientCredential, device_code: &str) -> TokenPoll {

        let url = format!("{}/token", self.endpoints.oidc);
        tracing::debug!(%url, "polling token");

        let req = CreateTokenRequest {
            client_id: &client.client_id,
            client_secret: &client.client_secret,
            grant_type: DEVICE_CODE_GRANT_TYPE,
            device_code,
        };

        let res = self.rt.block_on(async {
            let res = self.client.post(&url).json(&req).send().await?;
            read_json::<CreateTokenSuccess>(res).await
        });

        match res {
            Ok(res) => TokenPoll::Success(AccessToken::new(res.access_token, Duration::from_secs(res.expires_in))),
            Err(error) => TokenPoll::from_error(error),
        }

    }

    fn list_accounts(&mut self, token: &AccessToken, next_token: Option<&str>, max_results: Option<u32>) -> Result<Page<AccountInfo>> {

        let url = format!("{}/assignment/accounts", self.endpoints.portal);
        tracing::debug!(%url, ?next_token, ?max_results, "listing accounts");

        let mut query = Vec::new();
        if let Some(max_results) = max_results {
            query.push(("max_result", max_results.to_string()));
        }
        if let Some(next_token) = next_token {
            query.push(("next_token", next_token.to_string()));
        }

        let res = self.rt.block_on(async {
            let res = self.client.get(&url)
                .query(&query)
                .header(BEARER_TOKEN_HEADER, token.value())
                .send().await?;
            read_json::<ListAccountsSuccess>(res).await
        })?;

        Ok(Page {
            items: res.account_list.into_iter()
                .map(|account| AccountInfo {
                    id: account.account_id,
                    name: account.account_name,
                    email: account.email_address,
                })
                .collect(),
            next_token: res.next_token.filter(|token| !token.is_empty()),
        })

    }

    fn list_account_roles(&mut self, token: &AccessToken, account_id: &str, next_token: Option<&str>, max_results: Option<u32>) -> Result<Page<RoleInfo>> {

        let url = format!("{}/assignment/roles", self.endpoints.portal);
        tracing::debug!(%url, account_id, ?next_token, ?max_results, "listing account roles");

        let mut query = vec![("account_id", account_id.to_string())];
        if let Some(max_results) = max_results {
            query.push(("max_result", max_results.to_string()));
        }
        if let Some(next_token) = next_token {
            query.push(("next_token", next_token.to_string()));
        }

        let res = self.rt.block_on(async {
            let res = self.client.get(&url)
                .query(&query)
                .header(BEARER_TOKEN_HEADER, token.value())
                .send().await?;
            read_json::<ListAccountRolesSuccess>(res).await
        })?;

        Ok(Page {
            items: res.role_list.into_iter()
                .map(|role| RoleInfo {
                    name: role.role_name,
                    account_id: role.account_id,
                })
                .collect(),
            next_token: res.next_token.filter(|token| !token.is_empty()),
        })

    }

}

/// Decode a successful JSON response, or turn the response into an error.
async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T> {

    if !res.status().is_success() {
        return Err(read_error(res).await);
    }

    let bytes = res.bytes().await?;
    let mut de = serde_json::Deserializer::from_slice(&bytes);
    Ok(serde_path_to_error::deserialize(&mut de)?)

}

/// Read the error of a failed response, AWS services give the error code either in the
/// JSON body (OIDC style `error` field) or in the error type header.
async fn read_error(res: Response) -> Error {

    let status = res.status().as_u16();
    let header_code = res.headers()
        .get(ERROR_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(':').next().unwrap_or(value).to_string())
        .filter(|code| !code.is_empty());

    let payload = match res.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ApiError>(&bytes).ok(),
        Err(_) => None,
    };

    let (body_code, description) = match payload {
        Some(payload) => (payload.error, payload.error_description.or(payload.message)),
        None => (None, None),
    };

    match body_code.or(header_code) {
        Some(code) => Error::Provider { code, description },
        None => Error::InvalidStatus(status),
    }

}

/// (JSON)
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientRequest<'a> {
    client_name: &'a str,
    client_type: &'a str,
}

/// (JSON)
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterClientSuccess {
    client_id: String,
    client_secret: String,
    #[allow(unused)]
    #[serde(default)]
    client_id_issued_at: i64,
    #[serde(default)]
    client_secret_expires_at: i64,
}

/// (JSON)
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct StartDeviceAuthorizationRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    start_url: &'a str,
}

/// (JSON)
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartDeviceAuthorizationSuccess {
    device_code: String,
    user_code: String,
    verification_uri: String,
    verification_uri_complete: Option<String>,
    expires_in: u64,
    /// Absent or zero when the provider has no suggestion.
    #[serde(default)]
    interval: Option<u64>,
}

/// (JSON)
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'a str,
    device_code: &'a str,
}

/// (JSON)
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTokenSuccess {
    access_token: String,
    /// Always "Bearer"
    #[allow(unused)]
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: u64,
}

/// (JSON) Generic error payload, OIDC errors use `error` and `error_description`
/// while the portal uses `message`.
#[derive(Debug, Clone, serde::Deserialize)]
struct ApiError {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

/// (JSON)
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAccountsSuccess {
    #[serde(default)]
    next_token: Option<String>,
    #[serde(default)]
    account_list: Vec<AccountEntry>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEntry {
    account_id: String,
    account_name: String,
    #[serde(default)]
    email_address: Option<String>,
}

/// (JSON)
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAccountRolesSuccess {
    #[serde(default)]
    next_token: Option<String>,
    #[serde(default)]
    role_list: Vec<RoleEntry>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleEntry {
    role_name: String,
    account_id: String,
}
