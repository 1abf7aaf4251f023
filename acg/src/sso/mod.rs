//! AWS IAM Identity Center (SSO) data model and provider abstraction.
//!
//! The [`Provider`] trait is the only boundary with the identity provider, the
//! [`HttpProvider`] implementation talks to the real AWS services, but anything
//! implementing the trait can be used to drive the device authorization flow and the
//! access enumeration.

mod http;

use std::time::Duration;
use std::fmt;

use chrono::{DateTime, Utc};

pub use http::HttpProvider;


/// The OAuth grant type used when polling the token endpoint.
pub const DEVICE_CODE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// A registered OIDC client, obtained once per flow and never persisted.
#[derive(Clone)]
pub struct ClientCredential {
    pub client_id: String,
    pub client_secret: String,
    /// Time at which the client secret expires.
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A device authorization issued by the provider, to be completed by the user in a
/// browser while the client polls the token endpoint.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Same as the verification URI but with the user code already embedded.
    pub verification_uri_complete: Option<String>,
    /// Lifetime of the device code.
    pub expires_in: Duration,
    /// Suggested interval between two token polls, if any.
    pub interval: Option<Duration>,
}

impl DeviceAuthorization {

    /// Return the URI the user should open, the complete variant if available because
    /// it doesn't require the user to type the user code.
    pub fn user_uri(&self) -> &str {
        self.verification_uri_complete.as_deref().unwrap_or(&self.verification_uri)
    }

}

/// An access token for the SSO portal, only held in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_in: Duration,
}

impl AccessToken {

    pub fn new(value: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            value: value.into(),
            expires_in,
        }
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[inline]
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// An AWS account reachable with an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// A role that can be assumed within an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
    pub account_id: String,
}

/// A single page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The continuation token to give to the next request, none on the last page.
    pub next_token: Option<String>,
}

/// Outcome of a single poll of the token endpoint.
#[derive(Debug)]
pub enum TokenPoll {
    /// The user has completed the authorization.
    Success(AccessToken),
    /// The user has not yet completed the authorization.
    Pending,
    /// The client is polling too fast and should increase its interval.
    SlowDown,
    /// Any other error, the flow can't continue.
    Fatal(Error),
}

impl TokenPoll {

    /// Classify an error returned by the token endpoint, only provider errors with a
    /// pending or slow down code are recoverable.
    pub fn from_error(error: Error) -> Self {
        if let Error::Provider { code, .. } = &error {
            match code.as_str() {
                "authorization_pending" | "AuthorizationPendingException" => return Self::Pending,
                "slow_down" | "SlowDownException" => return Self::SlowDown,
                _ => {}
            }
        }
        Self::Fatal(error)
    }

}

/// The identity provider, every call is blocking.
pub trait Provider {

    /// Register a new OIDC client of the given name and type.
    fn register_client(&mut self, name: &str, kind: &str) -> Result<ClientCredential>;

    /// Request a device code for the given start URL.
    fn start_device_authorization(&mut self,
        client: &ClientCredential,
        start_url: &str,
    ) -> Result<DeviceAuthorization>;

    /// Poll the token endpoint once for the given device code.
    fn create_token(&mut self, client: &ClientCredential, device_code: &str) -> TokenPoll;

    /// List one page of accounts, the first page is requested without next token.
    fn list_accounts(&mut self,
        token: &AccessToken,
        next_token: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Page<AccountInfo>>;

    /// List one page of roles for the given account.
    fn list_account_roles(&mut self,
        token: &AccessToken,
        account_id: &str,
        next_token: Option<&str>,
        max_results: Option<u32>,
    ) -> Result<Page<RoleInfo>>;

}

impl<P: Provider + ?Sized> Provider for &mut P {

    #[inline]
    fn register_client(&mut self, name: &str, kind: &str) -> Result<ClientCredential> {
        (**self).register_client(name, kind)
    }

    #[inline]
    fn start_device_authorization(&mut self, client: &ClientCredential, start_url: &str) -> Result<DeviceAuthorization> {
        (**self).start_device_authorization(client, start_url)
    }

    #[inline]
    fn create_token(&mut self, client: &ClientCredential, device_code: &str) -> TokenPoll {
        (**self).create_token(client, device_code)
    }

    #[inline]
    fn list_accounts(&mut self, token: &AccessToken, next_token: Option<&str>, max_results: Option<u32>) -> Result<Page<AccountInfo>> {
        (**self).list_accounts(token, next_token, max_results)
    }

    #[inline]
    fn list_account_roles(&mut self, token: &AccessToken, account_id: &str, next_token: Option<&str>, max_results: Option<u32>) -> Result<Page<RoleInfo>> {
        (**self).list_account_roles(token, account_id, next_token, max_results)
    }

}

/// Errors that can happen when talking to the identity provider.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// An unexpected HTTP status has been received without any error payload.
    #[error("invalid status: {0}")]
    InvalidStatus(u16),
    /// The provider returned an error with the given code, such as `expired_token`,
    /// `access_denied` or `UnauthorizedException`.
    #[error("provider error: {code}{}", DescriptionFmt(.description.as_deref()))]
    Provider {
        code: String,
        description: Option<String>,
    },
    /// The operation has been cancelled through its cancel handle.
    #[error("cancelled")]
    Cancelled,
    /// An internal error, such as a transport, I/O or decoding error.
    #[error("internal: {0}")]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Self::Internal(Box::new(value))
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for Error {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Self::Internal(Box::new(value))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Internal(Box::new(value))
    }
}

/// Format an optional error description as a parenthesized suffix.
struct DescriptionFmt<'a>(Option<&'a str>);

impl fmt::Display for DescriptionFmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(description) => write!(f, " ({description})"),
            None => Ok(()),
        }
    }
}

/// Type alias for a result with the SSO error type.
pub type Result<T> = std::result::Result<T, Error>;
