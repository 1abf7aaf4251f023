//! HTTP(S) utilities shared by provider clients, everything is based on async reqwest
//! with tokio.

use reqwest::{Client, ClientBuilder};


/// The user agent to be used on each HTTP request.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Get a new client builder for async HTTP(S) requests.
pub fn builder() -> ClientBuilder {
    Client::builder().user_agent(USER_AGENT)
}

/// Base URLs of the two AWS services involved in a SSO login: the OIDC service that
/// registers clients and issues tokens, and the SSO portal that lists assignments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL of the OIDC service, without trailing slash.
    pub oidc: String,
    /// Base URL of the SSO portal service, without trailing slash.
    pub portal: String,
}

impl Endpoints {

    /// Public AWS endpoints for the given region.
    pub fn for_region(region: &str) -> Self {
        Self {
            oidc: format!("https://oidc.{region}.amazonaws.com"),
            portal: format!("https://portal.sso.{region}.amazonaws.com"),
        }
    }

    /// Use a single base URL for both services, mostly useful when testing against a
    /// local mock server.
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            oidc: base.to_string(),
            portal: base.to_string(),
        }
    }

}
