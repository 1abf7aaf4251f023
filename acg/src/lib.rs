//! ACG is a library and CLI for generating AWS CLI profiles from the accounts and roles
//! reachable through an AWS IAM Identity Center (SSO) login.
//!
//! The [`Generator`] drives the whole procedure: a [device authorization flow](flow)
//! produces an access token, the token is used to [enumerate](access) every account
//! and role, which are finally [rendered](config) as profile records.

mod http;
mod tokio;

pub mod sso;
pub mod flow;
pub mod access;
pub mod config;

use std::path::Path;
use std::time::Duration;
use std::io;

pub use crate::http::{Endpoints, USER_AGENT};
pub use crate::tokio::Cancel;

use sso::{AccessToken, AccountInfo, ClientCredential, DeviceAuthorization, Provider, RoleInfo};
use config::ProfileRecord;
use flow::{Authorizer, Browser};


/// The default region of the identity center when none is given.
pub const DEFAULT_REGION: &str = "us-east-1";

/// The full generation procedure, from login to rendered profiles.
#[derive(Debug, Clone)]
pub struct Generator {
    start_url: String,
    region: String,
    authorizer: Authorizer,
}

impl Generator {

    /// Create a new generator for the given start URL (such as
    /// `https://d-1234567890.awsapps.com/start`) and identity center region.
    pub fn new(start_url: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            region: region.into(),
            authorizer: Authorizer::new(),
        }
    }

    #[inline]
    pub fn start_url(&self) -> &str {
        &self.start_url
    }

    #[inline]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[inline]
    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    /// Access the underlying authorizer to change its settings, such as its cancel
    /// handle.
    #[inline]
    pub fn authorizer_mut(&mut self) -> &mut Authorizer {
        &mut self.authorizer
    }

    /// Authenticate, then list every account and its roles and render them as profile
    /// records, in account-then-role discovery order. Nothing is returned if any step
    /// fails, so partial results are never rendered.
    pub fn generate(&self,
        mut provider: impl Provider,
        browser: impl Browser,
        mut handler: impl Handler,
    ) -> Result<Vec<ProfileRecord>> {

        let token = self.authorizer.authorize(&mut provider, &self.start_url, browser, &mut handler)?;
        let access = access::collect(&mut provider, &token, self.authorizer.cancel(), &mut handler)?;

        let mut records = Vec::new();
        for entry in &access {
            records.extend(config::render(&entry.account.name, &self.region, &self.start_url, &entry.roles));
        }

        handler.on_event(Event::Rendered { records: &records });
        Ok(records)

    }

}

/// Handler for events happening during the generation.
pub trait Handler {
    /// Handle a single event.
    fn on_event(&mut self, event: Event);
}

impl<H: Handler + ?Sized> Handler for &mut H {
    #[inline]
    fn on_event(&mut self, event: Event) {
        (**self).on_event(event)
    }
}

impl Handler for () {
    fn on_event(&mut self, event: Event) {
        let _ = event;
    }
}

/// Events happening during the generation.
#[derive(Debug)]
#[non_exhaustive]
pub enum Event<'a> {
    /// A new OIDC client is going to be registered with the given name.
    RegisterClient { name: &'a str },
    /// The OIDC client has been registered.
    RegisteredClient { client: &'a ClientCredential },
    /// A device code is going to be requested for the start URL.
    StartDeviceAuthorization { start_url: &'a str },
    /// The device code has been issued, the user should now open the verification URI
    /// and possibly type the user code.
    DeviceAuthorization { start_url: &'a str, auth: &'a DeviceAuthorization },
    /// The verification URI has been opened in the user's browser.
    BrowserOpened { uri: &'a str },
    /// The browser could not be opened, the user has to open the URI manually.
    BrowserFailed { uri: &'a str, error: &'a io::Error },
    /// The user has not yet authorized the device, the next poll happens after the
    /// given interval.
    AuthorizationPending { interval: Duration },
    /// The provider asked to slow down, the given interval is the new, increased one.
    SlowDown { interval: Duration },
    /// The access token has been issued, the poll interval in use at that time is
    /// given.
    Authorized { start_url: &'a str, token: &'a AccessToken, interval: Duration },
    /// Accounts are going to be listed.
    ListAccounts,
    /// All accounts reachable with the token have been listed.
    ListedAccounts { accounts: &'a [AccountInfo] },
    /// All roles of the given account have been listed.
    ListedRoles { account: &'a AccountInfo, roles: &'a [RoleInfo] },
    /// All profile records have been rendered.
    Rendered { records: &'a [ProfileRecord] },
    /// The pre-existing config file has been removed before writing.
    RemovedConfig { file: &'a Path },
}

/// The top-level error of the generation procedure.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Error while authenticating or listing accounts and roles.
    #[error("sso: {0}")]
    Sso(#[from] sso::Error),
    /// Error while writing the config file.
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl Error {

    /// Return true if the error is caused by a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Sso(sso::Error::Cancelled))
    }

}

/// Type alias for a result with the top-level error type.
pub type Result<T> = std::result::Result<T, Error>;
