//! Device authorization flow, from client registration to access token.
//!
//! The flow goes through the following states:
//! - the client is registered with the provider, this is fatal on failure;
//! - a device code is issued for the start URL;
//! - the verification URI is shown to the user and opened in a browser if possible;
//! - the token endpoint is polled until the user completes the authorization, the
//!   poll interval grows every time the provider asks to slow down and never shrinks.
//!
//! See https://datatracker.ietf.org/doc/html/rfc8628

use std::time::Duration;
use std::io;

use crate::sso::{AccessToken, ClientCredential, DeviceAuthorization, Error, Provider, Result, TokenPoll};
use crate::tokio::Cancel;
use crate::{Event, Handler};


/// The client name registered with the provider by default.
pub const DEFAULT_CLIENT_NAME: &str = "acg-cli";
/// The type of the registered client, only public clients can use device codes.
pub const CLIENT_TYPE: &str = "public";
/// Poll interval used when the provider doesn't suggest one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
/// Increment added to the poll interval each time the provider asks to slow down.
pub const SLOW_DOWN_INCREMENT: Duration = Duration::from_secs(5);

/// The device authorization flow authenticator.
#[derive(Debug, Clone)]
pub struct Authorizer {
    client_name: String,
    default_interval: Duration,
    slow_down_increment: Duration,
    cancel: Cancel,
}

impl Authorizer {

    pub fn new() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            default_interval: DEFAULT_INTERVAL,
            slow_down_increment: SLOW_DOWN_INCREMENT,
            cancel: Cancel::new(),
        }
    }

    #[inline]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Change the name of the client registered with the provider.
    pub fn set_client_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.client_name = name.into();
        self
    }

    #[inline]
    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    /// Change the poll interval used when the provider doesn't suggest any.
    pub fn set_default_interval(&mut self, interval: Duration) -> &mut Self {
        self.default_interval = interval;
        self
    }

    #[inline]
    pub fn slow_down_increment(&self) -> Duration {
        self.slow_down_increment
    }

    /// Change the increment added to the poll interval on each slow down.
    pub fn set_slow_down_increment(&mut self, increment: Duration) -> &mut Self {
        self.slow_down_increment = increment;
        self
    }

    /// The cancel handle observed by this authorizer, it can be cloned and triggered
    /// from another thread to abort the flow.
    #[inline]
    pub fn cancel(&self) -> &Cancel {
        &self.cancel
    }

    /// Replace the cancel handle observed by this authorizer.
    pub fn set_cancel(&mut self, cancel: Cancel) -> &mut Self {
        self.cancel = cancel;
        self
    }

    /// Run the whole flow for the given start URL, the region is the one of the given
    /// provider. This blocks until the user completes the authorization in a browser,
    /// the provider returns a fatal error (including device code expiration) or the
    /// cancel handle is triggered.
    pub fn authorize(&self,
        mut provider: impl Provider,
        start_url: &str,
        mut browser: impl Browser,
        mut handler: impl Handler,
    ) -> Result<AccessToken> {

        self.check_cancel()?;

        handler.on_event(Event::RegisterClient { name: &self.client_name });
        let client = provider.register_client(&self.client_name, CLIENT_TYPE)?;
        handler.on_event(Event::RegisteredClient { client: &client });

        self.check_cancel()?;

        handler.on_event(Event::StartDeviceAuthorization { start_url });
        let auth = provider.start_device_authorization(&client, start_url)?;
        handler.on_event(Event::DeviceAuthorization { start_url, auth: &auth });

        let uri = auth.user_uri();
        match browser.open(uri) {
            Ok(true) => handler.on_event(Event::BrowserOpened { uri }),
            Ok(false) => {}
            Err(error) => handler.on_event(Event::BrowserFailed { uri, error: &error }),
        }

        let (token, interval) = self.poll(&mut provider, &client, &auth, &mut handler)?;
        handler.on_event(Event::Authorized { start_url, token: &token, interval });
        Ok(token)

    }

    /// Poll the token endpoint until success, fatal error or cancellation. The access
    /// token is returned with the poll interval in use at the end.
    fn poll(&self,
        mut provider: impl Provider,
        client: &ClientCredential,
        auth: &DeviceAuthorization,
        mut handler: impl Handler,
    ) -> Result<(AccessToken, Duration)> {

        let mut interval = auth.interval.unwrap_or(self.default_interval);

        loop {

            self.check_cancel()?;

            match provider.create_token(client, &auth.device_code) {
                TokenPoll::Success(token) => return Ok((token, interval)),
                TokenPoll::Pending => {
                    handler.on_event(Event::AuthorizationPending { interval });
                }
                TokenPoll::SlowDown => {
                    interval += self.slow_down_increment;
                    handler.on_event(Event::SlowDown { interval });
                }
                TokenPoll::Fatal(error) => return Err(error),
            }

            if !crate::tokio::sync(crate::tokio::sleep(interval, &self.cancel))? {
                return Err(Error::Cancelled);
            }

        }

    }

    #[inline]
    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// A capability for opening the verification URI outside of the process, usually in
/// the user's web browser.
pub trait Browser {
    /// Open the given URI, returning false if nothing has been opened on purpose.
    /// An error is never fatal to the flow, it's only reported to the handler.
    fn open(&mut self, uri: &str) -> io::Result<bool>;
}

impl<B: Browser + ?Sized> Browser for &mut B {
    #[inline]
    fn open(&mut self, uri: &str) -> io::Result<bool> {
        (**self).open(uri)
    }
}

/// No browser, the URI is only reported to the handler.
impl Browser for () {
    fn open(&mut self, uri: &str) -> io::Result<bool> {
        let _ = uri;
        Ok(false)
    }
}

impl<B: Browser> Browser for Option<B> {
    fn open(&mut self, uri: &str) -> io::Result<bool> {
        match self {
            Some(browser) => browser.open(uri),
            None => Ok(false),
        }
    }
}
