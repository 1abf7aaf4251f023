//! Implementing the logic for the different CLI commands.

mod generate;

use std::process::{self, ExitCode};
use std::io;

use chrono::Local;

use acg::sso;
use acg::{Cancel, Event};

use crate::parse::{CliArgs, CliCmd, CliOutput};
use crate::output::{Output, LogLevel};
use crate::format::{DATE_FORMAT, DurationFmt};


pub fn main(args: &CliArgs) -> ExitCode {

    // Create the adequate output handle depending on the output and verbose options.
    let mut out = match args.output {
        CliOutput::Human => Output::human(match args.verbose {
            0 => LogLevel::Pending,
            1.. => LogLevel::Info,
        }),
        CliOutput::Machine => Output::tab_separated(),
    };

    init_tracing(args.verbose);

    // We can set only one Ctrl-C handler for the whole CLI, the first interrupt cancels
    // the running operation, which then exits gracefully, the second one exits now.
    let cancel = Cancel::new();
    let handler_cancel = cancel.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        if handler_cancel.is_cancelled() {
            process::exit(130);
        }
        handler_cancel.cancel();
    }) {
        out.log("warn_interrupt_handler")
            .arg(&error)
            .warning(format_args!("Failed to install the interrupt handler: {error}"));
    }

    let mut cli = Cli {
        out,
        cancel,
    };

    match &args.cmd {
        CliCmd::Generate(generate_args) => generate::generate(&mut cli, generate_args),
    }

}

/// Install the diagnostics subscriber, the filter is taken from 'RUST_LOG' if present,
/// or derived from the verbosity.
fn init_tracing(verbose: u8) {

    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(match verbose {
            0..=1 => "warn",
            2.. => "warn,acg=debug",
        }));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

}

/// Shared CLI data.
#[derive(Debug)]
pub struct Cli {
    pub out: Output,
    /// Cancel handle triggered on interrupt.
    pub cancel: Cancel,
}

/// Generic handler logging the generation events.
#[derive(Debug)]
pub struct LogHandler<'a> {
    /// Handle to the output.
    out: &'a mut Output,
}

impl<'a> LogHandler<'a> {

    pub fn new(out: &'a mut Output) -> Self {
        Self { out }
    }

}

impl acg::Handler for LogHandler<'_> {
    fn on_event(&mut self, event: Event) {

        match event {
            Event::RegisterClient { name } => {
                self.out.log("register_client")
                    .arg(name)
                    .pending(format_args!("Registering client {name}"));
            }
            Event::RegisteredClient { client } => {
                self.out.log("registered_client")
                    .arg(&client.client_id)
                    .arg(client.expires_at.to_rfc3339())
                    .success(format_args!("Registered client, it expires on {}",
                        client.expires_at.with_timezone(&Local).format(DATE_FORMAT)));
            }
            Event::StartDeviceAuthorization { start_url } => {
                self.out.log("start_device_authorization")
                    .arg(start_url)
                    .pending(format_args!("Requesting device code for {start_url}"));
            }
            Event::DeviceAuthorization { start_url: _, auth } => {
                self.out.log("device_authorization")
                    .arg(auth.user_uri())
                    .arg(&auth.user_code)
                    .arg(auth.expires_in.as_secs())
                    .success(format_args!("Device code created, it expires in {}", DurationFmt(auth.expires_in)))
                    .additional(format_args!("Open {} and check that the code is {}", auth.user_uri(), auth.user_code));
            }
            Event::BrowserOpened { uri } => {
                self.out.log("browser_opened")
                    .arg(uri)
                    .additional("Your web browser has been opened");
            }
            Event::BrowserFailed { uri, error } => {
                self.out.log("browser_failed")
                    .arg(uri)
                    .arg(error)
                    .warning(format_args!("Failed to open your web browser: {error}"))
                    .additional("You need to open the link above manually");
            }
            Event::AuthorizationPending { interval } => {
                self.out.log("authorization_pending")
                    .arg(interval.as_millis())
                    .pending("Waiting for you to accept the request in your browser...");
            }
            Event::SlowDown { interval } => {
                self.out.log("slow_down")
                    .arg(interval.as_millis())
                    .newline()
                    .info(format_args!("Polling too fast, now waiting {:.1}s between attempts", interval.as_secs_f32()));
            }
            Event::Authorized { start_url, token, interval: _ } => {
                self.out.log("authorized")
                    .arg(start_url)
                    .arg(token.expires_in().as_secs())
                    .success(format_args!("Token created, it expires in {}", DurationFmt(token.expires_in())));
            }
            Event::ListAccounts => {
                self.out.log("list_accounts")
                    .pending("Listing accounts...");
            }
            Event::ListedAccounts { accounts } => {
                self.out.log("listed_accounts")
                    .arg(accounts.len())
                    .success(format_args!("Found {} accounts", accounts.len()));
            }
            Event::ListedRoles { account, roles } => {
                self.out.log("listed_roles")
                    .arg(&account.id)
                    .arg(&account.name)
                    .args(roles.iter().map(|role| &role.name))
                    .success(format_args!("Found {} roles in {} ({})", roles.len(), account.name, account.id));
            }
            Event::Rendered { records } => {
                self.out.log("rendered")
                    .arg(records.len())
                    .info(format_args!("Rendered {} profiles", records.len()));
            }
            Event::RemovedConfig { file } => {
                self.out.log("removed_config")
                    .arg(file.display())
                    .info(format_args!("Removed existing config file {}", file.display()));
            }
            _ => {}
        }

    }
}

/// Log a generation error.
pub fn log_error(cli: &mut Cli, error: &acg::Error) {
    match error {
        acg::Error::Sso(error) => log_sso_error(cli, error),
        acg::Error::Io(error) => log_any_error(cli, error, false),
        _ => log_any_error(cli, error, false),
    }
}

/// Log an error from the identity provider or the device authorization flow.
pub fn log_sso_error(cli: &mut Cli, error: &sso::Error) {
    match error {
        sso::Error::Cancelled => {
            cli.out.log("error_cancelled")
                .newline()
                .error("Operation cancelled");
        }
        sso::Error::InvalidStatus(status) => {
            cli.out.log("error_sso_invalid_status")
                .arg(status)
                .newline()
                .error(format_args!("Invalid status from the identity provider: {status}"));
        }
        sso::Error::Provider { code, description } => {

            let mut log = cli.out.log(match code.as_str() {
                "expired_token" | "ExpiredTokenException" => "error_sso_expired",
                "access_denied" | "AccessDeniedException" => "error_sso_denied",
                "UnauthorizedException" => "error_sso_unauthorized",
                _ => "error_sso_provider",
            });

            log.arg(code)
                .arg(description.as_deref().unwrap_or_default())
                .newline();

            match code.as_str() {
                "expired_token" | "ExpiredTokenException" =>
                    log.error("The device code expired before the request has been accepted"),
                "access_denied" | "AccessDeniedException" =>
                    log.error("The request has been denied"),
                "UnauthorizedException" =>
                    log.error("The access token has been rejected by the access portal"),
                _ => log.error(format_args!("Error from the identity provider: {code}")),
            };

            if let Some(description) = description {
                log.additional(description);
            }

        }
        sso::Error::Internal(error) => {
            log_any_error(cli, &**error, false);
        }
        _ => {
            cli.out.log("error_sso_unknown")
                .arg(error)
                .newline()
                .error(format_args!("Unknown error: {error}"));
        }
    }
}

/// Log any error, recursing into its sources.
pub fn log_any_error(cli: &mut Cli, error: &(dyn std::error::Error + 'static), additional: bool) {

    let level = if additional { LogLevel::Additional } else { LogLevel::Error };
    let indent = if additional { "  " } else { "" };

    if let Some(error) = error.downcast_ref::<io::Error>() {

        let mut log = cli.out.log("error_io");
        log.arg(io_error_kind_code(error).unwrap_or("other"));
        log.arg(error);

        // Newline because I/O errors are unexpected and we want to keep any previous context.
        log.newline()
            .line(level, format_args!("{indent}I/O error: {error}"));

    } else if let Some(error) = error.downcast_ref::<reqwest::Error>() {
        cli.out.log("error_reqwest")
            .args(error.status().map(|status| format!("status:{:03}", status.as_u16())))
            .args(error.url().map(|url| format!("url:{url}")))
            .newline()
            .line(level, format_args!("{indent}Network error: {error}"));

    } else if let Some(error) = error.downcast_ref::<serde_json::Error>() {
        cli.out.log("error_json")
            .arg(error)
            .arg("")
            .newline()
            .line(level, format_args!("{indent}JSON error: {error}"));

    } else if let Some(error) = error.downcast_ref::<serde_path_to_error::Error<serde_json::Error>>() {
        cli.out.log("error_json")
            .arg(error.inner())
            .arg(error.path())
            .newline()
            .line(level, format_args!("{indent}JSON error: {error}"))
            .additional(format_args!("{indent}At {}", error.path()));

    } else {
        cli.out.log("error_unknown")
            .arg(error)
            .newline()
            .line(level, format_args!("{indent}Unknown error: {error}"));

    }

    if let Some(source) = error.source() {
        log_any_error(cli, source, true);
    }

}

fn io_error_kind_code(error: &io::Error) -> Option<&'static str> {
    use io::ErrorKind;
    Some(match error.kind() {
        ErrorKind::NotFound => "not_found",
        ErrorKind::PermissionDenied => "permission_denied",
        ErrorKind::ConnectionRefused => "connection_refused",
        ErrorKind::ConnectionReset => "connection_reset",
        ErrorKind::ConnectionAborted => "connection_aborted",
        ErrorKind::NotConnected => "not_connected",
        ErrorKind::AlreadyExists => "already_exists",
        ErrorKind::InvalidInput => "invalid_input",
        ErrorKind::InvalidData => "invalid_data",
        ErrorKind::TimedOut => "timed_out",
        ErrorKind::Interrupted => "interrupted",
        ErrorKind::Unsupported => "unsupported",
        ErrorKind::UnexpectedEof => "unexpected_eof",
        ErrorKind::IsADirectory => "is_a_directory",
        ErrorKind::ReadOnlyFilesystem => "read_only_filesystem",
        ErrorKind::StorageFull => "storage_full",
        _ => return None,
    })
}
