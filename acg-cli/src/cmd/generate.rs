//! Implementation of the 'generate' command.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use acg::config::{self, Mode};
use acg::flow::Browser;
use acg::sso::HttpProvider;
use acg::Generator;

use crate::parse::GenerateArgs;

use super::{Cli, LogHandler, log_any_error, log_error, log_sso_error};


pub fn generate(cli: &mut Cli, args: &GenerateArgs) -> ExitCode {

    let Some(config_file) = args.config_file.clone().or_else(default_config_file) else {

        cli.out.log("error_missing_home_dir")
            .error("There is no home directory for your platform, please specify the config file using --config-file")
            .additional("This file is usually located at '<home>/.aws/config'");

        return ExitCode::FAILURE;

    };

    let mode = match select_mode(cli, args, &config_file) {
        Ok(mode) => mode,
        Err(error) => {
            log_any_error(cli, &error, false);
            return ExitCode::FAILURE;
        }
    };

    let provider = match HttpProvider::new(&args.region) {
        Ok(provider) => provider,
        Err(error) => {
            log_sso_error(cli, &error);
            return ExitCode::FAILURE;
        }
    };

    let mut generator = Generator::new(&args.sso_url, &args.region);
    generator.authorizer_mut().set_cancel(cli.cancel.clone());

    let browser = (!args.no_browser).then_some(WebBrowser);

    let records = match generator.generate(provider, browser, LogHandler::new(&mut cli.out)) {
        Ok(records) => records,
        Err(error) => {
            log_error(cli, &error);
            return ExitCode::FAILURE;
        }
    };

    if records.is_empty() {
        cli.out.log("warn_no_profile")
            .warning("No role can be assumed with this login, no profile has been generated");
    }

    if let Err(error) = config::output(&mode, &records, io::stdout().lock(), LogHandler::new(&mut cli.out)) {
        log_any_error(cli, &error, false);
        return ExitCode::FAILURE;
    }

    match mode {
        Mode::Write(file) => {
            cli.out.log("config_written")
                .arg(file.display())
                .arg(records.len())
                .success(format_args!("Wrote {} profiles to {}", records.len(), file.display()));
        }
        Mode::Print => {
            cli.out.log("config_printed")
                .arg(config_file.display())
                .arg(records.len())
                .success(format_args!("Printed {} profiles", records.len()))
                .additional(format_args!("You can use this profile values to update your config file({})", config_file.display()));
        }
    }

    ExitCode::SUCCESS

}

/// The standard config file of the AWS CLI, in the home directory.
fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".aws").join("config"))
}

/// Select the output mode from the arguments, asking the user before overwriting an
/// existing config file. This is done before logging in so that the user isn't asked
/// after the possibly long authorization.
fn select_mode(cli: &mut Cli, args: &GenerateArgs, config_file: &Path) -> io::Result<Mode> {

    if args.print {
        return Ok(Mode::Print);
    }

    if args.yes || !config_file.try_exists()? {
        return Ok(Mode::Write(config_file.to_path_buf()));
    }

    let stdin = io::stdin();
    if !stdin.is_terminal() {
        cli.out.log("config_exists")
            .arg(config_file.display())
            .info("Config file already exists and no terminal to confirm overwrite, printing instead");
        return Ok(Mode::Print);
    }

    {
        let mut stderr = io::stderr().lock();
        write!(stderr, "Overwrite current config({})[y/N]? ", config_file.display())?;
        stderr.flush()?;
    }

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;

    if parse_answer(&answer) {
        Ok(Mode::Write(config_file.to_path_buf()))
    } else {
        Ok(Mode::Print)
    }

}

/// Only an explicit yes is accepted, anything else is the default no.
fn parse_answer(answer: &str) -> bool {
    matches!(answer.trim(), "y" | "Y")
}

/// Open the verification URI with the system's web browser.
#[derive(Debug, Clone, Copy)]
struct WebBrowser;

impl Browser for WebBrowser {
    fn open(&mut self, uri: &str) -> io::Result<bool> {
        webbrowser::open(uri)?;
        Ok(true)
    }
}
