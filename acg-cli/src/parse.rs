//! Implementation of the command line parser, using clap struct derivation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};


/// Long version with the compiler and git revision the binary has been built with.
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"), "\n",
    "rustc: ", env!("ACG_RUSTC_VERSION"), "\n",
    "revision: ", env!("ACG_GIT_REVISION"),
);

// ================= //
//    MAIN COMMAND   //
// ================= //

/// Command line utility to generate the AWS CLI config file with every account and role
/// you can reach through AWS IAM Identity Center (SSO).
#[derive(Debug, Parser)]
#[command(name = "acg", version, long_version = LONG_VERSION, author, disable_help_subcommand = true, max_term_width = 140)]
pub struct CliArgs {
    #[command(subcommand)]
    pub cmd: CliCmd,
    /// Enable verbose output, the more -v argument you put, the more verbose the
    /// utility will be. With two or more, HTTP diagnostics are also shown unless
    /// the 'RUST_LOG' environment variable is set.
    #[arg(short, env = "ACG_VERBOSE", action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Change the default output format of the logs.
    #[arg(long, env = "ACG_OUTPUT", default_value = "human")]
    pub output: CliOutput,
}

#[derive(Debug, Subcommand)]
pub enum CliCmd {
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutput {
    /// Human readable output, it is not guaranteed to be stable across releases, for
    /// that you should prefer using the 'machine' output. With this format, the
    /// verbosity is used to show more informative data.
    Human,
    /// Machine output mode to allow parsing by other programs, using tab ('\t', 0x09)
    /// separated values where the first value defines which kind of data to follow on
    /// the line, a line return ('\n', 0x0A) is used to split every line. If any line
    /// return or tab is encoded into a value within the line, it is escaped with the
    /// two characters '\n' (for line return) or '\t' (for tab), these are the only two
    /// escapes used. This mode is always verbose. If the utility exit with a failure
    /// code, you should expect finding a log message prefixed with `error_`,
    /// describing the error(s) causing the exit.
    Machine,
}

// ================= //
//  GENERATE COMMAND //
// ================= //

/// Generate the AWS CLI config file.
///
/// This command logs you in through the device authorization flow of your
/// organization's AWS IAM Identity Center: your web browser is opened on the
/// verification page and the command waits until you accept the request. Then
/// every account and role you can access is listed and a profile named
/// '<account>-<role>' (lower-cased) is generated for each of them.
///
/// If the config file doesn't exist yet, it is created. Otherwise you're asked if it
/// should be overwritten, if not, the profiles are printed on the standard output so
/// that you can update your config file manually. Logs are written to the standard
/// error, so printed profiles can be redirected to a file.
#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// The start URL of your AWS access portal, such as
    /// 'https://d-1234567890.awsapps.com/start'.
    #[arg(short = 's', long, env = "ACG_SSO_URL", value_name = "URL")]
    pub sso_url: String,
    /// The region of your AWS IAM Identity Center, also used as the SSO region of
    /// generated profiles.
    #[arg(short, long, env = "ACG_REGION", default_value = acg::DEFAULT_REGION)]
    pub region: String,
    /// Path to the config file to generate.
    ///
    /// When unspecified, this defaults to the standard AWS CLI config file of your
    /// system: '<home>/.aws/config'.
    #[arg(long, env = "ACG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,
    /// Prevent opening your system's web browser with the verification page, the page
    /// is only logged with its user code.
    #[arg(long, env = "ACG_NO_BROWSER")]
    pub no_browser: bool,
    /// Overwrite an existing config file without asking.
    #[arg(short, long, conflicts_with = "print")]
    pub yes: bool,
    /// Print the profiles on the standard output instead of writing the config file,
    /// the existing config file is left untouched.
    #[arg(long)]
    pub print: bool,
}
