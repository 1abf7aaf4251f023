//! Rendering of profile records in the AWS CLI config file format.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::fmt;

use crate::sso::RoleInfo;
use crate::{Event, Handler};


/// A single profile of the AWS CLI config file, for one role in one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    /// Profile name, lower-cased `<account name>-<role name>`.
    pub name: String,
    pub start_url: String,
    pub region: String,
    pub account_id: String,
    pub role_name: String,
}

impl ProfileRecord {

    pub fn new(account_name: &str, region: &str, start_url: &str, role: &RoleInfo) -> Self {
        Self {
            name: format!("{}-{}", account_name.to_lowercase(), role.name.to_lowercase()),
            start_url: start_url.to_string(),
            region: region.to_string(),
            account_id: role.account_id.clone(),
            role_name: role.name.clone(),
        }
    }

}

/// The config file layout of the profile, followed by a blank line.
impl fmt::Display for ProfileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[profile {}]", self.name)?;
        writeln!(f, "sso_start_url={}", self.start_url)?;
        writeln!(f, "sso_region={}", self.region)?;
        writeln!(f, "sso_account_id={}", self.account_id)?;
        writeln!(f, "sso_role_name={}", self.role_name)?;
        writeln!(f)
    }
}

/// Render the profile records of all roles of an account, in role order.
pub fn render(account_name: &str, region: &str, start_url: &str, roles: &[RoleInfo]) -> Vec<ProfileRecord> {
    roles.iter()
        .map(|role| ProfileRecord::new(account_name, region, start_url, role))
        .collect()
}

/// Where the rendered records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Replace the given config file with the records.
    Write(PathBuf),
    /// Print the records, leaving any config file untouched.
    Print,
}

/// Output the records depending on the mode, the printed output goes to the given
/// writer, which is usually the standard output.
pub fn output(mode: &Mode, records: &[ProfileRecord], print: impl Write, handler: impl Handler) -> io::Result<()> {
    match mode {
        Mode::Write(file) => write_file(file, records, handler),
        Mode::Print => write_records(print, records),
    }
}

/// Write the records to the config file, any pre-existing file is removed first and the
/// parent directory is created if missing.
pub fn write_file(file: &Path, records: &[ProfileRecord], mut handler: impl Handler) -> io::Result<()> {

    if remove_file(file)? {
        handler.on_event(Event::RemovedConfig { file });
    }

    if let Some(parent) = file.parent() && !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(file)?;

    write_records(io::BufWriter::new(file), records)

}

/// Remove the given file, returning false if it was already absent.
pub fn remove_file(file: &Path) -> io::Result<bool> {
    match fs::remove_file(file) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

fn write_records(mut writer: impl Write, records: &[ProfileRecord]) -> io::Result<()> {
    for record in records {
        write!(writer, "{record}")?;
    }
    writer.flush()
}
