//! Command line parsing that keeps to the plugin contract
//!
//! clap reports a bad flag on stderr and exits 1, which a monitoring system
//! reads as WARNING. Here a bad flag is a configuration error like any other:
//! one UNKNOWN line on stdout and exit 3. `--help` and `--version` behave as
//! usual.

use lazy_static::lazy_static;
use regex::Regex;
use structopt::clap::{Error, ErrorKind};
use structopt::StructOpt;

use crate::results::Report;
use crate::threshold::ConfigError;
use crate::Status;

lazy_static! {
    static ref COLOR: Regex = Regex::new(r"\x1b\[[0-9;]*m").unwrap();
}

/// Parse the process arguments, exiting UNKNOWN if they are malformed
pub fn from_args<A: StructOpt>() -> A {
    match A::from_args_safe() {
        Ok(args) => args,
        Err(e) => match usage_report(&e) {
            Some(report) => report.print_and_exit(),
            None => e.exit(),
        },
    }
}

/// The report for a parse failure, or `None` when clap printed help or a
/// version
pub fn usage_report(err: &Error) -> Option<Report> {
    match err.kind {
        ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => None,
        _ => {
            let plain = COLOR.replace_all(&err.message, "");
            let first = plain.lines().next().unwrap_or("").trim();
            let reason = first.trim_start_matches("error:").trim();
            Some(Report::single(Status::Unknown, format!("UNKNOWN - {}", reason)))
        }
    }
}

/// A single device read has to end well inside the execution budget
pub fn check_read_timeout(read_timeout: u64, timeout: u64) -> Result<(), ConfigError> {
    if read_timeout == 0 || read_timeout >= timeout {
        Err(ConfigError::Invalid(format!(
            "--read-timeout {}s must be between 1s and --timeout {}s",
            read_timeout, timeout
        )))
    } else {
        Ok(())
    }
}
