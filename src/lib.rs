//! Probe plugins: strongly typed Nagios checks for network chassis, port
//! error counters and rsnapshot backups.
//!
//! Every check in here follows the same protocol: read some values through a
//! [`reader::DeviceReader`], compare them against [`threshold::Threshold`]s,
//! record one finding per subsystem into a [`results::CheckResults`], and then
//! print exactly one line and exit with the worst [`Status`] seen.
//!
//! ```rust
//! use probe_plugins::results::CheckResults;
//! use probe_plugins::threshold::{evaluate, Direction, Threshold};
//! use probe_plugins::Status;
//!
//! let mut results = CheckResults::new();
//! let memory = Threshold::new(85.0, 90.0);
//! let status = evaluate(95.0, memory, Direction::HigherIsWorse);
//! results.record("memory", status, "Memory usage at 95%.");
//! let (text, code) = results.finalize().render();
//! assert_eq!(text, "Memory usage at 95%.");
//! assert_eq!(code, 2);
//! ```
//!
//! The individual binaries are documented in the [`scripts`] module.

use std::fmt;
use std::process;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod checks;
pub mod cli;
pub mod delta;
pub mod logging;
pub mod reader;
pub mod results;
pub mod scripts;
pub mod threshold;
pub mod units;
pub mod watchdog;

/// All possible exit statuses for a check
///
/// The ordering is significant: `Ok < Warning < Critical < Unknown`, and a
/// run's status is the maximum of everything it has seen.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// The worse of two statuses
    pub fn combine(self, other: Status) -> Status {
        std::cmp::max(self, other)
    }

    /// The exit code that Nagios expects for this status
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    pub fn exit(self) -> ! {
        process::exit(self.code())
    }

    /// Everything that `from_str` will accept
    pub fn str_values() -> [&'static str; 6] {
        ["ok", "warning", "warn", "critical", "crit", "unknown"]
    }
}

impl Default for Status {
    fn default() -> Status {
        Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        write!(f, "{}", msg)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Status, String> {
        match s.to_lowercase().as_ref() {
            "ok" => Ok(Status::Ok),
            "warning" | "warn" => Ok(Status::Warning),
            "critical" | "crit" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(format!(
                "Unexpected exit status '{}', expected one of: {}",
                s,
                Status::str_values().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Status;
    use super::Status::*;

    const ALL: [Status; 4] = [Ok, Warning, Critical, Unknown];

    #[test]
    fn ordering_is_ok_warning_critical_unknown() {
        assert!(Ok < Warning);
        assert!(Warning < Critical);
        assert!(Critical < Unknown);
    }

    #[test]
    fn combine_is_commutative_and_idempotent() {
        for &a in &ALL {
            assert_eq!(a.combine(a), a);
            for &b in &ALL {
                assert_eq!(a.combine(b), b.combine(a));
            }
        }
    }

    #[test]
    fn combine_is_associative() {
        for &a in &ALL {
            for &b in &ALL {
                for &c in &ALL {
                    assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
                }
            }
        }
    }

    #[test]
    fn ok_is_identity() {
        for &a in &ALL {
            assert_eq!(Ok.combine(a), a);
            assert_eq!(a.combine(Ok), a);
        }
    }

    #[test]
    fn codes_match_plugin_contract() {
        let codes: Vec<i32> = ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn parses_from_flags() {
        assert_eq!("warn".parse::<Status>().unwrap(), Warning);
        assert_eq!("CRITICAL".parse::<Status>().unwrap(), Critical);
        assert!("bogus".parse::<Status>().is_err());
    }

    #[test]
    fn every_listed_value_parses() {
        for value in &Status::str_values() {
            assert!(value.parse::<Status>().is_ok(), "{}", value);
        }
        assert_eq!("crit".parse::<Status>().unwrap(), Critical);
    }
}
