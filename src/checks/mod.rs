//! The subsystem checks behind each binary
//!
//! Every function in here takes a reader (or a path), the parsed
//! configuration and a `CheckResults`, and records at most one finding per
//! subsystem. Nothing in here prints or exits.

use crate::reader::ReadError;

pub mod chassis;
pub mod port_errors;
pub mod rsnapshot;

/// The message for a subsystem whose values could not be read
///
/// A value that the device simply does not have is most likely a platform
/// without that sensor, so point the operator at the skip flag.
pub(crate) fn read_failure(label: &str, skip_flag: &str, err: &ReadError) -> String {
    match *err {
        ReadError::NotSupported(_) => format!(
            "{} unknown - possibly not supported on platform? Use {}.",
            label, skip_flag
        ),
        ref other => format!("{} unknown - {}.", label, other),
    }
}

/// Percentages without trailing noise: `95` or `95.5`
pub(crate) fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}
