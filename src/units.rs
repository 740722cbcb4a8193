//! Human readable sizes and durations

use crate::threshold::ConfigError;

const UNITS: [&str; 5] = ["K", "M", "G", "T", "P"];

/// A byte count in the units `parse_size` reads back, like `34.3M`
pub fn bytes_to_human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", size, UNITS[unit])
}

/// Parse a byte size with an optional `k`, `m` or `g` suffix (powers of 1024)
pub fn parse_size(s: &str) -> Result<u64, ConfigError> {
    let s = s.trim();
    let (num, multiplier) = match s.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&s[..s.len() - 1], 1024),
        Some('m') => (&s[..s.len() - 1], 1024 * 1024),
        Some('g') => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    num.parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| ConfigError::InvalidNumber(s.to_owned()))
}

/// Uptime the way an operator wants to read it
///
/// Hours below a day, days above.
pub fn uptime_to_human(seconds: f64) -> String {
    let hours = seconds / 60.0 / 60.0;
    if hours < 24.0 {
        format!("{:.1} hours", hours)
    } else {
        format!("{:.1} days", hours / 24.0)
    }
}
