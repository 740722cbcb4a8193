//! Readings via the net-snmp command line tools
//!
//! We shell out to `snmpget` and `snmpwalk` rather than speak SNMP ourselves.
//! Output is requested in the most machine-friendly form net-snmp has:
//! numeric OIDs, no type prefixes, numeric enums and timeticks, no units.

use std::collections::BTreeMap;
use std::process::Command;
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use super::{DeviceReader, ReadError, Reading};
use crate::watchdog;

/// How long past its own timeout a tool may take before it is killed
const GRACE: Duration = Duration::from_secs(2);

/// sysObjectID, which every agent has
const PROBE_OID: &str = ".1.3.6.1.2.1.1.2.0";

lazy_static! {
    static ref LINE: Regex = Regex::new(r"^\s*(\.?[0-9][0-9.]*)\s+(.*?)\s*$").unwrap();
}

#[derive(Debug, Clone)]
pub struct NetSnmpReader {
    host: String,
    port: u16,
    community: String,
    timeout: Duration,
}

impl NetSnmpReader {
    pub fn new<H, C>(host: H, port: u16, community: C, timeout: Duration) -> NetSnmpReader
    where
        H: Into<String>,
        C: Into<String>,
    {
        NetSnmpReader {
            host: host.into(),
            port,
            community: community.into(),
            timeout,
        }
    }

    fn run(&self, tool: &str, oid: &str) -> Result<String, ReadError> {
        let timeout = self.timeout.as_secs().max(1).to_string();
        let target = format!("{}:{}", self.host, self.port);
        debug!("{} {} {}", tool, target, oid);
        let output = watchdog::output_within(
            Command::new(tool)
                .args(&["-v2c", "-c", self.community.as_str(), "-OnqetU", "-t", timeout.as_str(), "-r", "0"])
                .arg(&target)
                .arg(oid),
            self.timeout + GRACE,
        )?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() || stderr.contains("Timeout") {
            return Err(ReadError::Unreachable(format!(
                "{} {}: {}",
                tool,
                target,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

/// Parse `OID value` lines
///
/// Values that say the object or instance does not exist are reported as
/// `NotSupported` for that OID.
pub(crate) fn parse_output(output: &str) -> Result<Vec<(String, Reading)>, ReadError> {
    let mut values = Vec::new();
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let caps = LINE
            .captures(line)
            .ok_or_else(|| ReadError::Parse(line.to_owned()))?;
        let oid = normalize(&caps[1]);
        let raw = &caps[2];
        if raw.starts_with("No Such Object") || raw.starts_with("No Such Instance") {
            return Err(ReadError::NotSupported(oid));
        }
        if raw.starts_with("No more variables") {
            continue;
        }
        values.push((oid, parse_value(raw)));
    }
    Ok(values)
}

fn parse_value(raw: &str) -> Reading {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return Reading::Text(raw[1..raw.len() - 1].to_owned());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Reading::Integer(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Reading::Real(f);
    }
    Reading::Text(raw.to_owned())
}

fn normalize(oid: &str) -> String {
    if oid.starts_with('.') {
        oid.to_owned()
    } else {
        format!(".{}", oid)
    }
}

impl DeviceReader for NetSnmpReader {
    fn identity(&self) -> &str {
        &self.host
    }

    fn probe(&mut self) -> Result<(), ReadError> {
        match self.read(PROBE_OID) {
            Err(ReadError::Unreachable(e)) => Err(ReadError::Unreachable(e)),
            _ => Ok(()),
        }
    }

    fn read(&mut self, id: &str) -> Result<Reading, ReadError> {
        let output = self.run("snmpget", id)?;
        let value = parse_output(&output)?
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| ReadError::NotSupported(id.to_owned()))?;
        info!("{} = {}", id, value);
        Ok(value)
    }

    fn walk(&mut self, id: &str) -> Result<BTreeMap<String, Reading>, ReadError> {
        let output = self.run("snmpwalk", id)?;
        let table = suffixes(&normalize(id), parse_output(&output)?);
        if table.is_empty() {
            return Err(ReadError::NotSupported(id.to_owned()));
        }
        info!("{}: {} rows", id, table.len());
        Ok(table)
    }
}

fn suffixes(base: &str, values: Vec<(String, Reading)>) -> BTreeMap<String, Reading> {
    let prefix = format!("{}.", base);
    values
        .into_iter()
        .filter_map(|(oid, v)| {
            if oid.starts_with(&prefix) {
                Some((oid[prefix.len()..].to_owned(), v))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_get_output() {
        let parsed = parse_output(".1.3.6.1.2.1.1.3.0 123456\n").unwrap();
        assert_eq!(
            parsed,
            vec![(".1.3.6.1.2.1.1.3.0".to_owned(), Reading::Integer(123456))]
        );
    }

    #[test]
    fn parses_walk_output() {
        let output = "\
.1.3.6.1.2.1.31.1.1.1.1.1 \"Gi0/1\"
.1.3.6.1.2.1.31.1.1.1.1.2 \"Gi0/2\"
.1.3.6.1.2.1.31.1.1.1.1.10 \"Port Channel 1\"
";
        let table = suffixes(".1.3.6.1.2.1.31.1.1.1.1", parse_output(output).unwrap());
        assert_eq!(table.len(), 3);
        assert_eq!(table["1"], Reading::Text("Gi0/1".into()));
        assert_eq!(table["10"], Reading::Text("Port Channel 1".into()));
    }

    #[test]
    fn missing_objects_are_not_supported() {
        let output = ".1.3.6.1.4.1.9.9.13.1.3.1.3 No Such Object available on this agent at this OID";
        match parse_output(output) {
            Err(ReadError::NotSupported(oid)) => assert_eq!(oid, ".1.3.6.1.4.1.9.9.13.1.3.1.3"),
            other => panic!("expected NotSupported, got {:?}", other),
        }
    }

    #[test]
    fn odd_values_are_text() {
        assert_eq!(parse_value("2.5"), Reading::Real(2.5));
        assert_eq!(parse_value("-4"), Reading::Integer(-4));
        assert_eq!(parse_value("00 1A 2B"), Reading::Text("00 1A 2B".into()));
        assert_eq!(parse_value("\"\""), Reading::Text("".into()));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        match parse_output("Error in packet") {
            Err(ReadError::Parse(_)) => {}
            other => panic!("expected Parse, got {:?}", other),
        }
    }
}
