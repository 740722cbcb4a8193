//! New interface errors since the previous run
//!
//! `ifInErrors` and `ifOutErrors` are lifetime counters, so a single reading
//! says nothing about whether a port is misbehaving right now. We keep the
//! previous sample in a `DeltaStore` and complain about any counter that went
//! up in between.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use regex::Regex;
use tracing::{debug, info};

use crate::delta::{diff, store_key, DeltaStore, Sample};
use crate::reader::{DeviceReader, ReadError, Reading};
use crate::results::{CheckResults, Report};
use crate::Status;

pub const IF_TYPE: &str = ".1.3.6.1.2.1.2.2.1.3";
pub const IF_NAME: &str = ".1.3.6.1.2.1.31.1.1.1.1";
pub const IF_IN_ERRORS: &str = ".1.3.6.1.2.1.2.2.1.14";
pub const IF_OUT_ERRORS: &str = ".1.3.6.1.2.1.2.2.1.20";

/// ifType for physical ethernet ports
pub const ETHERNET_CSMACD: i64 = 6;

/// How long a sample stays usable as a baseline
pub const DEFAULT_TTL_SECS: i64 = 15 * 60;

/// The store family for these counters
pub const FAMILY: &str = "port-errors";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traffic {
    In,
    Out,
}

impl Traffic {
    fn prefix(self) -> &'static str {
        match self {
            Traffic::In => "in",
            Traffic::Out => "out",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Traffic::In => "IN",
            Traffic::Out => "OUT",
        }
    }

    fn counter_id(self, index: &str) -> String {
        format!("{}.{}", self.prefix(), index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub index: String,
    pub name: String,
    pub in_errors: i64,
    pub out_errors: i64,
}

#[derive(Debug, Default)]
pub struct PortErrorsConfig {
    /// Interfaces whose name matches any of these are left out entirely
    pub ignore: Vec<Regex>,
}

impl PortErrorsConfig {
    fn ignores(&self, name: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(name))
    }
}

fn counter(table: &BTreeMap<String, Reading>, index: &str, what: &str) -> Result<i64, ReadError> {
    match table.get(index) {
        Some(reading) => reading
            .as_i64()
            .ok_or_else(|| ReadError::Parse(format!("{} for ifIndex {}: {}", what, index, reading))),
        None => Ok(0),
    }
}

/// The physical ethernet interfaces we care about
pub fn read_interfaces<R: DeviceReader + ?Sized>(
    reader: &mut R,
    config: &PortErrorsConfig,
) -> Result<Vec<Interface>, ReadError> {
    let types = reader.walk(IF_TYPE)?;
    let names = reader.walk(IF_NAME)?;
    let in_errors = reader.walk(IF_IN_ERRORS)?;
    let out_errors = reader.walk(IF_OUT_ERRORS)?;

    let mut interfaces = Vec::new();
    for (index, if_type) in &types {
        if if_type.as_i64() != Some(ETHERNET_CSMACD) {
            continue;
        }
        let name = names
            .get(index)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("ifIndex {}", index));
        if config.ignores(&name) {
            debug!("ignoring {}", name);
            continue;
        }
        interfaces.push(Interface {
            in_errors: counter(&in_errors, index, "ifInErrors")?,
            out_errors: counter(&out_errors, index, "ifOutErrors")?,
            index: index.clone(),
            name,
        });
    }
    debug!("found {} physical ethernet ports", interfaces.len());
    Ok(interfaces)
}

pub fn sample(interfaces: &[Interface]) -> Sample {
    interfaces
        .iter()
        .flat_map(|i| {
            vec![
                (Traffic::In.counter_id(&i.index), i.in_errors),
                (Traffic::Out.counter_id(&i.index), i.out_errors),
            ]
        })
        .collect()
}

/// Run the delta protocol against a store
///
/// The current sample is always saved before comparing, so a run that finds
/// no baseline still leaves one behind for the next run.
pub fn check_port_errors<R, S>(
    reader: &mut R,
    store: &S,
    config: &PortErrorsConfig,
    now: DateTime<Utc>,
    results: &mut CheckResults,
) -> Result<(), ReadError>
where
    R: DeviceReader + ?Sized,
    S: DeltaStore + ?Sized,
{
    let interfaces = read_interfaces(reader, config)?;
    let current = sample(&interfaces);
    let key = store_key(FAMILY, reader.identity());

    let previous = match store.load_at(&key, now) {
        Ok(previous) => previous,
        Err(e) => {
            results.record(FAMILY, Status::Unknown, format!("UNKNOWN - could not read cache: {}", e));
            return Ok(());
        }
    };
    if let Err(e) = store.save(&key, &current, now) {
        debug!("save failed: {}", e);
        results.record(FAMILY, Status::Unknown, "UNKNOWN - could not update cache");
        return Ok(());
    }
    let previous = match previous {
        Some(previous) => previous,
        None => {
            results.record(FAMILY, Status::Unknown, "UNKNOWN - no previous cached entries found");
            return Ok(());
        }
    };

    let elapsed = previous.age_secs(now);
    let names: BTreeMap<&str, &str> = interfaces
        .iter()
        .map(|i| (i.index.as_str(), i.name.as_str()))
        .collect();
    let increases = diff(&current, &previous.values);
    for &traffic in &[Traffic::In, Traffic::Out] {
        let prefix = format!("{}.", traffic.prefix());
        let found: Vec<String> = increases
            .iter()
            .filter(|(id, _)| id.starts_with(&prefix))
            .map(|(id, errors)| {
                let index = &id[prefix.len()..];
                let name = names.get(index).cloned().unwrap_or(index);
                format!("{}: {} errors;", name, errors)
            })
            .collect();
        if found.is_empty() {
            results.record(
                traffic.prefix(),
                Status::Ok,
                format!("No errors found for {} packets on all interfaces.", traffic.label()),
            );
        } else {
            info!("{} {} ports with new errors", found.len(), traffic.label());
            results.record(
                traffic.prefix(),
                Status::Critical,
                format!(
                    "In the last {} seconds, port errors were found. [{}] {}",
                    elapsed,
                    traffic.label(),
                    found.iter().join(" ")
                ),
            );
        }
    }
    Ok(())
}

/// Run a whole port error check and build its report
pub fn run_port_errors<R, S>(
    reader: &mut R,
    store: &S,
    config: &PortErrorsConfig,
    now: DateTime<Utc>,
) -> Report
where
    R: DeviceReader + ?Sized,
    S: DeltaStore + ?Sized,
{
    let mut results = CheckResults::new();
    match check_port_errors(reader, store, config, now, &mut results) {
        Ok(()) => results.finalize(),
        Err(e) => Report::single(
            Status::Unknown,
            format!(
                "UNKNOWN - could not read interface tables from {}: {}",
                reader.identity(),
                e
            ),
        ),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::delta::test::BrokenStore;
    use crate::delta::MemoryStore;
    use crate::reader::SnapshotReader;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn switch(in1: i64, out1: i64) -> SnapshotReader {
        let mut reader = SnapshotReader::from_json(
            "core1",
            r#"{
                ".1.3.6.1.2.1.2.2.1.3.1": 6,
                ".1.3.6.1.2.1.2.2.1.3.2": 6,
                ".1.3.6.1.2.1.2.2.1.3.3": 24,
                ".1.3.6.1.2.1.31.1.1.1.1.1": "Gi0/1",
                ".1.3.6.1.2.1.31.1.1.1.1.2": "Gi0/2",
                ".1.3.6.1.2.1.31.1.1.1.1.3": "lo0",
                ".1.3.6.1.2.1.2.2.1.14.2": 7,
                ".1.3.6.1.2.1.2.2.1.14.3": 500,
                ".1.3.6.1.2.1.2.2.1.20.2": 0,
                ".1.3.6.1.2.1.2.2.1.20.3": 500
            }"#,
        )
        .unwrap();
        reader.set(".1.3.6.1.2.1.2.2.1.14.1", Reading::Integer(in1));
        reader.set(".1.3.6.1.2.1.2.2.1.20.1", Reading::Integer(out1));
        reader
    }

    fn store() -> MemoryStore {
        MemoryStore::new(Duration::seconds(DEFAULT_TTL_SECS))
    }

    #[test]
    fn only_ethernet_ports_are_sampled() {
        let interfaces = read_interfaces(&mut switch(10, 0), &PortErrorsConfig::default()).unwrap();
        let names: Vec<&str> = interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Gi0/1", "Gi0/2"]);
        let sample = sample(&interfaces);
        assert_eq!(sample["in.1"], 10);
        assert_eq!(sample["in.2"], 7);
        assert!(!sample.contains_key("in.3"));
    }

    #[test]
    fn ignored_ports_are_dropped() {
        let config = PortErrorsConfig {
            ignore: vec![Regex::new("^Gi0/2$").unwrap()],
        };
        let interfaces = read_interfaces(&mut switch(10, 0), &config).unwrap();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].name, "Gi0/1");
    }

    #[test]
    fn first_run_has_no_baseline() {
        let store = store();
        let report = run_port_errors(&mut switch(10, 0), &store, &PortErrorsConfig::default(), t0());
        let (text, code) = report.render();
        assert_eq!(text, "UNKNOWN - no previous cached entries found");
        assert_eq!(code, 3);

        let saved = store.raw(&store_key(FAMILY, "core1")).unwrap();
        assert_eq!(saved.values["in.1"], 10);
        assert_eq!(saved.captured_at, t0());
    }

    #[test]
    fn new_errors_are_critical() {
        let store = store();
        let config = PortErrorsConfig::default();
        run_port_errors(&mut switch(10, 0), &store, &config, t0());
        let later = t0() + Duration::seconds(300);
        let report = run_port_errors(&mut switch(15, 0), &store, &config, later);
        let (text, code) = report.render();
        assert_eq!(
            text,
            "In the last 300 seconds, port errors were found. [IN] Gi0/1: 5 errors;"
        );
        assert_eq!(code, 2);
    }

    #[test]
    fn nothing_new_is_ok() {
        let store = store();
        let config = PortErrorsConfig::default();
        run_port_errors(&mut switch(10, 3), &store, &config, t0());
        let report = run_port_errors(&mut switch(10, 3), &store, &config, t0() + Duration::seconds(300));
        assert_eq!(
            report.render(),
            (
                "OK - No errors found for IN packets on all interfaces. \
                 No errors found for OUT packets on all interfaces."
                    .to_owned(),
                0
            )
        );
    }

    #[test]
    fn counter_reset_is_ok() {
        let store = store();
        let config = PortErrorsConfig::default();
        run_port_errors(&mut switch(1000, 0), &store, &config, t0());
        let report = run_port_errors(&mut switch(2, 0), &store, &config, t0() + Duration::seconds(300));
        assert_eq!(report.overall, Status::Ok);
    }

    #[test]
    fn expired_baseline_starts_over() {
        let store = store();
        let config = PortErrorsConfig::default();
        run_port_errors(&mut switch(10, 0), &store, &config, t0());
        let report = run_port_errors(&mut switch(50, 0), &store, &config, t0() + Duration::minutes(20));
        assert_eq!(report.render().1, 3);
    }

    #[test]
    fn unavailable_store_is_unknown() {
        let report = run_port_errors(&mut switch(10, 0), &BrokenStore, &PortErrorsConfig::default(), t0());
        let (text, code) = report.render();
        assert!(text.starts_with("UNKNOWN - could not read cache"), "{}", text);
        assert_eq!(code, 3);
    }

    #[test]
    fn missing_tables_are_unknown() {
        let mut reader = SnapshotReader::from_json("core1", "{}").unwrap();
        let report = run_port_errors(&mut reader, &store(), &PortErrorsConfig::default(), t0());
        let (text, code) = report.render();
        assert!(text.starts_with("UNKNOWN - could not read interface tables from core1"), "{}", text);
        assert_eq!(code, 3);
    }
}
