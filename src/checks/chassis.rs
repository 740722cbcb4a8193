//! Chassis health: temperature, fans, power, memory, disk, cpu and reboots
//!
//! Which identifiers to read comes from a `ChassisProfile`, a small JSON
//! document per device family. The checks themselves only know how to judge
//! readings.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{fmt_number, read_failure};
use crate::reader::{DeviceReader, ReadError, Reading, RpcRequest};
use crate::results::{CheckResults, Report, Tally};
use crate::threshold::{evaluate, ConfigError, Direction, Threshold};
use crate::units::uptime_to_human;
use crate::Status;

/// The chassis subsystems, in the order they are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    Temperature,
    Fans,
    Power,
    Memory,
    Disk,
    Cpu,
    Reboot,
}

impl Subsystem {
    pub const ALL: [Subsystem; 7] = [
        Subsystem::Temperature,
        Subsystem::Fans,
        Subsystem::Power,
        Subsystem::Memory,
        Subsystem::Disk,
        Subsystem::Cpu,
        Subsystem::Reboot,
    ];

    /// The name findings are recorded under
    pub fn name(self) -> &'static str {
        match self {
            Subsystem::Temperature => "temperature",
            Subsystem::Fans => "fans",
            Subsystem::Power => "psu",
            Subsystem::Memory => "memory",
            Subsystem::Disk => "disk",
            Subsystem::Cpu => "cpu",
            Subsystem::Reboot => "reboot",
        }
    }

    pub fn skip_flag(self) -> &'static str {
        match self {
            Subsystem::Temperature => "--skip-temp",
            Subsystem::Fans => "--skip-fans",
            Subsystem::Power => "--skip-psu",
            Subsystem::Memory => "--skip-mem",
            Subsystem::Disk => "--skip-disk",
            Subsystem::Cpu => "--skip-cpu",
            Subsystem::Reboot => "--skip-reboot",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Subsystem::Temperature => "Temperature",
            Subsystem::Fans => "Fan states",
            Subsystem::Power => "PSU states",
            Subsystem::Memory => "Memory",
            Subsystem::Disk => "Disk",
            Subsystem::Cpu => "CPU",
            Subsystem::Reboot => "Uptime",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subsystem {
    type Err = ConfigError;

    /// Accepts the recorded names and the short forms of the skip flags
    fn from_str(s: &str) -> Result<Subsystem, ConfigError> {
        match s.to_lowercase().as_ref() {
            "temperature" | "temp" => Ok(Subsystem::Temperature),
            "fans" | "fan" => Ok(Subsystem::Fans),
            "psu" | "power" => Ok(Subsystem::Power),
            "memory" | "mem" => Ok(Subsystem::Memory),
            "disk" => Ok(Subsystem::Disk),
            "cpu" => Ok(Subsystem::Cpu),
            "reboot" | "uptime" => Ok(Subsystem::Reboot),
            _ => Err(ConfigError::Invalid(format!(
                "unknown subsystem '{}', expected one of: {}",
                s,
                Subsystem::ALL
                    .iter()
                    .map(|sub| sub.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

/// A named identifier
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sensor {
    pub name: String,
    pub id: String,
}

/// Where to find a group of similar readings
///
/// Individual sensors are read one by one, a table is walked and each row
/// becomes a reading named `<label> <row>`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SensorSet {
    #[serde(default)]
    pub sensors: Vec<Sensor>,
    pub table: Option<String>,
    pub label: Option<String>,
}

impl SensorSet {
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty() && self.table.is_none()
    }
}

/// Readings gathered for one subsystem
#[derive(Debug, Default)]
struct Gathered {
    readings: Vec<(String, Reading)>,
    missing: Vec<String>,
}

/// Read everything in a set
///
/// Sensors that are individually missing are remembered so the OK summary
/// can mention them. If nothing at all could be read the subsystem is not
/// supported. Any other failure aborts the subsystem.
fn gather<R: DeviceReader + ?Sized>(reader: &mut R, set: &SensorSet) -> Result<Gathered, ReadError> {
    let mut gathered = Gathered::default();
    for sensor in &set.sensors {
        match reader.read(&sensor.id) {
            Ok(reading) => gathered.readings.push((sensor.name.clone(), reading)),
            Err(ReadError::NotSupported(_)) => {
                debug!("{} ({}) not present", sensor.name, sensor.id);
                gathered.missing.push(sensor.name.clone());
            }
            Err(e) => return Err(e),
        }
    }
    if let Some(ref table) = set.table {
        let label = set.label.as_ref().map(String::as_str).unwrap_or("");
        for (row, reading) in reader.walk(table)? {
            let name = if label.is_empty() {
                row
            } else {
                format!("{} {}", label, row)
            };
            gathered.readings.push((name, reading));
        }
    }
    if gathered.readings.is_empty() {
        let what = set
            .table
            .clone()
            .or_else(|| set.sensors.first().map(|s| s.id.clone()))
            .unwrap_or_default();
        return Err(ReadError::NotSupported(what));
    }
    Ok(gathered)
}

/// Readings of a set that a device may not have, by name
fn optional_readings<R: DeviceReader + ?Sized>(
    reader: &mut R,
    set: &SensorSet,
) -> Result<BTreeMap<String, Reading>, ReadError> {
    if set.is_empty() {
        return Ok(BTreeMap::new());
    }
    match gather(reader, set) {
        Ok(gathered) => Ok(gathered.readings.into_iter().collect()),
        Err(ReadError::NotSupported(id)) => {
            debug!("{} not present", id);
            Ok(BTreeMap::new())
        }
        Err(e) => Err(e),
    }
}

/// A single reading that names a state, like `temperatureOk`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateSensor {
    pub id: String,
    /// Every state that is fine, compared without case
    pub ok: Vec<String>,
}

/// Limits a device reports for each of its own sensors
///
/// Both sets are named the same way as the temperature readings, so a
/// limit applies to the reading with the same name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceLimits {
    #[serde(default)]
    pub warn: SensorSet,
    #[serde(default)]
    pub crit: SensorSet,
}

/// Vocabularies for devices that report states instead of numbers
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StateRules {
    #[serde(default)]
    pub ok: Vec<String>,
    #[serde(default)]
    pub absent: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Ok,
    Absent,
    Bad,
}

impl StateRules {
    pub fn classify(&self, reading: &Reading) -> StateClass {
        let state = reading.to_string();
        let state = state.trim();
        let matches = |vocab: &[String]| vocab.iter().any(|v| v.eq_ignore_ascii_case(state));
        if matches(&self.ok) {
            StateClass::Ok
        } else if matches(&self.absent) {
            StateClass::Absent
        } else {
            StateClass::Bad
        }
    }
}

impl Default for StateRules {
    fn default() -> StateRules {
        StateRules {
            ok: ["ok", "normal", "on", "up", "true", "1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            absent: ["notpresent", "not present", "absent", "missing"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// How memory or disk usage is reported
///
/// Either as percentages per slot, or as a pair of `used` or `free` against
/// `total`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UsageSource {
    #[serde(default)]
    pub percent: SensorSet,
    pub used: Option<String>,
    pub free: Option<String>,
    pub total: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UptimeKind {
    /// Seconds since boot
    Seconds,
    /// Hundredths of a second since boot, like sysUpTime
    Timeticks,
    /// Unix timestamp of the last boot
    BootEpoch,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UptimeSource {
    pub id: String,
    pub kind: UptimeKind,
}

/// Where a device family keeps each reading
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChassisProfile {
    #[serde(default)]
    pub name: String,
    /// The call to make for JSON-RPC devices
    pub request: Option<RpcRequest>,
    #[serde(default)]
    pub temperature: SensorSet,
    pub temperature_alarm: Option<String>,
    /// Overall temperature state, for devices that report one
    pub temperature_state: Option<StateSensor>,
    /// Per-sensor alert flags, named like the temperature readings
    #[serde(default)]
    pub temperature_alerts: SensorSet,
    pub temperature_limits: Option<DeviceLimits>,
    #[serde(default)]
    pub fans: SensorSet,
    /// Present if fans report states rather than RPM
    pub fan_states: Option<StateRules>,
    #[serde(default)]
    pub power: SensorSet,
    #[serde(default)]
    pub power_states: StateRules,
    pub memory: Option<UsageSource>,
    pub disk: Option<UsageSource>,
    #[serde(default)]
    pub cpu: SensorSet,
    pub uptime: Option<UptimeSource>,
}

impl ChassisProfile {
    pub fn from_json(json: &str) -> Result<ChassisProfile, ConfigError> {
        serde_json::from_str(json)
            .map_err(|e| ConfigError::Invalid(format!("invalid chassis profile: {}", e)))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ChassisProfile, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("could not read profile {}: {}", path.display(), e))
        })?;
        ChassisProfile::from_json(&contents)
    }
}

/// Levels and switches for a chassis run
#[derive(Debug, Clone, PartialEq)]
pub struct ChassisConfig {
    pub temperature: Threshold,
    pub fan_min_rpm: f64,
    pub ignore_psu_notpresent: bool,
    pub memory: Threshold,
    pub disk: Threshold,
    pub cpu: Threshold,
    /// Uptimes at or below this many seconds count as a reboot
    pub reboot_secs: f64,
    /// Unix time of the previous check, a boot after it is a reboot
    pub last_check: Option<i64>,
    pub skip: Vec<Subsystem>,
}

impl Default for ChassisConfig {
    fn default() -> ChassisConfig {
        ChassisConfig {
            temperature: Threshold::new(55.0, 65.0),
            fan_min_rpm: 300.0,
            ignore_psu_notpresent: false,
            memory: Threshold::new(80.0, 90.0),
            disk: Threshold::new(80.0, 90.0),
            cpu: Threshold::new(85.0, 95.0),
            reboot_secs: 3600.0,
            last_check: None,
            skip: Vec::new(),
        }
    }
}

impl ChassisConfig {
    /// Reject thresholds whose warning level is past the critical level
    pub fn validated(self) -> Result<ChassisConfig, ConfigError> {
        self.temperature
            .validated("temperature", Direction::HigherIsWorse)?;
        self.memory.validated("memory", Direction::HigherIsWorse)?;
        self.disk.validated("disk", Direction::HigherIsWorse)?;
        self.cpu.validated("cpu", Direction::HigherIsWorse)?;
        if self.fan_min_rpm < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "--fan-min-rpm must not be negative, got {}",
                self.fan_min_rpm
            )));
        }
        Ok(self)
    }

    pub fn skips(&self, subsystem: Subsystem) -> bool {
        self.skip.contains(&subsystem)
    }
}

/// Check every subsystem in order
///
/// Only a device that cannot be reached at all is an error, everything
/// else ends up as a finding.
pub fn check_chassis<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    now: DateTime<Utc>,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    reader.probe()?;
    for &subsystem in &Subsystem::ALL {
        if config.skips(subsystem) {
            results.skip(subsystem.name());
            continue;
        }
        debug!("{} check start", subsystem);
        let outcome = match subsystem {
            Subsystem::Temperature => check_temperature(reader, profile, config, results),
            Subsystem::Fans => check_fans(reader, profile, config, results),
            Subsystem::Power => check_power(reader, profile, config, results),
            Subsystem::Memory => check_usage(reader, subsystem, profile.memory.as_ref(), config.memory, results),
            Subsystem::Disk => check_usage(reader, subsystem, profile.disk.as_ref(), config.disk, results),
            Subsystem::Cpu => check_cpu(reader, profile, config, results),
            Subsystem::Reboot => check_reboot(reader, profile, config, now, results),
        };
        if let Err(e) = outcome {
            results.record(
                subsystem.name(),
                Status::Unknown,
                read_failure(subsystem.label(), subsystem.skip_flag(), &e),
            );
        }
        debug!("{} check end", subsystem);
    }
    Ok(())
}

/// Run a whole chassis check and build its report
pub fn run_chassis<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    now: DateTime<Utc>,
) -> Report {
    let mut results = CheckResults::new();
    match check_chassis(reader, profile, config, now, &mut results) {
        Ok(()) => results.finalize(),
        Err(e) => Report::single(
            Status::Unknown,
            format!("UNKNOWN - could not reach {}: {}", reader.identity(), e),
        ),
    }
}

fn note_missing(tally: &mut Tally, gathered: &Gathered) {
    for name in &gathered.missing {
        tally.note(format!("[{} not present?]", name));
    }
}

fn check_temperature<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    let gathered = gather(reader, &profile.temperature)?;
    let alerts = optional_readings(reader, &profile.temperature_alerts)?;
    let (warn_limits, crit_limits) = match profile.temperature_limits {
        Some(ref limits) => (
            optional_readings(reader, &limits.warn)?,
            optional_readings(reader, &limits.crit)?,
        ),
        None => (BTreeMap::new(), BTreeMap::new()),
    };
    let limit = |limits: &BTreeMap<String, Reading>, name: &str, temp: f64| {
        limits
            .get(name)
            .and_then(Reading::as_f64)
            .filter(|&limit| temp >= limit)
    };
    let mut tally = Tally::new();
    let t = config.temperature;
    for (name, reading) in &gathered.readings {
        let temp = match reading.as_f64() {
            Some(temp) => temp,
            None => {
                tally.flag(Status::Unknown, format!("{} temperature unreadable: {}.", name, reading));
                continue;
            }
        };
        info!("TEMP: {} - {}'C", name, temp);
        let temp_s = fmt_number(temp);
        if alerts.get(name).map_or(false, Reading::as_flag) {
            tally.flag(
                Status::Critical,
                format!("{} is in alert state at {}'C.", name, temp_s),
            );
        } else if let Some(crit) = limit(&crit_limits, name, temp) {
            tally.flag(
                Status::Critical,
                format!("{} is at its critical limit: {}/{}'C.", name, temp_s, fmt_number(crit)),
            );
        } else {
            match evaluate(temp, t, Direction::HigherIsWorse) {
                Status::Critical => tally.flag(
                    Status::Critical,
                    format!("{} exceeds critical threshold: {}/{}'C.", name, temp_s, fmt_number(t.crit)),
                ),
                Status::Warning => tally.flag(
                    Status::Warning,
                    format!("{} exceeds warning threshold: {}/{}'C.", name, temp_s, fmt_number(t.warn)),
                ),
                _ => {
                    if let Some(warn) = limit(&warn_limits, name, temp) {
                        tally.flag(
                            Status::Warning,
                            format!("{} is at its overheat limit: {}/{}'C.", name, temp_s, fmt_number(warn)),
                        );
                    }
                }
            }
        }
        tally.note(format!("[{} - {}'C]", name, temp_s));
    }
    if let Some(ref state) = profile.temperature_state {
        match reader.read(&state.id) {
            Ok(reading) => {
                let word = reading.to_string();
                let word = word.trim();
                if !state.ok.iter().any(|ok| ok.eq_ignore_ascii_case(word)) {
                    tally.flag(
                        Status::Critical,
                        format!("Overall temperature status: {}.", word),
                    );
                }
            }
            Err(ReadError::NotSupported(_)) => debug!("no temperature status at {}", state.id),
            Err(e) => tally.flag(Status::Unknown, format!("Temperature status unknown - {}.", e)),
        }
    }
    if let Some(ref alarm) = profile.temperature_alarm {
        match reader.read(alarm) {
            Ok(reading) => {
                if reading.as_flag() {
                    tally.flag(Status::Critical, "Temperature alarm set.");
                }
            }
            Err(ReadError::NotSupported(_)) => debug!("no temperature alarm at {}", alarm),
            Err(e) => tally.flag(Status::Unknown, format!("Temperature alarm unknown - {}.", e)),
        }
    }
    note_missing(&mut tally, &gathered);
    tally.record_into(results, Subsystem::Temperature.name(), "Temperatures:");
    Ok(())
}

fn check_fans<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    let gathered = gather(reader, &profile.fans)?;
    let mut tally = Tally::new();
    for (name, reading) in &gathered.readings {
        info!("FAN: {} - {}", name, reading);
        if let Some(ref rules) = profile.fan_states {
            match rules.classify(reading) {
                StateClass::Ok => tally.note(format!("[{} - {}]", name, reading)),
                _ => tally.flag(Status::Critical, format!("Fan state for {}: {}.", name, reading)),
            }
            continue;
        }
        match reading.as_f64() {
            Some(rpm) if reading.is_numeric() => {
                let rpm_s = fmt_number(rpm);
                if rpm <= 0.0 {
                    tally.flag(
                        Status::Critical,
                        format!("{} is not OK, speed is {} RPM.", name, rpm_s),
                    );
                } else if rpm < config.fan_min_rpm {
                    tally.flag(
                        Status::Critical,
                        format!("{} is not OK, speed is only {} RPM.", name, rpm_s),
                    );
                }
                tally.note(format!("[{} - {} RPM]", name, rpm_s));
            }
            _ => match StateRules::default().classify(reading) {
                StateClass::Ok => tally.note(format!("[{} - {}]", name, reading)),
                _ => tally.flag(Status::Critical, format!("Fan state for {}: {}.", name, reading)),
            },
        }
    }
    note_missing(&mut tally, &gathered);
    tally.record_into(results, Subsystem::Fans.name(), "Fans:");
    Ok(())
}

fn check_power<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    let gathered = gather(reader, &profile.power)?;
    let mut tally = Tally::new();
    for (name, reading) in &gathered.readings {
        info!("PSU: {} - {}", name, reading);
        match profile.power_states.classify(reading) {
            StateClass::Ok => tally.note(format!("[{} - OK]", name)),
            StateClass::Absent if config.ignore_psu_notpresent => {
                tally.note(format!("[{} - not present]", name))
            }
            StateClass::Absent => {
                tally.flag(Status::Warning, format!("PSU {} is not present.", name))
            }
            StateClass::Bad => {
                tally.flag(Status::Critical, format!("PSU state for {}: {}.", name, reading))
            }
        }
    }
    note_missing(&mut tally, &gathered);
    tally.record_into(results, Subsystem::Power.name(), "PSUs:");
    Ok(())
}

fn read_number<R: DeviceReader + ?Sized>(reader: &mut R, id: &str) -> Result<f64, ReadError> {
    let reading = reader.read(id)?;
    reading
        .as_f64()
        .ok_or_else(|| ReadError::Parse(format!("{} is not a number: {}", id, reading)))
}

/// Usage percentages by name
fn usage<R: DeviceReader + ?Sized>(
    reader: &mut R,
    source: &UsageSource,
) -> Result<Vec<(Option<String>, f64)>, ReadError> {
    if !source.percent.is_empty() {
        let gathered = gather(reader, &source.percent)?;
        return gathered
            .readings
            .into_iter()
            .map(|(name, reading)| match reading.as_f64() {
                Some(pct) => Ok((Some(name), pct)),
                None => Err(ReadError::Parse(format!("{} is not a number: {}", name, reading))),
            })
            .collect();
    }
    let total_id = source
        .total
        .as_ref()
        .ok_or_else(|| ReadError::NotSupported("total".into()))?;
    let total = read_number(reader, total_id)?;
    if total <= 0.0 {
        return Err(ReadError::Parse(format!("{} reports a total of {}", total_id, total)));
    }
    let used = match (source.used.as_ref(), source.free.as_ref()) {
        (Some(used), _) => read_number(reader, used)?,
        (None, Some(free)) => total - read_number(reader, free)?,
        (None, None) => return Err(ReadError::NotSupported("used".into())),
    };
    Ok(vec![(None, 100.0 * used / total)])
}

fn check_usage<R: DeviceReader + ?Sized>(
    reader: &mut R,
    subsystem: Subsystem,
    source: Option<&UsageSource>,
    threshold: Threshold,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    let source = source.ok_or_else(|| ReadError::NotSupported(subsystem.name().into()))?;
    let label = subsystem.label();
    let mut tally = Tally::new();
    for (name, pct) in usage(reader, source)? {
        info!("{}: {:?} at {}%", label, name, pct);
        let pct_s = fmt_number(pct);
        let what = match name {
            Some(ref name) => format!("{} usage in {} at {}%.", label, name, pct_s),
            None => format!("{} usage at {}%.", label, pct_s),
        };
        let status = evaluate(pct, threshold, Direction::HigherIsWorse);
        tally.flag(status, what);
        match name {
            Some(name) => tally.note(format!("[{} - {}%]", name, pct_s)),
            None => tally.note(format!("{}%", pct_s)),
        }
    }
    tally.record_into(results, subsystem.name(), &format!("{} (usage%):", label));
    Ok(())
}

fn check_cpu<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    let gathered = gather(reader, &profile.cpu)?;
    let mut tally = Tally::new();
    for (name, reading) in &gathered.readings {
        let util = reading
            .as_f64()
            .ok_or_else(|| ReadError::Parse(format!("{} is not a number: {}", name, reading)))?;
        info!("CPU: {} - {}%", name, util);
        let util_s = fmt_number(util);
        tally.flag(
            evaluate(util, config.cpu, Direction::HigherIsWorse),
            format!("CPU {} usage at {}%.", name, util_s),
        );
        tally.note(format!("[{} - {}%]", name, util_s));
    }
    tally.record_into(results, Subsystem::Cpu.name(), "CPU (usage%):");
    Ok(())
}

fn check_reboot<R: DeviceReader + ?Sized>(
    reader: &mut R,
    profile: &ChassisProfile,
    config: &ChassisConfig,
    now: DateTime<Utc>,
    results: &mut CheckResults,
) -> Result<(), ReadError> {
    let source = profile
        .uptime
        .as_ref()
        .ok_or_else(|| ReadError::NotSupported("uptime".into()))?;
    let raw = read_number(reader, &source.id)?;
    let now_secs = now.timestamp() as f64;
    let (uptime, booted_at) = match source.kind {
        UptimeKind::Seconds => (raw, now_secs - raw),
        UptimeKind::Timeticks => (raw / 100.0, now_secs - raw / 100.0),
        UptimeKind::BootEpoch => (now_secs - raw, raw),
    };
    info!("Last reboot: {:.1} minutes ago", uptime / 60.0);

    let rebooted_since_last_check = config
        .last_check
        .map_or(false, |last| booted_at >= last as f64);
    if uptime <= config.reboot_secs || rebooted_since_last_check {
        results.record(
            Subsystem::Reboot.name(),
            Status::Critical,
            format!("Device rebooted {:.1} minutes ago.", uptime / 60.0),
        );
    } else {
        results.record(
            Subsystem::Reboot.name(),
            Status::Ok,
            format!("Uptime: {}.", uptime_to_human(uptime)),
        );
    }
    Ok(())
}
