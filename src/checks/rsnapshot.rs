//! Sanity checks for rsnapshot backups
//!
//! rsnapshot keeps `<root>/<period>.<n>` directories for each retention
//! period, with `.0` being the most recent. These checks look at the lowest
//! (most frequent) period's `.1` for content, at the log for the result of
//! the last run of each period, and at the directories themselves for
//! missing or stale rotations.
//!
//! Everything is configured by flags, the rsnapshot configuration file is
//! never read.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::delta::{store_key, DeltaStore, Sample};
use crate::results::{CheckResults, Report, Tally};
use crate::threshold::{evaluate, ConfigError, Direction, Threshold};
use crate::units::bytes_to_human_size;
use crate::Status;

/// The store family for first-run baselines
pub const FAMILY: &str = "rsnapshot-firstrun";

/// How long a first-run baseline survives without being refreshed
pub const DEFAULT_STATE_TTL_SECS: i64 = 3 * 24 * 60 * 60;

const FIRST_RUN: &str = "first_run";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsnapshotCheck {
    Minfiles,
    Minsize,
    Log,
    DirCreation,
    Rotation,
    Timestamp,
}

impl RsnapshotCheck {
    pub const ALL: [RsnapshotCheck; 6] = [
        RsnapshotCheck::Minfiles,
        RsnapshotCheck::Minsize,
        RsnapshotCheck::Log,
        RsnapshotCheck::DirCreation,
        RsnapshotCheck::Rotation,
        RsnapshotCheck::Timestamp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RsnapshotCheck::Minfiles => "minfiles",
            RsnapshotCheck::Minsize => "minsize",
            RsnapshotCheck::Log => "log",
            RsnapshotCheck::DirCreation => "dir-creation",
            RsnapshotCheck::Rotation => "rotation",
            RsnapshotCheck::Timestamp => "timestamp",
        }
    }

    /// Whether the check looks inside `<lowest>.1`
    fn needs_previous_snapshot(self) -> bool {
        match self {
            RsnapshotCheck::Minfiles | RsnapshotCheck::Minsize | RsnapshotCheck::Timestamp => true,
            _ => false,
        }
    }
}

impl fmt::Display for RsnapshotCheck {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn split_assignment(s: &str) -> Result<(&str, &str), ConfigError> {
    let mut parts = s.splitn(2, '=');
    match (parts.next(), parts.next()) {
        (Some(name), Some(value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim(), value.trim()))
        }
        _ => Err(ConfigError::MalformedAssignment(s.to_owned())),
    }
}

/// `retain daily 7` as `daily=7`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retention {
    pub name: String,
    pub count: u32,
}

impl FromStr for Retention {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Retention, ConfigError> {
        let (name, count) = split_assignment(s)?;
        Ok(Retention {
            name: name.to_owned(),
            count: count
                .parse()
                .map_err(|_| ConfigError::InvalidNumber(count.to_owned()))?,
        })
    }
}

/// A backup point: an alias for messages and its path inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub alias: String,
    pub path: String,
}

impl FromStr for Backup {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Backup, ConfigError> {
        let (alias, path) = split_assignment(s)?;
        Ok(Backup {
            alias: alias.to_owned(),
            path: path.to_owned(),
        })
    }
}

/// Override the length of a period in seconds, like `daily=86400`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLength {
    pub name: String,
    pub seconds: i64,
}

impl FromStr for PeriodLength {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<PeriodLength, ConfigError> {
        let (name, seconds) = split_assignment(s)?;
        let seconds: i64 = seconds
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(seconds.to_owned()))?;
        if seconds <= 0 {
            return Err(ConfigError::Invalid(format!(
                "period {} must be longer than 0 seconds",
                name
            )));
        }
        Ok(PeriodLength {
            name: name.to_owned(),
            seconds,
        })
    }
}

/// A setting for every backup, or for one backup named by its alias
///
/// `10,5` applies to every backup and `web=1000,500` only to `web`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scoped<T> {
    pub backup: Option<String>,
    pub value: T,
}

impl<T> Scoped<T> {
    pub fn parse_with<F>(s: &str, parse: F) -> Result<Scoped<T>, ConfigError>
    where
        F: Fn(&str) -> Result<T, ConfigError>,
    {
        if s.contains('=') {
            let (backup, value) = split_assignment(s)?;
            Ok(Scoped {
                backup: Some(backup.to_owned()),
                value: parse(value)?,
            })
        } else {
            Ok(Scoped {
                backup: None,
                value: parse(s.trim())?,
            })
        }
    }
}

impl<T: FromStr<Err = ConfigError>> FromStr for Scoped<T> {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Scoped<T>, ConfigError> {
        Scoped::parse_with(s, str::parse)
    }
}

/// Per-backup settings over a default for the rest
#[derive(Debug, Clone, PartialEq)]
pub struct PerBackup<T> {
    pub default: Option<T>,
    pub overrides: BTreeMap<String, T>,
}

impl<T> Default for PerBackup<T> {
    fn default() -> PerBackup<T> {
        PerBackup {
            default: None,
            overrides: BTreeMap::new(),
        }
    }
}

impl<T> PerBackup<T> {
    pub fn everywhere(value: T) -> PerBackup<T> {
        PerBackup {
            default: Some(value),
            overrides: BTreeMap::new(),
        }
    }

    /// Later settings for the same scope replace earlier ones
    pub fn from_scoped<I: IntoIterator<Item = Scoped<T>>>(settings: I) -> PerBackup<T> {
        let mut per = PerBackup::default();
        for setting in settings {
            match setting.backup {
                Some(alias) => {
                    per.overrides.insert(alias, setting.value);
                }
                None => per.default = Some(setting.value),
            }
        }
        per
    }

    pub fn get(&self, alias: &str) -> Option<&T> {
        self.overrides.get(alias).or_else(|| self.default.as_ref())
    }

    fn covers_any(&self, backups: &[Backup]) -> bool {
        backups.iter().any(|b| self.get(&b.alias).is_some())
    }

    fn unknown_backup(&self, backups: &[Backup]) -> Option<&str> {
        self.overrides
            .keys()
            .find(|alias| !backups.iter().any(|b| &b.alias == *alias))
            .map(String::as_str)
    }
}

fn validate_levels(name: &str, levels: &PerBackup<Threshold>) -> Result<(), ConfigError> {
    if let Some(t) = levels.default {
        t.validated(name, Direction::LowerIsWorse)?;
    }
    for (alias, t) in &levels.overrides {
        t.validated(&format!("{} of {}", name, alias), Direction::LowerIsWorse)?;
    }
    Ok(())
}

pub fn default_periods() -> BTreeMap<String, i64> {
    [
        ("hourly", 3600),
        ("daily", 86400),
        ("weekly", 604_800),
        ("monthly", 2_678_400),
    ]
    .iter()
    .map(|&(name, secs)| (name.to_owned(), secs))
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsnapshotConfig {
    pub snapshot_root: PathBuf,
    /// Lowest period first, as in rsnapshot.conf
    pub retain: Vec<Retention>,
    pub backups: Vec<Backup>,
    pub periods: BTreeMap<String, i64>,
    pub minfiles: PerBackup<Threshold>,
    pub minsize: PerBackup<Threshold>,
    /// Name of the timestamp file inside each backup
    pub timestamp_file: PerBackup<String>,
    pub logfile: Option<PathBuf>,
    pub disabled: Vec<RsnapshotCheck>,
}

impl RsnapshotConfig {
    pub fn new<P: Into<PathBuf>>(snapshot_root: P, retain: Vec<Retention>) -> RsnapshotConfig {
        RsnapshotConfig {
            snapshot_root: snapshot_root.into(),
            retain,
            backups: Vec::new(),
            periods: default_periods(),
            minfiles: PerBackup::default(),
            minsize: PerBackup::default(),
            timestamp_file: PerBackup::default(),
            logfile: None,
            disabled: Vec::new(),
        }
    }

    pub fn with_periods(mut self, overrides: &[PeriodLength]) -> RsnapshotConfig {
        for p in overrides {
            self.periods.insert(p.name.clone(), p.seconds);
        }
        self
    }

    pub fn enabled(&self, check: RsnapshotCheck) -> bool {
        !self.disabled.contains(&check)
    }

    /// Make sure every check that will run has what it needs
    pub fn validated(self) -> Result<RsnapshotConfig, ConfigError> {
        let lowest = match self.retain.first() {
            Some(lowest) => lowest,
            None => {
                return Err(ConfigError::Invalid(
                    "at least one --retain NAME=COUNT is required".into(),
                ))
            }
        };
        for r in &self.retain {
            if !self.periods.contains_key(&r.name) {
                return Err(ConfigError::Invalid(format!(
                    "no length known for retention period '{}', use --period {}=SECONDS",
                    r.name, r.name
                )));
            }
        }
        let unknown = self
            .minfiles
            .unknown_backup(&self.backups)
            .map(|alias| ("minfiles", alias))
            .or_else(|| self.minsize.unknown_backup(&self.backups).map(|a| ("minsize", a)))
            .or_else(|| {
                self.timestamp_file
                    .unknown_backup(&self.backups)
                    .map(|a| ("timestamp-file", a))
            });
        if let Some((flag, alias)) = unknown {
            return Err(ConfigError::Invalid(format!(
                "--{} names backup '{}', which no --backup defines",
                flag, alias
            )));
        }
        validate_levels("minfiles", &self.minfiles)?;
        validate_levels("minsize", &self.minsize)?;
        if lowest.count < 2 {
            if let Some(check) = RsnapshotCheck::ALL
                .iter()
                .find(|c| c.needs_previous_snapshot() && self.configured(**c))
            {
                return Err(ConfigError::Invalid(format!(
                    "the {} check needs at least 2 snapshots for lowest retention period '{}'",
                    check, lowest.name
                )));
            }
        }
        Ok(self)
    }

    /// Enabled and given whatever options it needs
    fn configured(&self, check: RsnapshotCheck) -> bool {
        self.enabled(check)
            && match check {
                RsnapshotCheck::Minfiles => self.minfiles.covers_any(&self.backups),
                RsnapshotCheck::Minsize => self.minsize.covers_any(&self.backups),
                RsnapshotCheck::Timestamp => self.timestamp_file.covers_any(&self.backups),
                RsnapshotCheck::Log => self.logfile.is_some(),
                RsnapshotCheck::DirCreation | RsnapshotCheck::Rotation => true,
            }
    }

    fn lowest(&self) -> Option<&Retention> {
        self.retain.first()
    }

    fn period(&self, name: &str) -> i64 {
        self.periods.get(name).cloned().unwrap_or(0)
    }

    pub fn snapshot_dir(&self, period: &str, n: u32) -> PathBuf {
        self.snapshot_root.join(format!("{}.{}", period, n))
    }

    fn backup_dir(&self, period: &str, n: u32, backup: &Backup) -> PathBuf {
        self.snapshot_dir(period, n)
            .join(backup.path.trim_start_matches('/'))
    }
}

/// Run every enabled check in order
pub fn check_rsnapshot<S: DeltaStore + ?Sized>(
    config: &RsnapshotConfig,
    store: &S,
    now: DateTime<Utc>,
    results: &mut CheckResults,
) {
    for &check in &RsnapshotCheck::ALL {
        if !config.configured(check) {
            results.skip(check.name());
            continue;
        }
        debug!("{} check start", check);
        match check {
            RsnapshotCheck::Minfiles => check_minfiles(config, results),
            RsnapshotCheck::Minsize => check_minsize(config, results),
            RsnapshotCheck::Log => check_log(config, results),
            RsnapshotCheck::DirCreation => check_dir_creation(config, store, now, results),
            RsnapshotCheck::Rotation => check_rotation(config, now, results),
            RsnapshotCheck::Timestamp => check_timestamp(config, now, results),
        }
        debug!("{} check end", check);
    }
}

pub fn run_rsnapshot<S: DeltaStore + ?Sized>(
    config: &RsnapshotConfig,
    store: &S,
    now: DateTime<Utc>,
) -> Report {
    let mut results = CheckResults::new();
    check_rsnapshot(config, store, now, &mut results);
    results.finalize()
}

/// Number of entries under `path`, itself included, like `find | wc -l`
fn count_entries(path: &Path) -> io::Result<u64> {
    let mut count = 0;
    for entry in WalkDir::new(path) {
        entry?;
        count += 1;
    }
    Ok(count)
}

/// Apparent size of every file under `path`, like `du -sb`
fn apparent_size(path: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        total += entry.metadata().map_err(io::Error::from)?.len();
    }
    Ok(total)
}

/// Shared shape of minfiles and minsize
fn check_content<F, D>(
    config: &RsnapshotConfig,
    results: &mut CheckResults,
    check: RsnapshotCheck,
    label: &str,
    levels: &PerBackup<Threshold>,
    measure: F,
    describe: D,
) where
    F: Fn(&Path) -> io::Result<u64>,
    D: Fn(f64) -> String,
{
    let lowest = match config.lowest() {
        Some(lowest) => lowest,
        None => return,
    };
    let mut tally = Tally::new();
    for backup in &config.backups {
        let threshold = match levels.get(&backup.alias) {
            Some(threshold) => *threshold,
            None => {
                debug!("no {} levels for {}", check, backup.alias);
                continue;
            }
        };
        let path = config.backup_dir(&lowest.name, 1, backup);
        if !path.exists() {
            info!(
                "skipping {} check for {} as retention directory does not exist",
                check,
                path.display()
            );
            continue;
        }
        let found = match measure(&path) {
            Ok(found) => found as f64,
            Err(e) => {
                error!("{} check for {} failed: {}", check, path.display(), e);
                tally.flag(
                    Status::Unknown,
                    format!("{} check for '{}' failed: {}.", label, backup.alias, e),
                );
                continue;
            }
        };
        debug!("{} for {}: {}", check, path.display(), found);
        let status = evaluate(found, threshold, Direction::LowerIsWorse);
        let expected = if status == Status::Critical {
            threshold.crit
        } else {
            threshold.warn
        };
        tally.flag(
            status,
            format!(
                "{} check for '{}' is {}, expected > {}.",
                label,
                backup.alias,
                describe(found),
                describe(expected)
            ),
        );
        tally.note(format!("[{} - {}]", backup.alias, describe(found)));
    }
    tally.record_into(results, check.name(), &format!("{}:", label));
}

fn check_minfiles(config: &RsnapshotConfig, results: &mut CheckResults) {
    check_content(
        config,
        results,
        RsnapshotCheck::Minfiles,
        "Minfiles",
        &config.minfiles,
        count_entries,
        |n| format!("{}", n as u64),
    );
}

fn check_minsize(config: &RsnapshotConfig, results: &mut CheckResults) {
    check_content(
        config,
        results,
        RsnapshotCheck::Minsize,
        "Minsize",
        &config.minsize,
        apparent_size,
        |n| bytes_to_human_size(n as u64),
    );
}

/// The completion line of the latest run of a period
#[derive(Debug, Default)]
struct LogRun {
    ended: Option<String>,
}

fn check_log(config: &RsnapshotConfig, results: &mut CheckResults) {
    let name = RsnapshotCheck::Log.name();
    let logfile = match config.logfile {
        Some(ref logfile) => logfile,
        None => return,
    };
    let contents = match fs::read_to_string(logfile) {
        Ok(contents) => contents,
        Err(e) => {
            error!("log file {} can't be opened: {}", logfile.display(), e);
            results.record(
                name,
                Status::Unknown,
                "Error - cannot open rsnapshot log file for log-check.",
            );
            return;
        }
    };

    let mut runs: BTreeMap<&str, LogRun> = BTreeMap::new();
    for line in contents.lines() {
        for r in &config.retain {
            if line.contains(&format!("{}: started", r.name)) {
                runs.insert(&r.name, LogRun::default());
            } else if line.contains(&format!("{}: completed", r.name)) {
                runs.entry(&r.name).or_insert_with(LogRun::default).ended = Some(line.trim().to_owned());
            }
        }
    }

    let mut tally = Tally::new();
    if runs.len() < config.retain.len() {
        tally.flag(
            Status::Warning,
            "Log check: Not all retention periods were found in the log.",
        );
    }
    for r in &config.retain {
        let ended = match runs.get(r.name.as_str()).and_then(|run| run.ended.as_ref()) {
            Some(ended) => ended,
            None => continue,
        };
        if ended.contains("completed, but with some errors") {
            tally.flag(
                Status::Critical,
                format!("Log check: Task for period {} was completed but with errors.", r.name),
            );
        } else if ended.contains("completed, but with some warnings") {
            tally.flag(
                Status::Warning,
                format!("Log check: Task for period {} was completed but with warnings.", r.name),
            );
        } else if ended.contains("completed successfully") {
            tally.note(format!("[{} - completed successfully]", r.name));
        } else {
            tally.flag(
                Status::Unknown,
                format!(
                    "Log check: Unknown completion status for retention period {}.",
                    r.name
                ),
            );
        }
    }
    tally.record_into(results, name, "Log:");
}

fn check_dir_creation<S: DeltaStore + ?Sized>(
    config: &RsnapshotConfig,
    store: &S,
    now: DateTime<Utc>,
    results: &mut CheckResults,
) {
    let name = RsnapshotCheck::DirCreation.name();
    let key = store_key(FAMILY, &config.snapshot_root.to_string_lossy());
    let previous = match store.load_at(&key, now) {
        Ok(previous) => previous,
        Err(e) => {
            results.record(
                name,
                Status::Unknown,
                format!("Directory Creation Check: {}.", e),
            );
            return;
        }
    };
    let first_run = previous
        .as_ref()
        .and_then(|p| p.values.get(FIRST_RUN).cloned())
        .unwrap_or_else(|| now.timestamp());
    let mut baseline = Sample::new();
    baseline.insert(FIRST_RUN.to_owned(), first_run);
    if let Err(e) = store.save(&key, &baseline, now) {
        results.record(
            name,
            Status::Unknown,
            format!("Directory Creation Check: {}.", e),
        );
        return;
    }
    if previous.is_none() {
        results.record(
            name,
            Status::Unknown,
            "Directory Creation Check: no first run recorded yet, baseline saved.",
        );
        return;
    }

    let elapsed = (now.timestamp() - first_run).max(0);
    let mut tally = Tally::new();
    for r in &config.retain {
        let expected = (elapsed / config.period(&r.name).max(1)).min(i64::from(r.count)) as u32;
        debug!("checking for {} expected directories for {}", expected, r.name);
        let mut present = 0;
        for i in 0..expected {
            let path = config.snapshot_dir(&r.name, i);
            if path.exists() {
                present += 1;
            } else {
                info!("retention directory {} is expected but does not exist", path.display());
                tally.flag(
                    Status::Critical,
                    format!("Directory Creation Check: {}.{} is expected but missing.", r.name, i),
                );
            }
        }
        tally.note(format!("[{} - {}/{}]", r.name, present, expected));
    }
    tally.record_into(results, name, "Directories:");
}

fn check_rotation(config: &RsnapshotConfig, now: DateTime<Utc>, results: &mut CheckResults) {
    let mut tally = Tally::new();
    for r in &config.retain {
        let oldest_allowed = now.timestamp() - config.period(&r.name);
        for i in 0..r.count {
            let path = config.snapshot_dir(&r.name, i);
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(_) => {
                    info!("retention directory {} does not exist", path.display());
                    continue;
                }
            };
            let overdue = oldest_allowed - meta.ctime();
            if overdue > 0 {
                info!("retention directory {} is {} seconds too old", path.display(), overdue);
                tally.flag(
                    Status::Warning,
                    format!(
                        "Rotation Check: {}.{} is {} seconds past expected rotation.",
                        r.name, i, overdue
                    ),
                );
            }
        }
    }
    tally.record_into(results, RsnapshotCheck::Rotation.name(), "Rotation OK:");
}

fn read_timestamp(path: &Path) -> Result<i64, String> {
    let contents = fs::read_to_string(path).map_err(|e| e.to_string())?;
    contents
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a timestamp", contents.trim()))
}

fn check_timestamp(config: &RsnapshotConfig, now: DateTime<Utc>, results: &mut CheckResults) {
    let lowest = match config.lowest() {
        Some(lowest) => lowest,
        None => return,
    };
    let limit = 2.0 * config.period(&lowest.name) as f64;
    let threshold = Threshold::new(limit, limit);
    let mut tally = Tally::new();
    for backup in &config.backups {
        let file = match config.timestamp_file.get(&backup.alias) {
            Some(file) => file,
            None => continue,
        };
        let candidates = [
            config.backup_dir(&lowest.name, 0, backup).join(file),
            config.backup_dir(&lowest.name, 1, backup).join(file),
        ];
        let path = match candidates.iter().find(|p| p.exists()) {
            Some(path) => path,
            None => {
                error!("timestamp file {} does not exist", candidates[1].display());
                tally.flag(
                    Status::Unknown,
                    format!("Timestamp file for {} not found.", backup.alias),
                );
                continue;
            }
        };
        let ts = match read_timestamp(path) {
            Ok(ts) => ts,
            Err(e) => {
                tally.flag(
                    Status::Unknown,
                    format!("Timestamp for {} could not be read: {}.", backup.alias, e),
                );
                continue;
            }
        };
        let age = now.timestamp() - ts;
        debug!("timestamp for {} is {} seconds old", backup.alias, age);
        tally.flag(
            evaluate(age as f64, threshold, Direction::HigherIsWorse),
            format!(
                "Timestamp for {} is greater than it should be ({} seconds old).",
                backup.alias, age
            ),
        );
        tally.note(format!("[{} - {}s old]", backup.alias, age));
    }
    tally.record_into(results, RsnapshotCheck::Timestamp.name(), "Timestamps:");
}
