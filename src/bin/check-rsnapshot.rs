//! Check that rsnapshot backups are being taken and rotated
//!
//! Looks at the snapshot directories, the rsnapshot log and an optional
//! timestamp file written by a backup script. The retention periods and
//! backup points are given as flags, rsnapshot.conf is not parsed.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use structopt::StructOpt;

use probe_plugins::checks::rsnapshot::{
    run_rsnapshot, Backup, PerBackup, PeriodLength, Retention, RsnapshotCheck, RsnapshotConfig,
    Scoped, DEFAULT_STATE_TTL_SECS,
};
use probe_plugins::delta::FileStore;
use probe_plugins::logging::{self, Verbosity};
use probe_plugins::results::Report;
use probe_plugins::threshold::{ConfigError, Threshold};
use probe_plugins::{cli, watchdog, Status};

/// Check that rsnapshot backups are being taken and rotated
///
/// Give retention periods lowest first, in the same order as rsnapshot.conf:
///
///     check-rsnapshot --snapshot-root /backups --retain daily=7 --retain weekly=4
#[derive(Debug, StructOpt)]
#[structopt(
    name = "check-rsnapshot (part of probe-plugins)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(long = "snapshot-root", parse(from_os_str))]
    snapshot_root: PathBuf,
    #[structopt(
        long = "retain",
        number_of_values = 1,
        required = true,
        help = "Retention period as NAME=COUNT, lowest first, may be repeated"
    )]
    retain: Vec<Retention>,
    #[structopt(
        long = "backup",
        number_of_values = 1,
        help = "Backup point as ALIAS=PATH inside each snapshot, may be repeated"
    )]
    backup: Vec<Backup>,
    #[structopt(
        long = "period",
        number_of_values = 1,
        help = "Length of a retention period as NAME=SECONDS, may be repeated"
    )]
    period: Vec<PeriodLength>,

    #[structopt(
        long = "minfiles",
        number_of_values = 1,
        help = "Fewest files per backup as <warn>,<crit>, or ALIAS=<warn>,<crit> for one backup"
    )]
    minfiles: Vec<Scoped<Threshold>>,
    #[structopt(
        long = "minsize",
        number_of_values = 1,
        parse(try_from_str = parse_minsize),
        help = "Smallest size per backup as <warn>,<crit> with k, m or g suffixes, or ALIAS=<warn>,<crit>"
    )]
    minsize: Vec<Scoped<Threshold>>,
    #[structopt(
        long = "timestamp-file",
        number_of_values = 1,
        parse(try_from_str = parse_timestamp_file),
        help = "Name of a file holding the backup's unix time, or ALIAS=NAME for one backup"
    )]
    timestamp_file: Vec<Scoped<String>>,
    #[structopt(long = "logfile", parse(from_os_str))]
    logfile: Option<PathBuf>,

    #[structopt(long = "disable-minfiles")]
    disable_minfiles: bool,
    #[structopt(long = "disable-minsize")]
    disable_minsize: bool,
    #[structopt(long = "disable-log")]
    disable_log: bool,
    #[structopt(long = "disable-dir-creation")]
    disable_dir_creation: bool,
    #[structopt(long = "disable-rotation")]
    disable_rotation: bool,
    #[structopt(long = "disable-timestamp")]
    disable_timestamp: bool,

    #[structopt(
        long = "state-dir",
        default_value = "/var/tmp/probe-plugins",
        help = "Where to keep the first-run time between runs",
        parse(from_os_str)
    )]
    state_dir: PathBuf,
    #[structopt(long = "state-ttl", help = "Seconds the first-run time is kept without a run")]
    state_ttl: Option<u32>,

    #[structopt(long = "timeout", default_value = "55", help = "Give up with UNKNOWN after this many seconds")]
    timeout: u64,

    #[structopt(short = "q", long = "quiet", help = "Only print the status line")]
    quiet: bool,
    #[structopt(short = "v", long = "verbose", help = "Explain each check")]
    verbose: bool,
    #[structopt(short = "d", long = "debug", help = "Print everything")]
    debug: bool,
}

fn parse_minsize(s: &str) -> Result<Scoped<Threshold>, ConfigError> {
    Scoped::parse_with(s, Threshold::parse_sizes)
}

fn parse_timestamp_file(s: &str) -> Result<Scoped<String>, ConfigError> {
    Scoped::parse_with(s, |name| Ok(name.to_owned()))
}

impl Args {
    fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose, self.debug)
    }

    fn config(&self) -> Result<RsnapshotConfig, ConfigError> {
        let mut config = RsnapshotConfig::new(&self.snapshot_root, self.retain.clone())
            .with_periods(&self.period);
        config.backups = self.backup.clone();
        config.minfiles = PerBackup::from_scoped(self.minfiles.clone());
        config.minsize = PerBackup::from_scoped(self.minsize.clone());
        config.timestamp_file = PerBackup::from_scoped(self.timestamp_file.clone());
        config.logfile = self.logfile.clone();
        config.disabled = [
            (self.disable_minfiles, RsnapshotCheck::Minfiles),
            (self.disable_minsize, RsnapshotCheck::Minsize),
            (self.disable_log, RsnapshotCheck::Log),
            (self.disable_dir_creation, RsnapshotCheck::DirCreation),
            (self.disable_rotation, RsnapshotCheck::Rotation),
            (self.disable_timestamp, RsnapshotCheck::Timestamp),
        ]
        .iter()
        .filter(|&&(disabled, _)| disabled)
        .map(|&(_, check)| check)
        .collect();
        config.validated()
    }

    fn store(&self) -> FileStore {
        let ttl = self.state_ttl.map_or(DEFAULT_STATE_TTL_SECS, i64::from);
        FileStore::new(&self.state_dir, chrono::Duration::seconds(ttl))
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args: Args = cli::from_args();
    logging::init(args.verbosity());
    watchdog::arm(Duration::from_secs(args.timeout));

    let config = args.config().unwrap_or_else(|e| {
        Report::single(Status::Unknown, format!("UNKNOWN - {}", e)).print_and_exit()
    });
    run_rsnapshot(&config, &args.store(), Utc::now()).print_and_exit();
}
