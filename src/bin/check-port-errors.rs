//! Check for new errors on a switch's ethernet ports
//!
//! Interface error counters are compared against the previous run's, which
//! is kept in a state directory. The first run (and the first run after the
//! saved counters expire) only records a baseline and reports UNKNOWN.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use structopt::StructOpt;

use probe_plugins::checks::port_errors::{run_port_errors, PortErrorsConfig, DEFAULT_TTL_SECS};
use probe_plugins::delta::FileStore;
use probe_plugins::logging::{self, Verbosity};
use probe_plugins::reader::{DeviceReader, NetSnmpReader, SnapshotReader};
use probe_plugins::results::Report;
use probe_plugins::{cli, watchdog, Status};

/// Check for new errors on a switch's ethernet ports
#[derive(Debug, StructOpt)]
#[structopt(
    name = "check-port-errors (part of probe-plugins)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(short = "H", long = "host", help = "SNMP agent to query")]
    host: Option<String>,
    #[structopt(short = "c", long = "community", default_value = "public")]
    community: String,
    #[structopt(short = "p", long = "port", default_value = "161")]
    port: u16,
    #[structopt(
        long = "snapshot",
        help = "Read the interface tables from a JSON file instead",
        parse(from_os_str)
    )]
    snapshot: Option<PathBuf>,

    #[structopt(
        long = "ignore-port",
        number_of_values = 1,
        help = "Regex of interface names to leave out, may be repeated"
    )]
    ignore_port: Vec<Regex>,

    #[structopt(
        long = "state-dir",
        default_value = "/var/tmp/probe-plugins",
        help = "Where to keep counters between runs",
        parse(from_os_str)
    )]
    state_dir: PathBuf,
    #[structopt(
        long = "state-ttl",
        help = "Seconds after which saved counters are too old to compare against"
    )]
    state_ttl: Option<u32>,

    #[structopt(long = "read-timeout", default_value = "5", help = "Seconds to wait for the device")]
    read_timeout: u64,
    #[structopt(long = "timeout", default_value = "55", help = "Give up with UNKNOWN after this many seconds")]
    timeout: u64,

    #[structopt(short = "q", long = "quiet", help = "Only print the status line")]
    quiet: bool,
    #[structopt(short = "v", long = "verbose", help = "Print readings as they are taken")]
    verbose: bool,
    #[structopt(short = "d", long = "debug", help = "Print everything")]
    debug: bool,
}

impl Args {
    fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose, self.debug)
    }

    fn store(&self) -> FileStore {
        let ttl = self.state_ttl.map_or(DEFAULT_TTL_SECS, i64::from);
        FileStore::new(&self.state_dir, chrono::Duration::seconds(ttl))
    }

    fn config(&self) -> PortErrorsConfig {
        PortErrorsConfig {
            ignore: self.ignore_port.clone(),
        }
    }

    fn reader(&self) -> Result<Box<dyn DeviceReader>, String> {
        cli::check_read_timeout(self.read_timeout, self.timeout).map_err(|e| e.to_string())?;
        match (&self.snapshot, &self.host) {
            (Some(path), None) => SnapshotReader::from_file(path)
                .map(|r| Box::new(r) as Box<dyn DeviceReader>)
                .map_err(|e| e.to_string()),
            (None, Some(host)) => Ok(Box::new(NetSnmpReader::new(
                host.as_str(),
                self.port,
                self.community.as_str(),
                Duration::from_secs(self.read_timeout),
            ))),
            _ => Err("exactly one of --host or --snapshot is required".to_owned()),
        }
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args: Args = cli::from_args();
    logging::init(args.verbosity());
    watchdog::arm(Duration::from_secs(args.timeout));

    let mut reader = args.reader().unwrap_or_else(|e| {
        Report::single(Status::Unknown, format!("UNKNOWN - {}", e)).print_and_exit()
    });
    run_port_errors(&mut *reader, &args.store(), &args.config(), Utc::now()).print_and_exit();
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use super::Args;
    use probe_plugins::cli::usage_report;
    use probe_plugins::delta::FileStore;
    use probe_plugins::reader::DeviceReader;

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    #[test]
    fn defaults() {
        let args = build_args(vec!["check-port-errors", "-H", "core1", "-c", "s3cret"]);
        assert_eq!(args.host.as_deref(), Some("core1"));
        assert_eq!(args.community, "s3cret");
        assert!(args.ignore_port.is_empty());
        let store: FileStore = args.store();
        assert_eq!(store.dir(), std::path::Path::new("/var/tmp/probe-plugins"));
    }

    #[test]
    fn repeated_ignores() {
        let args = build_args(vec![
            "check-port-errors",
            "-H",
            "core1",
            "--ignore-port",
            "^Gi0/4$",
            "--ignore-port",
            "^Te",
        ]);
        let config = args.config();
        assert_eq!(config.ignore.len(), 2);
        assert!(config.ignore[1].is_match("Te1/0/1"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let res = Args::from_iter_safe(
            vec!["check-port-errors", "-H", "core1", "--ignore-port", "(unclosed"].into_iter(),
        );
        let (text, code) = usage_report(&res.unwrap_err()).unwrap().render();
        assert_eq!(code, 3);
        assert!(text.starts_with("UNKNOWN - "), "{}", text);
        assert!(text.contains("--ignore-port"), "{}", text);
    }

    #[test]
    fn state_ttl_must_be_positive() {
        let res = Args::from_iter_safe(
            vec!["check-port-errors", "-H", "core1", "--state-ttl", "-60"].into_iter(),
        );
        assert_eq!(usage_report(&res.unwrap_err()).unwrap().render().1, 3);
        let args = build_args(vec!["check-port-errors", "-H", "core1", "--state-ttl", "600"]);
        assert_eq!(args.store().ttl(), chrono::Duration::seconds(600));
    }

    #[test]
    fn read_timeout_inside_budget() {
        let args = build_args(vec![
            "check-port-errors",
            "-H",
            "core1",
            "--read-timeout",
            "30",
            "--timeout",
            "20",
        ]);
        let err = args.reader().err().unwrap();
        assert_eq!(err, "--read-timeout 30s must be between 1s and --timeout 20s");
    }

    #[test]
    fn needs_a_source() {
        let args = build_args(vec!["check-port-errors"]);
        assert!(args.reader().is_err());
        let args = build_args(vec!["check-port-errors", "-H", "core1"]);
        assert_eq!(args.reader().unwrap().identity(), "core1");
    }
}
