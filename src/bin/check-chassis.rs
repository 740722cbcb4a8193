//! Check the health of a switch or router chassis
//!
//! Temperature, fans, power supplies, memory, disk, cpu and recent reboots,
//! read over SNMP, a JSON-RPC API or a snapshot file. Where each value lives
//! is described by a device profile.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use structopt::StructOpt;

use probe_plugins::checks::chassis::{run_chassis, ChassisConfig, ChassisProfile, Subsystem};
use probe_plugins::logging::{self, Verbosity};
use probe_plugins::reader::{DeviceReader, JsonRpcReader, NetSnmpReader, SnapshotReader};
use probe_plugins::results::Report;
use probe_plugins::threshold::{ConfigError, Threshold};
use probe_plugins::{cli, watchdog, Status};

/// Check the health of a switch or router chassis
///
/// Exactly one of --host, --api-url or --snapshot selects where readings come
/// from. Subsystems that a platform does not support can be skipped with the
/// matching --skip-* flag, or the run narrowed to a few with --target.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "check-chassis (part of probe-plugins)",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
struct Args {
    #[structopt(long = "profile", help = "Device profile (JSON) describing where readings live", parse(from_os_str))]
    profile: PathBuf,

    #[structopt(short = "H", long = "host", help = "SNMP agent to query")]
    host: Option<String>,
    #[structopt(short = "c", long = "community", default_value = "public")]
    community: String,
    #[structopt(short = "p", long = "port", default_value = "161")]
    port: u16,

    #[structopt(long = "api-url", help = "JSON-RPC endpoint to query instead of SNMP")]
    api_url: Option<String>,
    #[structopt(long = "username", default_value = "")]
    username: String,
    #[structopt(long = "password", default_value = "")]
    password: String,
    #[structopt(long = "insecure", help = "Do not verify the API's TLS certificate")]
    insecure: bool,

    #[structopt(
        long = "snapshot",
        help = "Read values from a JSON file of identifier to value",
        parse(from_os_str)
    )]
    snapshot: Option<PathBuf>,

    #[structopt(long = "tempwarn", default_value = "55")]
    tempwarn: f64,
    #[structopt(long = "tempcrit", default_value = "65")]
    tempcrit: f64,
    #[structopt(long = "fan-min-rpm", default_value = "300", help = "Fans slower than this are critical")]
    fan_min_rpm: f64,
    #[structopt(long = "ignore-psu-notpresent", help = "Do not warn about empty PSU slots")]
    ignore_psu_notpresent: bool,
    #[structopt(long = "memwarn", default_value = "80")]
    memwarn: f64,
    #[structopt(long = "memcrit", default_value = "90")]
    memcrit: f64,
    #[structopt(long = "diskwarn", default_value = "80")]
    diskwarn: f64,
    #[structopt(long = "diskcrit", default_value = "90")]
    diskcrit: f64,
    #[structopt(long = "thres-cpu", default_value = "85,95", help = "CPU usage as <warn>,<crit>")]
    thres_cpu: Threshold,
    #[structopt(
        long = "reboot",
        default_value = "3600",
        help = "Critical if the device has been up for fewer than this many seconds"
    )]
    reboot: f64,
    #[structopt(
        long = "lastcheck",
        help = "Unix time of the previous check, critical if the device booted since"
    )]
    lastcheck: Option<i64>,

    #[structopt(long = "skip-temp")]
    skip_temp: bool,
    #[structopt(long = "skip-fans")]
    skip_fans: bool,
    #[structopt(long = "skip-psu")]
    skip_psu: bool,
    #[structopt(long = "skip-mem")]
    skip_mem: bool,
    #[structopt(long = "skip-disk")]
    skip_disk: bool,
    #[structopt(long = "skip-cpu")]
    skip_cpu: bool,
    #[structopt(long = "skip-reboot")]
    skip_reboot: bool,
    #[structopt(
        long = "target",
        number_of_values = 1,
        help = "Only check this subsystem, may be repeated"
    )]
    target: Vec<Subsystem>,

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

    fn config(&self) -> Result<ChassisConfig, ConfigError> {
        cli::check_read_timeout(self.read_timeout, self.timeout)?;
        let skip = [
            (self.skip_temp, Subsystem::Temperature),
            (self.skip_fans, Subsystem::Fans),
            (self.skip_psu, Subsystem::Power),
            (self.skip_mem, Subsystem::Memory),
            (self.skip_disk, Subsystem::Disk),
            (self.skip_cpu, Subsystem::Cpu),
            (self.skip_reboot, Subsystem::Reboot),
        ]
        .iter()
        .filter(|&&(skipped, subsystem)| {
            skipped || !(self.target.is_empty() || self.target.contains(&subsystem))
        })
        .map(|&(_, subsystem)| subsystem)
        .collect();
        ChassisConfig {
            temperature: Threshold::new(self.tempwarn, self.tempcrit),
            fan_min_rpm: self.fan_min_rpm,
            ignore_psu_notpresent: self.ignore_psu_notpresent,
            memory: Threshold::new(self.memwarn, self.memcrit),
            disk: Threshold::new(self.diskwarn, self.diskcrit),
            cpu: self.thres_cpu,
            reboot_secs: self.reboot,
            last_check: self.lastcheck,
            skip,
        }
        .validated()
    }

    fn reader(&self, profile: &ChassisProfile) -> Result<Box<dyn DeviceReader>, String> {
        let timeout = Duration::from_secs(self.read_timeout);
        match (&self.snapshot, &self.api_url, &self.host) {
            (Some(path), None, None) => SnapshotReader::from_file(path)
                .map(|r| Box::new(r) as Box<dyn DeviceReader>)
                .map_err(|e| e.to_string()),
            (None, Some(url), None) => {
                let request = profile
                    .request
                    .clone()
                    .ok_or_else(|| "profile has no request for --api-url".to_owned())?;
                JsonRpcReader::new(
                    url,
                    &self.username,
                    &self.password,
                    request,
                    timeout,
                    self.insecure,
                )
                .map(|r| Box::new(r) as Box<dyn DeviceReader>)
                .map_err(|e| e.to_string())
            }
            (None, None, Some(host)) => Ok(Box::new(NetSnmpReader::new(
                host.as_str(),
                self.port,
                self.community.as_str(),
                timeout,
            ))),
            _ => Err("exactly one of --host, --api-url or --snapshot is required".to_owned()),
        }
    }
}

fn unknown<E: std::fmt::Display>(e: E) -> ! {
    Report::single(Status::Unknown, format!("UNKNOWN - {}", e)).print_and_exit()
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    let args: Args = cli::from_args();
    logging::init(args.verbosity());
    watchdog::arm(Duration::from_secs(args.timeout));

    let config = args.config().unwrap_or_else(|e| unknown(e));
    let profile = ChassisProfile::from_file(&args.profile).unwrap_or_else(|e| unknown(e));
    let mut reader = args.reader(&profile).unwrap_or_else(|e| unknown(e));

    run_chassis(&mut *reader, &profile, &config, Utc::now()).print_and_exit();
}

#[cfg(test)]
mod test {
    use structopt::StructOpt;

    use super::Args;
    use probe_plugins::checks::chassis::{ChassisProfile, Subsystem};
    use probe_plugins::cli::usage_report;
    use probe_plugins::reader::DeviceReader;
    use probe_plugins::threshold::Threshold;

    fn build_args(argv: Vec<&str>) -> Args {
        Args::from_iter(argv.into_iter())
    }

    #[test]
    fn defaults() {
        let args = build_args(vec!["check-chassis", "--profile", "p.json", "-H", "sw1"]);
        let config = args.config().unwrap();
        assert_eq!(config.temperature, Threshold::new(55.0, 65.0));
        assert_eq!(config.memory, Threshold::new(80.0, 90.0));
        assert_eq!(config.cpu, Threshold::new(85.0, 95.0));
        assert_eq!(config.reboot_secs, 3600.0);
        assert!(config.skip.is_empty());
        assert_eq!(args.community, "public");
        assert_eq!(args.port, 161);
    }

    #[test]
    fn thresholds_and_skips() {
        let args = build_args(vec![
            "check-chassis",
            "--profile",
            "p.json",
            "-H",
            "sw1",
            "--memwarn",
            "85",
            "--memcrit",
            "95",
            "--thres-cpu",
            "70,80",
            "--skip-temp",
            "--skip-reboot",
            "--lastcheck",
            "1700000000",
        ]);
        let config = args.config().unwrap();
        assert_eq!(config.memory, Threshold::new(85.0, 95.0));
        assert_eq!(config.cpu, Threshold::new(70.0, 80.0));
        assert_eq!(config.skip, vec![Subsystem::Temperature, Subsystem::Reboot]);
        assert_eq!(config.last_check, Some(1_700_000_000));
    }

    #[test]
    fn inverted_thresholds_are_config_errors() {
        let args = build_args(vec![
            "check-chassis",
            "--profile",
            "p.json",
            "-H",
            "sw1",
            "--tempwarn",
            "70",
            "--tempcrit",
            "60",
        ]);
        assert!(args.config().is_err());
    }

    #[test]
    fn bad_cpu_pair_is_rejected_by_the_parser() {
        let res = Args::from_iter_safe(
            vec!["check-chassis", "--profile", "p.json", "--thres-cpu", "85"].into_iter(),
        );
        let (text, code) = usage_report(&res.unwrap_err()).unwrap().render();
        assert_eq!(code, 3);
        assert!(text.starts_with("UNKNOWN - Invalid value for"), "{}", text);
        assert!(text.contains("'85'"), "{}", text);
    }

    #[test]
    fn targets_narrow_the_run() {
        let args = build_args(vec![
            "check-chassis",
            "--profile",
            "p.json",
            "-H",
            "sw1",
            "--target",
            "FANS",
            "--target",
            "temp",
        ]);
        let config = args.config().unwrap();
        assert_eq!(
            config.skip,
            vec![
                Subsystem::Power,
                Subsystem::Memory,
                Subsystem::Disk,
                Subsystem::Cpu,
                Subsystem::Reboot
            ]
        );

        let res = Args::from_iter_safe(
            vec!["check-chassis", "--profile", "p.json", "--target", "voltage"].into_iter(),
        );
        let (text, code) = usage_report(&res.unwrap_err()).unwrap().render();
        assert_eq!(code, 3);
        assert!(text.contains("unknown subsystem 'voltage'"), "{}", text);
    }

    #[test]
    fn read_timeout_inside_budget() {
        let args = build_args(vec![
            "check-chassis",
            "--profile",
            "p.json",
            "-H",
            "sw1",
            "--read-timeout",
            "10",
            "--timeout",
            "10",
        ]);
        assert!(args.config().is_err());
    }

    #[test]
    fn exactly_one_source() {
        let profile = ChassisProfile::default();
        let args = build_args(vec!["check-chassis", "--profile", "p.json"]);
        assert!(args.reader(&profile).is_err());

        let args = build_args(vec![
            "check-chassis",
            "--profile",
            "p.json",
            "-H",
            "sw1",
            "--api-url",
            "https://sw1/command-api",
        ]);
        assert!(args.reader(&profile).is_err());

        let args = build_args(vec![
            "check-chassis",
            "--profile",
            "p.json",
            "--api-url",
            "https://sw1/command-api",
        ]);
        assert!(args.reader(&profile).is_err(), "no request in profile");

        let args = build_args(vec!["check-chassis", "--profile", "p.json", "-H", "sw1"]);
        assert_eq!(args.reader(&profile).unwrap().identity(), "sw1");
    }
}
