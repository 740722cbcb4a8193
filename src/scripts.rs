//! Documentation about the various scripts contained herein
//!
//! - [check-chassis](#check-chassis)
//! - [check-port-errors](#check-port-errors)
//! - [check-rsnapshot](#check-rsnapshot)
//!
//! All of them print a single line and exit 0, 1, 2 or 3 for OK, WARNING,
//! CRITICAL and UNKNOWN. Anything that takes longer than `--timeout` seconds
//! exits UNKNOWN, and so does a malformed flag. `--read-timeout` has to be
//! shorter than `--timeout`.
//!
//! # check-chassis
//!
//! Needs either `snmpget`/`snmpwalk` from net-snmp, an HTTPS JSON-RPC
//! endpoint on the device, or a snapshot file. Profiles for a couple of
//! device families live in the `profiles/` directory.
//!
//! ```plain
//! $ check-chassis --help
//! check-chassis (part of probe-plugins) 0.1.0
//! Check the health of a switch or router chassis
//!
//! Exactly one of --host, --api-url or --snapshot selects where readings come from. Subsystems that a platform does not
//! support can be skipped with the matching --skip-* flag, or the run narrowed to a few with --target.
//!
//! USAGE:
//!     check-chassis [FLAGS] [OPTIONS] --profile <profile>
//!
//! FLAGS:
//!     -d, --debug                    Print everything
//!     -h, --help                     Prints help information
//!         --ignore-psu-notpresent    Do not warn about empty PSU slots
//!         --insecure                 Do not verify the API's TLS certificate
//!     -q, --quiet                    Only print the status line
//!         --skip-cpu
//!         --skip-disk
//!         --skip-fans
//!         --skip-mem
//!         --skip-psu
//!         --skip-reboot
//!         --skip-temp
//!     -V, --version                  Prints version information
//!     -v, --verbose                  Print readings as they are taken
//!
//! OPTIONS:
//!         --api-url <api-url>              JSON-RPC endpoint to query instead of SNMP
//!     -c, --community <community>          [default: public]
//!         --diskcrit <diskcrit>            [default: 90]
//!         --diskwarn <diskwarn>            [default: 80]
//!         --fan-min-rpm <fan-min-rpm>      Fans slower than this are critical [default: 300]
//!     -H, --host <host>                    SNMP agent to query
//!         --lastcheck <lastcheck>          Unix time of the previous check, critical if the device booted since
//!         --memcrit <memcrit>              [default: 90]
//!         --memwarn <memwarn>              [default: 80]
//!         --password <password>            [default: ]
//!     -p, --port <port>                    [default: 161]
//!         --profile <profile>              Device profile (JSON) describing where readings live
//!         --read-timeout <read-timeout>    Seconds to wait for the device [default: 5]
//!         --reboot <reboot>                Critical if the device has been up for fewer than this many seconds
//!                                          [default: 3600]
//!         --snapshot <snapshot>            Read values from a JSON file of identifier to value
//!         --target <target>...             Only check this subsystem, may be repeated
//!         --tempcrit <tempcrit>            [default: 65]
//!         --tempwarn <tempwarn>            [default: 55]
//!         --thres-cpu <thres-cpu>          CPU usage as <warn>,<crit> [default: 85,95]
//!         --timeout <timeout>              Give up with UNKNOWN after this many seconds [default: 55]
//!         --username <username>            [default: ]
//! ```
//!
//! A profile names the identifier of each reading. Sensors are read one at a
//! time, tables are walked and each row becomes a reading:
//!
//! ```plain
//! {
//!   "name": "example",
//!   "temperature": {"sensors": [{"name": "board", "id": ".1.3.6.1.4.1.14988.1.1.3.10.0"}]},
//!   "fans": {"table": ".1.3.6.1.4.1.9.9.13.1.4.1.3", "label": "Fan"},
//!   "power": {"sensors": [{"name": "PSU1", "id": ".1.3.6.1.4.1.14988.1.1.3.15.0"}]},
//!   "memory": {"used": ".1.3.6.1.2.1.25.2.3.1.6.65536", "total": ".1.3.6.1.2.1.25.2.3.1.5.65536"},
//!   "cpu": {"table": ".1.3.6.1.2.1.25.3.3.1.2", "label": "cpu"},
//!   "uptime": {"id": ".1.3.6.1.2.1.1.3.0", "kind": "timeticks"}
//! }
//! ```
//!
//! For JSON-RPC devices the profile also carries the `request` to send, and
//! identifiers are JSON pointers into its result. A table written as
//! `/0/fanTraySlots#status` walks every element of the array and reads its
//! `status` field.
//!
//! Devices that judge their own temperatures can say so in the profile. An
//! overall state outside its `ok` list is critical, as is any sensor whose
//! alert flag is set, and limits the device reports per sensor are applied
//! on top of `--tempwarn` and `--tempcrit`:
//!
//! ```plain
//! "temperature_state": {"id": "/2/systemStatus", "ok": ["temperatureOk"]},
//! "temperature_alerts": {"table": "/2/tempSensors#inAlertState", "label": "Sensor"},
//! "temperature_limits": {
//!   "warn": {"table": "/2/tempSensors#overheatThreshold", "label": "Sensor"},
//!   "crit": {"table": "/2/tempSensors#criticalThreshold", "label": "Sensor"}
//! }
//! ```
//!
//! `--target` takes `temperature`, `fans`, `psu`, `memory`, `disk`, `cpu` or
//! `reboot`.
//!
//! # check-port-errors
//!
//! Needs `snmpwalk` from net-snmp, or a snapshot file, and a writable state
//! directory.
//!
//! ```plain
//! $ check-port-errors --help
//! check-port-errors (part of probe-plugins) 0.1.0
//! Check for new errors on a switch's ethernet ports
//!
//! USAGE:
//!     check-port-errors [FLAGS] [OPTIONS]
//!
//! FLAGS:
//!     -d, --debug      Print everything
//!     -h, --help       Prints help information
//!     -q, --quiet      Only print the status line
//!     -V, --version    Prints version information
//!     -v, --verbose    Print readings as they are taken
//!
//! OPTIONS:
//!     -c, --community <community>          [default: public]
//!     -H, --host <host>                    SNMP agent to query
//!         --ignore-port <ignore-port>...   Regex of interface names to leave out, may be repeated
//!     -p, --port <port>                    [default: 161]
//!         --read-timeout <read-timeout>    Seconds to wait for the device [default: 5]
//!         --snapshot <snapshot>            Read the interface tables from a JSON file instead
//!         --state-dir <state-dir>          Where to keep counters between runs [default: /var/tmp/probe-plugins]
//!         --state-ttl <state-ttl>          Seconds after which saved counters are too old to compare against
//!         --timeout <timeout>              Give up with UNKNOWN after this many seconds [default: 55]
//! ```
//!
//! The first run against a device only saves a baseline and exits UNKNOWN.
//! After that every run reports errors that appeared since the previous
//! one, for incoming and outgoing traffic separately. A counter that went
//! backwards (a reboot or a cleared counter) counts as no new errors.
//!
//! # check-rsnapshot
//!
//! Needs read access to the snapshot root and the rsnapshot log.
//!
//! ```plain
//! $ check-rsnapshot --help
//! check-rsnapshot (part of probe-plugins) 0.1.0
//! Check that rsnapshot backups are being taken and rotated
//!
//! Give retention periods lowest first, in the same order as rsnapshot.conf:
//!
//!     check-rsnapshot --snapshot-root /backups --retain daily=7 --retain weekly=4
//!
//! USAGE:
//!     check-rsnapshot [FLAGS] [OPTIONS] --retain <retain>... --snapshot-root <snapshot-root>
//!
//! FLAGS:
//!     -d, --debug                   Print everything
//!         --disable-dir-creation
//!         --disable-log
//!         --disable-minfiles
//!         --disable-minsize
//!         --disable-rotation
//!         --disable-timestamp
//!     -h, --help                    Prints help information
//!     -q, --quiet                   Only print the status line
//!     -V, --version                 Prints version information
//!     -v, --verbose                 Explain each check
//!
//! OPTIONS:
//!         --backup <backup>...                 Backup point as ALIAS=PATH inside each snapshot, may be repeated
//!         --logfile <logfile>
//!         --minfiles <minfiles>...             Fewest files per backup as <warn>,<crit>, or ALIAS=<warn>,<crit> for one
//!                                              backup
//!         --minsize <minsize>...               Smallest size per backup as <warn>,<crit> with k, m or g suffixes, or
//!                                              ALIAS=<warn>,<crit>
//!         --period <period>...                 Length of a retention period as NAME=SECONDS, may be repeated
//!         --retain <retain>...                 Retention period as NAME=COUNT, lowest first, may be repeated
//!         --snapshot-root <snapshot-root>
//!         --state-dir <state-dir>              Where to keep the first-run time between runs [default:
//!                                              /var/tmp/probe-plugins]
//!         --state-ttl <state-ttl>              Seconds the first-run time is kept without a run
//!         --timeout <timeout>                  Give up with UNKNOWN after this many seconds [default: 55]
//!         --timestamp-file <timestamp-file>... Name of a file holding the backup's unix time, or ALIAS=NAME for one
//!                                              backup
//! ```
//!
//! Periods named `hourly`, `daily`, `weekly` and `monthly` have known
//! lengths, anything else needs a `--period`. Checks that need a
//! backup point or a threshold are skipped when those are not given.
//!
//! Backups of very different sizes can get their own levels. The unscoped
//! value covers every other backup:
//!
//! ```plain
//! check-rsnapshot --snapshot-root /backups --retain daily=7 \
//!     --backup web=srv/web/ --backup db=var/lib/db/ \
//!     --minfiles 1000,100 --minfiles db=10,2
//! ```
//!
//! A file count or size that only reaches a level counts as being below it.
