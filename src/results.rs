//! Collect findings from subsystem checks and turn them into plugin output
//!
//! A run records at most one `Finding` per subsystem. The overall status is
//! only ever changed through `Status::combine`, so a later check that is fine
//! can never hide an earlier problem.

use std::thread;

use itertools::Itertools;
use tracing::debug;

use crate::watchdog;
use crate::Status;

/// One subsystem's verdict
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub subsystem: String,
    pub status: Status,
    pub message: String,
}

/// The accumulator for a single run
#[derive(Debug, Default)]
pub struct CheckResults {
    findings: Vec<Finding>,
    skipped: Vec<String>,
    overall: Status,
}

impl CheckResults {
    pub fn new() -> CheckResults {
        CheckResults::default()
    }

    /// Add a finding and fold its status into the overall status
    pub fn record<S, M>(&mut self, subsystem: S, status: Status, message: M)
    where
        S: Into<String>,
        M: Into<String>,
    {
        let finding = Finding {
            subsystem: subsystem.into(),
            status,
            message: message.into(),
        };
        debug!(
            "{} [{}]: {}",
            finding.status, finding.subsystem, finding.message
        );
        self.overall = self.overall.combine(status);
        self.findings.push(finding);
    }

    /// Note that a subsystem was disabled by configuration
    ///
    /// Nothing is recorded and the overall status is untouched.
    pub fn skip<S: Into<String>>(&mut self, subsystem: S) {
        let subsystem = subsystem.into();
        debug!("skipping {} check", subsystem);
        self.skipped.push(subsystem);
    }

    pub fn was_skipped(&self, subsystem: &str) -> bool {
        self.skipped.iter().any(|s| s == subsystem)
    }

    pub fn overall(&self) -> Status {
        self.overall
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn finding(&self, subsystem: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.subsystem == subsystem)
    }

    /// Build the report for everything recorded so far
    ///
    /// This does not consume or modify anything, calling it twice gives the
    /// same report.
    pub fn finalize(&self) -> Report {
        let (problems, oks): (Vec<&Finding>, Vec<&Finding>) =
            self.findings.iter().partition(|f| f.status > Status::Ok);
        Report {
            overall: self.overall,
            ok_messages: oks.into_iter().map(|f| f.message.clone()).collect(),
            problem_messages: problems.into_iter().map(|f| f.message.clone()).collect(),
            skipped: self.skipped.clone(),
        }
    }
}

/// Per-item verdicts for a subsystem that looks at several things
///
/// Fans, power supplies, interfaces and backups are checked one at a time,
/// but the subsystem only gets one finding.
#[derive(Debug, Default)]
pub struct Tally {
    worst: Status,
    problems: Vec<String>,
    details: Vec<String>,
}

impl Tally {
    pub fn new() -> Tally {
        Tally::default()
    }

    /// Record a bad item
    pub fn flag<M: Into<String>>(&mut self, status: Status, message: M) {
        self.worst = self.worst.combine(status);
        if status > Status::Ok {
            self.problems.push(message.into());
        }
    }

    /// Record information for the OK summary
    pub fn note<M: Into<String>>(&mut self, detail: M) {
        self.details.push(detail.into());
    }

    /// Record this tally as a single finding
    ///
    /// Problems are listed if there are any, otherwise the details are
    /// summarised after `ok_prefix`.
    pub fn record_into(self, results: &mut CheckResults, subsystem: &str, ok_prefix: &str) {
        let message = if self.worst > Status::Ok {
            self.problems.join(" ")
        } else if self.details.is_empty() {
            ok_prefix.trim_end_matches(':').to_owned() + "."
        } else {
            format!("{} {}.", ok_prefix, self.details.join(" "))
        };
        results.record(subsystem, self.worst, message);
    }
}

/// What gets printed at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub overall: Status,
    pub ok_messages: Vec<String>,
    pub problem_messages: Vec<String>,
    pub skipped: Vec<String>,
}

impl Report {
    /// A report that consists of a single finding
    ///
    /// Used when a run has to stop before any subsystem is checked.
    pub fn single<M: Into<String>>(status: Status, message: M) -> Report {
        let mut results = CheckResults::new();
        results.record("run", status, message);
        results.finalize()
    }

    pub fn render(&self) -> (String, i32) {
        render(self)
    }

    /// Print the one line of plugin output and exit with its code
    #[cfg_attr(test, allow(dead_code))]
    pub fn print_and_exit(&self) -> ! {
        let (text, _) = self.render();
        if !watchdog::disarm() {
            // the watchdog is already printing its own line
            loop {
                thread::park();
            }
        }
        println!("{}", text);
        self.overall.exit()
    }
}

/// The plugin text and exit code for a report
///
/// An OK report lists everything that was checked, anything else lists only
/// the problems.
pub fn render(report: &Report) -> (String, i32) {
    let text = if report.overall == Status::Ok {
        format!("OK - {}", report.ok_messages.iter().join(" "))
    } else {
        report.problem_messages.iter().join(" ")
    };
    (text, report.overall.code())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Status::*;

    #[test]
    fn overall_is_max_regardless_of_order() {
        let sequences = [
            vec![Ok, Critical, Warning],
            vec![Critical, Ok, Warning],
            vec![Warning, Warning, Critical],
            vec![Unknown, Ok],
            vec![Ok, Ok],
        ];
        for seq in &sequences {
            let mut results = CheckResults::new();
            for (i, status) in seq.iter().enumerate() {
                results.record(format!("sub{}", i), *status, "msg");
            }
            assert_eq!(results.overall(), *seq.iter().max().unwrap());
        }
    }

    #[test]
    fn later_ok_does_not_downgrade() {
        let mut results = CheckResults::new();
        results.record("fans", Critical, "Fan 1 is not operational.");
        results.record("memory", Ok, "Memory OK.");
        assert_eq!(results.overall(), Critical);
    }

    #[test]
    fn skip_records_nothing() {
        let mut results = CheckResults::new();
        results.skip("temperature");
        assert!(results.was_skipped("temperature"));
        assert!(results.findings().is_empty());
        assert_eq!(results.overall(), Ok);
        assert_eq!(results.finalize().skipped, vec!["temperature".to_owned()]);
    }

    #[test]
    fn finalize_is_idempotent_and_ordered() {
        let mut results = CheckResults::new();
        results.record("temperature", Ok, "Temp: 40'C.");
        results.record("fans", Critical, "Fan 1 is not operational.");
        results.record("memory", Ok, "Memory OK.");
        results.record("cpu", Warning, "CPU usage at 90%.");
        let first = results.finalize();
        let second = results.finalize();
        assert_eq!(first, second);
        assert_eq!(first.ok_messages, vec!["Temp: 40'C.", "Memory OK."]);
        assert_eq!(
            first.problem_messages,
            vec!["Fan 1 is not operational.", "CPU usage at 90%."]
        );
    }

    #[test]
    fn render_ok_lists_everything() {
        let mut results = CheckResults::new();
        results.record("temperature", Ok, "Temp: 40'C.");
        results.record("memory", Ok, "Memory OK.");
        let (text, code) = results.finalize().render();
        assert_eq!(text, "OK - Temp: 40'C. Memory OK.");
        assert_eq!(code, 0);
    }

    #[test]
    fn render_problems_only() {
        let mut results = CheckResults::new();
        results.record("temperature", Ok, "Temp: 40'C.");
        results.record("psu", Warning, "PSU 2 is not present.");
        results.record("fans", Unknown, "Fan states unknown.");
        let (text, code) = render(&results.finalize());
        assert_eq!(text, "PSU 2 is not present. Fan states unknown.");
        assert_eq!(code, 3);
    }

    #[test]
    fn tally_summarises_items() {
        let mut results = CheckResults::new();
        let mut fans = Tally::new();
        fans.note("[1 - OK (3000 RPM)]");
        fans.note("[2 - OK (3100 RPM)]");
        fans.record_into(&mut results, "fans", "Fans:");
        let mut psus = Tally::new();
        psus.note("[1 - OK]");
        psus.flag(Critical, "PSU 2 is not OK.");
        psus.flag(Warning, "PSU 3 is not present.");
        psus.record_into(&mut results, "psu", "PSUs:");

        assert_eq!(
            results.finding("fans").unwrap().message,
            "Fans: [1 - OK (3000 RPM)] [2 - OK (3100 RPM)]."
        );
        let psu = results.finding("psu").unwrap();
        assert_eq!(psu.status, Critical);
        assert_eq!(psu.message, "PSU 2 is not OK. PSU 3 is not present.");
    }
}
