//! Bound the total run time of a check
//!
//! Nagios kills plugins that take too long and reports that as a generic
//! failure. We would rather say UNKNOWN ourselves, with a reason.
//!
//! External tools are run through [`output_within`] so that neither a slow
//! tool nor an expired budget leaves a child process behind.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::process::{self, Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::Status;

const POLL: Duration = Duration::from_millis(10);

/// The right to print the plugin output, which only one side gets
pub(crate) struct Claim(AtomicBool);

impl Claim {
    pub(crate) const fn new() -> Claim {
        Claim(AtomicBool::new(false))
    }

    pub(crate) fn take(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// The line to print when the budget runs out, unless a report got
    /// there first
    pub(crate) fn expire(&self, budget: Duration) -> Option<String> {
        if self.take() {
            Some(format!(
                "UNKNOWN - check timed out after {}s",
                budget.as_secs()
            ))
        } else {
            None
        }
    }
}

static OUTPUT: Claim = Claim::new();

/// Running children by pid
static CHILDREN: Mutex<BTreeMap<u32, Child>> = Mutex::new(BTreeMap::new());

fn children() -> MutexGuard<'static, BTreeMap<u32, Child>> {
    CHILDREN.lock().unwrap_or_else(PoisonError::into_inner)
}

fn kill_children() {
    let running = std::mem::take(&mut *children());
    for (pid, mut child) in running {
        debug!("killing {}", pid);
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// Start the timer
///
/// If `disarm` has not been called by the time `budget` elapses the process
/// kills whatever tool it is running, prints an UNKNOWN line and exits.
pub fn arm(budget: Duration) {
    thread::spawn(move || {
        thread::sleep(budget);
        if let Some(line) = OUTPUT.expire(budget) {
            kill_children();
            error!("execution budget of {}s exhausted", budget.as_secs());
            println!("{}", line);
            process::exit(Status::Unknown.code());
        }
    });
}

/// Claim the right to print the plugin output
///
/// Returns false if the watchdog got there first.
pub fn disarm() -> bool {
    OUTPUT.take()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Run a command to completion and collect its output
///
/// The child is killed once `limit` has passed, or when the execution
/// budget runs out, whichever comes first.
pub fn output_within(command: &mut Command, limit: Duration) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let pid = child.id();
    children().insert(pid, child);

    let start = Instant::now();
    let status = loop {
        let polled = match children().get_mut(&pid) {
            Some(child) => child.try_wait(),
            None => Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "killed when the execution budget ran out",
            )),
        };
        match polled {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= limit => {
                if let Some(mut child) = children().remove(&pid) {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer within {}s", limit.as_secs()),
                ));
            }
            Ok(None) => thread::sleep(POLL),
            Err(e) => {
                children().remove(&pid);
                return Err(e);
            }
        }
    };
    children().remove(&pid);
    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expiry_prints_once() {
        let claim = Claim::new();
        assert_eq!(
            claim.expire(Duration::from_secs(2)),
            Some("UNKNOWN - check timed out after 2s".to_owned())
        );
        // the report that arrives late must stay quiet
        assert!(!claim.take());
        assert_eq!(claim.expire(Duration::from_secs(2)), None);
    }

    #[test]
    fn report_first_silences_expiry() {
        let claim = Claim::new();
        assert!(claim.take());
        assert_eq!(claim.expire(Duration::from_secs(55)), None);
    }

    #[test]
    fn collects_output() {
        let out = output_within(
            Command::new("sh").args(&["-c", "echo up; echo warn >&2"]),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout, b"up\n");
        assert_eq!(out.stderr, b"warn\n");
    }

    #[test]
    fn slow_tools_are_killed() {
        let start = Instant::now();
        let err = output_within(
            Command::new("sleep").arg("30"),
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn big_output_does_not_block() {
        let out = output_within(
            Command::new("sh").args(&["-c", "head -c 1000000 /dev/zero"]),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(out.stdout.len(), 1_000_000);
    }
}
