//! Warn/critical threshold comparisons
//!
//! Every check family compares readings against a pair of levels. Most
//! families consider higher values to be worse (temperature, memory, cpu),
//! some consider lower values to be worse (file counts, snapshot sizes).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::units::parse_size;
use crate::Status;

/// Which side of a threshold indicates degradation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsWorse,
    LowerIsWorse,
}

/// A pair of levels, warn first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub warn: f64,
    pub crit: f64,
}

/// Problems with user-supplied configuration
///
/// These are fatal for a run: a check that hits one prints a single UNKNOWN
/// line and exits without checking anything.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("warning threshold {warn} is worse than critical threshold {crit} for {name}")]
    InvertedThreshold { name: String, warn: f64, crit: f64 },
    #[error("expected <warn>,<crit> but got '{0}'")]
    MalformedPair(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("expected NAME=VALUE but got '{0}'")]
    MalformedAssignment(String),
    #[error("{0}")]
    Invalid(String),
}

impl Threshold {
    pub fn new(warn: f64, crit: f64) -> Threshold {
        Threshold { warn, crit }
    }

    /// Check that warn and crit are on the correct side of each other
    ///
    /// `evaluate` does not do this itself: an inverted pair there just means
    /// that the warning level is unreachable. Probes call this while
    /// loading their configuration instead.
    pub fn validated(self, name: &str, direction: Direction) -> Result<Threshold, ConfigError> {
        let ordered = match direction {
            Direction::HigherIsWorse => self.crit >= self.warn,
            Direction::LowerIsWorse => self.crit <= self.warn,
        };
        if ordered && !self.warn.is_nan() && !self.crit.is_nan() {
            Ok(self)
        } else {
            Err(ConfigError::InvertedThreshold {
                name: name.to_owned(),
                warn: self.warn,
                crit: self.crit,
            })
        }
    }

    /// Parse a `warn,crit` pair of byte sizes like `10G,1G`
    pub fn parse_sizes(s: &str) -> Result<Threshold, ConfigError> {
        let (warn, crit) = split_pair(s)?;
        Ok(Threshold {
            warn: parse_size(warn)? as f64,
            crit: parse_size(crit)? as f64,
        })
    }
}

/// Compare a value against a threshold
///
/// Reaching a level counts, in either direction. The critical level is
/// checked first, so a value that is equal to both levels is critical.
pub fn evaluate(value: f64, threshold: Threshold, direction: Direction) -> Status {
    match direction {
        Direction::HigherIsWorse => {
            if value >= threshold.crit {
                Status::Critical
            } else if value >= threshold.warn {
                Status::Warning
            } else {
                Status::Ok
            }
        }
        Direction::LowerIsWorse => {
            if value <= threshold.crit {
                Status::Critical
            } else if value <= threshold.warn {
                Status::Warning
            } else {
                Status::Ok
            }
        }
    }
}

fn split_pair(s: &str) -> Result<(&str, &str), ConfigError> {
    let mut parts = s.split(',').map(str::trim);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(warn), Some(crit), None) if !warn.is_empty() && !crit.is_empty() => Ok((warn, crit)),
        _ => Err(ConfigError::MalformedPair(s.to_owned())),
    }
}

impl FromStr for Threshold {
    type Err = ConfigError;

    /// Parse `warn,crit`, e.g. `85,95`
    fn from_str(s: &str) -> Result<Threshold, ConfigError> {
        let (warn, crit) = split_pair(s)?;
        let num = |v: &str| {
            v.parse::<f64>()
                .map_err(|_| ConfigError::InvalidNumber(v.to_owned()))
        };
        Ok(Threshold {
            warn: num(warn)?,
            crit: num(crit)?,
        })
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.warn, self.crit)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Status::*;

    #[test]
    fn higher_is_worse_table() {
        let t = Threshold::new(70.0, 90.0);
        let got: Vec<Status> = [69.0, 70.0, 89.0, 90.0, 95.0]
            .iter()
            .map(|v| evaluate(*v, t, Direction::HigherIsWorse))
            .collect();
        assert_eq!(got, vec![Ok, Warning, Warning, Critical, Critical]);
    }

    #[test]
    fn lower_is_worse_table() {
        let t = Threshold::new(2.0, 1.0);
        let got: Vec<Status> = [3.0, 2.0, 1.0, 0.0]
            .iter()
            .map(|v| evaluate(*v, t, Direction::LowerIsWorse))
            .collect();
        assert_eq!(got, vec![Ok, Warning, Critical, Critical]);
    }

    #[test]
    fn ties_are_critical() {
        let t = Threshold::new(5.0, 5.0);
        assert_eq!(evaluate(5.0, t, Direction::HigherIsWorse), Critical);
        assert_eq!(evaluate(4.0, t, Direction::LowerIsWorse), Critical);
    }

    #[test]
    fn lower_is_worse_ties_are_critical() {
        let t = Threshold::new(5.0, 5.0);
        assert_eq!(evaluate(5.0, t, Direction::LowerIsWorse), Critical);
        assert_eq!(evaluate(6.0, t, Direction::LowerIsWorse), Ok);
        let t = Threshold::new(5.0, 3.0);
        assert_eq!(evaluate(5.0, t, Direction::LowerIsWorse), Warning);
        assert_eq!(evaluate(3.0, t, Direction::LowerIsWorse), Critical);
    }

    #[test]
    fn inverted_thresholds_are_not_rejected_by_evaluate() {
        // warn is unreachable, but nothing panics
        let t = Threshold::new(90.0, 70.0);
        assert_eq!(evaluate(80.0, t, Direction::HigherIsWorse), Critical);
        assert_eq!(evaluate(60.0, t, Direction::HigherIsWorse), Ok);
    }

    #[test]
    fn validation_catches_inverted_pairs() {
        assert!(Threshold::new(80.0, 90.0)
            .validated("mem", Direction::HigherIsWorse)
            .is_ok());
        assert_eq!(
            Threshold::new(90.0, 80.0).validated("mem", Direction::HigherIsWorse),
            Err(ConfigError::InvertedThreshold {
                name: "mem".into(),
                warn: 90.0,
                crit: 80.0
            })
        );
        assert!(Threshold::new(100.0, 10.0)
            .validated("minfiles", Direction::LowerIsWorse)
            .is_ok());
        assert!(Threshold::new(10.0, 100.0)
            .validated("minfiles", Direction::LowerIsWorse)
            .is_err());
    }

    #[test]
    fn parses_pairs() {
        assert_eq!("85,95".parse::<Threshold>().unwrap(), Threshold::new(85.0, 95.0));
        assert_eq!(" 1.5 , 2".parse::<Threshold>().unwrap(), Threshold::new(1.5, 2.0));
        assert!("85".parse::<Threshold>().is_err());
        assert!("85,95,99".parse::<Threshold>().is_err());
        assert!("a,b".parse::<Threshold>().is_err());
    }

    #[test]
    fn parses_size_pairs() {
        assert_eq!(
            Threshold::parse_sizes("2k,1k").unwrap(),
            Threshold::new(2048.0, 1024.0)
        );
    }
}
