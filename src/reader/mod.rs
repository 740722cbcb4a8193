//! Get raw values off a device
//!
//! The checks never talk to a device directly. They ask a `DeviceReader` for
//! identifiers (OIDs for SNMP, JSON pointers for JSON-RPC, plain keys for a
//! snapshot) that come out of a device profile, so nothing in the checks
//! knows about any particular vendor.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

mod jsonrpc;
mod snapshot;
mod snmp;

pub use self::jsonrpc::{JsonRpcReader, RpcRequest};
pub use self::snapshot::SnapshotReader;
pub use self::snmp::NetSnmpReader;

/// A single raw value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Flag(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Reading {
    /// The value as a float, if it is numeric
    ///
    /// Text that looks like a number (plenty of devices report gauges as
    /// strings) counts as numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Reading::Integer(i) => Some(i as f64),
            Reading::Real(f) => Some(f),
            Reading::Text(ref s) => s.trim().parse().ok(),
            Reading::Flag(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Reading::Integer(i) => Some(i),
            Reading::Real(f) if f.fract() == 0.0 => Some(f as i64),
            Reading::Text(ref s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Truthiness as alarm sensors report it
    pub fn as_flag(&self) -> bool {
        match *self {
            Reading::Flag(b) => b,
            Reading::Integer(i) => i != 0,
            Reading::Real(f) => f != 0.0,
            Reading::Text(ref s) => {
                let s = s.trim().to_lowercase();
                !(s.is_empty() || s == "0" || s == "false" || s == "no" || s == "off")
            }
        }
    }

    pub fn is_numeric(&self) -> bool {
        match *self {
            Reading::Integer(_) | Reading::Real(_) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Reading::Flag(b) => write!(f, "{}", b),
            Reading::Integer(i) => write!(f, "{}", i),
            Reading::Real(r) => write!(f, "{}", r),
            Reading::Text(ref s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReadError {
    /// The device answered but does not have this value
    #[error("{0} is not supported by the device")]
    NotSupported(String),
    /// The device did not answer
    #[error("device unreachable: {0}")]
    Unreachable(String),
    /// The device answered with something we could not understand
    #[error("could not parse device response: {0}")]
    Parse(String),
}

impl From<std::io::Error> for ReadError {
    fn from(e: std::io::Error) -> ReadError {
        ReadError::Unreachable(e.to_string())
    }
}

impl From<serde_json::Error> for ReadError {
    fn from(e: serde_json::Error) -> ReadError {
        ReadError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for ReadError {
    fn from(e: reqwest::Error) -> ReadError {
        if e.is_decode() {
            ReadError::Parse(e.to_string())
        } else {
            ReadError::Unreachable(e.to_string())
        }
    }
}

/// Something that can hand out readings by identifier
pub trait DeviceReader {
    /// Who we are talking to, used for logging and for delta store keys
    fn identity(&self) -> &str;

    /// Make sure the device can be reached at all
    ///
    /// Checks call this before anything else so that a dead device is one
    /// UNKNOWN line instead of one per subsystem.
    fn probe(&mut self) -> Result<(), ReadError> {
        Ok(())
    }

    fn read(&mut self, id: &str) -> Result<Reading, ReadError>;

    /// Every value below `id`, keyed by the part of the identifier after it
    fn walk(&mut self, id: &str) -> Result<BTreeMap<String, Reading>, ReadError>;
}

impl<'a, R: DeviceReader + ?Sized> DeviceReader for &'a mut R {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn probe(&mut self) -> Result<(), ReadError> {
        (**self).probe()
    }

    fn read(&mut self, id: &str) -> Result<Reading, ReadError> {
        (**self).read(id)
    }

    fn walk(&mut self, id: &str) -> Result<BTreeMap<String, Reading>, ReadError> {
        (**self).walk(id)
    }
}

impl<R: DeviceReader + ?Sized> DeviceReader for Box<R> {
    fn identity(&self) -> &str {
        (**self).identity()
    }

    fn probe(&mut self) -> Result<(), ReadError> {
        (**self).probe()
    }

    fn read(&mut self, id: &str) -> Result<Reading, ReadError> {
        (**self).read(id)
    }

    fn walk(&mut self, id: &str) -> Result<BTreeMap<String, Reading>, ReadError> {
        (**self).walk(id)
    }
}
