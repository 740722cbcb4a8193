//! Readings from a JSON document
//!
//! Useful for devices that are polled by something else and for tests.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;

use super::{DeviceReader, ReadError, Reading};

/// A flat JSON object of identifier to value
///
/// ```json
/// {"temp.1": 41, "temp.2": 44, "fan.1": "normal"}
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    identity: String,
    values: BTreeMap<String, Reading>,
}

impl SnapshotReader {
    pub fn new<S: Into<String>>(identity: S, values: BTreeMap<String, Reading>) -> SnapshotReader {
        SnapshotReader {
            identity: identity.into(),
            values,
        }
    }

    pub fn from_json<S: Into<String>>(identity: S, json: &str) -> Result<SnapshotReader, ReadError> {
        let doc: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let values = doc
            .into_iter()
            .filter_map(|(k, v)| to_reading(v).map(|r| (k, r)))
            .collect();
        Ok(SnapshotReader::new(identity, values))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<SnapshotReader, ReadError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        SnapshotReader::from_json(path.display().to_string(), &contents)
    }

    pub fn set<S: Into<String>>(&mut self, id: S, value: Reading) {
        self.values.insert(id.into(), value);
    }
}

/// Nulls are treated as missing, nested values as text
fn to_reading(value: Value) -> Option<Reading> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Reading::Flag(b)),
        Value::Number(n) => n
            .as_i64()
            .map(Reading::Integer)
            .or_else(|| n.as_f64().map(Reading::Real)),
        Value::String(s) => Some(Reading::Text(s)),
        other => Some(Reading::Text(other.to_string())),
    }
}

impl DeviceReader for SnapshotReader {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn read(&mut self, id: &str) -> Result<Reading, ReadError> {
        self.values
            .get(id)
            .cloned()
            .ok_or_else(|| ReadError::NotSupported(id.to_owned()))
    }

    fn walk(&mut self, id: &str) -> Result<BTreeMap<String, Reading>, ReadError> {
        let prefix = format!("{}.", id);
        let found: BTreeMap<String, Reading> = self
            .values
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, v)| (k[prefix.len()..].to_owned(), v.clone()))
            .collect();
        if found.is_empty() {
            Err(ReadError::NotSupported(id.to_owned()))
        } else {
            Ok(found)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reader() -> SnapshotReader {
        SnapshotReader::from_json(
            "switch1",
            r#"{
                "temp.1": 41,
                "temp.2": 44.5,
                "tempx": 1,
                "fan.1": "normal",
                "alarm": false,
                "missing": null
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn reads_single_values() {
        let mut r = reader();
        assert_eq!(r.identity(), "switch1");
        assert_eq!(r.read("temp.1").unwrap(), Reading::Integer(41));
        assert_eq!(r.read("fan.1").unwrap(), Reading::Text("normal".into()));
        assert_eq!(r.read("alarm").unwrap(), Reading::Flag(false));
        match r.read("missing") {
            Err(ReadError::NotSupported(_)) => {}
            other => panic!("expected NotSupported, got {:?}", other),
        }
    }

    #[test]
    fn walks_only_below_prefix() {
        let mut r = reader();
        let temps = r.walk("temp").unwrap();
        assert_eq!(temps.len(), 2);
        assert_eq!(temps["1"], Reading::Integer(41));
        assert_eq!(temps["2"], Reading::Real(44.5));
        assert!(r.walk("psu").is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, r#"{"cpu.1": 12}"#).unwrap();
        let mut r = SnapshotReader::from_file(&path).unwrap();
        assert_eq!(r.read("cpu.1").unwrap(), Reading::Integer(12));
        assert!(SnapshotReader::from_file(dir.path().join("nope.json")).is_err());
    }
}
