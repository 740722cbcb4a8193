//! Persist samples between runs
//!
//! Some checks only make sense relative to the previous run: interface error
//! counters only ever go up, so what matters is how much they went up since
//! we last looked. Each run loads the previous sample for its key, saves the
//! current one (whether or not it found anything), and then compares.
//!
//! Records expire. A record older than its time to live is treated exactly
//! like a missing one, so a check that has not run for a while starts over
//! from a fresh baseline instead of reporting errors accumulated over days.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Counter id to counter value
pub type Sample = BTreeMap<String, i64>;

/// A sample as it was saved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub key: String,
    pub values: Sample,
    pub captured_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DeltaRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds between this record and `now`
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.captured_at).num_seconds()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store unavailable at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not encode record for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for delta records
///
/// Writes are last-writer-wins per key. Two overlapping runs for the same key
/// will each compare against whatever was there when they loaded.
pub trait DeltaStore {
    /// The record for `key` unless it is missing or expired at `now`
    fn load_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<DeltaRecord>, StoreError>;

    /// Overwrite the record for `key`, refreshing its expiry
    fn save(
        &self,
        key: &str,
        values: &Sample,
        timestamp: DateTime<Utc>,
    ) -> Result<DeltaRecord, StoreError>;

    fn load(&self, key: &str) -> Result<Option<DeltaRecord>, StoreError> {
        self.load_at(key, Utc::now())
    }
}

/// How much each counter went up
///
/// Only counters present in both samples are compared. Counters that went
/// down or stayed put are dropped: a reset or wrap between samples is
/// treated as "no new errors" rather than guessed at.
pub fn diff(current: &Sample, previous: &Sample) -> Sample {
    current
        .iter()
        .filter_map(|(id, now)| {
            previous
                .get(id)
                .map(|before| (id, now - before))
                .filter(|&(_, delta)| delta > 0)
                .map(|(id, delta)| (id.clone(), delta))
        })
        .collect()
}

/// A stable, filesystem-safe key for a metric family on a target
pub fn store_key(family: &str, identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    format!("{}-{}", family, &hex::encode(digest)[..32])
}

fn build_record(key: &str, values: &Sample, timestamp: DateTime<Utc>, ttl: Duration) -> DeltaRecord {
    DeltaRecord {
        key: key.to_owned(),
        values: values.clone(),
        captured_at: timestamp,
        expires_at: timestamp + ttl,
    }
}

/// One JSON file per key in a state directory
///
/// Records are written to a temporary file in the same directory and renamed
/// into place, so a reader never sees half a record.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    ttl: Duration,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(dir: P, ttl: Duration) -> FileStore {
        FileStore {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
        move |source| StoreError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

impl DeltaStore for FileStore {
    fn load_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<DeltaRecord>, StoreError> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no record at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(Self::io_err(&path)(e)),
        };
        let record: DeltaRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!("ignoring unreadable record {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        if record.is_expired(now) {
            debug!("record {} expired at {}", key, record.expires_at);
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn save(
        &self,
        key: &str,
        values: &Sample,
        timestamp: DateTime<Utc>,
    ) -> Result<DeltaRecord, StoreError> {
        let record = build_record(key, values, timestamp, self.ttl);
        let encoded = serde_json::to_vec(&record).map_err(|source| StoreError::Encode {
            key: key.to_owned(),
            source,
        })?;
        fs::create_dir_all(&self.dir).map_err(Self::io_err(&self.dir))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(Self::io_err(&self.dir))?;
        tmp.write_all(&encoded).map_err(Self::io_err(tmp.path()))?;
        let path = self.path_for(key);
        tmp.persist(&path)
            .map_err(|e| Self::io_err(&path)(e.error))?;
        debug!("saved {} counters to {}", values.len(), path.display());
        Ok(record)
    }
}

/// Records that live as long as the process
///
/// Used by tests and by dry runs that should not touch the state directory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<String, DeltaRecord>>,
    ttl: Duration,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> MemoryStore {
        MemoryStore {
            records: RefCell::new(HashMap::new()),
            ttl,
        }
    }

    /// Every record, expired or not
    pub fn raw(&self, key: &str) -> Option<DeltaRecord> {
        self.records.borrow().get(key).cloned()
    }
}

impl DeltaStore for MemoryStore {
    fn load_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<DeltaRecord>, StoreError> {
        Ok(self
            .records
            .borrow()
            .get(key)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    fn save(
        &self,
        key: &str,
        values: &Sample,
        timestamp: DateTime<Utc>,
    ) -> Result<DeltaRecord, StoreError> {
        let record = build_record(key, values, timestamp, self.ttl);
        self.records
            .borrow_mut()
            .insert(key.to_owned(), record.clone());
        Ok(record)
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use chrono::TimeZone;

    /// A store that cannot be reached at all
    pub(crate) struct BrokenStore;

    impl DeltaStore for BrokenStore {
        fn load_at(&self, _: &str, _: DateTime<Utc>) -> Result<Option<DeltaRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn save(&self, _: &str, _: &Sample, _: DateTime<Utc>) -> Result<DeltaRecord, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    pub(crate) fn sample(pairs: &[(&str, i64)]) -> Sample {
        pairs.iter().map(|&(k, v)| (k.to_owned(), v)).collect()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn diff_keeps_only_positive_deltas() {
        let current = sample(&[("a", 15), ("b", 5)]);
        let previous = sample(&[("a", 10), ("b", 8)]);
        assert_eq!(diff(&current, &previous), sample(&[("a", 5)]));
    }

    #[test]
    fn diff_ignores_new_and_unchanged_counters() {
        let current = sample(&[("a", 10), ("new", 100)]);
        let previous = sample(&[("a", 10), ("gone", 3)]);
        assert!(diff(&current, &previous).is_empty());
    }

    #[test]
    fn counter_reset_is_not_an_error() {
        let current = sample(&[("in.1", 2)]);
        let previous = sample(&[("in.1", 4_000_000_000)]);
        assert!(diff(&current, &previous).is_empty());
    }

    #[test]
    fn keys_are_stable_and_distinct() {
        let a = store_key("port-errors", "core1.example.com");
        assert_eq!(a, store_key("port-errors", "core1.example.com"));
        assert_ne!(a, store_key("port-errors", "core2.example.com"));
        assert_ne!(a, store_key("other", "core1.example.com"));
        assert!(a.starts_with("port-errors-"));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn memory_round_trip_respects_ttl() {
        let store = MemoryStore::new(Duration::minutes(15));
        store.save("k", &sample(&[("a", 10)]), t0()).unwrap();

        let fresh = store.load_at("k", t0() + Duration::minutes(5)).unwrap();
        assert_eq!(fresh.unwrap().values, sample(&[("a", 10)]));

        let stale = store.load_at("k", t0() + Duration::minutes(16)).unwrap();
        assert!(stale.is_none());
    }

    #[test]
    fn file_round_trip_respects_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"), Duration::minutes(15));
        assert!(store.load_at("k", t0()).unwrap().is_none());

        store.save("k", &sample(&[("a", 10)]), t0()).unwrap();
        let fresh = store.load_at("k", t0() + Duration::seconds(1)).unwrap().unwrap();
        assert_eq!(fresh.values, sample(&[("a", 10)]));
        assert_eq!(fresh.captured_at, t0());
        assert_eq!(fresh.age_secs(t0() + Duration::seconds(1)), 1);

        assert!(store
            .load_at("k", t0() + Duration::minutes(20))
            .unwrap()
            .is_none());
    }

    #[test]
    fn file_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::minutes(15));
        store.save("k", &sample(&[("a", 1)]), t0()).unwrap();
        store
            .save("k", &sample(&[("a", 2)]), t0() + Duration::minutes(5))
            .unwrap();
        let record = store
            .load_at("k", t0() + Duration::minutes(6))
            .unwrap()
            .unwrap();
        assert_eq!(record.values, sample(&[("a", 2)]));
    }

    #[test]
    fn corrupt_records_are_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), Duration::minutes(15));
        fs::write(dir.path().join("k.json"), "{ not json").unwrap();
        assert!(store.load_at("k", t0()).unwrap().is_none());
    }

    #[test]
    fn unwritable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let store = FileStore::new(blocker.join("state"), Duration::minutes(15));
        assert!(store.save("k", &sample(&[("a", 1)]), t0()).is_err());
    }
}
