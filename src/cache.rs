// =============================================================================
// Cache Store — last-known-good signal snapshots
// =============================================================================
//
// One JSON file per signal family under the cache directory. The cache is
// strictly best-effort: a failed write never aborts the caller, and a
// missing, unreadable, or corrupt record is indistinguishable from an empty
// cache. Writes go through a temp file and rename so a crash mid-write
// cannot leave a half-record behind.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;

pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read the cached record for `key`. Missing and corrupt records both
    /// come back as `None`.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(key, path = %path.display(), error = %e, "cache miss");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(record) => {
                debug!(key, "cache hit");
                Some(record)
            }
            Err(e) => {
                warn!(key, error = %e, "cache record corrupt, treating as empty");
                None
            }
        }
    }

    /// Write the record for `key`, replacing any previous record. Failures
    /// are logged and swallowed.
    pub fn write<T: Serialize>(&self, key: &str, record: &T) {
        let path = self.path_for(key);
        if let Err(e) = self.try_write(&path, record) {
            warn!(key, error = %e, "cache write failed, continuing without cache");
        }
    }

    fn try_write<T: Serialize>(&self, path: &Path, record: &T) -> Result<(), EngineError> {
        let persistence = |reason: String| EngineError::Persistence {
            what: path.display().to_string(),
            reason,
        };
        std::fs::create_dir_all(&self.dir).map_err(|e| persistence(format!("create dir: {e}")))?;
        let content =
            serde_json::to_string(record).map_err(|e| persistence(format!("serialise: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &content).map_err(|e| persistence(format!("write tmp: {e}")))?;
        std::fs::rename(&tmp, path).map_err(|e| persistence(format!("rename: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        value: f64,
        source: String,
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("bm20_cache_{tag}_{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = scratch_dir("roundtrip");
        let store = CacheStore::new(&dir);
        let record = Record {
            value: 1.23,
            source: "upbit".to_string(),
        };

        store.write("price_gap_last", &record);
        let back: Option<Record> = store.read("price_gap_last");
        assert_eq!(back, Some(record));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_record_reads_as_none() {
        let dir = scratch_dir("missing");
        let store = CacheStore::new(&dir);
        let back: Option<Record> = store.read("never_written");
        assert!(back.is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_record_reads_as_none() {
        let dir = scratch_dir("corrupt");
        let store = CacheStore::new(&dir);
        std::fs::write(dir.join("funding_last.json"), "{not json").unwrap();
        let back: Option<Record> = store.read("funding_last");
        assert!(back.is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn write_replaces_the_previous_record() {
        let dir = scratch_dir("replace");
        let store = CacheStore::new(&dir);
        store.write(
            "funding_last",
            &Record {
                value: 0.01,
                source: "binance".to_string(),
            },
        );
        store.write(
            "funding_last",
            &Record {
                value: 0.02,
                source: "bybit".to_string(),
            },
        );

        let back: Record = store.read("funding_last").unwrap();
        assert!((back.value - 0.02).abs() < 1e-10);
        assert_eq!(back.source, "bybit");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn no_tmp_file_left_behind_after_write() {
        let dir = scratch_dir("tmpfile");
        let store = CacheStore::new(&dir);
        store.write(
            "kimchi_last",
            &Record {
                value: 2.5,
                source: "upbit".to_string(),
            },
        );
        assert!(dir.join("kimchi_last.json").exists());
        assert!(!dir.join("kimchi_last.json.tmp").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
