// =============================================================================
// Base Value — the index rebasing anchor
// =============================================================================
//
// Established exactly once: the first run persists {base_date, base_value}
// and every later run reads it back unchanged, which is what keeps index
// levels comparable across restarts. Nothing in the engine ever rewrites
// this file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// The persisted rebasing anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseValue {
    pub base_date: NaiveDate,
    pub base_value: f64,
}

pub struct BaseValueStore {
    path: PathBuf,
}

impl BaseValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted base, or establish it from today's basket value.
    ///
    /// A present-but-unreadable file is a hard error: re-establishing the
    /// base would silently rebase the whole series. A failed first write is
    /// only a warning; the run continues on the in-memory base and the next
    /// run gets another chance to persist.
    pub fn load_or_init(&self, today: NaiveDate, today_value: f64) -> Result<BaseValue> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("failed to read base file {}", self.path.display()))?;
            let base: BaseValue = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse base file {}", self.path.display()))?;
            debug!(base_value = base.base_value, base_date = %base.base_date, "base value loaded");
            return Ok(base);
        }

        let base = BaseValue {
            base_date: today,
            base_value: today_value,
        };
        match self.persist(&base) {
            Ok(()) => {
                info!(base_value = base.base_value, base_date = %today, "base value established")
            }
            Err(e) => {
                warn!(error = %e, "failed to persist base value, continuing with in-memory base")
            }
        }
        Ok(base)
    }

    fn persist(&self, base: &BaseValue) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create base dir {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(base).context("failed to serialise base")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &content)
            .with_context(|| format!("failed to write base tmp {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move base into place {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scratch_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir()
            .join(format!("bm20_base_{tag}_{nanos}"))
            .join("bm20_base.json")
    }

    #[test]
    fn first_run_establishes_the_base() {
        let path = scratch_path("establish");
        let store = BaseValueStore::new(&path);

        let base = store.load_or_init(date(2026, 8, 23), 76.31).unwrap();
        assert_eq!(base.base_date, date(2026, 8, 23));
        assert!((base.base_value - 76.31).abs() < 1e-10);
        assert!(path.exists());

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn later_runs_read_the_base_back_unchanged() {
        let path = scratch_path("stable");
        let store = BaseValueStore::new(&path);

        let first = store.load_or_init(date(2026, 8, 1), 76.31).unwrap();
        // A later day with a very different basket value must not move it.
        let second = store.load_or_init(date(2026, 8, 23), 99.99).unwrap();
        assert_eq!(second, first);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn corrupt_base_file_is_a_hard_error() {
        let path = scratch_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{broken").unwrap();

        let store = BaseValueStore::new(&path);
        assert!(store.load_or_init(date(2026, 8, 23), 76.31).is_err());

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
