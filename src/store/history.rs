// =============================================================================
// Index History — one level per calendar date, kept forever
// =============================================================================
//
// A date-ordered JSON array with upsert-by-date semantics: re-running a day
// replaces that day's level and leaves everything else alone, so the series
// never grows duplicate dates no matter how often a day is re-run. Points
// are never deleted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One recorded index level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub level: f64,
}

/// Date-ordered index series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    points: Vec<HistoryPoint>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Insert `point`, replacing any existing point on the same date and
    /// keeping the series date-ordered.
    pub fn upsert(&mut self, point: HistoryPoint) {
        self.points.retain(|p| p.date != point.date);
        let idx = self.points.partition_point(|p| p.date < point.date);
        self.points.insert(idx, point);
    }

    /// Latest level recorded on or before `date`.
    pub fn level_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .iter()
            .rev()
            .find(|p| p.date <= date)
            .map(|p| p.level)
    }

    /// The most recent point.
    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }
}

/// Durable JSON storage for [`History`].
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the series. A missing file is a normal first run and loads as
    /// empty; an unreadable or corrupt file is a hard error, since starting
    /// over from empty would silently truncate the series on the next save.
    pub fn load(&self) -> Result<History> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no history file yet, starting empty");
            return Ok(History::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read history file {}", self.path.display()))?;
        let mut history: History = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse history file {}", self.path.display()))?;
        // Tolerate hand-edited files arriving out of order.
        history.points.sort_by_key(|p| p.date);
        debug!(points = history.len(), "history loaded");
        Ok(history)
    }

    /// Persist the series through a temp file and rename.
    pub fn save(&self, history: &History) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create history dir {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(history).context("failed to serialise history")?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &content)
            .with_context(|| format!("failed to write history tmp {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move history into place {}", self.path.display()))?;
        debug!(points = history.len(), path = %self.path.display(), "history saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn point(y: i32, m: u32, d: u32, level: f64) -> HistoryPoint {
        HistoryPoint {
            date: date(y, m, d),
            level,
        }
    }

    fn scratch_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("bm20_history_{tag}_{nanos}.json"))
    }

    #[test]
    fn upsert_keeps_points_date_ordered() {
        let mut history = History::new();
        history.upsert(point(2026, 8, 3, 101.0));
        history.upsert(point(2026, 8, 1, 100.0));
        history.upsert(point(2026, 8, 2, 99.5));

        // The serialized array is the series, so order shows up there.
        let json = serde_json::to_string(&history).unwrap();
        let first = json.find("2026-08-01").unwrap();
        let second = json.find("2026-08-02").unwrap();
        let third = json.find("2026-08-03").unwrap();
        assert!(first < second && second < third);
        assert_eq!(history.latest().unwrap().date, date(2026, 8, 3));
    }

    #[test]
    fn upsert_same_date_replaces_in_place() {
        let mut history = History::new();
        history.upsert(point(2026, 8, 1, 100.0));
        history.upsert(point(2026, 8, 2, 101.0));
        history.upsert(point(2026, 8, 2, 102.5));

        assert_eq!(history.len(), 2);
        assert!((history.latest().unwrap().level - 102.5).abs() < 1e-10);
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut history = History::new();
        history.upsert(point(2026, 8, 1, 100.0));
        history.upsert(point(2026, 8, 2, 101.0));
        let before = history.clone();

        history.upsert(point(2026, 8, 2, 101.0));
        assert_eq!(history, before);
    }

    #[test]
    fn level_on_or_before_picks_the_latest_eligible_point() {
        let mut history = History::new();
        history.upsert(point(2026, 8, 1, 100.0));
        history.upsert(point(2026, 8, 5, 104.0));
        history.upsert(point(2026, 8, 10, 98.0));

        // Exact hit.
        assert!((history.level_on_or_before(date(2026, 8, 5)).unwrap() - 104.0).abs() < 1e-10);
        // Gap: falls back to the closest earlier point.
        assert!((history.level_on_or_before(date(2026, 8, 8)).unwrap() - 104.0).abs() < 1e-10);
        // Before the series started.
        assert!(history.level_on_or_before(date(2026, 7, 31)).is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = scratch_path("roundtrip");
        let store = HistoryStore::new(&path);
        let mut history = History::new();
        history.upsert(point(2026, 8, 1, 100.0));
        history.upsert(point(2026, 8, 2, 101.7));

        store.save(&history).unwrap();
        let back = store.load().unwrap();
        assert_eq!(back, history);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let store = HistoryStore::new(scratch_path("missing"));
        let history = store.load().unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn corrupt_file_is_a_hard_error() {
        let path = scratch_path("corrupt");
        std::fs::write(&path, "[{\"date\": not json").unwrap();
        let store = HistoryStore::new(&path);
        assert!(store.load().is_err());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn unsorted_file_is_normalised_on_load() {
        let path = scratch_path("unsorted");
        std::fs::write(
            &path,
            r#"[{"date":"2026-08-05","level":104.0},{"date":"2026-08-01","level":100.0}]"#,
        )
        .unwrap();

        let history = HistoryStore::new(&path).load().unwrap();
        assert!((history.level_on_or_before(date(2026, 8, 1)).unwrap() - 100.0).abs() < 1e-10);
        assert!((history.latest().unwrap().level - 104.0).abs() < 1e-10);

        std::fs::remove_file(&path).unwrap();
    }
}
