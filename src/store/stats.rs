//! Usage statistics store
//!
//! One record per session (duration, output characters), with today /
//! this-week / total rollups for the `stats` subcommand.

use crate::error::StoreError;
use chrono::{Datelike, Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    ts: String,
    duration: f64,
    chars: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StatsFile {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

/// Rollup for one time bucket
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bucket {
    pub duration_secs: f64,
    pub chars: usize,
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSummary {
    pub today: Bucket,
    pub week: Bucket,
    pub total: Bucket,
}

pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join("stats.json"),
        }
    }

    pub fn record_session(&self, duration_secs: f64, char_count: usize) -> Result<(), StoreError> {
        let mut file = self.load()?;
        file.sessions.push(SessionRecord {
            ts: Local::now().format(TS_FORMAT).to_string(),
            duration: (duration_secs * 100.0).round() / 100.0,
            chars: char_count,
        });
        self.save(&file)
    }

    /// Today / this-week (Monday start) / total rollups
    pub fn summary(&self) -> Result<StatsSummary, StoreError> {
        let file = self.load()?;
        let now = Local::now().naive_local();
        let today_start = now.date().and_hms_opt(0, 0, 0).unwrap();
        let week_start = today_start - Duration::days(now.weekday().num_days_from_monday() as i64);

        let mut summary = StatsSummary::default();
        for record in &file.sessions {
            let Ok(ts) = NaiveDateTime::parse_from_str(&record.ts, TS_FORMAT) else {
                continue;
            };

            add_to(&mut summary.total, record);
            if ts >= week_start {
                add_to(&mut summary.week, record);
            }
            if ts >= today_start {
                add_to(&mut summary.today, record);
            }
        }

        Ok(summary)
    }

    fn load(&self) -> Result<StatsFile, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatsFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, file: &StatsFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(file)?)?;
        Ok(())
    }
}

fn add_to(bucket: &mut Bucket, record: &SessionRecord) {
    bucket.duration_secs += record.duration;
    bucket.chars += record.chars;
    bucket.sessions += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_summarize() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::new(dir.path().to_path_buf());

        store.record_session(3.5, 42).unwrap();
        store.record_session(1.5, 8).unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.total.sessions, 2);
        assert_eq!(summary.total.chars, 50);
        assert!((summary.total.duration_secs - 5.0).abs() < 1e-9);
        // Records written just now are in every bucket
        assert_eq!(summary.today, summary.total);
        assert_eq!(summary.week, summary.total);
    }

    #[test]
    fn test_old_records_only_count_toward_total() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::new(dir.path().to_path_buf());

        let old = serde_json::json!({
            "sessions": [
                { "ts": "2020-01-01T10:00:00", "duration": 2.0, "chars": 10 }
            ]
        });
        std::fs::write(dir.path().join("stats.json"), old.to_string()).unwrap();
        store.record_session(1.0, 5).unwrap();

        let summary = store.summary().unwrap();
        assert_eq!(summary.total.sessions, 2);
        assert_eq!(summary.today.sessions, 1);
        assert_eq!(summary.week.sessions, 1);
    }

    #[test]
    fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::new(dir.path().to_path_buf());
        let summary = store.summary().unwrap();
        assert_eq!(summary.total.sessions, 0);
    }
}
