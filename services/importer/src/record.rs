use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// One merged download row as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DownloadRecord {
    pub url: String,
    pub title: String,
    pub code: Option<String>,
    pub feature: Option<String>,
    pub full: f64,
    pub partial: f64,
    /// Megabytes per download; absent when there were no downloads.
    pub avg_bw: Option<f64>,
    /// Megabytes.
    pub total_bw: f64,
    pub eq_full: i64,
    pub created_at: Option<NaiveDate>,
    pub consumed_at: NaiveDate,
    pub consumed_year: i32,
    pub consumed_month: i32,
    pub assumed_month: bool,
    pub imported_at: DateTime<Utc>,
    pub source_file_path: String,
}

impl DownloadRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            url: self.url.clone(),
            year: self.consumed_year,
            month: self.consumed_month,
        }
    }
}

/// Natural key of a download record: `(url, consumed_year, consumed_month)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub url: String,
    pub year: i32,
    pub month: i32,
}

impl RecordKey {
    pub fn new(url: impl Into<String>, year: i32, month: i32) -> Self {
        Self {
            url: url.into(),
            year,
            month,
        }
    }
}

/// `floor(full + 0.5 * partial)`: partial (206) hits count as half a download.
pub fn equivalent_full(full: f64, partial: f64) -> i64 {
    (full + 0.5 * partial).floor() as i64
}
