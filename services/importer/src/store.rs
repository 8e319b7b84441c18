//! Download store: one SQLite table keyed by `(url, consumed_year, consumed_month)`.
//!
//! The store handle owns a single connection for the whole run. Every write
//! is one atomic statement; the two upsert flavours map directly onto
//! SQLite's `INSERT OR REPLACE` and `INSERT OR IGNORE`.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;
use tracing::{debug, info};

use crate::record::{DownloadRecord, RecordKey};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS podcasts (
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    code TEXT,
    feature TEXT,
    full REAL NOT NULL,
    partial REAL NOT NULL,
    avg_bw REAL,
    total_bw REAL NOT NULL,
    eq_full INTEGER NOT NULL,
    created_at TEXT,
    consumed_at TEXT NOT NULL,
    consumed_year INTEGER NOT NULL,
    consumed_month INTEGER NOT NULL,
    assumed_month INTEGER NOT NULL DEFAULT 0,
    imported_at TEXT NOT NULL,
    source_file_path TEXT NOT NULL,
    PRIMARY KEY (url, consumed_year, consumed_month)
)
"#;

const COLUMNS: &str = "url, title, code, feature, full, partial, avg_bw, total_bw, eq_full, \
     created_at, consumed_at, consumed_year, consumed_month, assumed_month, imported_at, source_file_path";

pub struct DownloadStore {
    conn: SqliteConnection,
}

impl DownloadStore {
    /// Open (creating if needed) the database at `url` and ensure the table exists.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let conn = SqliteConnection::connect_with(&options).await?;
        let mut store = Self { conn };
        store.ensure_schema().await?;
        debug!(url, "download store ready");
        Ok(store)
    }

    async fn ensure_schema(&mut self) -> Result<(), sqlx::Error> {
        sqlx::query(SCHEMA).execute(&mut self.conn).await?;
        Ok(())
    }

    /// Remove every record. Returns how many were deleted.
    pub async fn reset(&mut self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM podcasts").execute(&mut self.conn).await?;
        info!(deleted = result.rows_affected(), "download store reset");
        Ok(result.rows_affected())
    }

    pub async fn exists(&mut self, key: &RecordKey) -> Result<bool, sqlx::Error> {
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM podcasts WHERE url = ? AND consumed_year = ? AND consumed_month = ?")
                .bind(&key.url)
                .bind(key.year)
                .bind(key.month)
                .fetch_optional(&mut self.conn)
                .await?;
        Ok(found.is_some())
    }

    /// Write the record, replacing any row with the same key wholesale.
    pub async fn replace(&mut self, record: &DownloadRecord) -> Result<(), sqlx::Error> {
        self.write("INSERT OR REPLACE", record).await?;
        Ok(())
    }

    /// Write the record unless its key is already present. Returns whether it was written.
    pub async fn insert_if_absent(&mut self, record: &DownloadRecord) -> Result<bool, sqlx::Error> {
        Ok(self.write("INSERT OR IGNORE", record).await? > 0)
    }

    async fn write(&mut self, verb: &str, record: &DownloadRecord) -> Result<u64, sqlx::Error> {
        let sql = format!(
            "{verb} INTO podcasts ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let result = sqlx::query(&sql)
            .bind(&record.url)
            .bind(&record.title)
            .bind(&record.code)
            .bind(&record.feature)
            .bind(record.full)
            .bind(record.partial)
            .bind(record.avg_bw)
            .bind(record.total_bw)
            .bind(record.eq_full)
            .bind(record.created_at)
            .bind(record.consumed_at)
            .bind(record.consumed_year)
            .bind(record.consumed_month)
            .bind(record.assumed_month)
            .bind(record.imported_at)
            .bind(&record.source_file_path)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn fetch(&mut self, key: &RecordKey) -> Result<Option<DownloadRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM podcasts WHERE url = ? AND consumed_year = ? AND consumed_month = ?"
        );
        sqlx::query_as::<_, DownloadRecord>(&sql)
            .bind(&key.url)
            .bind(key.year)
            .bind(key.month)
            .fetch_optional(&mut self.conn)
            .await
    }

    pub async fn count(&mut self) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM podcasts")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(count)
    }

    pub async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}
