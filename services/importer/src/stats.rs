//! Import statistics: fixed counters, serializable as the run's output object.

use std::ops::AddAssign;

use serde::Serialize;

use crate::error::SheetError;
use crate::file_type::FileType;
use crate::upsert::UpsertOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkippedSheets {
    pub unreadable: usize,
    pub missing_cols: usize,
    pub bad_date: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SheetStats {
    /// Sheets targeted: all sheets of a report, the first sheet of a monthly file.
    pub total: usize,
    pub processed: usize,
    pub skipped: SkippedSheets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowStats {
    /// Asset rows read after filtering.
    pub scanned: usize,
    pub merged: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub inserted: usize,
    pub replaced: usize,
    pub ignored: usize,
}

impl WriteStats {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
            UpsertOutcome::Ignored => self.ignored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.replaced + self.ignored
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub sheets: SheetStats,
    pub rows: RowStats,
    pub actual: WriteStats,
    pub dry_run: WriteStats,
}

impl ImportStats {
    pub fn record_skip(&mut self, err: &SheetError) {
        let skipped = &mut self.sheets.skipped;
        match err {
            SheetError::Unreadable { .. } => skipped.unreadable += 1,
            SheetError::MissingColumns { .. } => skipped.missing_cols += 1,
            SheetError::BadDate(_) => skipped.bad_date += 1,
        }
    }

    pub fn record_outcome(&mut self, outcome: UpsertOutcome, dry_run: bool) {
        if dry_run {
            self.dry_run.record(outcome);
        } else {
            self.actual.record(outcome);
        }
    }

    pub fn sheets_skipped(&self) -> usize {
        let s = self.sheets.skipped;
        s.unreadable + s.missing_cols + s.bad_date
    }
}

impl AddAssign for SkippedSheets {
    fn add_assign(&mut self, other: Self) {
        self.unreadable += other.unreadable;
        self.missing_cols += other.missing_cols;
        self.bad_date += other.bad_date;
    }
}

impl AddAssign for WriteStats {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.ignored += other.ignored;
    }
}

impl AddAssign for ImportStats {
    fn add_assign(&mut self, other: Self) {
        self.sheets.total += other.sheets.total;
        self.sheets.processed += other.sheets.processed;
        self.sheets.skipped += other.sheets.skipped;
        self.rows.scanned += other.rows.scanned;
        self.rows.merged += other.rows.merged;
        self.rows.errors += other.rows.errors;
        self.actual += other.actual;
        self.dry_run += other.dry_run;
    }
}

/// Megabytes for humans: `MB` below 1024, `GB` from there on.
pub fn format_bw(megabytes: Option<f64>) -> String {
    match megabytes {
        None => "N/A".to_string(),
        Some(mb) if mb.is_nan() => "N/A".to_string(),
        Some(mb) if mb >= 1024.0 => format!("{:.2} GB", mb / 1024.0),
        Some(mb) => format!("{mb:.2} MB"),
    }
}

/// What a run did to the store, in words. `None` describes a mixed batch.
pub fn action_summary(file_type: Option<FileType>, dry_run: bool, reset_db: bool) -> String {
    let effect = match (reset_db, file_type, dry_run) {
        (true, _, false) => "The entire database was deleted before import. Only data from this import remains.",
        (true, _, true) => "The entire database would be deleted before import. Only data from this import would remain.",
        (false, Some(FileType::Monthly), false) => {
            "Rows for the same period (month/year) were overwritten. All other data remains unchanged."
        }
        (false, Some(FileType::Monthly), true) => {
            "Rows for the same period (month/year) would be overwritten. All other data would remain unchanged."
        }
        (false, Some(FileType::Report), false) => {
            "New rows were added. Existing rows for the same period were ignored (not overwritten). All other data remains unchanged."
        }
        (false, Some(FileType::Report), true) => {
            "New rows would be added. Existing rows for the same period would be ignored (not overwritten). All other data would remain unchanged."
        }
        (false, None, false) => {
            "Monthly files overwrote rows for their month; report files only added rows that were missing."
        }
        (false, None, true) => {
            "Monthly files would overwrite rows for their month; report files would only add rows that are missing."
        }
    };

    if dry_run {
        format!("This was a dry run. No changes were made to the database.\nIf this were not a dry run: {effect}")
    } else {
        effect.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcome_splits_dry_run() {
        let mut stats = ImportStats::default();
        stats.record_outcome(UpsertOutcome::Inserted, false);
        stats.record_outcome(UpsertOutcome::Replaced, false);
        stats.record_outcome(UpsertOutcome::Ignored, true);

        assert_eq!(stats.actual, WriteStats { inserted: 1, replaced: 1, ignored: 0 });
        assert_eq!(stats.dry_run, WriteStats { inserted: 0, replaced: 0, ignored: 1 });
        assert_eq!(stats.actual.total(), 2);
    }

    #[test]
    fn test_record_skip() {
        let mut stats = ImportStats::default();
        stats.record_skip(&SheetError::BadDate("Summary".into()));
        stats.record_skip(&SheetError::MissingColumns { missing: vec!["url"] });
        stats.record_skip(&SheetError::BadDate("Notes".into()));

        assert_eq!(stats.sheets.skipped.bad_date, 2);
        assert_eq!(stats.sheets.skipped.missing_cols, 1);
        assert_eq!(stats.sheets_skipped(), 3);
    }

    #[test]
    fn test_accumulate() {
        let mut total = ImportStats::default();
        let mut one = ImportStats::default();
        one.sheets.total = 2;
        one.sheets.processed = 1;
        one.sheets.skipped.unreadable = 1;
        one.rows.scanned = 10;
        one.rows.merged = 3;
        one.actual.inserted = 7;

        total += one;
        total += one;
        assert_eq!(total.sheets.total, 4);
        assert_eq!(total.sheets.skipped.unreadable, 2);
        assert_eq!(total.rows.merged, 6);
        assert_eq!(total.actual.inserted, 14);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ImportStats::default()).unwrap();
        assert_eq!(json["sheets"]["skipped"]["missing_cols"], 0);
        assert_eq!(json["rows"]["scanned"], 0);
        assert_eq!(json["actual"]["replaced"], 0);
        assert_eq!(json["dry_run"]["ignored"], 0);
    }

    #[test]
    fn test_format_bw() {
        assert_eq!(format_bw(None), "N/A");
        assert_eq!(format_bw(Some(12.5)), "12.50 MB");
        assert_eq!(format_bw(Some(1536.0)), "1.50 GB");
        assert_eq!(format_bw(Some(1024.0)), "1.00 GB");
    }

    #[test]
    fn test_action_summary() {
        assert!(action_summary(Some(FileType::Report), false, false).starts_with("New rows were added"));
        assert!(action_summary(Some(FileType::Monthly), false, false).contains("were overwritten"));
        let dry = action_summary(Some(FileType::Monthly), true, true);
        assert!(dry.starts_with("This was a dry run."));
        assert!(dry.contains("would be deleted"));
    }
}
