//! Import orchestrator.
//!
//! Drives one file (or a directory of files) through the pipeline, sheet by
//! sheet: read grid, map columns, filter asset rows, resolve the period,
//! aggregate, upsert. Sheet and row failures are tallied and skipped; only an
//! unclassifiable file, an unopenable workbook or an unavailable store abort.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{SheetAggregate, SheetAggregator};
use crate::columns::{url_header, ColumnMapping};
use crate::error::{ImportError, SheetError};
use crate::file_type::{classify, Classification, FileType};
use crate::period::{self, ReportingPeriod};
use crate::sheet::read_rows;
use crate::stats::{action_summary, format_bw, ImportStats};
use crate::store::DownloadStore;
use crate::upsert::{UpsertPolicy, Upserter};
use crate::workbook::{ExcelWorkbook, WorkbookSource};

pub const DEFAULT_ASSET_MARKER: &str = "/wp-content/uploads";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Classify and count, never write.
    pub dry_run: bool,
    /// Wipe the store once, when the importer starts.
    pub reset_db: bool,
    /// Accepted for compatibility with older callers; the upsert policy
    /// depends on the file type alone.
    pub override_existing: bool,
    /// Substring a resolved URL must contain to count as a podcast asset.
    pub asset_marker: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            reset_db: false,
            override_existing: false,
            asset_marker: DEFAULT_ASSET_MARKER.to_string(),
        }
    }
}

/// Outcome of importing one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub file_name: String,
    pub file_type: FileType,
    pub source_path: String,
    pub dry_run: bool,
    pub sheets_in_file: usize,
    pub stats: ImportStats,
}

impl ImportReport {
    /// Multi-section human summary.
    pub fn render(&self) -> String {
        let s = &self.stats;
        let rule = "=".repeat(70);
        let mut out = Vec::new();

        out.push(rule.clone());
        out.push(format!(" Import Summary for: {}", self.file_name));
        out.push(rule);
        out.push(format!("File Type: {}", capitalize(self.file_type.as_str())));
        out.push(format!(
            "Processing Mode: {}",
            if self.dry_run { "Dry Run" } else { "Actual Import" }
        ));
        out.push(format!("Source Path: {}", self.source_path));
        out.push(String::new());

        out.push("File & Sheet Details:".to_string());
        out.push(format!("  Sheets in file: {}", self.sheets_in_file));
        out.push(format!("  Sheets targeted: {}", s.sheets.total));
        out.push(format!("  Sheets processed: {}", s.sheets.processed));
        out.push("  Sheets skipped:".to_string());
        out.push(format!("    - Unreadable: {}", s.sheets.skipped.unreadable));
        out.push(format!("    - Missing columns: {}", s.sheets.skipped.missing_cols));
        out.push(format!("    - Bad date format: {}", s.sheets.skipped.bad_date));
        out.push(String::new());

        out.extend(render_rows_and_changes(s, self.dry_run));
        out.push("-".repeat(70));
        out.join("\n")
    }
}

/// A file of a batch that could not be imported at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub file_name: String,
    pub error: String,
}

/// Outcome of importing a directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub directory: String,
    pub dry_run: bool,
    pub reset_db: bool,
    /// In import order: monthly files first, then reports.
    pub files: Vec<ImportReport>,
    pub failures: Vec<FileFailure>,
    pub total: ImportStats,
}

impl BatchReport {
    pub fn render(&self) -> String {
        let rule = "=".repeat(70);
        let mut out = Vec::new();

        out.push(rule.clone());
        out.push(format!(" Batch Import Summary for: {}", self.directory));
        out.push(rule);
        out.push(format!(
            "Processing Mode: {}",
            if self.dry_run { "Dry Run" } else { "Actual Import" }
        ));
        out.push(format!("Files imported: {}", self.files.len()));
        for report in &self.files {
            out.push(format!(
                "  - {} ({}): {} of {} sheets processed",
                report.file_name, report.file_type, report.stats.sheets.processed, report.stats.sheets.total
            ));
        }
        out.push(format!("Files failed: {}", self.failures.len()));
        for failure in &self.failures {
            out.push(format!("  - {}: {}", failure.file_name, failure.error));
        }
        out.push(String::new());

        out.push(format!("Sheets processed: {} of {}", self.total.sheets.processed, self.total.sheets.total));
        out.push(format!("Sheets skipped: {}", self.total.sheets_skipped()));
        out.push(String::new());

        out.extend(render_rows_and_changes(&self.total, self.dry_run));
        out.push(String::new());
        out.push(format!("Action Taken: {}", action_summary(None, self.dry_run, self.reset_db)));
        out.push("-".repeat(70));
        out.join("\n")
    }
}

fn render_rows_and_changes(s: &ImportStats, dry_run: bool) -> Vec<String> {
    let mut out = vec![
        "Row Processing:".to_string(),
        format!("  Total rows scanned: {}", s.rows.scanned),
        format!("  Rows merged: {}", s.rows.merged),
        format!("  Processing errors: {}", s.rows.errors),
        String::new(),
    ];
    if dry_run {
        out.push("Database Changes (Preview):".to_string());
        out.push(format!("  Would insert: {}", s.dry_run.inserted));
        out.push(format!("  Would replace: {}", s.dry_run.replaced));
        out.push(format!("  Would ignore: {}", s.dry_run.ignored));
    } else {
        out.push("Database Changes (Actual):".to_string());
        out.push(format!("  Inserted: {}", s.actual.inserted));
        out.push(format!("  Replaced: {}", s.actual.replaced));
        out.push(format!("  Ignored: {}", s.actual.ignored));
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Per-sheet result that is not a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetOutcome {
    Processed,
    /// No asset rows survived filtering. Neither processed nor skipped.
    NoAssetRows,
}

/// Holds the store for the whole run and imports files into it.
pub struct Importer {
    store: DownloadStore,
    options: ImportOptions,
    upserter: Upserter,
}

impl Importer {
    /// Take ownership of the store. A requested reset happens here, once.
    pub async fn start(mut store: DownloadStore, options: ImportOptions) -> Result<Self, ImportError> {
        if options.reset_db && !options.dry_run {
            store.reset().await?;
        }
        if options.override_existing {
            debug!("override flag set; upsert policy still follows the file type");
        }

        let upserter = if options.dry_run {
            Upserter::dry_run(options.reset_db)
        } else {
            Upserter::live()
        };

        Ok(Self {
            store,
            options,
            upserter,
        })
    }

    pub fn store_mut(&mut self) -> &mut DownloadStore {
        &mut self.store
    }

    pub fn into_store(self) -> DownloadStore {
        self.store
    }

    /// Import one spreadsheet from disk.
    pub async fn import_file(&mut self, path: &Path) -> Result<ImportReport, ImportError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let classification = classify(&file_name).ok_or_else(|| ImportError::UnknownFileType(file_name.clone()))?;

        let mut workbook = ExcelWorkbook::open(path).map_err(|source| ImportError::WorkbookOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let source_path = path.display().to_string();
        self.import_classified(&mut workbook, &file_name, &classification, &source_path)
            .await
    }

    /// Import an already opened workbook. `file_name` decides the file type.
    pub async fn import_workbook(
        &mut self,
        workbook: &mut dyn WorkbookSource,
        file_name: &str,
        source_path: &str,
    ) -> Result<ImportReport, ImportError> {
        let classification = classify(file_name).ok_or_else(|| ImportError::UnknownFileType(file_name.to_string()))?;
        self.import_classified(workbook, file_name, &classification, source_path)
            .await
    }

    async fn import_classified(
        &mut self,
        workbook: &mut dyn WorkbookSource,
        file_name: &str,
        classification: &Classification,
        source_path: &str,
    ) -> Result<ImportReport, ImportError> {
        let file_type = classification.file_type;
        let sheet_names = workbook.sheet_names();
        let targeted: Vec<String> = match file_type {
            FileType::Report => sheet_names.clone(),
            FileType::Monthly => sheet_names.iter().take(1).cloned().collect(),
        };

        info!(
            file = file_name,
            file_type = %file_type,
            sheets = sheet_names.len(),
            targeted = targeted.len(),
            dry_run = self.options.dry_run,
            "importing file"
        );

        let mut stats = ImportStats::default();
        stats.sheets.total = targeted.len();
        let imported_at = Utc::now();

        for sheet_name in &targeted {
            let result = self
                .import_sheet(workbook, sheet_name, classification, source_path, imported_at, &mut stats)
                .await;
            match result {
                Ok(SheetOutcome::Processed) => {
                    stats.sheets.processed += 1;
                    info!(sheet = %sheet_name, "sheet processed");
                }
                Ok(SheetOutcome::NoAssetRows) => {
                    info!(sheet = %sheet_name, "no podcast asset rows in sheet");
                }
                Err(e) => {
                    warn!(sheet = %sheet_name, error = %e, "sheet skipped");
                    stats.record_skip(&e);
                }
            }
        }

        info!(
            file = file_name,
            processed = stats.sheets.processed,
            skipped = stats.sheets_skipped(),
            scanned = stats.rows.scanned,
            merged = stats.rows.merged,
            errors = stats.rows.errors,
            "file done"
        );

        Ok(ImportReport {
            file_name: file_name.to_string(),
            file_type,
            source_path: source_path.to_string(),
            dry_run: self.options.dry_run,
            sheets_in_file: sheet_names.len(),
            stats,
        })
    }

    async fn import_sheet(
        &mut self,
        workbook: &mut dyn WorkbookSource,
        sheet_name: &str,
        classification: &Classification,
        source_path: &str,
        imported_at: DateTime<Utc>,
        stats: &mut ImportStats,
    ) -> Result<SheetOutcome, SheetError> {
        let file_type = classification.file_type;

        let grid = workbook.read_sheet(sheet_name).map_err(|source| SheetError::Unreadable {
            sheet: sheet_name.to_string(),
            source,
        })?;

        let rows = read_rows(&grid, url_header(file_type), &self.options.asset_marker);
        debug!(sheet = sheet_name, kept = rows.rows.len(), discarded = rows.discarded, "filtered rows");
        if rows.rows.is_empty() {
            return Ok(SheetOutcome::NoAssetRows);
        }

        let mapping = ColumnMapping::resolve(file_type, &grid.headers())?;

        let period = period::resolve(file_type, sheet_name, &classification.canonical_name)?;
        debug!(
            sheet = sheet_name,
            year = period.year,
            month = period.month,
            assumed_month = period.assumed_month,
            "reporting period"
        );

        stats.rows.scanned += rows.rows.len();
        let mut aggregator = SheetAggregator::new(&period);
        for raw in &rows.rows {
            let mapped = mapping.apply(raw);
            if let Err(e) = aggregator.fold(&mapped) {
                warn!(sheet = sheet_name, line = mapped.line, error = %e, "row skipped");
                stats.rows.errors += 1;
            }
        }

        let aggregate = aggregator.finish();
        stats.rows.merged += aggregate.merged_rows;
        log_merges(sheet_name, &aggregate);

        self.write_groups(aggregate, file_type, &period, imported_at, source_path, stats)
            .await;
        Ok(SheetOutcome::Processed)
    }

    async fn write_groups(
        &mut self,
        aggregate: SheetAggregate,
        file_type: FileType,
        period: &ReportingPeriod,
        imported_at: DateTime<Utc>,
        source_path: &str,
        stats: &mut ImportStats,
    ) {
        let policy = UpsertPolicy::for_file_type(file_type);
        let dry_run = self.upserter.is_dry_run();

        for group in aggregate.groups {
            let record = group.into_record(period, imported_at, source_path);
            match self.upserter.apply(&mut self.store, policy, &record).await {
                Ok(outcome) => stats.record_outcome(outcome, dry_run),
                Err(e) => {
                    warn!(url = %record.url, error = %e, "failed to write record");
                    stats.rows.errors += 1;
                }
            }
        }
    }

    /// Import every `.xls`/`.xlsx` in `dir`: monthly files first (by name),
    /// then reports. A file that fails is recorded and the batch moves on.
    pub async fn import_directory(&mut self, dir: &Path) -> Result<BatchReport, ImportError> {
        let listing_error = |source| ImportError::Directory {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths: Vec<PathBuf> = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await.map_err(listing_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
            let path = entry.path();
            if path.is_file() && is_spreadsheet(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let (monthly, other): (Vec<PathBuf>, Vec<PathBuf>) = paths.into_iter().partition(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(classify)
                .map(|c| c.file_type == FileType::Monthly)
                .unwrap_or(false)
        });

        info!(
            directory = %dir.display(),
            monthly = monthly.len(),
            other = other.len(),
            "importing directory"
        );

        let mut batch = BatchReport {
            directory: dir.display().to_string(),
            dry_run: self.options.dry_run,
            reset_db: self.options.reset_db,
            ..BatchReport::default()
        };

        for path in monthly.iter().chain(other.iter()) {
            match self.import_file(path).await {
                Ok(report) => {
                    batch.total += report.stats;
                    batch.files.push(report);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "file not imported");
                    batch.failures.push(FileFailure {
                        file_name: path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(batch)
    }
}

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "xls" | "xlsx"))
        .unwrap_or(false)
}

fn log_merges(sheet_name: &str, aggregate: &SheetAggregate) {
    for group in aggregate.groups.iter().filter(|g| g.rows > 1) {
        debug!(
            sheet = sheet_name,
            key = %group.key,
            rows = group.rows,
            full = group.full,
            partial = group.partial,
            eq_full = group.eq_full,
            total_bw = %format_bw(Some(group.total_bw)),
            avg_bw = %format_bw(group.avg_bw),
            "merged rows"
        );
    }
    for rec in &aggregate.reconciliations {
        info!(
            sheet = sheet_name,
            key = %rec.key,
            titles = ?rec.titles,
            urls = ?rec.urls,
            canonical_title = %rec.canonical_title,
            canonical_url = %rec.canonical_url,
            "reconciled variants"
        );
    }
}
