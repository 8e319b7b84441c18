//! Importer - Reconciles podcast download spreadsheets into the download store
//!
//! Responsibilities:
//! - Classify a spreadsheet as a yearly "report" or a "monthly" export
//! - Read sheets, resolving hyperlink targets for the URL column
//! - Recover code / feature / title / creation date from asset filenames
//! - Merge rows describing the same download within a sheet
//! - Upsert merged records with a per-file-type policy (replace vs. ignore)
//! - Report what happened (or would happen, in dry-run) as fixed statistics
//!
//! Same file + same store state = same outcome. Every heuristic in here is a
//! pure function so aggregation keys are reproducible across runs.

pub mod aggregate;
pub mod columns;
pub mod config;
pub mod error;
pub mod file_type;
pub mod hyperlinks;
pub mod import;
pub mod metadata;
pub mod period;
pub mod record;
pub mod sheet;
pub mod stats;
pub mod store;
pub mod upsert;
pub mod workbook;

pub use error::{ImportError, RowError, SheetError, WorkbookError};
pub use file_type::FileType;
pub use import::{BatchReport, ImportOptions, ImportReport, Importer};
pub use record::{DownloadRecord, RecordKey};
pub use stats::ImportStats;
pub use store::DownloadStore;
