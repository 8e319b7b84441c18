use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort the import of a whole file. Nothing from the file is
/// written once one of these is returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("could not determine file type for '{0}' (expected report*.xls[x] or YYYYMMDD_podcast_downloads.xls[x])")]
    UnknownFileType(String),

    #[error("failed to open workbook {}: {source}", path.display())]
    WorkbookOpen {
        path: PathBuf,
        #[source]
        source: WorkbookError,
    },

    #[error("download store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("failed to read directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures scoped to one sheet. The orchestrator tallies them and moves on.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("sheet '{sheet}' is unreadable: {source}")]
    Unreadable {
        sheet: String,
        #[source]
        source: WorkbookError,
    },

    #[error("sheet is missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },

    #[error("cannot determine reporting period from '{0}'")]
    BadDate(String),
}

/// Failures scoped to one row. The row is excluded from aggregation.
#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("row has no usable URL")]
    MissingUrl,

    #[error("column '{field}' is not numeric: '{value}'")]
    NonNumeric { field: &'static str, value: String },

    #[error("column '{field}' is negative: {value}")]
    Negative { field: &'static str, value: f64 },
}

/// Errors from the spreadsheet capability.
#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error(transparent)]
    Calamine(#[from] calamine::Error),

    #[error("hyperlink table: {0}")]
    Package(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("sheet '{0}' not found")]
    SheetNotFound(String),
}
