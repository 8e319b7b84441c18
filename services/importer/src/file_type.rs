//! Spreadsheet schema detection from the filename alone.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MONTHLY_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d{8}_podcast_downloads\.xlsx?$").expect("monthly filename pattern should compile")
});

/// `{YYYYMMDD}-{HHMMSS}_` prepended by the upload pipeline.
static PREFIXED_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\d{8}-\d{6}_(.*)$").expect("prefixed timestamp pattern should compile")
});

/// `_{YYYY-MM-DD}_{HH-MM-SS}` appended before the extension by the upload pipeline.
static APPENDED_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}(\.xlsx?)$")
        .expect("appended timestamp pattern should compile")
});

/// The two spreadsheet schemas the importer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// One workbook, one sheet per calendar year.
    Report,
    /// One workbook per reporting month, `{YYYYMMDD}_podcast_downloads.xlsx`.
    Monthly,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Report => "report",
            FileType::Monthly => "monthly",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub file_type: FileType,
    /// Filename with upload decorations removed, e.g. `20240115_podcast_downloads.xlsx`.
    pub canonical_name: String,
}

/// Classify a bare filename (no directories).
///
/// Upload decorations are stripped first (appended suffix, then prefix); when
/// a stripped name does not match either schema the next candidate is tried,
/// ending with the name as given.
pub fn classify(filename: &str) -> Option<Classification> {
    let mut candidates = Vec::with_capacity(3);

    if let Some(caps) = APPENDED_TIMESTAMP.captures(filename) {
        candidates.push(format!("{}{}", &caps[1], &caps[2]));
    }
    if let Some(caps) = PREFIXED_TIMESTAMP.captures(filename) {
        candidates.push(caps[1].to_string());
    }
    candidates.push(filename.to_string());

    candidates.into_iter().find_map(|name| {
        let file_type = match_schema(&name)?;
        Some(Classification {
            file_type,
            canonical_name: name,
        })
    })
}

fn match_schema(name: &str) -> Option<FileType> {
    if MONTHLY_FILENAME.is_match(name) {
        return Some(FileType::Monthly);
    }
    let lower = name.to_lowercase();
    if lower.starts_with("report") && (lower.ends_with(".xls") || lower.ends_with(".xlsx")) {
        return Some(FileType::Report);
    }
    None
}
