//! Header mapping for the two spreadsheet schemas.
//!
//! The headers are exact, known strings per file type. We do not guess:
//! a sheet that lacks one of them is skipped.

use std::collections::BTreeMap;

use calamine::Data;

use crate::error::SheetError;
use crate::file_type::FileType;
use crate::sheet::RawRow;

/// Canonical field names, in mapping order.
pub const CANONICAL_FIELDS: [&str; 5] = ["url", "full", "partial", "total_bw", "avg_bw"];

/// Literal header per canonical field for yearly report workbooks.
const REPORT_HEADERS: [(&str, &str); 5] = [
    ("url", "URL"),
    ("full", "Full"),
    ("partial", "Partial"),
    ("total_bw", "Total BW"),
    ("avg_bw", "Avg BW"),
];

/// Literal header per canonical field for monthly exports.
const MONTHLY_HEADERS: [(&str, &str); 5] = [
    ("url", "Downloads"),
    ("full", "Hits"),
    ("partial", "206 Hits"),
    ("total_bw", "Bandwidth"),
    ("avg_bw", "Average size"),
];

/// Static schema table: canonical field -> header string for a file type.
pub fn schema_headers(file_type: FileType) -> &'static [(&'static str, &'static str); 5] {
    match file_type {
        FileType::Report => &REPORT_HEADERS,
        FileType::Monthly => &MONTHLY_HEADERS,
    }
}

/// Header of the column holding the asset URL for a file type.
pub fn url_header(file_type: FileType) -> &'static str {
    schema_headers(file_type)[0].1
}

/// Rename dictionary for one sheet: original header -> canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub renames: BTreeMap<String, &'static str>,
}

/// A raw row after renaming, metrics still as raw cell values.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub line: usize,
    pub url: String,
    pub full: Data,
    pub partial: Data,
    pub total_bw: Data,
    pub avg_bw: Data,
}

impl ColumnMapping {
    /// Build the mapping for a header row. Headers are compared after trimming.
    pub fn resolve(file_type: FileType, headers: &[String]) -> Result<Self, SheetError> {
        let mut renames = BTreeMap::new();
        for (field, header) in schema_headers(file_type) {
            if headers.iter().any(|h| h.trim() == *header) {
                renames.insert((*header).to_string(), *field);
            }
        }

        let missing: Vec<&'static str> = CANONICAL_FIELDS
            .iter()
            .copied()
            .filter(|f| !renames.values().any(|mapped| mapped == f))
            .collect();
        if !missing.is_empty() {
            return Err(SheetError::MissingColumns { missing });
        }

        Ok(Self { renames })
    }

    /// Apply the renames to a raw row. Metrics absent from the row read as empty.
    pub fn apply(&self, row: &RawRow) -> MappedRow {
        let mut mapped: BTreeMap<&'static str, &Data> = BTreeMap::new();
        for (header, value) in &row.fields {
            if let Some(field) = self.renames.get(header) {
                mapped.insert(*field, value);
            }
        }
        let take = |field: &str| mapped.get(field).map(|v| (*v).clone()).unwrap_or(Data::Empty);

        MappedRow {
            line: row.line,
            url: row.url.clone(),
            full: take("full"),
            partial: take("partial"),
            total_bw: take("total_bw"),
            avg_bw: take("avg_bw"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_report_mapping() {
        let h = headers(&["URL", "Full", "Partial", "Avg BW", "Total BW"]);
        let m = ColumnMapping::resolve(FileType::Report, &h).unwrap();
        assert_eq!(m.renames.len(), 5);
        assert_eq!(m.renames["URL"], "url");
        assert_eq!(m.renames["Total BW"], "total_bw");
        assert_eq!(m.renames["Avg BW"], "avg_bw");
    }

    #[test]
    fn test_monthly_mapping_with_extra_columns_and_padding() {
        let h = headers(&["Rank", " Downloads ", "Hits", "206 Hits", "Bandwidth", "Average size", "Notes"]);
        let m = ColumnMapping::resolve(FileType::Monthly, &h).unwrap();
        assert_eq!(m.renames.len(), 5);
        assert_eq!(m.renames["Downloads"], "url");
        assert_eq!(m.renames["206 Hits"], "partial");
        assert!(!m.renames.contains_key("Rank"));
    }

    #[test]
    fn test_apply_renames() {
        let h = headers(&["Downloads", "Hits", "206 Hits", "Bandwidth", "Average size"]);
        let m = ColumnMapping::resolve(FileType::Monthly, &h).unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("Downloads".to_string(), Data::String("/wp-content/uploads/a.mp3".into()));
        fields.insert("Hits".to_string(), Data::Float(7.0));
        fields.insert("206 Hits".to_string(), Data::Int(2));
        fields.insert("Bandwidth".to_string(), Data::String("10 MB".into()));
        fields.insert("Rank".to_string(), Data::Float(1.0));
        let raw = RawRow {
            line: 4,
            url: "/wp-content/uploads/a.mp3".to_string(),
            fields,
        };

        let row = m.apply(&raw);
        assert_eq!(row.line, 4);
        assert_eq!(row.url, "/wp-content/uploads/a.mp3");
        assert_eq!(row.full, Data::Float(7.0));
        assert_eq!(row.partial, Data::Int(2));
        assert_eq!(row.total_bw, Data::String("10 MB".into()));
        assert_eq!(row.avg_bw, Data::Empty);
    }

    #[test]
    fn test_missing_columns_reported() {
        let h = headers(&["URL", "Full", "Total BW"]);
        let err = ColumnMapping::resolve(FileType::Report, &h).unwrap_err();
        match err {
            SheetError::MissingColumns { missing } => assert_eq!(missing, vec!["partial", "avg_bw"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrong_schema_headers_do_not_map() {
        let h = headers(&["URL", "Full", "Partial", "Avg BW", "Total BW"]);
        assert!(ColumnMapping::resolve(FileType::Monthly, &h).is_err());
    }

    #[test]
    fn test_url_header() {
        assert_eq!(url_header(FileType::Report), "URL");
        assert_eq!(url_header(FileType::Monthly), "Downloads");
    }
}
