//! Sheet reader: turns a grid into raw rows for the podcast assets only.

use std::collections::BTreeMap;

use calamine::Data;

use crate::workbook::{Cell, SheetGrid};

/// One data row, keyed by original header text, with the URL resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// 1-based sheet line (header is line 1).
    pub line: usize,
    pub url: String,
    pub fields: BTreeMap<String, Data>,
}

/// Rows kept by the reader plus how many were dropped as irrelevant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRows {
    pub rows: Vec<RawRow>,
    pub discarded: usize,
}

/// Read the data rows of a sheet.
///
/// The URL column is resolved from the cell hyperlink when present (display
/// labels are often shortened), else from the literal text. Rows whose URL
/// does not contain `asset_marker` are discarded: blank rows, totals, header
/// artifacts. They are not errors.
pub fn read_rows(grid: &SheetGrid, url_header: &str, asset_marker: &str) -> SheetRows {
    let headers = grid.headers();
    let Some(url_idx) = headers.iter().position(|h| h == url_header) else {
        return SheetRows::default();
    };

    let mut out = SheetRows::default();
    for (line, cells) in grid.data_rows() {
        let url = match cells.get(url_idx).and_then(resolve_url) {
            Some(url) if url.contains(asset_marker) => url,
            _ => {
                out.discarded += 1;
                continue;
            }
        };

        let mut fields = BTreeMap::new();
        for (header, cell) in headers.iter().zip(cells) {
            if header.is_empty() {
                continue;
            }
            let value = if header == url_header {
                Data::String(url.clone())
            } else {
                match &cell.value {
                    Data::String(s) => Data::String(s.trim().to_string()),
                    other => other.clone(),
                }
            };
            fields.insert(header.clone(), value);
        }

        out.rows.push(RawRow { line, url, fields });
    }
    out
}

/// Hyperlink target first, literal text second.
fn resolve_url(cell: &Cell) -> Option<String> {
    if let Some(target) = cell.hyperlink.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return Some(target.to_string());
    }
    let text = cell.display_text();
    (!text.is_empty()).then_some(text)
}
