//! Spreadsheet capability used by the importer.
//!
//! The orchestrator only needs sheet names and, per sheet, a grid of cells
//! carrying both the literal value and the hyperlink target (if any).
//! `ExcelWorkbook` provides that on top of calamine; tests provide their own.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::{debug, warn};

use crate::error::WorkbookError;
use crate::hyperlinks::{read_sheet_hyperlinks, HyperlinkMap};

/// One cell: what the sheet shows, and where it links to.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: Data,
    pub hyperlink: Option<String>,
}

impl Cell {
    pub fn new(value: Data) -> Self {
        Self { value, hyperlink: None }
    }

    pub fn text(value: &str) -> Self {
        Self::new(Data::String(value.to_string()))
    }

    pub fn number(value: f64) -> Self {
        Self::new(Data::Float(value))
    }

    pub fn empty() -> Self {
        Self::new(Data::Empty)
    }

    pub fn linked(label: &str, target: &str) -> Self {
        Self {
            value: Data::String(label.to_string()),
            hyperlink: Some(target.to_string()),
        }
    }

    /// Trimmed display text of the literal value.
    pub fn display_text(&self) -> String {
        match &self.value {
            Data::String(s) => s.trim().to_string(),
            Data::Empty => String::new(),
            other => other.to_string(),
        }
    }
}

/// A sheet as a dense grid. The first row is the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    pub rows: Vec<Vec<Cell>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Trimmed header texts; empty when the sheet has no rows.
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(Cell::display_text).collect())
            .unwrap_or_default()
    }

    /// Data rows with their 1-based sheet line number (header is line 1).
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[Cell])> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, row)| (idx + 1, row.as_slice()))
    }
}

/// Read access to a workbook, sheet by sheet.
pub trait WorkbookSource {
    /// Sheet names in workbook order.
    fn sheet_names(&self) -> Vec<String>;

    fn read_sheet(&mut self, name: &str) -> Result<SheetGrid, WorkbookError>;
}

/// `.xls` / `.xlsx` file on disk.
pub struct ExcelWorkbook {
    path: PathBuf,
    sheets: Sheets<BufReader<File>>,
    /// Only OOXML packages carry a hyperlink table we can read.
    ooxml: bool,
}

impl ExcelWorkbook {
    /// Open a workbook (calamine auto-detects xls, xlsx, xlsb, ods).
    pub fn open(path: &Path) -> Result<Self, WorkbookError> {
        let sheets = open_workbook_auto(path)?;
        let ooxml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
            .unwrap_or(false);
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
            ooxml,
        })
    }

    fn hyperlinks(&self, sheet_name: &str) -> HyperlinkMap {
        if !self.ooxml {
            return HyperlinkMap::new();
        }
        match read_sheet_hyperlinks(&self.path, sheet_name) {
            Ok(links) => links,
            Err(e) => {
                warn!(sheet = sheet_name, error = %e, "hyperlinks unavailable, using cell text");
                HyperlinkMap::new()
            }
        }
    }
}

impl WorkbookSource for ExcelWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names().to_vec()
    }

    fn read_sheet(&mut self, name: &str) -> Result<SheetGrid, WorkbookError> {
        let range = self.sheets.worksheet_range(name)?;
        let links = self.hyperlinks(name);
        let (row_offset, col_offset) = range.start().unwrap_or((0, 0));

        let (row_count, col_count) = range.get_size();
        debug!(sheet = name, rows = row_count, columns = col_count, links = links.len(), "read sheet");

        let rows = range
            .rows()
            .enumerate()
            .map(|(r, row)| {
                row.iter()
                    .enumerate()
                    .map(|(c, value)| {
                        let at = (row_offset + r as u32, col_offset + c as u32);
                        Cell {
                            value: value.clone(),
                            hyperlink: links.get(&at).cloned(),
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(SheetGrid::new(rows))
    }
}
