//! Hyperlink targets for `.xlsx` sheets.
//!
//! calamine exposes cell values only. The URL column of the download exports
//! often shows a shortened label while the real asset URL lives in the cell's
//! hyperlink, so we read the hyperlink table straight from the OOXML package:
//!
//!   xl/workbook.xml                       sheet name -> relationship id
//!   xl/_rels/workbook.xml.rels            relationship id -> sheet part
//!   xl/worksheets/sheetN.xml              <hyperlink ref="A2" r:id="rId1"/>
//!   xl/worksheets/_rels/sheetN.xml.rels   relationship id -> external target

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::WorkbookError;

/// Absolute (row, column), both zero-based -> hyperlink target.
pub type HyperlinkMap = HashMap<(u32, u32), String>;

static SHEET_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?sheet\b[^>]*>").expect("sheet tag pattern should compile"));

static RELATIONSHIP_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?Relationship\b[^>]*>").expect("relationship tag pattern should compile")
});

static HYPERLINK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\w+:)?hyperlink\b[^>]*>").expect("hyperlink tag pattern should compile"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w:]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attribute pattern should compile")
});

static CELL_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)$").expect("cell reference pattern should compile"));

/// Read the hyperlink table of one sheet of an `.xlsx` package.
///
/// A sheet without hyperlinks (or without a relationships part) yields an
/// empty map; only a broken package is an error.
pub fn read_sheet_hyperlinks(path: &Path, sheet_name: &str) -> Result<HyperlinkMap, WorkbookError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let workbook = read_part(&mut archive, "xl/workbook.xml")?.ok_or(ZipError::FileNotFound)?;
    let workbook_rels = read_part(&mut archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();

    let Some(rel_id) = sheet_relationship_id(&workbook, sheet_name) else {
        return Err(WorkbookError::SheetNotFound(sheet_name.to_string()));
    };
    let Some(target) = parse_relationships(&workbook_rels).remove(&rel_id) else {
        return Ok(HyperlinkMap::new());
    };

    let sheet_part = resolve_part("xl", &target);
    let Some(sheet_xml) = read_part(&mut archive, &sheet_part)? else {
        return Ok(HyperlinkMap::new());
    };
    let sheet_rels = read_part(&mut archive, &relationships_part(&sheet_part))?.unwrap_or_default();

    Ok(parse_hyperlinks(&sheet_xml, &parse_relationships(&sheet_rels)))
}

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, WorkbookError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(Some(content))
}

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(tag)
        .map(|caps| {
            let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            (caps[1].to_string(), unescape(value))
        })
        .collect()
}

/// The `r:id` style attribute, whatever the namespace prefix is.
fn relationship_attr(attrs: &HashMap<String, String>) -> Option<String> {
    attrs
        .iter()
        .find(|(key, _)| key.ends_with(":id"))
        .map(|(_, value)| value.clone())
}

fn sheet_relationship_id(workbook_xml: &str, sheet_name: &str) -> Option<String> {
    SHEET_TAG.find_iter(workbook_xml).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        if attrs.get("name").map(String::as_str) == Some(sheet_name) {
            relationship_attr(&attrs)
        } else {
            None
        }
    })
}

/// Relationship `Id` -> `Target`.
pub fn parse_relationships(rels_xml: &str) -> HashMap<String, String> {
    RELATIONSHIP_TAG
        .find_iter(rels_xml)
        .filter_map(|tag| {
            let mut attrs = attributes(tag.as_str());
            Some((attrs.remove("Id")?, attrs.remove("Target")?))
        })
        .collect()
}

/// Hyperlink cells of a sheet part, resolved through its relationships.
/// Internal links (`location=` only) carry no target and are skipped.
pub fn parse_hyperlinks(sheet_xml: &str, relationships: &HashMap<String, String>) -> HyperlinkMap {
    let mut links = HyperlinkMap::new();
    for tag in HYPERLINK_TAG.find_iter(sheet_xml) {
        let attrs = attributes(tag.as_str());
        let (Some(cell_range), Some(rel_id)) = (attrs.get("ref"), relationship_attr(&attrs)) else {
            continue;
        };
        let Some(target) = relationships.get(&rel_id) else {
            continue;
        };
        for cell in expand_range(cell_range) {
            links.insert(cell, target.clone());
        }
    }
    links
}

/// `B12` -> (11, 1).
pub fn parse_cell_ref(cell: &str) -> Option<(u32, u32)> {
    let caps = CELL_REF.captures(cell.trim())?;
    let col = caps[1]
        .to_ascii_uppercase()
        .bytes()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
    let row: u32 = caps[2].parse().ok()?;
    Some((row.checked_sub(1)?, col - 1))
}

/// `A2:B3` -> every cell in the rectangle; a single reference -> itself.
fn expand_range(range: &str) -> Vec<(u32, u32)> {
    let mut parts = range.split(':');
    let Some(start) = parts.next().and_then(parse_cell_ref) else {
        return Vec::new();
    };
    let end = parts.next().and_then(parse_cell_ref).unwrap_or(start);
    let mut cells = Vec::new();
    for row in start.0.min(end.0)..=start.0.max(end.0) {
        for col in start.1.min(end.1)..=start.1.max(end.1) {
            cells.push((row, col));
        }
    }
    cells
}

/// Relationship targets are relative to the directory of the source part,
/// or to the package root when they start with `/`.
fn resolve_part(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("{base_dir}/{target}"),
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`.
fn relationships_part(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="2022" sheetId="1" r:id="rId1"/>
    <sheet name="Q&amp;A" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#;

    const SHEET_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/wp-content/uploads/2022/01/A001-Show.mp3?a=1&amp;b=2" TargetMode="External"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/other.mp3" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn test_sheet_relationship_id() {
        assert_eq!(sheet_relationship_id(WORKBOOK, "2022").as_deref(), Some("rId1"));
        assert_eq!(sheet_relationship_id(WORKBOOK, "Q&A").as_deref(), Some("rId2"));
        assert_eq!(sheet_relationship_id(WORKBOOK, "2023"), None);
    }

    #[test]
    fn test_parse_relationships_unescapes_targets() {
        let rels = parse_relationships(SHEET_RELS);
        assert_eq!(
            rels["rId1"],
            "https://example.com/wp-content/uploads/2022/01/A001-Show.mp3?a=1&b=2"
        );
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn test_parse_hyperlinks() {
        let sheet = r#"<worksheet><sheetData/><hyperlinks>
            <hyperlink ref="A2" r:id="rId1"/>
            <hyperlink ref="A3:A4" r:id="rId2" display="other"/>
            <hyperlink ref="B2" location="'2022'!A1"/>
        </hyperlinks></worksheet>"#;
        let links = parse_hyperlinks(sheet, &parse_relationships(SHEET_RELS));
        assert_eq!(links.len(), 3);
        assert!(links[&(1, 0)].ends_with("A001-Show.mp3?a=1&b=2"));
        assert_eq!(links[&(2, 0)], "https://example.com/other.mp3");
        assert_eq!(links[&(3, 0)], "https://example.com/other.mp3");
        assert!(!links.contains_key(&(1, 1)));
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B12"), Some((11, 1)));
        assert_eq!(parse_cell_ref("AA3"), Some((2, 26)));
        assert_eq!(parse_cell_ref("$C$5"), Some((4, 2)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("12"), None);
    }

    #[test]
    fn test_resolve_part() {
        assert_eq!(resolve_part("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_part("xl", "/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_part("xl", "../xl/worksheets/sheet3.xml"), "xl/worksheets/sheet3.xml");
        assert_eq!(relationships_part("xl/worksheets/sheet1.xml"), "xl/worksheets/_rels/sheet1.xml.rels");
    }
}
