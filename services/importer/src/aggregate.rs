//! Row aggregation: collapse rows describing the same download in one sheet.
//!
//! Export tools list the same episode several times under slightly different
//! URLs (absolute vs. relative, re-uploads, renamed files). Rows are grouped
//! by `(code, feature, normalized title, year, month)`; counts and bandwidth
//! are summed, and the longest title / URL variant becomes canonical.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use calamine::Data;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::columns::MappedRow;
use crate::error::RowError;
use crate::metadata::{self, strip_audio_extension};
use crate::period::ReportingPeriod;
use crate::record::{equivalent_full, DownloadRecord};

const NO_CODE: &str = "_NO_CODE_";
const NO_FEATURE: &str = "_NO_FEATURE_";
const EMPTY_TITLE: &str = "_EMPTY_TITLE_";
const PROCESSED_EMPTY_TITLE: &str = "_PROCESSED_EMPTY_TITLE_";

/// Title prefixes that mark the same episode in another packaging.
const TITLE_PREFIXES: [&str; 3] = ["id_", "iv_", "sp_"];

/// Words of the title that take part in the grouping key.
const TITLE_KEY_WORDS: usize = 2;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("non-alphanumeric pattern should compile"));

/// Grouping key for one merged download.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub code: String,
    pub feature: String,
    pub title_key: String,
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}-{:02}",
            self.code, self.feature, self.title_key, self.year, self.month
        )
    }
}

/// Grouping form of a title: lower-case, one marketing prefix removed,
/// punctuation collapsed, first two words joined.
pub fn normalize_title_key(title: &str) -> String {
    if title.is_empty() {
        return EMPTY_TITLE.to_string();
    }

    let lower = title.to_lowercase();
    let stripped = TITLE_PREFIXES
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(lower.as_str());

    let spaced = NON_ALPHANUMERIC.replace_all(stripped, " ");
    let key: String = spaced.split_whitespace().take(TITLE_KEY_WORDS).collect();

    if key.is_empty() {
        PROCESSED_EMPTY_TITLE.to_string()
    } else {
        key
    }
}

/// Count columns: a plain number; empty counts as zero.
pub fn parse_count(field: &'static str, value: &Data) -> Result<f64, RowError> {
    let number = match value {
        Data::String(s) if s.trim().is_empty() => 0.0,
        Data::String(s) => parse_text(field, s.trim())?,
        other => parse_cell(field, other)?,
    };
    check_non_negative(field, number)
}

/// Bandwidth columns, in megabytes. Text such as `"12.5 MB"` or `"1.2 GB"`
/// is accepted; gigabytes are converted at 1024 MB.
pub fn parse_megabytes(field: &'static str, value: &Data) -> Result<f64, RowError> {
    let number = match value {
        Data::String(s) => {
            let upper = s.to_uppercase().replace("MB", "");
            let upper = upper.trim();
            if upper.is_empty() {
                0.0
            } else if upper.contains("GB") {
                parse_text(field, upper.replace("GB", "").trim())? * 1024.0
            } else {
                parse_text(field, upper)?
            }
        }
        other => parse_cell(field, other)?,
    };
    check_non_negative(field, number)
}

fn parse_cell(field: &'static str, value: &Data) -> Result<f64, RowError> {
    match value {
        Data::Empty => Ok(0.0),
        Data::Float(f) => Ok(*f),
        Data::Int(i) => Ok(*i as f64),
        other => Err(RowError::NonNumeric {
            field,
            value: other.to_string(),
        }),
    }
}

fn parse_text(field: &'static str, text: &str) -> Result<f64, RowError> {
    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| RowError::NonNumeric {
            field,
            value: text.to_string(),
        })
}

fn check_non_negative(field: &'static str, value: f64) -> Result<f64, RowError> {
    if value < 0.0 {
        Err(RowError::Negative { field, value })
    } else {
        Ok(value)
    }
}

/// Running state of one group.
#[derive(Debug, Clone)]
struct Group {
    urls: Vec<String>,
    titles: Vec<String>,
    code: Option<String>,
    feature: Option<String>,
    created_at: Option<NaiveDate>,
    full: f64,
    partial: f64,
    total_bw: f64,
    rows: usize,
}

/// A finalized group, ready to become a record.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedGroup {
    pub key: GroupKey,
    pub url: String,
    pub title: String,
    pub code: Option<String>,
    pub feature: Option<String>,
    pub created_at: Option<NaiveDate>,
    pub full: f64,
    pub partial: f64,
    pub total_bw: f64,
    pub avg_bw: Option<f64>,
    pub eq_full: i64,
    /// Source rows folded into this group.
    pub rows: usize,
}

impl MergedGroup {
    pub fn into_record(
        self,
        period: &ReportingPeriod,
        imported_at: DateTime<Utc>,
        source_file_path: &str,
    ) -> DownloadRecord {
        DownloadRecord {
            url: self.url,
            title: self.title,
            code: self.code,
            feature: self.feature,
            full: self.full,
            partial: self.partial,
            avg_bw: self.avg_bw,
            total_bw: self.total_bw,
            eq_full: self.eq_full,
            created_at: self.created_at,
            consumed_at: period.consumed_at,
            consumed_year: period.year,
            consumed_month: period.month as i32,
            assumed_month: period.assumed_month,
            imported_at,
            source_file_path: source_file_path.to_string(),
        }
    }
}

/// A group that merged differing title or URL variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub key: GroupKey,
    /// Distinct variants in first-seen order.
    pub titles: Vec<String>,
    pub urls: Vec<String>,
    pub canonical_title: String,
    pub canonical_url: String,
}

/// Outcome of aggregating one sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetAggregate {
    pub groups: Vec<MergedGroup>,
    pub reconciliations: Vec<Reconciliation>,
    /// Rows beyond the first in each group.
    pub merged_rows: usize,
}

/// Folds mapped rows of one sheet into groups.
pub struct SheetAggregator {
    year: i32,
    month: u32,
    groups: BTreeMap<GroupKey, Group>,
}

impl SheetAggregator {
    pub fn new(period: &ReportingPeriod) -> Self {
        Self {
            year: period.year,
            month: period.month,
            groups: BTreeMap::new(),
        }
    }

    /// Add one row. A failing row leaves the groups untouched.
    pub fn fold(&mut self, row: &MappedRow) -> Result<(), RowError> {
        let url = row.url.trim();
        if url.is_empty() {
            return Err(RowError::MissingUrl);
        }

        let full = parse_count("full", &row.full)?;
        let partial = parse_count("partial", &row.partial)?;
        let total_bw = parse_megabytes("total_bw", &row.total_bw)?;

        let meta = metadata::extract(url);
        let key = GroupKey {
            code: meta.code.clone().unwrap_or_else(|| NO_CODE.to_string()),
            feature: meta.feature.clone().unwrap_or_else(|| NO_FEATURE.to_string()),
            title_key: normalize_title_key(&meta.title),
            year: self.year,
            month: self.month,
        };

        let group = self.groups.entry(key).or_insert_with(|| Group {
            urls: Vec::new(),
            titles: Vec::new(),
            code: meta.code,
            feature: meta.feature,
            created_at: meta.created_at,
            full: 0.0,
            partial: 0.0,
            total_bw: 0.0,
            rows: 0,
        });
        group.urls.push(url.to_string());
        group.titles.push(meta.title);
        group.full += full;
        group.partial += partial;
        group.total_bw += total_bw;
        group.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> SheetAggregate {
        let mut out = SheetAggregate::default();

        for (key, group) in self.groups {
            out.merged_rows += group.rows.saturating_sub(1);

            let canonical_url = longest(&group.urls);
            let canonical_title = strip_audio_extension(&longest(&group.titles)).to_string();

            let titles = distinct(&group.titles);
            let urls = distinct(&group.urls);
            if titles.len() > 1 || urls.len() > 1 {
                out.reconciliations.push(Reconciliation {
                    key: key.clone(),
                    titles,
                    urls,
                    canonical_title: canonical_title.clone(),
                    canonical_url: canonical_url.clone(),
                });
            }

            let downloads = group.full + group.partial;
            out.groups.push(MergedGroup {
                key,
                url: canonical_url,
                title: canonical_title,
                code: group.code,
                feature: group.feature,
                created_at: group.created_at,
                full: group.full,
                partial: group.partial,
                total_bw: group.total_bw,
                avg_bw: (downloads > 0.0).then(|| group.total_bw / downloads),
                eq_full: equivalent_full(group.full, group.partial),
                rows: group.rows,
            });
        }

        out
    }
}

/// Longest by character count; the first seen wins ties.
fn longest(values: &[String]) -> String {
    let mut best: Option<&String> = None;
    for value in values {
        if best.map_or(true, |b| value.chars().count() > b.chars().count()) {
            best = Some(value);
        }
    }
    best.cloned().unwrap_or_default()
}

fn distinct(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(value) {
            out.push(value.clone());
        }
    }
    out
}
