//! Reporting period resolution.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::SheetError;
use crate::file_type::FileType;

static MONTHLY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{4})(\d{2})(\d{2})_.*\.xlsx?$").expect("monthly date pattern should compile")
});

/// The period a sheet's rows are counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingPeriod {
    pub year: i32,
    pub month: u32,
    /// Month defaulted to December because the source only carries a year.
    pub assumed_month: bool,
    /// Always the last day of `year`/`month`.
    pub consumed_at: NaiveDate,
}

/// Resolve the period for one sheet.
///
/// Report sheets are named after their year. Monthly files carry the date in
/// the (decoration-stripped) filename; only year and month are kept.
pub fn resolve(file_type: FileType, sheet_name: &str, canonical_filename: &str) -> Result<ReportingPeriod, SheetError> {
    match file_type {
        FileType::Report => report_period(sheet_name),
        FileType::Monthly => monthly_period(canonical_filename),
    }
}

fn report_period(sheet_name: &str) -> Result<ReportingPeriod, SheetError> {
    let year: i32 = sheet_name
        .trim()
        .parse()
        .map_err(|_| SheetError::BadDate(sheet_name.to_string()))?;
    let consumed_at = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(|| SheetError::BadDate(sheet_name.to_string()))?;
    Ok(ReportingPeriod {
        year,
        month: 12,
        assumed_month: true,
        consumed_at,
    })
}

fn monthly_period(filename: &str) -> Result<ReportingPeriod, SheetError> {
    let bad = || SheetError::BadDate(filename.to_string());
    let caps = MONTHLY_DATE.captures(filename).ok_or_else(bad)?;
    let year: i32 = caps[1].parse().map_err(|_| bad())?;
    let month: u32 = caps[2].parse().map_err(|_| bad())?;
    // Day digits are informational; the period always ends on the last day of the month.
    let consumed_at = last_day_of_month(year, month).ok_or_else(bad)?;
    Ok(ReportingPeriod {
        year,
        month,
        assumed_month: false,
        consumed_at,
    })
}

/// Last calendar day of `year`/`month`, or `None` for an invalid month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(year, month, 1)?;
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sheet_year() {
        let p = resolve(FileType::Report, "2023", "report0416.xls").unwrap();
        assert_eq!(p.year, 2023);
        assert_eq!(p.month, 12);
        assert!(p.assumed_month);
        assert_eq!(p.consumed_at, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_report_sheet_name_trimmed() {
        assert_eq!(resolve(FileType::Report, " 2021 ", "report.xls").unwrap().year, 2021);
    }

    #[test]
    fn test_report_bad_sheet_name() {
        assert!(matches!(resolve(FileType::Report, "Summary", "report.xls"), Err(SheetError::BadDate(_))));
    }

    #[test]
    fn test_monthly_uses_month_end() {
        let p = resolve(FileType::Monthly, "Sheet1", "20240115_podcast_downloads.xlsx").unwrap();
        assert_eq!((p.year, p.month), (2024, 1));
        assert!(!p.assumed_month);
        assert_eq!(p.consumed_at, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_monthly_leap_february() {
        let p = resolve(FileType::Monthly, "Sheet1", "20240201_podcast_downloads.xlsx").unwrap();
        assert_eq!(p.consumed_at, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_monthly_december_rolls_year() {
        let p = resolve(FileType::Monthly, "Sheet1", "20231231_podcast_downloads.xls").unwrap();
        assert_eq!(p.consumed_at, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_monthly_invalid_month() {
        assert!(resolve(FileType::Monthly, "Sheet1", "20241301_podcast_downloads.xlsx").is_err());
    }

    #[test]
    fn test_monthly_ignores_sheet_name() {
        let p = resolve(FileType::Monthly, "1999", "20240610_podcast_downloads.xlsx").unwrap();
        assert_eq!((p.year, p.month), (2024, 6));
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2023, 2), NaiveDate::from_ymd_opt(2023, 2, 28));
        assert_eq!(last_day_of_month(2023, 4), NaiveDate::from_ymd_opt(2023, 4, 30));
        assert_eq!(last_day_of_month(2023, 0), None);
    }
}
