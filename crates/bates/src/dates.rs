//! Source-date resolution for ledger rows.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Local, NaiveDate};
use lopdf::Document;
use regex::Regex;

use crate::pdf;

/// Picks the best available date for a source document: embedded PDF
/// metadata first, then a date written in the file name, then the file's
/// modification time. Falls back to `fallback` when none are readable.
pub fn resolve_source_date(path: &Path, doc: Option<&Document>, fallback: NaiveDate) -> NaiveDate {
    doc.and_then(pdf_metadata_date)
        .or_else(|| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(date_from_file_name)
        })
        .or_else(|| modified_date(path))
        .unwrap_or(fallback)
}

fn pdf_metadata_date(doc: &Document) -> Option<NaiveDate> {
    [b"CreationDate".as_slice(), b"ModDate".as_slice()]
        .iter()
        .filter_map(|key| pdf::info_string(doc, key))
        .find_map(|value| parse_pdf_date(&value))
}

/// Parses the date part of a PDF date string (`D:YYYYMMDDHHmmSS...`).
pub fn parse_pdf_date(value: &str) -> Option<NaiveDate> {
    let digits: String = value
        .trim()
        .trim_start_matches("D:")
        .chars()
        .take(8)
        .collect();
    if digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let year = digits.get(0..4)?.parse().ok()?;
    let month = digits.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day = digits.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, day)
}

struct FileNamePattern {
    regex: Regex,
    order: FieldOrder,
}

#[derive(Clone, Copy)]
enum FieldOrder {
    YearMonthDay,
    MonthDayYear,
}

fn file_name_patterns() -> &'static [FileNamePattern] {
    static PATTERNS: OnceLock<Vec<FileNamePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"(?:^|\D)(\d{4})[-_.](\d{2})[-_.](\d{2})(?:\D|$)", FieldOrder::YearMonthDay),
            (r"(?:^|\D)(\d{2})[-_.](\d{2})[-_.](\d{4})(?:\D|$)", FieldOrder::MonthDayYear),
            (r"(?:^|\D)(\d{4})(\d{2})(\d{2})(?:\D|$)", FieldOrder::YearMonthDay),
        ]
        .into_iter()
        .filter_map(|(pattern, order)| Regex::new(pattern).ok().map(|regex| FileNamePattern { regex, order }))
        .collect()
    })
}

/// Finds a calendar date embedded in a file name, e.g. `statement_2023-04-30.pdf`.
pub fn date_from_file_name(name: &str) -> Option<NaiveDate> {
    file_name_patterns().iter().find_map(|pattern| {
        pattern.regex.captures_iter(name).find_map(|captures| {
            let field = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
            let (year, month, day) = match pattern.order {
                FieldOrder::YearMonthDay => (field(1)?, field(2)?, field(3)?),
                FieldOrder::MonthDayYear => (field(3)?, field(1)?, field(2)?),
            };
            if !(1900..=2100).contains(&year) {
                return None;
            }
            NaiveDate::from_ymd_opt(year as i32, month, day)
        })
    })
}

fn modified_date(path: &Path) -> Option<NaiveDate> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).date_naive())
}
