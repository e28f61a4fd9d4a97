use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;

/// One row per file that made it through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub label: String,
    pub last_label: String,
    pub first_number: u64,
    pub source_path: PathBuf,
    pub relative_path: PathBuf,
    pub original_name: String,
    pub page_count: u32,
    pub source_date: NaiveDate,
    pub processing_date: NaiveDate,
    pub destination: PathBuf,
    /// Untouched copy of a converted original, sharing the same label.
    pub original_copy: Option<PathBuf>,
    /// 1-based page numbers that could not be stamped.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unstamped_pages: Vec<u32>,
}

/// Append-only record of a run. Rows arrive in numbering order.
#[derive(Debug, Default)]
pub struct Ledger {
    records: Vec<FileRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: FileRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_pages(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.page_count)).sum()
    }

    pub fn into_records(self) -> Vec<FileRecord> {
        self.records
    }
}

#[cfg(test)]
pub(crate) fn sample_record(label: &str, first_number: u64, pages: u32) -> FileRecord {
    let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();
    FileRecord {
        label: label.to_string(),
        last_label: label.to_string(),
        first_number,
        source_path: PathBuf::from(format!("/input/{}.pdf", label)),
        relative_path: PathBuf::from(format!("{}.pdf", label)),
        original_name: format!("{}.pdf", label),
        page_count: pages,
        source_date: date,
        processing_date: date,
        destination: PathBuf::from(format!("/run/{}_doc.pdf", label)),
        original_copy: None,
        unstamped_pages: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_totals() {
        let mut ledger = Ledger::new();
        assert!(ledger.is_empty());

        ledger.append(sample_record("ABC00001", 1, 3));
        ledger.append(sample_record("ABC00004", 4, 1));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.total_pages(), 4);
        assert_eq!(ledger.records()[1].label, "ABC00004");
    }

    #[test]
    fn test_record_serializes_dates_as_iso() {
        let json = serde_json::to_value(sample_record("X00001", 1, 1)).unwrap();
        assert_eq!(json["source_date"], "2024-03-01");
        assert!(json.get("unstamped_pages").is_none());
    }
}
