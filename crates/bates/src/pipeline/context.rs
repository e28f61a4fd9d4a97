use std::path::PathBuf;

use chrono::NaiveDate;
use lopdf::Document;
use serde::Serialize;

use crate::error::{ConvertError, PdfError};
use crate::ledger::FileRecord;
use crate::sequencer::Reservation;
use crate::walker::DiscoveredFile;

use super::error::{FailureKind, PipelineWarning};

/// Where a file is in `Classified → Converted → Numbered → Stamped → Recorded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Classified,
    Converted,
    Numbered,
    Stamped,
    Recorded,
    Quarantined,
}

pub struct FileContext {
    // Input
    pub file: DiscoveredFile,
    pub state: FileState,

    // Conversion done ahead of time by the worker pool, if any
    pub prefetched: Option<Result<Vec<u8>, ConvertError>>,

    // Convert step: the PDF the later steps read, and the staged copy when converted
    pub working_pdf: Option<PathBuf>,
    pub staged: Option<PathBuf>,

    // Page count step
    pub page_count: Option<u32>,
    pub source_date: Option<NaiveDate>,
    /// Working document and unlock strategy, when counting needed a password
    pub unlocked: Option<(Document, &'static str)>,
    /// Every unlock strategy failed; the pages were counted structurally
    pub locked: Option<PdfError>,

    // Reserve step
    pub reservation: Option<Reservation>,

    // Stamp step
    pub stamped_path: Option<PathBuf>,
    pub unstamped_pages: Vec<u32>,

    // Record step
    pub original_copy: Option<PathBuf>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl FileContext {
    pub fn new(file: DiscoveredFile) -> Self {
        Self {
            file,
            state: FileState::Classified,
            prefetched: None,
            working_pdf: None,
            staged: None,
            page_count: None,
            source_date: None,
            unlocked: None,
            locked: None,
            reservation: None,
            stamped_path: None,
            unstamped_pages: Vec::new(),
            original_copy: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_conversion(mut self, conversion: Result<Vec<u8>, ConvertError>) -> Self {
        self.prefetched = Some(conversion);
        self
    }
}

/// A file diverted to the issues area.
#[derive(Debug, Clone, Serialize)]
pub struct QuarantineEntry {
    pub source: PathBuf,
    pub kind: FailureKind,
    pub reason: String,
    pub detail: String,
    /// `None` when even the quarantine move failed.
    pub stored_at: Option<PathBuf>,
    /// Block that stays consumed even though the file failed.
    pub reserved_label: Option<String>,
}

#[derive(Debug, Clone)]
pub enum FileOutcome {
    Recorded(FileRecord),
    Quarantined(QuarantineEntry),
}

impl FileOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, FileOutcome::Recorded(_))
    }
}
