use serde::Serialize;
use thiserror::Error;

use crate::error::{ConvertError, PdfError, StorageError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConvertError),

    #[error("Page count unavailable: {0}")]
    PageCount(PdfError),

    #[error("Unlock failed: {0}")]
    Locked(PdfError),

    #[error("Stamp failed: {0}")]
    Stamp(String),

    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// The five ways a file can fail, each with its quarantine reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Conversion,
    PageCount,
    Locked,
    Stamp,
    Io,
}

impl FailureKind {
    /// Text embedded in the quarantined file name.
    pub fn reason(self) -> &'static str {
        match self {
            FailureKind::Conversion => "conversion failed",
            FailureKind::PageCount => "page count unavailable",
            FailureKind::Locked | FailureKind::Stamp => "failed to apply stamp",
            FailureKind::Io => "io failure",
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Conversion(_) => FailureKind::Conversion,
            PipelineError::PageCount(_) => FailureKind::PageCount,
            PipelineError::Locked(_) => FailureKind::Locked,
            PipelineError::Stamp(_) => FailureKind::Stamp,
            PipelineError::Storage(_) => FailureKind::Io,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    /// Some, but not all, pages kept their original look without a stamp.
    UnstampedPages { pages: Vec<u32>, reason: String },
    /// The working copy came from a fallback unlock strategy.
    Unlocked { strategy: &'static str },
}
