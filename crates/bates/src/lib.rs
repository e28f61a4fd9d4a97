pub mod config;
pub mod convert;
pub mod dates;
pub mod error;
pub mod ledger;
pub mod merge;
pub mod pdf;
pub mod pipeline;
pub mod production;
pub mod render;
pub mod report;
pub mod sanitize;
pub mod sequencer;
pub mod stamp;
pub mod storage;
pub mod unlock;
pub mod walker;
pub mod worker;

pub use config::{ProductionJob, StampColor, StampPosition, StampStyle};
pub use error::{
    BatesError, ConfigError, ConvertError, MergeError, PdfError, ReportError, Result, StampError,
    StorageError, WalkError, WorkerError,
};
pub use ledger::{FileRecord, Ledger};
pub use pipeline::{FailureKind, Pipeline, PipelineError};
pub use production::{Production, QuarantineEntry, RunLayout, RunSummary};
pub use sequencer::{BatesSequencer, LabelFormat, Reservation};
pub use walker::{ConversionRoute, DiscoveredFile, FileClass, FileWalker};
