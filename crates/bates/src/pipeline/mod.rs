pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use context::{FileContext, FileOutcome, FileState, QuarantineEntry};
pub use error::{FailureKind, PipelineError, PipelineWarning};
pub use progress::{LogProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::Pipeline;
