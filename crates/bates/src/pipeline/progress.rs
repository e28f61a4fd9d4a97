use tracing::{info, warn};

/// Events emitted while a production runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        file: String,
    },
    Skipped {
        file: String,
        reason: String,
    },
    Recorded {
        file: String,
        label: String,
        last_label: String,
        pages: u32,
    },
    Quarantined {
        file: String,
        reason: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// One log line per finished file.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { .. } => {}
            ProgressEvent::Skipped { file, reason } => {
                info!(file = %file, reason = %reason, "Skipped");
            }
            ProgressEvent::Recorded {
                file,
                label,
                last_label,
                pages,
            } => {
                info!(file = %file, pages, "{} - {}", label, last_label);
            }
            ProgressEvent::Quarantined { file, reason } => {
                warn!(file = %file, reason = %reason, "Moved to issues");
            }
        }
    }
}
