//! Producing an unlocked working copy of a PDF before stamping.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use lopdf::Document;
use tracing::{debug, info, warn};

use crate::convert::external::run_bounded;
use crate::error::PdfError;
use crate::pdf;
use crate::sanitize::redact_path;

pub trait UnlockStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn unlock(&self, path: &Path) -> Result<Document, PdfError>;
}

/// Opens the file directly, removing owner-password security when the user
/// password is empty.
pub struct OpenUnlocked;

impl UnlockStrategy for OpenUnlocked {
    fn name(&self) -> &'static str {
        "open-unlocked"
    }

    fn unlock(&self, path: &Path) -> Result<Document, PdfError> {
        // lopdf decrypts on load whenever the empty user password works.
        let doc = pdf::load(path)?;
        if pdf::requires_password(&doc) {
            return Err(PdfError::Open {
                path: path.to_path_buf(),
                message: "a user password is required".to_string(),
            });
        }
        if doc.was_encrypted() {
            debug!(file = %redact_path(path), "Removed PDF security");
        }
        Ok(doc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReprintTool {
    /// macOS print system filter; writes the PDF to stdout.
    Cupsfilter,
    /// `qpdf --decrypt in out`.
    Qpdf,
}

/// Re-prints the file through a platform tool, which drops security but
/// keeps the page content.
pub struct ExternalReprint {
    tool: ReprintTool,
    program: String,
    timeout: Duration,
}

impl ExternalReprint {
    pub fn new(tool: ReprintTool, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            tool,
            program: program.into(),
            timeout,
        }
    }

    pub fn for_platform(timeout: Duration) -> Self {
        if cfg!(target_os = "macos") {
            Self::new(ReprintTool::Cupsfilter, "cupsfilter", timeout)
        } else {
            Self::new(ReprintTool::Qpdf, "qpdf", timeout)
        }
    }

    fn failure(&self, path: &Path, message: impl std::fmt::Display) -> PdfError {
        PdfError::Open {
            path: path.to_path_buf(),
            message: format!("{}: {}", self.program, message),
        }
    }
}

impl UnlockStrategy for ExternalReprint {
    fn name(&self) -> &'static str {
        "external-reprint"
    }

    fn unlock(&self, path: &Path) -> Result<Document, PdfError> {
        let work_dir = tempfile::tempdir().map_err(|e| self.failure(path, e))?;
        let output = work_dir.path().join("reprinted.pdf");

        let mut command = Command::new(&self.program);
        match self.tool {
            ReprintTool::Cupsfilter => {
                let sink = File::create(&output).map_err(|e| self.failure(path, e))?;
                command.arg(path).stdout(Stdio::from(sink));
            }
            ReprintTool::Qpdf => {
                command
                    .arg("--decrypt")
                    .arg(path)
                    .arg(&output)
                    .stdout(Stdio::null());
            }
        }

        run_bounded(&mut command, self.timeout).map_err(|e| self.failure(path, e))?;
        pdf::load(&output)
    }
}

/// Tries each strategy in order until one yields a loadable document.
pub struct Unlocker {
    strategies: Vec<Box<dyn UnlockStrategy>>,
}

impl Unlocker {
    pub fn platform_default(timeout: Duration) -> Self {
        Self::with_strategies(vec![
            Box::new(OpenUnlocked),
            Box::new(ExternalReprint::for_platform(timeout)),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn UnlockStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the working document and the name of the strategy that
    /// produced it.
    pub fn unlock(&self, path: &Path) -> Result<(Document, &'static str), PdfError> {
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            match strategy.unlock(path) {
                Ok(doc) => {
                    if !attempts.is_empty() {
                        info!(file = %redact_path(path), strategy = strategy.name(), "Unlocked PDF with fallback");
                    }
                    return Ok((doc, strategy.name()));
                }
                Err(e) => {
                    warn!(file = %redact_path(path), strategy = strategy.name(), error = %e, "Unlock strategy failed");
                    attempts.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        Err(PdfError::Locked {
            path: path.to_path_buf(),
            attempts: if attempts.is_empty() {
                "no unlock strategy configured".to_string()
            } else {
                attempts.join("; ")
            },
        })
    }
}
