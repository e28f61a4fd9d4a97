use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ConvertError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `command` to completion, killing it once `timeout` has elapsed.
/// A non-zero exit status is an error.
pub fn run_bounded(command: &mut Command, timeout: Duration) -> Result<(), ConvertError> {
    let program = command.get_program().to_string_lossy().into_owned();

    let mut child = command
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ConvertError::External {
            program: program.clone(),
            message: e.to_string(),
        })?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                debug!(program = %program, elapsed_ms = started.elapsed().as_millis() as u64, "External command finished");
                return Ok(());
            }
            Ok(Some(status)) => {
                return Err(ConvertError::External {
                    program,
                    message: format!("exited with {}", status),
                });
            }
            Ok(None) if started.elapsed() >= timeout => {
                warn!(program = %program, "External command timed out, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConvertError::Timeout {
                    program,
                    seconds: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                return Err(ConvertError::External {
                    program,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Headless office-suite conversion (`soffice --headless --convert-to pdf`).
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    program: String,
    timeout: Duration,
}

impl OfficeConverter {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Converts `input` and returns the PDF bytes. The office suite writes
    /// into a private temp directory that is removed afterwards.
    pub fn convert(&self, input: &Path) -> Result<Vec<u8>, ConvertError> {
        let out_dir = tempfile::tempdir().map_err(|e| ConvertError::External {
            program: self.program.clone(),
            message: format!("cannot create temp dir: {}", e),
        })?;

        let mut command = Command::new(&self.program);
        command
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir.path())
            .arg(input)
            .stdout(Stdio::null());
        run_bounded(&mut command, self.timeout)?;

        let produced = expected_output(out_dir.path(), input);
        std::fs::read(&produced).map_err(|e| ConvertError::External {
            program: self.program.clone(),
            message: format!("no PDF produced at '{}': {}", produced.display(), e),
        })
    }
}

fn expected_output(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    out_dir.join(format!("{}.pdf", stem))
}
