//! Subscriber setup for the `bates` binary.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub struct LoggingOptions<'a> {
    pub verbose: bool,
    pub json: bool,
    /// Processing log inside the run directory, when the run has one.
    pub log_file: Option<&'a Path>,
}

pub fn init(options: LoggingOptions<'_>) -> anyhow::Result<()> {
    let filter = if options.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let console_json = options
        .json
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let console_text = (!options.json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let file_layer = match options.log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    // Walker and conversion pool log through the `log` facade.
    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    Ok(())
}
