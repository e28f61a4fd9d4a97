//! One production run from walk to merged PDF.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::config::ProductionJob;
use crate::convert::ConverterRegistry;
use crate::error::{BatesError, StorageError};
use crate::ledger::FileRecord;
use crate::merge;
use crate::pipeline::{FileContext, FileOutcome, Pipeline, ProgressEvent, ProgressReporter};
use crate::report;
use crate::storage::ISSUES_DIR_NAME;
use crate::unlock::Unlocker;
use crate::walker::{DiscoveredFile, FileClass, FileWalker};
use crate::worker::{ConversionTask, OrderedConversions};

pub use crate::pipeline::QuarantineEntry;

/// Where a run writes its output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLayout {
    pub run_directory: PathBuf,
    pub issues_directory: PathBuf,
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub merged_path: Option<PathBuf>,
}

impl RunLayout {
    /// Directory runs get `BATES_{prefix}_{YYYYmmdd_HHMMSS}` under the output
    /// root; single-file runs write straight into the output root.
    pub fn for_job(job: &ProductionJob, now: DateTime<Local>) -> Self {
        if job.is_single_file() {
            let run_directory = job.output_root.clone();
            return Self {
                issues_directory: run_directory.join(ISSUES_DIR_NAME),
                run_directory,
                log_path: None,
                report_path: None,
                merged_path: None,
            };
        }

        let base = format!("BATES_{}_{}", job.prefix, now.format("%Y%m%d_%H%M%S"));
        let mut name = base.clone();
        let mut counter = 2;
        while job.output_root.join(&name).exists() {
            name = format!("{}_{}", base, counter);
            counter += 1;
        }

        let run_directory = job.output_root.join(&name);
        Self {
            issues_directory: run_directory.join(ISSUES_DIR_NAME),
            log_path: Some(run_directory.join(format!("{}_processing.log", base))),
            report_path: Some(run_directory.join(report::REPORT_FILE_NAME)),
            merged_path: Some(run_directory.join(merge::merged_file_name(&job.prefix))),
            run_directory,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_directory: PathBuf,
    pub files_seen: usize,
    /// Unsupported files, relative to the input root.
    pub skipped: Vec<PathBuf>,
    pub recorded: usize,
    pub quarantined: Vec<QuarantineEntry>,
    pub total_pages: u64,
    pub first_label: Option<String>,
    pub last_label: Option<String>,
    /// First number the next run should start from to continue this one.
    pub next_number: u64,
    /// Every number handed out, including blocks of files that later failed.
    pub numbers_issued: u64,
    pub records: Vec<FileRecord>,
    pub report_path: Option<PathBuf>,
    pub merged_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

pub struct Production {
    job: Arc<ProductionJob>,
    unlocker: Option<Unlocker>,
    converters: Option<Arc<ConverterRegistry>>,
}

impl Production {
    /// Only an invalid job is rejected here; per-file problems never are.
    pub fn new(job: ProductionJob) -> Result<Self, BatesError> {
        job.validate()?;
        Ok(Self {
            job: Arc::new(job),
            unlocker: None,
            converters: None,
        })
    }

    pub fn with_unlocker(mut self, unlocker: Unlocker) -> Self {
        self.unlocker = Some(unlocker);
        self
    }

    pub fn with_converters(mut self, converters: Arc<ConverterRegistry>) -> Self {
        self.converters = Some(converters);
        self
    }

    pub fn job(&self) -> &ProductionJob {
        &self.job
    }

    pub fn layout(&self, now: DateTime<Local>) -> RunLayout {
        RunLayout::for_job(&self.job, now)
    }

    pub fn run(self, progress: &dyn ProgressReporter) -> Result<RunSummary, BatesError> {
        let layout = self.layout(Local::now());
        self.run_with_layout(layout, progress)
    }

    pub fn run_with_layout(
        mut self,
        layout: RunLayout,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, BatesError> {
        let _span = info_span!(
            "production",
            prefix = %self.job.prefix,
            run = %crate::sanitize::redact_path(&layout.run_directory)
        )
        .entered();

        std::fs::create_dir_all(&layout.run_directory).map_err(|e| {
            StorageError::CreateDirectory {
                path: layout.run_directory.clone(),
                source: e,
            }
        })?;

        let discovered = self.discover()?;
        let files_seen = discovered.len();

        let mut skipped = Vec::new();
        let mut files = Vec::with_capacity(files_seen);
        for file in discovered {
            if file.class == FileClass::Unsupported {
                progress.report(ProgressEvent::Skipped {
                    file: file.relative.display().to_string(),
                    reason: "unsupported file type".to_string(),
                });
                skipped.push(file.relative);
            } else {
                files.push(file);
            }
        }

        let today = Local::now().date_naive();
        let mut pipeline = Pipeline::from_job(Arc::clone(&self.job), &layout.run_directory, today);
        if let Some(unlocker) = self.unlocker.take() {
            pipeline = pipeline.with_unlocker(unlocker);
        }
        if let Some(converters) = self.converters.take() {
            pipeline = pipeline.with_converters(converters);
        }

        let mut conversions = self.start_conversions(&pipeline, &files);

        let mut quarantined = Vec::new();
        for (index, file) in files.into_iter().enumerate() {
            let mut ctx = FileContext::new(file);

            if ctx.file.class.route().is_some() {
                let taken = conversions.as_mut().map(|pool| pool.take(index));
                match taken {
                    Some(Ok(conversion)) => ctx = ctx.with_conversion(conversion),
                    Some(Err(e)) => {
                        warn!(error = %e, "Conversion pool stopped, converting inline");
                        if let Some(pool) = conversions.take() {
                            pool.finish();
                        }
                    }
                    None => {}
                }
            }

            if let (FileOutcome::Quarantined(entry), _) = pipeline.run(ctx, progress) {
                quarantined.push(entry);
            }
        }

        if let Some(pool) = conversions {
            pool.finish();
        }

        let (ledger, sequencer) = pipeline.into_parts();

        let report_path = match (&layout.report_path, self.job.build_report) {
            (Some(path), true) => match report::write_report(ledger.records(), path) {
                Ok(()) => Some(path.clone()),
                Err(e) => {
                    error!(error = %e, "Report could not be written");
                    None
                }
            },
            _ => None,
        };

        let merged_path = match (&layout.merged_path, self.job.build_merge) {
            (Some(path), true) => {
                match merge::build_merged_pdf(
                    &layout.run_directory,
                    &self.job.prefix,
                    &layout.issues_directory,
                    path,
                ) {
                    Ok(summary) => summary.map(|s| s.path),
                    Err(e) => {
                        error!(error = %e, "Merged PDF could not be written");
                        None
                    }
                }
            }
            _ => None,
        };

        let records = ledger.into_records();
        let summary = RunSummary {
            run_directory: layout.run_directory.clone(),
            files_seen,
            skipped,
            recorded: records.len(),
            quarantined,
            total_pages: records.iter().map(|r| u64::from(r.page_count)).sum(),
            first_label: records.first().map(|r| r.label.clone()),
            last_label: records.last().map(|r| r.last_label.clone()),
            next_number: sequencer.current_number(),
            numbers_issued: sequencer.issued(),
            records,
            report_path,
            merged_path,
            log_path: layout.log_path.clone(),
        };

        info!(
            recorded = summary.recorded,
            quarantined = summary.quarantined.len(),
            skipped = summary.skipped.len(),
            pages = summary.total_pages,
            "Production complete"
        );
        Ok(summary)
    }

    fn discover(&self) -> Result<Vec<DiscoveredFile>, BatesError> {
        if self.job.is_single_file() {
            return Ok(vec![DiscoveredFile::single(&self.job.input)]);
        }

        let files = FileWalker::new(&self.job.input)
            .excluding(&self.job.output_root)
            .enumerate()?;
        Ok(files)
    }

    fn start_conversions(
        &self,
        pipeline: &Pipeline,
        files: &[DiscoveredFile],
    ) -> Option<OrderedConversions> {
        if self.job.workers <= 1 {
            return None;
        }

        let tasks: Vec<ConversionTask> = files
            .iter()
            .enumerate()
            .filter_map(|(index, file)| match file.class {
                FileClass::Convertible(route) => Some(ConversionTask {
                    index,
                    route,
                    path: file.path.clone(),
                }),
                _ => None,
            })
            .collect();
        if tasks.is_empty() {
            return None;
        }

        match OrderedConversions::start(pipeline.converters(), self.job.workers, tasks) {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!(error = %e, "Could not start conversion workers, converting inline");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap()
    }

    #[test]
    fn test_directory_layout() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        let job = ProductionJob::new(&input, temp_dir.path().join("out")).with_prefix("ACME_");

        let layout = RunLayout::for_job(&job, fixed_time());
        let run = temp_dir.path().join("out/BATES_ACME_20240203_040506");
        assert_eq!(layout.run_directory, run);
        assert_eq!(layout.issues_directory, run.join("_FILES WITH ISSUES"));
        assert_eq!(layout.report_path, Some(run.join("bates_report.xlsx")));
        assert_eq!(layout.merged_path, Some(run.join("ACME_combined.pdf")));
        assert_eq!(
            layout.log_path,
            Some(run.join("BATES_ACME_20240203_040506_processing.log"))
        );
    }

    #[test]
    fn test_existing_run_directory_gets_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        let out = temp_dir.path().join("out");
        std::fs::create_dir_all(out.join("BATES_X_20240203_040506")).unwrap();
        let job = ProductionJob::new(&input, &out).with_prefix("X");

        let layout = RunLayout::for_job(&job, fixed_time());
        assert_eq!(layout.run_directory, out.join("BATES_X_20240203_040506_2"));
    }

    #[test]
    fn test_single_file_layout_has_no_extras() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("one.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        let job = ProductionJob::new(&file, temp_dir.path().join("out"));

        let layout = RunLayout::for_job(&job, fixed_time());
        assert_eq!(layout.run_directory, temp_dir.path().join("out"));
        assert!(layout.report_path.is_none());
        assert!(layout.merged_path.is_none());
        assert!(layout.log_path.is_none());
    }

    #[test]
    fn test_invalid_job_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut job = ProductionJob::new(temp_dir.path(), temp_dir.path().join("out"));
        job.zero_pad = 0;
        assert!(matches!(Production::new(job), Err(BatesError::Config(_))));
    }
}
