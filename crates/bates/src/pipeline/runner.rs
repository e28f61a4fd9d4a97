use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use lopdf::Document;
use tracing::{debug, error, info_span, warn};

use crate::config::ProductionJob;
use crate::convert::ConverterRegistry;
use crate::dates;
use crate::error::ConvertError;
use crate::ledger::{FileRecord, Ledger};
use crate::pdf;
use crate::sanitize;
use crate::sequencer::{BatesSequencer, LabelFormat};
use crate::stamp::{Compositor, PageStamp};
use crate::storage::ProductionStorage;
use crate::unlock::Unlocker;
use crate::walker::FileClass;

use super::context::{FileContext, FileOutcome, FileState, QuarantineEntry};
use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressEvent, ProgressReporter};

/// Carries one file at a time from classification to a ledger row or the
/// issues area. Owns the sequencer and the ledger for the whole run.
pub struct Pipeline {
    job: Arc<ProductionJob>,
    converters: Arc<ConverterRegistry>,
    unlocker: Unlocker,
    compositor: Compositor,
    storage: ProductionStorage,
    sequencer: BatesSequencer,
    ledger: Ledger,
    processing_date: NaiveDate,
}

impl Pipeline {
    /// Production constructor — builds all sub-components from the job.
    pub fn from_job(
        job: Arc<ProductionJob>,
        run_directory: impl Into<PathBuf>,
        processing_date: NaiveDate,
    ) -> Self {
        let timeout = job.converter_timeout();
        let converters = Arc::new(ConverterRegistry::new(&job.office_command, timeout));
        let unlocker = Unlocker::platform_default(timeout);
        let compositor = Compositor::new(job.style.clone());
        let storage = ProductionStorage::new(run_directory.into());
        let sequencer = BatesSequencer::new(LabelFormat::new(&job.prefix, job.zero_pad), job.start);

        Self {
            job,
            converters,
            unlocker,
            compositor,
            storage,
            sequencer,
            ledger: Ledger::new(),
            processing_date,
        }
    }

    pub fn with_unlocker(mut self, unlocker: Unlocker) -> Self {
        self.unlocker = unlocker;
        self
    }

    pub fn with_converters(mut self, converters: Arc<ConverterRegistry>) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = compositor;
        self
    }

    pub fn job(&self) -> &ProductionJob {
        &self.job
    }

    /// Shared with the conversion pool so both convert the same way.
    pub fn converters(&self) -> Arc<ConverterRegistry> {
        Arc::clone(&self.converters)
    }

    pub fn storage(&self) -> &ProductionStorage {
        &self.storage
    }

    pub fn sequencer(&self) -> &BatesSequencer {
        &self.sequencer
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn into_parts(self) -> (Ledger, BatesSequencer) {
        (self.ledger, self.sequencer)
    }

    /// Run every step for a single file. Any step error diverts the file to
    /// the issues area; nothing here aborts the run.
    pub fn run(
        &mut self,
        mut ctx: FileContext,
        progress: &dyn ProgressReporter,
    ) -> (FileOutcome, FileContext) {
        let filename = sanitize::redact_path(&ctx.file.path);
        let _pipeline_span = info_span!("pipeline",
            filename = %filename,
            class = ?ctx.file.class,
        )
        .entered();

        progress.report(ProgressEvent::Started {
            file: display_name(&ctx),
        });

        // Step 1: Convert to PDF (skipped for native PDFs)
        {
            let _step = info_span!("convert").entered();
            if let Err(e) = self.step_convert(&mut ctx) {
                return self.quarantine(ctx, e, progress);
            }
        }

        // Step 2: Count pages
        {
            let _step = info_span!("count_pages").entered();
            if let Err(e) = self.step_count_pages(&mut ctx) {
                return self.quarantine(ctx, e, progress);
            }
        }

        // Step 3: Reserve the label block
        {
            let _step = info_span!("reserve").entered();
            self.step_reserve(&mut ctx);
        }

        // Step 4: Unlock and stamp every page
        {
            let _step = info_span!("stamp").entered();
            if let Err(e) = self.step_stamp(&mut ctx) {
                return self.quarantine(ctx, e, progress);
            }
        }

        // Step 5: Keep the original and append the ledger row
        let record = {
            let _step = info_span!("record").entered();
            match self.step_record(&mut ctx) {
                Ok(record) => record,
                Err(e) => return self.quarantine(ctx, e, progress),
            }
        };

        progress.report(ProgressEvent::Recorded {
            file: display_name(&ctx),
            label: record.label.clone(),
            last_label: record.last_label.clone(),
            pages: record.page_count,
        });

        (FileOutcome::Recorded(record), ctx)
    }

    fn step_convert(&self, ctx: &mut FileContext) -> Result<(), PipelineError> {
        let route = match ctx.file.class {
            FileClass::NativePdf => {
                ctx.working_pdf = Some(ctx.file.path.clone());
                return Ok(());
            }
            FileClass::Convertible(route) => route,
            FileClass::Unsupported => {
                return Err(ConvertError::UnsupportedFormat(ctx.file.file_name()).into());
            }
        };

        let bytes = match ctx.prefetched.take() {
            Some(conversion) => conversion?,
            None => self.converters.convert(route, &ctx.file.path)?,
        };

        let directory = self.storage.target_directory(ctx.file.relative_parent())?;
        let staged = self
            .storage
            .stage(&directory, &format!("{}.pdf", ctx.file.stem()), &bytes)?;

        debug!(staged = %sanitize::redact_path(&staged), bytes = bytes.len(), "Staged converted PDF");
        ctx.working_pdf = Some(staged.clone());
        ctx.staged = Some(staged);
        ctx.state = FileState::Converted;
        Ok(())
    }

    fn step_count_pages(&self, ctx: &mut FileContext) -> Result<(), PipelineError> {
        let working = ctx.working_pdf.clone().expect("step 1 completed");
        let doc = pdf::load(&working).map_err(PipelineError::PageCount)?;

        if pdf::requires_password(&doc) {
            return self.count_locked_pages(ctx, &working);
        }

        let count = pdf::count_pages(&working, &doc).map_err(PipelineError::PageCount)?;
        self.set_page_count(ctx, count, Some(&doc));
        Ok(())
    }

    /// A user password hides the page tree from a plain load, so the unlocker
    /// runs here. When it fails the file still gets its block, counted from
    /// the raw page tree, and is quarantined at the stamp step.
    fn count_locked_pages(&self, ctx: &mut FileContext, working: &Path) -> Result<(), PipelineError> {
        match self.unlocker.unlock(working) {
            Ok((doc, strategy)) => {
                let count = pdf::count_pages(working, &doc).map_err(PipelineError::PageCount)?;
                debug!(strategy, pages = count, "Counted pages after unlocking");
                self.set_page_count(ctx, count, Some(&doc));
                ctx.unlocked = Some((doc, strategy));
                Ok(())
            }
            Err(locked) => match pdf::structural_page_count(working) {
                Ok(count) => {
                    warn!(pages = count, error = %locked, "PDF stays locked; reserving its pages anyway");
                    self.set_page_count(ctx, count, None);
                    ctx.locked = Some(locked);
                    Ok(())
                }
                Err(e) => {
                    debug!(error = %e, "Locked PDF page tree is unreadable");
                    Err(PipelineError::Locked(locked))
                }
            },
        }
    }

    fn set_page_count(&self, ctx: &mut FileContext, count: u32, doc: Option<&Document>) {
        // A converted PDF carries the conversion time, not the source's.
        let metadata = doc.filter(|_| matches!(ctx.file.class, FileClass::NativePdf));
        ctx.source_date = Some(dates::resolve_source_date(
            &ctx.file.path,
            metadata,
            self.processing_date,
        ));
        ctx.page_count = Some(count);
    }

    fn step_reserve(&mut self, ctx: &mut FileContext) {
        let count = ctx.page_count.expect("step 2 completed");
        let reservation = self.sequencer.reserve(count);

        debug!(
            first = %reservation.starting_label(),
            last = %reservation.last_label(),
            pages = count,
            "Reserved label block"
        );
        ctx.reservation = Some(reservation);
        ctx.state = FileState::Numbered;
    }

    fn step_stamp(&self, ctx: &mut FileContext) -> Result<(), PipelineError> {
        let working = ctx.working_pdf.clone().expect("step 1 completed");
        let reservation = ctx.reservation.as_ref().expect("step 3 completed");

        if let Some(locked) = ctx.locked.take() {
            return Err(PipelineError::Locked(locked));
        }
        let (mut doc, strategy) = match ctx.unlocked.take() {
            Some(unlocked) => unlocked,
            None => self
                .unlocker
                .unlock(&working)
                .map_err(PipelineError::Locked)?,
        };
        if strategy != "open-unlocked" {
            ctx.warnings.push(PipelineWarning::Unlocked { strategy });
        }

        let actual = doc.get_pages().len() as u32;
        if actual != reservation.page_count() {
            return Err(PipelineError::Stamp(format!(
                "working copy has {} pages but {} were numbered",
                actual,
                reservation.page_count()
            )));
        }

        let outcome = self.compositor.stamp_document(&mut doc, reservation);
        let first_failure = outcome.pages.iter().find_map(|page| match page {
            PageStamp::Unstamped { reason } => Some(reason.clone()),
            PageStamp::Stamped(_) => None,
        });

        if outcome.stamped_count() == 0 {
            return Err(PipelineError::Stamp(
                first_failure.unwrap_or_else(|| "no page could be stamped".to_string()),
            ));
        }

        let unstamped = outcome.unstamped_pages();
        if !unstamped.is_empty() {
            warn!(pages = ?unstamped, "Some pages were left unstamped");
            ctx.warnings.push(PipelineWarning::UnstampedPages {
                pages: unstamped.clone(),
                reason: first_failure.unwrap_or_default(),
            });
            ctx.unstamped_pages = unstamped;
        }

        let bytes = pdf::to_bytes(&mut doc).map_err(|e| PipelineError::Stamp(e.to_string()))?;
        let directory = self.storage.target_directory(ctx.file.relative_parent())?;
        let output = directory.join(output_name(ctx, &reservation.starting_label()));
        self.storage.write_atomic(&output, &bytes)?;

        if let Some(staged) = ctx.staged.take() {
            self.storage.discard(&staged);
        }

        ctx.stamped_path = Some(output);
        ctx.state = FileState::Stamped;
        Ok(())
    }

    fn step_record(&mut self, ctx: &mut FileContext) -> Result<FileRecord, PipelineError> {
        let reservation = ctx.reservation.as_ref().expect("step 3 completed");
        let destination = ctx.stamped_path.clone().expect("step 4 completed");
        let label = reservation.starting_label();

        if matches!(ctx.file.class, FileClass::Convertible(_)) {
            let directory = self.storage.target_directory(ctx.file.relative_parent())?;
            let copy = directory.join(format!("{}_{}", label, ctx.file.file_name()));
            self.storage.copy_file(&ctx.file.path, &copy)?;
            ctx.original_copy = Some(copy);
        }

        let record = FileRecord {
            label,
            last_label: reservation.last_label(),
            first_number: reservation.first_number(),
            source_path: ctx.file.path.clone(),
            relative_path: ctx.file.relative.clone(),
            original_name: ctx.file.file_name(),
            page_count: reservation.page_count(),
            source_date: ctx.source_date.unwrap_or(self.processing_date),
            processing_date: self.processing_date,
            destination,
            original_copy: ctx.original_copy.clone(),
            unstamped_pages: ctx.unstamped_pages.clone(),
        };

        self.ledger.append(record.clone());
        ctx.state = FileState::Recorded;
        Ok(record)
    }

    fn quarantine(
        &self,
        mut ctx: FileContext,
        err: PipelineError,
        progress: &dyn ProgressReporter,
    ) -> (FileOutcome, FileContext) {
        let _step = info_span!("quarantine").entered();
        let kind = err.kind();
        let reason = kind.reason();

        let artifact = ctx.stamped_path.take().or_else(|| ctx.staged.take());
        let stored_at = match self
            .storage
            .quarantine(artifact.as_deref(), &ctx.file.path, reason)
        {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %e, "Failed to move file into the issues area");
                None
            }
        };

        let reserved_label = ctx.reservation.as_ref().map(|r| r.starting_label());
        warn!(
            reason,
            error = %err,
            reserved = reserved_label.as_deref().unwrap_or("-"),
            "File quarantined"
        );

        ctx.state = FileState::Quarantined;
        progress.report(ProgressEvent::Quarantined {
            file: display_name(&ctx),
            reason: reason.to_string(),
        });

        let entry = QuarantineEntry {
            source: ctx.file.relative.clone(),
            kind,
            reason: reason.to_string(),
            detail: err.to_string(),
            stored_at,
            reserved_label,
        };
        (FileOutcome::Quarantined(entry), ctx)
    }
}

fn display_name(ctx: &FileContext) -> String {
    ctx.file.relative.display().to_string()
}

/// `{label}_{file name}` for native PDFs, `{label}_{stem}.pdf` for converted ones.
fn output_name(ctx: &FileContext, label: &str) -> String {
    match ctx.file.class {
        FileClass::NativePdf => format!("{}_{}", label, ctx.file.file_name()),
        _ => format!("{}_{}.pdf", label, ctx.file.stem()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PdfError, StampError};
    use crate::pdf::fixtures;
    use crate::pipeline::error::FailureKind;
    use crate::pipeline::progress::NoopProgress;
    use crate::stamp::{ContentMerge, Overlay, OverlayStrategy, StampMethod};
    use crate::unlock::{OpenUnlocked, UnlockStrategy};
    use crate::walker::DiscoveredFile;
    use lopdf::{Document, ObjectId};
    use std::path::Path;
    use tempfile::TempDir;

    struct Refuses;

    impl UnlockStrategy for Refuses {
        fn name(&self) -> &'static str {
            "refuses"
        }

        fn unlock(&self, path: &Path) -> Result<Document, PdfError> {
            Err(PdfError::Open {
                path: path.to_path_buf(),
                message: "password required".to_string(),
            })
        }
    }

    /// Stands in for an external reprint: hands back an unencrypted copy.
    struct Reprints(usize);

    impl UnlockStrategy for Reprints {
        fn name(&self) -> &'static str {
            "reprints"
        }

        fn unlock(&self, _path: &Path) -> Result<Document, PdfError> {
            Ok(fixtures::document(self.0))
        }
    }

    /// Delegates to content merge except for pages carrying `label`.
    struct FailsFor(&'static str);

    impl OverlayStrategy for FailsFor {
        fn method(&self) -> StampMethod {
            StampMethod::ContentMerge
        }

        fn apply(
            &self,
            doc: &mut Document,
            page_id: ObjectId,
            overlay: &Overlay<'_>,
        ) -> Result<(), StampError> {
            let content = String::from_utf8_lossy(&overlay.content);
            if content.contains(self.0) {
                return Err(StampError::Contents("simulated".to_string()));
            }
            ContentMerge.apply(doc, page_id, overlay)
        }
    }

    fn setup_dirs() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("input");
        let run = tmp.path().join("run");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&run).unwrap();
        (tmp, input, run)
    }

    fn pipeline(input: &Path, run: &Path) -> Pipeline {
        let job = ProductionJob::new(input, run).with_prefix("ABC");
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        Pipeline::from_job(Arc::new(job), run, date)
    }

    fn discovered(input: &Path, relative: &str) -> FileContext {
        FileContext::new(DiscoveredFile::new(input.join(relative), PathBuf::from(relative)))
    }

    fn write(input: &Path, relative: &str, content: &[u8]) {
        let path = input.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    // ── Happy path ──

    #[test]
    fn test_native_pdf_is_stamped_and_recorded() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "sub/brief.pdf", &fixtures::bytes(3));

        let mut pipeline = pipeline(&input, &run);
        let (outcome, ctx) = pipeline.run(discovered(&input, "sub/brief.pdf"), &NoopProgress);

        let record = match outcome {
            FileOutcome::Recorded(record) => record,
            other => panic!("expected a record, got {:?}", other),
        };
        assert_eq!(record.label, "ABC00001");
        assert_eq!(record.last_label, "ABC00003");
        assert_eq!(record.page_count, 3);
        assert_eq!(record.destination, run.join("sub/ABC00001_brief.pdf"));
        assert!(record.original_copy.is_none());
        assert_eq!(ctx.state, FileState::Recorded);
        assert_eq!(pipeline.sequencer().current_number(), 4);
        assert_eq!(pipeline.ledger().len(), 1);

        let stamped = Document::load(&record.destination).unwrap();
        let last_page = *stamped.get_pages().values().last().unwrap();
        let content = String::from_utf8_lossy(&stamped.get_page_content(last_page).unwrap()).into_owned();
        assert!(content.contains("(ABC00003)"));
        assert!(input.join("sub/brief.pdf").exists(), "source is never moved");
    }

    #[test]
    fn test_converted_file_keeps_original_copy() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "notes.txt", b"Deposition notes\nSecond line\n");

        let mut pipeline = pipeline(&input, &run);
        let (outcome, ctx) = pipeline.run(discovered(&input, "notes.txt"), &NoopProgress);

        assert!(outcome.is_recorded());
        assert_eq!(ctx.stamped_path.as_deref(), Some(run.join("ABC00001_notes.pdf").as_path()));
        assert_eq!(ctx.original_copy.as_deref(), Some(run.join("ABC00001_notes.txt").as_path()));
        assert_eq!(
            std::fs::read(run.join("ABC00001_notes.txt")).unwrap(),
            b"Deposition notes\nSecond line\n"
        );
        assert!(!run.join("notes.pdf").exists(), "staged PDF is cleaned up");
    }

    #[test]
    fn test_prefetched_conversion_is_used() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "scan.png", b"not decoded because prefetched");

        let mut pipeline = pipeline(&input, &run);
        let ctx = discovered(&input, "scan.png").with_conversion(Ok(fixtures::bytes(2)));
        let (outcome, _ctx) = pipeline.run(ctx, &NoopProgress);

        match outcome {
            FileOutcome::Recorded(record) => assert_eq!(record.page_count, 2),
            other => panic!("expected a record, got {:?}", other),
        }
    }

    // ── Failures ──

    #[test]
    fn test_conversion_failure_does_not_consume_numbers() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "broken.png", b"definitely not a png");

        let mut pipeline = pipeline(&input, &run);
        let (outcome, ctx) = pipeline.run(discovered(&input, "broken.png"), &NoopProgress);

        let entry = match outcome {
            FileOutcome::Quarantined(entry) => entry,
            other => panic!("expected quarantine, got {:?}", other),
        };
        assert_eq!(entry.kind, FailureKind::Conversion);
        assert!(entry.reserved_label.is_none());
        assert_eq!(
            entry.stored_at.as_deref(),
            Some(run.join("_FILES WITH ISSUES/broken_ISSUE_conversion_failed.png").as_path())
        );
        assert_eq!(ctx.state, FileState::Quarantined);
        assert_eq!(pipeline.sequencer().current_number(), 1);
        assert!(pipeline.ledger().is_empty());
    }

    #[test]
    fn test_unreadable_pdf_is_page_count_failure() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "garbage.pdf", b"%PDF-1.4\nthis is not a pdf");

        let mut pipeline = pipeline(&input, &run);
        let (outcome, _ctx) = pipeline.run(discovered(&input, "garbage.pdf"), &NoopProgress);

        match outcome {
            FileOutcome::Quarantined(entry) => {
                assert_eq!(entry.kind, FailureKind::PageCount);
                assert!(entry
                    .stored_at
                    .unwrap()
                    .ends_with("garbage_ISSUE_page_count_unavailable.pdf"));
            }
            other => panic!("expected quarantine, got {:?}", other),
        }
        assert_eq!(pipeline.sequencer().current_number(), 1);
    }

    #[test]
    fn test_locked_pdf_keeps_its_reserved_block() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "a_locked.pdf", &fixtures::bytes(2));
        write(&input, "b_open.pdf", &fixtures::bytes(1));

        let mut pipeline = pipeline(&input, &run);
        let locked_pipeline = Unlocker::with_strategies(vec![Box::new(Refuses)]);
        pipeline = pipeline.with_unlocker(locked_pipeline);
        let (outcome, _ctx) = pipeline.run(discovered(&input, "a_locked.pdf"), &NoopProgress);

        match outcome {
            FileOutcome::Quarantined(entry) => {
                assert_eq!(entry.kind, FailureKind::Locked);
                assert!(entry.reason.contains("stamp"));
                assert_eq!(entry.reserved_label.as_deref(), Some("ABC00001"));
            }
            other => panic!("expected quarantine, got {:?}", other),
        }

        pipeline = pipeline.with_unlocker(Unlocker::with_strategies(vec![Box::new(OpenUnlocked)]));
        let (outcome, _ctx) = pipeline.run(discovered(&input, "b_open.pdf"), &NoopProgress);
        match outcome {
            FileOutcome::Recorded(record) => assert_eq!(record.label, "ABC00003", "gap preserved"),
            other => panic!("expected a record, got {:?}", other),
        }
    }

    #[test]
    fn test_user_password_pdf_reserves_structural_page_count() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "sealed.pdf", &fixtures::encrypted_bytes(3, "owner", "secret"));

        let mut pipeline = pipeline(&input, &run)
            .with_unlocker(Unlocker::with_strategies(vec![Box::new(OpenUnlocked)]));
        let (outcome, ctx) = pipeline.run(discovered(&input, "sealed.pdf"), &NoopProgress);

        match outcome {
            FileOutcome::Quarantined(entry) => {
                assert_eq!(entry.kind, FailureKind::Locked);
                assert_eq!(entry.reason, "failed to apply stamp");
                assert_eq!(entry.reserved_label.as_deref(), Some("ABC00001"));
            }
            other => panic!("expected quarantine, got {:?}", other),
        }
        assert_eq!(ctx.page_count, Some(3));
        assert_eq!(pipeline.sequencer().current_number(), 4, "all three pages consumed");
    }

    #[test]
    fn test_user_password_pdf_is_counted_from_unlocked_copy() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "sealed.pdf", &fixtures::encrypted_bytes(2, "owner", "secret"));

        let mut pipeline = pipeline(&input, &run).with_unlocker(Unlocker::with_strategies(vec![
            Box::new(OpenUnlocked),
            Box::new(Reprints(2)),
        ]));
        let (outcome, ctx) = pipeline.run(discovered(&input, "sealed.pdf"), &NoopProgress);

        match outcome {
            FileOutcome::Recorded(record) => {
                assert_eq!(record.page_count, 2);
                assert_eq!(record.last_label, "ABC00002");
            }
            other => panic!("expected a record, got {:?}", other),
        }
        assert!(ctx
            .warnings
            .contains(&PipelineWarning::Unlocked { strategy: "reprints" }));
        assert!(ctx.unlocked.is_none(), "the unlocked copy is consumed by stamping");
    }

    #[test]
    fn test_partially_stamped_file_is_recorded_with_warning() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "mixed.pdf", &fixtures::bytes(3));

        let compositor = Compositor::with_strategies(
            Default::default(),
            vec![Box::new(FailsFor("ABC00002"))],
        );
        let mut pipeline = pipeline(&input, &run).with_compositor(compositor);
        let (outcome, ctx) = pipeline.run(discovered(&input, "mixed.pdf"), &NoopProgress);

        match outcome {
            FileOutcome::Recorded(record) => assert_eq!(record.unstamped_pages, vec![2]),
            other => panic!("expected a record, got {:?}", other),
        }
        assert!(ctx
            .warnings
            .iter()
            .any(|w| matches!(w, PipelineWarning::UnstampedPages { pages, .. } if pages == &vec![2])));
        assert_eq!(pipeline.sequencer().current_number(), 4, "all three pages consumed");
    }

    #[test]
    fn test_no_stamped_page_quarantines_converted_artifact() {
        let (_tmp, input, run) = setup_dirs();
        write(&input, "memo.txt", b"memo");

        let compositor = Compositor::with_strategies(Default::default(), Vec::new());
        let mut pipeline = pipeline(&input, &run).with_compositor(compositor);
        let (outcome, _ctx) = pipeline.run(discovered(&input, "memo.txt"), &NoopProgress);

        let entry = match outcome {
            FileOutcome::Quarantined(entry) => entry,
            other => panic!("expected quarantine, got {:?}", other),
        };
        assert_eq!(entry.kind, FailureKind::Stamp);
        let stored = entry.stored_at.unwrap();
        assert!(stored.ends_with("memo_ISSUE_failed_to_apply_stamp.pdf"), "{:?}", stored);
        assert!(Document::load(&stored).is_ok(), "the converted PDF is what gets quarantined");
        assert!(!run.join("memo.pdf").exists());
        assert_eq!(pipeline.sequencer().current_number(), 2);
    }
}
