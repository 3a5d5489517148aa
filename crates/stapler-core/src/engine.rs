use crate::backend::{MergeBackend, OcrBackend};
use crate::config::AppConfig;
use crate::error::{Error, SkippedFile};
use crate::progress::{ProgressListener, ProgressTracker};
use crate::scanner::{self, MergeJob};
use crate::validate;
use chrono::Local;
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
    Failed,
}

/// Cloneable control handle shared between the worker and the caller.
///
/// The caller only flips control flags; the worker observes them at
/// defined checkpoints (between folders and between file-level operations)
/// and blocks on the condvar while paused. Backend calls in flight are
/// never interrupted.
#[derive(Clone)]
pub struct SessionControl {
    inner: Arc<ControlInner>,
}

struct ControlInner {
    state: Mutex<ControlState>,
    changed: Condvar,
}

impl SessionControl {
    fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                state: Mutex::new(ControlState::Idle),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> ControlState {
        *self.inner.state.lock().unwrap()
    }

    /// Running → Paused. Returns false when not running.
    pub fn pause(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if *state == ControlState::Running {
            *state = ControlState::Paused;
            true
        } else {
            false
        }
    }

    /// Paused → Running. Returns false when not paused.
    pub fn resume(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if *state == ControlState::Paused {
            *state = ControlState::Running;
            self.inner.changed.notify_all();
            true
        } else {
            false
        }
    }

    /// Running or Paused → Stopping. Takes effect at the worker's next
    /// checkpoint; a paused worker is woken so it can observe the stop.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            ControlState::Running | ControlState::Paused => {
                *state = ControlState::Stopping;
                self.inner.changed.notify_all();
                true
            }
            _ => false,
        }
    }

    fn begin(&self) -> Result<(), Error> {
        let mut state = self.inner.state.lock().unwrap();
        if *state != ControlState::Idle {
            return Err(Error::SessionPrecondition(format!(
                "session already consumed (state {:?})",
                *state
            )));
        }
        *state = ControlState::Running;
        Ok(())
    }

    fn fail(&self) {
        *self.inner.state.lock().unwrap() = ControlState::Failed;
    }

    fn complete(&self) {
        let mut state = self.inner.state.lock().unwrap();
        *state = ControlState::Completed;
        self.inner.changed.notify_all();
    }

    /// Worker-side suspension point: blocks while paused, returns true when
    /// the session should stop.
    fn checkpoint(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        while *state == ControlState::Paused {
            state = self.inner.changed.wait(state).unwrap();
        }
        *state == ControlState::Stopping
    }
}

/// Terminal result of one folder's merge job.
#[derive(Debug)]
pub struct MergeOutcome {
    pub output_path: Option<PathBuf>,
    pub success: bool,
    pub files_merged: usize,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub skipped: Vec<SkippedFile>,
    pub sources_deleted: usize,
    pub error: Option<String>,
}

/// Cumulative statistics for one session.
#[derive(Debug, Default, Clone)]
pub struct SessionSummary {
    pub folders_processed: usize,
    pub folders_merged: usize,
    pub folders_failed: usize,
    pub files_merged: usize,
    pub files_skipped: usize,
    pub already_merged_skipped: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub sources_deleted: usize,
    pub ocr_failures: usize,
    pub stopped_early: bool,
}

/// Drives one processing session across all selected folders: discovery,
/// optional OCR, merge, output verification, conditional source deletion
/// and progress reporting. Folders are processed strictly sequentially.
pub struct BatchEngine {
    config: AppConfig,
    merge_backend: Box<dyn MergeBackend>,
    ocr_backend: Box<dyn OcrBackend>,
    control: SessionControl,
}

impl BatchEngine {
    pub fn new(
        config: AppConfig,
        merge_backend: Box<dyn MergeBackend>,
        ocr_backend: Box<dyn OcrBackend>,
    ) -> Self {
        Self {
            config,
            merge_backend,
            ocr_backend,
            control: SessionControl::new(),
        }
    }

    /// Control handle for another thread to pause/resume/stop the session.
    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Run the session to completion (or until stopped). One engine runs
    /// exactly once; a second call fails the precondition check.
    pub fn run(&self, listener: &dyn ProgressListener) -> Result<SessionSummary, Error> {
        if !self.config.base_path.is_dir() {
            self.control.fail();
            return Err(Error::SessionPrecondition(format!(
                "base path {} is not a readable directory",
                self.config.base_path.display()
            )));
        }
        self.control.begin()?;

        let mut ocr_enabled = self.config.ocr_enabled;
        if ocr_enabled && !self.ocr_backend.probe().available {
            warn!("OCR backend is not installed; continuing without OCR for this session");
            ocr_enabled = false;
        }

        info!(
            "Starting batch session: deletion {}, quality {}, OCR {}",
            if self.config.delete_sources_after_merge {
                "enabled"
            } else {
                "disabled"
            },
            self.config.quality_preset.label(),
            if ocr_enabled { "enabled" } else { "disabled" },
        );

        let mut summary = SessionSummary::default();

        // Build every job up front so the total file count is known and no
        // file can end up in two jobs.
        let folders = scanner::discover_folders(&self.config)?;
        let mut jobs: Vec<MergeJob> = Vec::new();
        for folder in &folders {
            match scanner::scan_folder(folder) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    error!("Error reading folder {}: {}", folder.path.display(), err);
                    summary.folders_failed += 1;
                }
            }
        }

        let files_total: usize = jobs.iter().map(|job| job.files.len()).sum();
        info!(
            "Found {} usable PDF files across {} folders",
            files_total,
            jobs.len()
        );
        listener.on_session_start(jobs.len(), files_total);

        let mut tracker = ProgressTracker::new(files_total);
        let total_jobs = jobs.len();
        let mut files_done = 0usize;

        'jobs: for (index, job) in jobs.into_iter().enumerate() {
            if self.control.checkpoint() {
                summary.stopped_early = true;
                break;
            }

            listener.on_folder_start(index, total_jobs, &job.folder.name);
            info!(
                "[{}/{}] Processing folder: {}",
                index + 1,
                total_jobs,
                job.folder.name
            );
            summary.folders_processed += 1;
            summary.already_merged_skipped += job.already_merged_count;
            if job.already_merged_count > 0 {
                info!(
                    "  Skipped {} previously merged PDF(s)",
                    job.already_merged_count
                );
            }
            for skip in &job.skipped {
                warn!(
                    "  Skipping {}: {} ({})",
                    skip.path.display(),
                    skip.reason,
                    skip.reason.hint()
                );
                listener.on_file_skipped(&skip.path, &skip.reason);
            }

            if job.files.is_empty() {
                summary.files_skipped += job.skipped.len();
                info!("  No usable PDF files in {}", job.folder.name);
                continue;
            }
            info!("  Found {} usable PDF files", job.files.len());

            if ocr_enabled {
                for file in &job.files {
                    if self.control.checkpoint() {
                        summary.stopped_early = true;
                        break 'jobs;
                    }
                    listener.on_ocr_file(&file.path);
                    if let Err(err) = self
                        .ocr_backend
                        .ocr_in_place(&file.path, &self.config.ocr_language)
                    {
                        warn!(
                            "  OCR failed for {}: {}; merging without text layer",
                            file.path.display(),
                            err
                        );
                        summary.ocr_failures += 1;
                    }
                }
            }

            if self.control.checkpoint() {
                summary.stopped_early = true;
                break;
            }

            let mut outcome = self.merge_folder(&job);
            for skip in &outcome.skipped {
                listener.on_file_skipped(&skip.path, &skip.reason);
            }

            if outcome.success {
                summary.folders_merged += 1;
                summary.files_merged += outcome.files_merged;
                summary.bytes_before += outcome.input_bytes;
                summary.bytes_after += outcome.output_bytes;

                if self.config.delete_sources_after_merge {
                    // Deletion is a file-level operation with its own
                    // checkpoint; a pending stop retains the sources.
                    if self.control.checkpoint() {
                        summary.stopped_early = true;
                        info!("  Stop requested; source files retained");
                    } else {
                        outcome.sources_deleted = self.delete_sources(&job, &outcome);
                        summary.sources_deleted += outcome.sources_deleted;
                        info!("  Removed {} source PDF files", outcome.sources_deleted);
                    }
                } else {
                    info!(
                        "  Source files retained ({} PDFs preserved)",
                        job.files.len()
                    );
                }
            } else {
                summary.folders_failed += 1;
                error!("  Failed to merge PDFs in {}", job.folder.name);
            }

            files_done += job.files.len();
            summary.files_skipped += outcome.skipped.len();

            if let Some(snapshot) = tracker.update(
                files_done,
                files_total,
                summary.bytes_before,
                summary.bytes_after,
            ) {
                listener.on_progress(&snapshot);
            }
            listener.on_folder_complete(&job.folder.name, &outcome);

            if summary.stopped_early {
                break;
            }
        }

        // The final 100 % state is published regardless of the throttle.
        let final_snapshot = tracker.finish();
        listener.on_progress(&final_snapshot);

        if summary.stopped_early {
            info!("Processing stopped by user.");
        }
        info!(
            "Batch processing completed: {} folders merged, {} failed, {} files merged, {} -> {} bytes",
            summary.folders_merged,
            summary.folders_failed,
            summary.files_merged,
            summary.bytes_before,
            summary.bytes_after
        );
        self.control.complete();
        listener.on_session_complete(&summary);
        Ok(summary)
    }

    /// Merge one folder's job: backend call, output verification, rename to
    /// the dated final name. Deletion is handled by the caller so its
    /// checkpoint sits outside the atomic merge step.
    fn merge_folder(&self, job: &MergeJob) -> MergeOutcome {
        let input_bytes: u64 = job.files.iter().map(|f| f.size_bytes).sum();
        let inputs: Vec<PathBuf> = job.files.iter().map(|f| f.path.clone()).collect();
        let temp_output = scanner::temp_output_path(&job.folder.path);
        let params = self.config.quality_preset.params();

        let failure = |skipped: Vec<SkippedFile>, message: String| MergeOutcome {
            output_path: None,
            success: false,
            files_merged: 0,
            input_bytes,
            output_bytes: 0,
            skipped,
            sources_deleted: 0,
            error: Some(message),
        };

        let report = match self.merge_backend.merge(&inputs, &temp_output, &params) {
            Ok(report) => report,
            Err(err) => {
                let _ = fs::remove_file(&temp_output);
                return failure(job.skipped.clone(), err.to_string());
            }
        };

        if let Err(err) = verify_output(&temp_output) {
            let _ = fs::remove_file(&temp_output);
            let mut skipped = job.skipped.clone();
            skipped.extend(report.skipped);
            return failure(skipped, format!("merged output failed verification: {err}"));
        }

        let final_name = scanner::output_filename(&job.folder.name, Local::now());
        let final_path = job.folder.path.join(&final_name);
        if let Err(err) = fs::rename(&temp_output, &final_path) {
            let _ = fs::remove_file(&temp_output);
            let mut skipped = job.skipped.clone();
            skipped.extend(report.skipped);
            return failure(skipped, format!("could not move output into place: {err}"));
        }

        info!(
            "  Merged {} PDFs into {} ({} -> {} bytes)",
            report.merged_files, final_name, input_bytes, report.output_bytes
        );

        let mut skipped = job.skipped.clone();
        skipped.extend(report.skipped);
        MergeOutcome {
            output_path: Some(final_path),
            success: true,
            files_merged: report.merged_files,
            input_bytes,
            output_bytes: report.output_bytes,
            skipped,
            sources_deleted: 0,
            error: None,
        }
    }

    /// Delete exactly the source files that went into the merged output;
    /// files the backend skipped stay on disk. Individual failures are
    /// warnings, never fatal.
    fn delete_sources(&self, job: &MergeJob, outcome: &MergeOutcome) -> usize {
        let skipped_paths: HashSet<&Path> =
            outcome.skipped.iter().map(|s| s.path.as_path()).collect();
        let mut deleted = 0;
        for file in &job.files {
            if skipped_paths.contains(file.path.as_path()) {
                continue;
            }
            match fs::remove_file(&file.path) {
                Ok(()) => deleted += 1,
                Err(err) => warn!("  Could not delete {}: {}", file.path.display(), err),
            }
        }
        deleted
    }
}

/// Independently re-open the merged output and confirm it is a non-empty
/// PDF before anything is deleted.
fn verify_output(path: &Path) -> Result<(), Error> {
    let metadata = fs::metadata(path)?;
    if metadata.len() < validate::MIN_PDF_BYTES {
        return Err(Error::MergeBackend(format!(
            "output is only {} bytes",
            metadata.len()
        )));
    }
    let mut header = [0u8; 5];
    fs::File::open(path)?.read_exact(&mut header)?;
    if &header != b"%PDF-" {
        return Err(Error::MergeBackend(
            "output is missing the PDF header".to_string(),
        ));
    }
    Ok(())
}
