use crate::engine::{MergeOutcome, SessionSummary};
use crate::error::SkipReason;
use std::path::Path;
use std::time::{Duration, Instant};

/// Minimum spacing between published progress snapshots (10 per second).
pub const PUBLISH_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub files_done: usize,
    pub files_total: usize,
    pub percent: f64,
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed: Duration,
    pub eta: Duration,
}

/// Aggregates file and byte counts into a throttled, time-estimated signal.
///
/// `update` returns a snapshot at most every [`PUBLISH_INTERVAL`];
/// `finish` always returns the final 100 % snapshot regardless of the
/// throttle. `files_done` never decreases across published snapshots.
pub struct ProgressTracker {
    started: Instant,
    last_published: Option<Instant>,
    files_done: usize,
    files_total: usize,
    bytes_before: u64,
    bytes_after: u64,
}

impl ProgressTracker {
    pub fn new(files_total: usize) -> Self {
        Self {
            started: Instant::now(),
            last_published: None,
            files_done: 0,
            files_total,
            bytes_before: 0,
            bytes_after: 0,
        }
    }

    pub fn update(
        &mut self,
        files_done: usize,
        files_total: usize,
        bytes_before: u64,
        bytes_after: u64,
    ) -> Option<ProgressSnapshot> {
        self.files_done = files_done.max(self.files_done);
        self.files_total = files_total;
        self.bytes_before = bytes_before;
        self.bytes_after = bytes_after;

        let now = Instant::now();
        if let Some(last) = self.last_published {
            if now.duration_since(last) < PUBLISH_INTERVAL {
                return None;
            }
        }
        self.last_published = Some(now);
        Some(self.snapshot(now))
    }

    /// Unconditionally publish the final state at 100 %.
    pub fn finish(&mut self) -> ProgressSnapshot {
        self.files_done = self.files_total;
        let now = Instant::now();
        self.last_published = Some(now);
        self.snapshot(now)
    }

    fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        let elapsed = now.duration_since(self.started);
        let remaining = self.files_total.saturating_sub(self.files_done);
        let eta = elapsed * remaining as u32 / self.files_done.max(1) as u32;
        let percent = if self.files_total == 0 {
            100.0
        } else {
            self.files_done as f64 / self.files_total as f64 * 100.0
        };
        ProgressSnapshot {
            files_done: self.files_done,
            files_total: self.files_total,
            percent,
            bytes_before: self.bytes_before,
            bytes_after: self.bytes_after,
            elapsed,
            eta,
        }
    }
}

/// Callbacks for a consuming UI. The CLI implements this with indicatif;
/// all methods default to no-ops.
pub trait ProgressListener: Send + Sync {
    fn on_session_start(&self, _folders: usize, _files_total: usize) {}
    fn on_folder_start(&self, _index: usize, _total: usize, _name: &str) {}
    fn on_file_skipped(&self, _path: &Path, _reason: &SkipReason) {}
    fn on_ocr_file(&self, _path: &Path) {}
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
    fn on_folder_complete(&self, _name: &str, _outcome: &MergeOutcome) {}
    fn on_session_complete(&self, _summary: &SessionSummary) {}
}

/// No-op listener for silent operation.
pub struct SilentListener;

impl ProgressListener for SilentListener {}
