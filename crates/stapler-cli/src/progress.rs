use std::path::Path;
use std::sync::Mutex;

use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};

use stapler_core::engine::MergeOutcome;
use stapler_core::error::SkipReason;
use stapler_core::{ProgressListener, ProgressSnapshot};

const BAR_TEMPLATE: &str =
    "[{elapsed_precise}] {prefix:.bold}▕{bar:.blue}▏{pos}/{len} files {wide_msg}";
const FINISH_TEMPLATE: &str = "[{elapsed_precise}] {msg}";

fn new_session_bar(files_total: u64) -> ProgressBar {
    let pb = ProgressBar::new(files_total);
    pb.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap()
            .progress_chars("█▓▒░  "),
    );
    pb
}

/// Terminal progress rendering for one session. The engine drives this
/// from its worker thread; the bar itself is created lazily on session
/// start.
pub struct CliListener {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliListener {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl Default for CliListener {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressListener for CliListener {
    fn on_session_start(&self, folders: usize, files_total: usize) {
        let pb = new_session_bar(files_total as u64);
        pb.set_prefix(format!("{} folders", folders));
        *self.bar.lock().unwrap() = Some(pb);
    }

    fn on_folder_start(&self, index: usize, total: usize, name: &str) {
        if let Some(pb) = self.bar.lock().unwrap().as_ref() {
            pb.set_prefix(format!("[{}/{}] {}", index + 1, total, name));
        }
    }

    fn on_file_skipped(&self, path: &Path, reason: &SkipReason) {
        if let Some(pb) = self.bar.lock().unwrap().as_ref() {
            pb.println(format!("  skipped {}: {}", path.display(), reason));
        }
    }

    fn on_ocr_file(&self, path: &Path) {
        if let Some(pb) = self.bar.lock().unwrap().as_ref() {
            if let Some(name) = path.file_name() {
                pb.set_message(format!("OCR {}", name.to_string_lossy()));
            }
        }
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        if let Some(pb) = self.bar.lock().unwrap().as_ref() {
            pb.set_position(snapshot.files_done as u64);
            pb.set_message(format!(
                "{} -> {}, eta {}",
                HumanBytes(snapshot.bytes_before),
                HumanBytes(snapshot.bytes_after),
                HumanDuration(snapshot.eta)
            ));
        }
    }

    fn on_folder_complete(&self, name: &str, outcome: &MergeOutcome) {
        if let Some(pb) = self.bar.lock().unwrap().as_ref() {
            if outcome.success {
                pb.println(format!(
                    "  {}: merged {} files ({} -> {})",
                    name,
                    outcome.files_merged,
                    HumanBytes(outcome.input_bytes),
                    HumanBytes(outcome.output_bytes)
                ));
            } else if let Some(error) = &outcome.error {
                pb.println(format!("  {}: failed: {}", name, error));
            }
        }
    }

    fn on_session_complete(&self, _summary: &stapler_core::SessionSummary) {
        if let Some(pb) = self.bar.lock().unwrap().take() {
            pb.set_style(ProgressStyle::with_template(FINISH_TEMPLATE).unwrap());
            pb.finish_with_message("done");
        }
    }
}
