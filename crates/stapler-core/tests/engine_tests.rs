use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tempfile::tempdir;

use stapler_core::backend::{MergeBackend, MergeReport, OcrBackend, OcrCapability};
use stapler_core::{
    AppConfig, BatchEngine, CompressionParams, ControlState, Error, OcrError, ProgressListener,
    ProgressSnapshot, QualityPreset, SilentListener,
};

fn pdf_bytes() -> Vec<u8> {
    let mut bytes = b"%PDF-1.4\n".to_vec();
    bytes.extend(vec![b'x'; 150]);
    bytes.extend_from_slice(b"\n%%EOF\n");
    bytes
}

fn config(base: &Path, delete: bool) -> AppConfig {
    AppConfig {
        base_path: base.to_path_buf(),
        selected_folders: vec![],
        delete_sources_after_merge: delete,
        quality_preset: QualityPreset::Medium,
        ocr_enabled: false,
        ocr_language: "deu".to_string(),
    }
}

/// Scriptable merge backend. Writes a structurally valid-looking PDF unless
/// told otherwise, records every call, and can gate a specific call so a
/// test can issue control commands while a merge is "in flight".
struct FakeMergeBackend {
    calls: Arc<Mutex<Vec<Vec<PathBuf>>>>,
    fail: bool,
    write_invalid: bool,
    gate: Option<Gate>,
}

struct Gate {
    on_call: usize,
    started: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

type CallLog = Arc<Mutex<Vec<Vec<PathBuf>>>>;

impl FakeMergeBackend {
    fn new() -> (Self, CallLog) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let backend = Self {
            calls: calls.clone(),
            fail: false,
            write_invalid: false,
            gate: None,
        };
        (backend, calls)
    }

    fn failing() -> Self {
        let (backend, _) = Self::new();
        Self {
            fail: true,
            ..backend
        }
    }

    fn writing_invalid_output() -> Self {
        let (backend, _) = Self::new();
        Self {
            write_invalid: true,
            ..backend
        }
    }

    fn gated(on_call: usize) -> (Self, CallLog, Receiver<()>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let (backend, calls) = Self::new();
        let backend = Self {
            gate: Some(Gate {
                on_call,
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            }),
            ..backend
        };
        (backend, calls, started_rx, release_tx)
    }
}

fn input_names(calls: &CallLog, index: usize) -> Vec<String> {
    calls.lock().unwrap()[index]
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

impl MergeBackend for FakeMergeBackend {
    fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        _params: &CompressionParams,
    ) -> Result<MergeReport, Error> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(inputs.to_vec());
            calls.len()
        };

        if let Some(gate) = &self.gate {
            if call_index == gate.on_call {
                gate.started.lock().unwrap().send(()).unwrap();
                gate.release.lock().unwrap().recv().unwrap();
            }
        }

        if self.fail {
            return Err(Error::MergeBackend("simulated backend failure".to_string()));
        }

        if self.write_invalid {
            fs::write(output, b"xx")?;
        } else {
            fs::write(output, pdf_bytes())?;
        }
        let output_bytes = fs::metadata(output)?.len();
        Ok(MergeReport {
            merged_files: inputs.len(),
            skipped: vec![],
            output_bytes,
        })
    }
}

struct FakeOcrBackend {
    available: bool,
    fail_for: Option<String>,
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeOcrBackend {
    fn new(available: bool) -> Self {
        Self {
            available,
            fail_for: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing_for(filename: &str) -> Self {
        Self {
            fail_for: Some(filename.to_string()),
            ..Self::new(true)
        }
    }

    fn call_log(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        self.calls.clone()
    }
}

impl OcrBackend for FakeOcrBackend {
    fn probe(&self) -> OcrCapability {
        OcrCapability {
            available: self.available,
        }
    }

    fn ocr_in_place(&self, path: &Path, _language: &str) -> Result<(), OcrError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if let Some(name) = &self.fail_for {
            if path.file_name().map(|f| f.to_string_lossy().into_owned()) == Some(name.clone()) {
                return Err(OcrError::Failed("simulated OCR failure".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct CollectingListener {
    snapshots: Mutex<Vec<ProgressSnapshot>>,
}

impl ProgressListener for CollectingListener {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

fn merged_outputs(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| stapler_core::validate::is_already_merged(name))
        .collect();
    names.sort();
    names
}

#[test]
fn test_merge_orders_inputs_and_deletes_sources() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Steuer 2025");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("Old_01-01-2020.pdf"), pdf_bytes()).unwrap();
    fs::write(folder.join("Invoice_13-11-2025.pdf"), pdf_bytes()).unwrap();
    fs::write(folder.join("NoDate.pdf"), pdf_bytes()).unwrap();

    let (merge, calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );

    let summary = engine.run(&SilentListener).unwrap();
    assert_eq!(summary.folders_merged, 1);
    assert_eq!(summary.files_merged, 3);
    assert_eq!(summary.sources_deleted, 3);
    assert!(!summary.stopped_early);

    // Newest first, undated last.
    assert_eq!(
        input_names(&calls, 0),
        vec![
            "Invoice_13-11-2025.pdf",
            "Old_01-01-2020.pdf",
            "NoDate.pdf"
        ]
    );

    // Exactly one dated output remains; every source is gone.
    let outputs = merged_outputs(&folder);
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].starts_with("Steuer 2025_"));
    assert!(!folder.join("Invoice_13-11-2025.pdf").exists());
    assert!(!folder.join("Old_01-01-2020.pdf").exists());
    assert!(!folder.join("NoDate.pdf").exists());
}

#[test]
fn test_deletion_disabled_retains_sources() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Ablage");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("a_01-02-2024.pdf"), pdf_bytes()).unwrap();

    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), false),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.folders_merged, 1);
    assert_eq!(summary.sources_deleted, 0);
    assert!(folder.join("a_01-02-2024.pdf").exists());
    assert_eq!(merged_outputs(&folder).len(), 1);
}

#[test]
fn test_merge_failure_never_deletes_sources() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Kaputt");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("a.pdf"), pdf_bytes()).unwrap();
    fs::write(folder.join("b.pdf"), pdf_bytes()).unwrap();

    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(FakeMergeBackend::failing()),
        Box::new(FakeOcrBackend::new(true)),
    );
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.folders_failed, 1);
    assert_eq!(summary.folders_merged, 0);
    assert_eq!(summary.sources_deleted, 0);
    assert!(folder.join("a.pdf").exists());
    assert!(folder.join("b.pdf").exists());
    assert!(merged_outputs(&folder).is_empty());
}

#[test]
fn test_invalid_output_fails_verification() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Komisch");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("a.pdf"), pdf_bytes()).unwrap();

    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(FakeMergeBackend::writing_invalid_output()),
        Box::new(FakeOcrBackend::new(true)),
    );
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.folders_failed, 1);
    assert!(folder.join("a.pdf").exists());
    // Neither a dated output nor a leftover temp file.
    assert!(merged_outputs(&folder).is_empty());
    let leftovers: Vec<String> = fs::read_dir(&folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_second_run_is_a_noop() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Einmal");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("a_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(folder.join("b_02-03-2024.pdf"), pdf_bytes()).unwrap();

    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let first = engine.run(&SilentListener).unwrap();
    assert_eq!(first.files_merged, 2);
    assert_eq!(merged_outputs(&folder).len(), 1);

    // The only remaining PDF is the dated output of the first run, which is
    // recognized and excluded: no chain-merge, no new output.
    let (merge, calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let second = engine.run(&SilentListener).unwrap();

    assert_eq!(second.files_merged, 0);
    assert_eq!(second.already_merged_skipped, 1);
    assert_eq!(calls.lock().unwrap().len(), 0);
    assert_eq!(merged_outputs(&folder).len(), 1);
}

#[test]
fn test_validation_skips_are_reported_and_never_deleted() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Gemischt");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("good_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(folder.join("empty.pdf"), b"").unwrap();
    fs::write(folder.join("tiny.pdf"), vec![b'x'; 45]).unwrap();

    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.folders_merged, 1);
    assert_eq!(summary.files_merged, 1);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(summary.sources_deleted, 1);
    // Skipped files stay on disk even though deletion is enabled.
    assert!(folder.join("empty.pdf").exists());
    assert!(folder.join("tiny.pdf").exists());
    assert!(!folder.join("good_01-02-2024.pdf").exists());
}

#[test]
fn test_folder_failure_does_not_abort_session() {
    let tmp = tempdir().unwrap();
    // The first folder has nothing usable; the second is fine. The session
    // must still process both.
    let bad = tmp.path().join("a_bad");
    let good = tmp.path().join("b_good");
    fs::create_dir(&bad).unwrap();
    fs::create_dir(&good).unwrap();
    fs::write(bad.join("only_empty.pdf"), b"").unwrap();
    fs::write(good.join("fine_01-02-2024.pdf"), pdf_bytes()).unwrap();

    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), false),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.folders_processed, 2);
    assert_eq!(summary.folders_merged, 1);
    assert_eq!(merged_outputs(&good).len(), 1);
    assert!(merged_outputs(&bad).is_empty());
}

#[test]
fn test_ocr_unavailable_disables_ocr_for_session() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Scans");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("a_01-02-2024.pdf"), pdf_bytes()).unwrap();

    let mut cfg = config(tmp.path(), false);
    cfg.ocr_enabled = true;

    let ocr = FakeOcrBackend::new(false);
    let ocr_calls = ocr.call_log();
    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(cfg, Box::new(merge), Box::new(ocr));
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.folders_merged, 1);
    assert_eq!(summary.ocr_failures, 0);
    assert_eq!(ocr_calls.lock().unwrap().len(), 0);
}

#[test]
fn test_ocr_file_failure_degrades_to_plain_merge() {
    let tmp = tempdir().unwrap();
    let folder = tmp.path().join("Scans");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("a_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(folder.join("b_02-03-2024.pdf"), pdf_bytes()).unwrap();

    let mut cfg = config(tmp.path(), false);
    cfg.ocr_enabled = true;

    let (merge, calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        cfg,
        Box::new(merge),
        Box::new(FakeOcrBackend::failing_for("a_01-02-2024.pdf")),
    );
    let summary = engine.run(&SilentListener).unwrap();

    assert_eq!(summary.ocr_failures, 1);
    assert_eq!(summary.folders_merged, 1);
    // The file whose OCR failed is still part of the merge input.
    let inputs = input_names(&calls, 0);
    assert!(inputs.contains(&"a_01-02-2024.pdf".to_string()));
    assert_eq!(inputs.len(), 2);
}

#[test]
fn test_invalid_base_path_is_a_precondition_error() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("does_not_exist");

    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(&missing, false),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let control = engine.control();
    let result = engine.run(&SilentListener);

    assert!(matches!(result, Err(Error::SessionPrecondition(_))));
    assert_eq!(control.state(), ControlState::Failed);
}

#[test]
fn test_stop_during_merge_halts_before_deletion_and_next_folder() {
    let tmp = tempdir().unwrap();
    let first = tmp.path().join("a_first");
    let second = tmp.path().join("b_second");
    fs::create_dir(&first).unwrap();
    fs::create_dir(&second).unwrap();
    fs::write(first.join("one_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(second.join("two_01-02-2024.pdf"), pdf_bytes()).unwrap();

    let (merge, calls, started, release) = FakeMergeBackend::gated(1);
    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let control = engine.control();

    let handle = thread::spawn(move || engine.run(&SilentListener).unwrap());

    // Wait until the first merge is in flight, stop, then let it finish.
    started.recv().unwrap();
    assert!(control.stop());
    release.send(()).unwrap();
    let summary = handle.join().unwrap();

    assert!(summary.stopped_early);
    assert_eq!(summary.folders_merged, 1);
    // The in-flight merge ran to completion, but the pre-deletion
    // checkpoint observed the stop: sources of the first folder survive.
    assert_eq!(summary.sources_deleted, 0);
    assert!(first.join("one_01-02-2024.pdf").exists());
    assert_eq!(merged_outputs(&first).len(), 1);
    // The second folder was never touched.
    assert_eq!(calls.lock().unwrap().len(), 1);
    assert!(second.join("two_01-02-2024.pdf").exists());
    assert!(merged_outputs(&second).is_empty());
    assert_eq!(control.state(), ControlState::Completed);
}

#[test]
fn test_stop_after_completed_folder_keeps_its_deletions() {
    let tmp = tempdir().unwrap();
    let first = tmp.path().join("a_first");
    let second = tmp.path().join("b_second");
    let third = tmp.path().join("c_third");
    for dir in [&first, &second, &third] {
        fs::create_dir(dir).unwrap();
    }
    fs::write(first.join("one_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(second.join("two_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(third.join("three_01-02-2024.pdf"), pdf_bytes()).unwrap();

    // Gate the second folder's merge; the first completes fully.
    let (merge, calls, started, release) = FakeMergeBackend::gated(2);
    let engine = BatchEngine::new(
        config(tmp.path(), true),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let control = engine.control();

    let handle = thread::spawn(move || engine.run(&SilentListener).unwrap());
    started.recv().unwrap();
    assert!(control.stop());
    release.send(()).unwrap();
    let summary = handle.join().unwrap();

    assert!(summary.stopped_early);
    // The first folder's deletions stand.
    assert!(!first.join("one_01-02-2024.pdf").exists());
    assert_eq!(merged_outputs(&first).len(), 1);
    // The second folder merged but kept its sources.
    assert!(second.join("two_01-02-2024.pdf").exists());
    assert_eq!(merged_outputs(&second).len(), 1);
    // The third folder was never started.
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert!(merged_outputs(&third).is_empty());
    assert_eq!(summary.sources_deleted, 1);
}

#[test]
fn test_pause_and_resume_round_trip() {
    let tmp = tempdir().unwrap();
    let first = tmp.path().join("a_first");
    let second = tmp.path().join("b_second");
    fs::create_dir(&first).unwrap();
    fs::create_dir(&second).unwrap();
    fs::write(first.join("one_01-02-2024.pdf"), pdf_bytes()).unwrap();
    fs::write(second.join("two_01-02-2024.pdf"), pdf_bytes()).unwrap();

    let (merge, _calls, started, release) = FakeMergeBackend::gated(1);
    let engine = BatchEngine::new(
        config(tmp.path(), false),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    let control = engine.control();

    let handle = thread::spawn(move || engine.run(&SilentListener).unwrap());

    started.recv().unwrap();
    assert!(control.pause());
    release.send(()).unwrap();
    // The worker parks at the next checkpoint; resuming lets it finish.
    thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(control.state(), ControlState::Paused);
    assert!(control.resume());

    let summary = handle.join().unwrap();
    assert!(!summary.stopped_early);
    assert_eq!(summary.folders_merged, 2);
    assert_eq!(control.state(), ControlState::Completed);
}

#[test]
fn test_final_progress_reaches_one_hundred_percent() {
    let tmp = tempdir().unwrap();
    for (folder, file) in [("a", "x_01-02-2024.pdf"), ("b", "y_02-03-2024.pdf")] {
        let dir = tmp.path().join(folder);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(file), pdf_bytes()).unwrap();
    }

    let listener = CollectingListener::default();
    let (merge, _calls) = FakeMergeBackend::new();
    let engine = BatchEngine::new(
        config(tmp.path(), false),
        Box::new(merge),
        Box::new(FakeOcrBackend::new(true)),
    );
    engine.run(&listener).unwrap();

    let snapshots = listener.snapshots.lock().unwrap();
    assert!(!snapshots.is_empty());
    let last = snapshots.last().unwrap();
    assert_eq!(last.percent, 100.0);
    assert_eq!(last.files_done, last.files_total);
    // files_done never decreases across published snapshots.
    for pair in snapshots.windows(2) {
        assert!(pair[1].files_done >= pair[0].files_done);
    }
}
