use crate::config::AppConfig;
use crate::date;
use crate::error::{Error, SkipReason, SkippedFile};
use crate::validate::{self, ValidationState};
use chrono::{DateTime, Local, NaiveDate};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Folder {
    pub path: PathBuf,
    pub name: String,
}

/// One candidate file, re-derived on every session. Never cached across runs.
#[derive(Debug, Clone)]
pub struct PdfFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub extracted_date: Option<NaiveDate>,
    pub state: ValidationState,
}

/// Everything the orchestrator needs to process one folder: the ordered
/// usable files, the locally skipped ones, and the count of outputs from
/// prior runs that were filtered out entirely.
#[derive(Debug)]
pub struct MergeJob {
    pub folder: Folder,
    pub files: Vec<PdfFile>,
    pub skipped: Vec<SkippedFile>,
    pub already_merged_count: usize,
}

/// Resolve the folders to process. An explicit selection is honored in
/// order; an empty selection means every subfolder of the base path,
/// sorted by name. Selected folders that do not exist are logged and
/// dropped rather than failing the session.
pub fn discover_folders(config: &AppConfig) -> Result<Vec<Folder>, Error> {
    let base = &config.base_path;

    if !config.selected_folders.is_empty() {
        let mut folders = Vec::new();
        for name in &config.selected_folders {
            let path = base.join(name);
            if path.is_dir() {
                folders.push(Folder {
                    path,
                    name: name.clone(),
                });
            } else {
                warn!("Selected folder not found, skipping: {}", path.display());
            }
        }
        return Ok(folders);
    }

    let mut folders = Vec::new();
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            folders.push(Folder { path, name });
        }
    }
    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// Scan one folder into a job: list its PDF files, filter outputs of prior
/// runs, validate the rest and order the usable ones for merging.
/// Directory entries are taken in name order, which is the discovery order
/// undated files keep among themselves.
pub fn scan_folder(folder: &Folder) -> Result<MergeJob, Error> {
    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(&folder.path)? {
        let entry = entry?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    let mut already_merged_count = 0;

    for name in names {
        if !validate::is_pdf(&name) {
            continue;
        }
        if validate::is_already_merged(&name) {
            already_merged_count += 1;
            continue;
        }

        let path = folder.path.join(&name);
        let state = validate::validate(&path);
        let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

        match state {
            ValidationState::Usable => files.push(PdfFile {
                path,
                size_bytes,
                extracted_date: date::extract(&name),
                state,
            }),
            ValidationState::EmptySkip => skipped.push(SkippedFile {
                path,
                reason: SkipReason::EmptyFile,
            }),
            ValidationState::TooSmallSkip => skipped.push(SkippedFile {
                path,
                reason: SkipReason::TooSmallFile(size_bytes),
            }),
            ValidationState::Faulty => skipped.push(SkippedFile {
                path,
                reason: SkipReason::NotFound,
            }),
        }
    }

    order_for_merge(&mut files);
    debug!(
        "Scanned {}: {} usable, {} skipped, {} previously merged",
        folder.path.display(),
        files.len(),
        skipped.len(),
        already_merged_count
    );

    Ok(MergeJob {
        folder: folder.clone(),
        files,
        skipped,
        already_merged_count,
    })
}

/// Ordering policy: extracted date descending (newest first); files with no
/// date sort after all dated files, keeping discovery order among
/// themselves. The stable sort makes this the exact merge input order.
pub fn order_for_merge(files: &mut [PdfFile]) {
    files.sort_by(|a, b| match (a.extracted_date, b.extracted_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Output name for a merged folder: `<folder>_<YYYY-MM-DD>_<HH-MM-SS>.pdf`,
/// stamped with the merge completion time. The folder name is reduced to
/// alphanumerics, spaces, dashes and underscores.
pub fn output_filename(folder_name: &str, completed_at: DateTime<Local>) -> String {
    let safe: String = folder_name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    format!(
        "{}_{}.pdf",
        safe.trim(),
        completed_at.format("%Y-%m-%d_%H-%M-%S")
    )
}

/// Temporary output path used while the backend writes; renamed to the
/// dated name only after verification succeeds.
pub fn temp_output_path(folder: &Path) -> PathBuf {
    folder.join(".stapler_merge.tmp")
}
