//! External collaborator seams: the byte-level PDF merge routine and the
//! OCR engine. The orchestrator only sees these traits; the shipped
//! adapters are thin and replaceable.

pub mod lopdf_merge;
pub mod ocrmypdf;

use crate::error::{Error, OcrError, SkippedFile};
use crate::preset::CompressionParams;
use std::path::{Path, PathBuf};

/// Result of one backend merge invocation. Per-input problems surface as
/// skip entries; an `Err` from [`MergeBackend::merge`] means the whole
/// folder failed (nothing usable was written).
#[derive(Debug)]
pub struct MergeReport {
    pub merged_files: usize,
    pub skipped: Vec<SkippedFile>,
    pub output_bytes: u64,
}

pub trait MergeBackend: Send + Sync {
    /// Merge `inputs` (already validated and ordered) into `output`,
    /// applying `params`. Treated as atomic by the orchestrator: it is
    /// never interrupted mid-call.
    fn merge(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        params: &CompressionParams,
    ) -> Result<MergeReport, Error>;
}

/// Result of the one-time OCR availability probe at session start.
#[derive(Debug, Clone, Copy)]
pub struct OcrCapability {
    pub available: bool,
}

pub trait OcrBackend: Send + Sync {
    fn probe(&self) -> OcrCapability;

    /// Rewrite `path` in place with a searchable text layer. Pages that
    /// already contain extractable text are left untouched, so the call is
    /// idempotent on reprocessing.
    fn ocr_in_place(&self, path: &Path, language: &str) -> Result<(), OcrError>;
}
