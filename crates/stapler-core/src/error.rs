use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Session precondition failed: {0}")]
    SessionPrecondition(String),

    #[error("Merge backend failure: {0}")]
    MergeBackend(String),
}

/// Why a single input file was excluded from a merge. Per-file skips are
/// never fatal: the file is logged and the rest of the folder proceeds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("empty file (0 bytes)")]
    EmptyFile,

    #[error("file too small ({0} bytes)")]
    TooSmallFile(u64),

    #[error("file could not be read")]
    NotFound,

    #[error("corrupt PDF structure")]
    CorruptStructure,

    #[error("password protected PDF")]
    PasswordProtected,

    #[error("damaged or truncated PDF")]
    DamagedFile,
}

impl SkipReason {
    /// A short remediation hint for the log.
    pub fn hint(&self) -> &'static str {
        match self {
            SkipReason::EmptyFile | SkipReason::TooSmallFile(_) => {
                "remove the file or rescan the document"
            }
            SkipReason::NotFound => "check that the file still exists and is readable",
            SkipReason::CorruptStructure => {
                "repair the file in Adobe or Preview and save it again"
            }
            SkipReason::PasswordProtected => "remove the password before merging",
            SkipReason::DamagedFile => "the file is incomplete; export it again from the source",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR backend is not installed")]
    Unavailable,

    #[error("OCR failed: {0}")]
    Failed(String),
}
