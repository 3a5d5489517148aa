pub mod backend;
pub mod config;
pub mod date;
pub mod engine;
pub mod error;
pub mod preset;
pub mod progress;
pub mod scanner;
pub mod validate;

pub use config::AppConfig;
pub use engine::{BatchEngine, ControlState, MergeOutcome, SessionControl, SessionSummary};
pub use error::{Error, OcrError, SkipReason, SkippedFile};
pub use preset::{CompressionParams, QualityPreset};
pub use progress::{ProgressListener, ProgressSnapshot, ProgressTracker, SilentListener};
