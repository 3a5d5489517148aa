use crate::preset::QualityPreset;
use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;
use std::path::PathBuf;

/// Session configuration. Passed into the engine at construction; there is
/// no process-wide mutable state and nothing is persisted back.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub base_path: PathBuf,

    /// Folder names under `base_path` to process, in order. Empty means
    /// every immediate subfolder, sorted by name.
    #[serde(default)]
    pub selected_folders: Vec<String>,

    #[serde(default)]
    pub delete_sources_after_merge: bool,

    #[serde(default)]
    pub quality_preset: QualityPreset,

    #[serde(default)]
    pub ocr_enabled: bool,

    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
}

fn default_ocr_language() -> String {
    "deu".to_string()
}

/// Load configuration from an optional `Config.toml` in the working
/// directory. Unknown quality preset names fail here, before any job starts.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
