use super::{OcrBackend, OcrCapability};
use crate::error::OcrError;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// OCR adapter shelling out to `ocrmypdf`. Writes to a temporary sibling
/// file and replaces the original only on success, so a failed run never
/// damages the source.
pub struct OcrmypdfBackend {
    binary: String,
}

impl OcrmypdfBackend {
    pub fn new() -> Self {
        Self {
            binary: "ocrmypdf".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for OcrmypdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for OcrmypdfBackend {
    fn probe(&self) -> OcrCapability {
        let available = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false);
        debug!("ocrmypdf probe: available={}", available);
        OcrCapability { available }
    }

    fn ocr_in_place(&self, path: &Path, language: &str) -> Result<(), OcrError> {
        let temp = path.with_extension("ocr.pdf");

        let output = Command::new(&self.binary)
            .arg("-l")
            .arg(language)
            .arg("--optimize")
            .arg("0")
            .arg("--skip-text")
            .arg(path)
            .arg(&temp)
            .output()
            .map_err(|_| OcrError::Unavailable)?;

        if output.status.success() {
            fs::rename(&temp, path).map_err(|err| OcrError::Failed(err.to_string()))?;
            return Ok(());
        }

        let _ = fs::remove_file(&temp);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lowered = stderr.to_lowercase();
        if lowered.contains("password") || lowered.contains("encrypted") {
            Err(OcrError::Failed("PDF is password protected".to_string()))
        } else if lowered.contains("no text found") || lowered.contains("page already has text") {
            // All pages already carry a text layer; nothing to add.
            Ok(())
        } else {
            let first = stderr.lines().next().unwrap_or("unknown error");
            Err(OcrError::Failed(first.chars().take(120).collect()))
        }
    }
}
