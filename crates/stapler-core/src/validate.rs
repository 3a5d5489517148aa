use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Anything below this is treated as too small to be a real PDF. The same
/// threshold is used to verify merged output files.
pub const MIN_PDF_BYTES: u64 = 100;

/// Cheap, local classification of a candidate file. Structural checks are
/// the merge backend's job; this only fails fast on size and name pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Usable,
    EmptySkip,
    TooSmallSkip,
    Faulty,
}

lazy_static! {
    // Output of a prior run: <anything>_YYYY-MM-DD_HH-MM-SS.pdf
    static ref JOINED_PDF: Regex =
        Regex::new(r"(?i)_\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}\.pdf$").unwrap();
}

/// True when the filename carries the timestamp suffix of a previously
/// merged output. Such files are excluded from every job, which keeps a
/// second run over the same folder from chain-merging its own output.
pub fn is_already_merged(filename: &str) -> bool {
    JOINED_PDF.is_match(filename)
}

pub fn is_pdf(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
}

pub fn validate(path: &Path) -> ValidationState {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => ValidationState::EmptySkip,
        Ok(meta) if meta.len() < MIN_PDF_BYTES => ValidationState::TooSmallSkip,
        Ok(_) => ValidationState::Usable,
        Err(_) => ValidationState::Faulty,
    }
}
