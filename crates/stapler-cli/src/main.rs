mod logging;
mod progress;

use std::io::{self, Write};

use colored::*;
use console::Term;
use dotenv::dotenv;
use indicatif::HumanBytes;
use tracing::{debug, error, info};

use stapler_core::backend::lopdf_merge::LopdfMergeBackend;
use stapler_core::backend::ocrmypdf::OcrmypdfBackend;
use stapler_core::{config, BatchEngine, SessionSummary};

use progress::CliListener;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let term = Term::stdout();
    let _ = term.hide_cursor();

    if let Err(err) = run_session() {
        error!("Error: {}", err);
    }

    let _ = term.show_cursor();
}

fn run_session() -> Result<(), String> {
    let config = config::load_configuration()
        .map_err(|err| format!("Error loading configuration: {}", err))?;
    debug!("config.base_path: {:?}", config.base_path);
    debug!("config.selected_folders: {:?}", config.selected_folders);
    debug!("config.quality_preset: {}", config.quality_preset.label());

    if config.delete_sources_after_merge && !confirm_deletion() {
        info!("Aborted; no files were touched.");
        return Ok(());
    }

    let engine = BatchEngine::new(
        config,
        Box::new(LopdfMergeBackend::new()),
        Box::new(OcrmypdfBackend::new()),
    );
    let summary = engine
        .run(&CliListener::new())
        .map_err(|err| format!("Error running merge session: {}", err))?;
    print_summary(&summary);

    Ok(())
}

/// Source deletion is irreversible, so it needs an explicit yes.
fn confirm_deletion() -> bool {
    println!(
        "{}",
        "Source PDFs will be DELETED after each successful merge.".red()
    );
    print!("Continue? [y/N] ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes")
}

fn print_summary(summary: &SessionSummary) {
    println!();
    if summary.stopped_early {
        println!("{}", "Session stopped early by request.".yellow());
    }
    println!(
        "Folders merged: {}  failed: {}",
        summary.folders_merged.to_string().green(),
        if summary.folders_failed > 0 {
            summary.folders_failed.to_string().red()
        } else {
            summary.folders_failed.to_string().normal()
        }
    );
    println!(
        "Files merged: {}  skipped: {}  previously merged: {}",
        summary.files_merged, summary.files_skipped, summary.already_merged_skipped
    );
    println!(
        "Size: {} -> {}",
        HumanBytes(summary.bytes_before),
        HumanBytes(summary.bytes_after)
    );
    if summary.sources_deleted > 0 {
        println!("Source files deleted: {}", summary.sources_deleted);
    }
    if summary.ocr_failures > 0 {
        println!(
            "{}",
            format!("OCR failed for {} file(s); merged without text layer", summary.ocr_failures)
                .yellow()
        );
    }
}
