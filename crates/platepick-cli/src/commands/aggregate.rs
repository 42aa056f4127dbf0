//! `platepick aggregate`: resumable pick-list batching.

use std::path::PathBuf;

use platepick_core::picklist::picklist_file_name;
use platepick_core::{BatchSummary, PipelineConfig, PlateBatcher};

pub fn run(files: &[String], output_folder: &str, force: bool, config: PipelineConfig) {
    let files: Vec<PathBuf> = files.iter().map(PathBuf::from).collect();
    let summary = PlateBatcher::new(output_folder, config.batch)
        .force(force)
        .run(&files)
        .unwrap_or_else(|e| super::fail("Aggregation failed", e));
    print_summary(&summary);
}

pub fn print_summary(summary: &BatchSummary) {
    println!("Run {}", summary.run_id);
    println!(
        "  plates     {} batched, {} already seen",
        summary.processed_plates.len(),
        summary.skipped_plates.len()
    );
    if summary.sealed.is_empty() {
        println!("  sealed     none");
    } else {
        let names: Vec<String> = summary
            .sealed
            .iter()
            .map(|n| picklist_file_name(*n, true))
            .collect();
        println!("  sealed     {}", names.join(", "));
    }
    if let Some(n) = summary.partial {
        println!(
            "  waiting    {} row(s) in {} from {}",
            summary.pending_rows,
            picklist_file_name(n, false),
            summary.pending_plates.join(", ")
        );
    }
    println!(
        "  rows       {} in, {} written",
        summary.rows_in, summary.rows_written
    );
    if summary.orphaned_rows() > 0 {
        eprintln!("{} row(s) reached no pick list", summary.orphaned_rows());
        std::process::exit(1);
    }
}
