//! `platepick run`: cherrypick every plate, then batch the passing ones.

use std::path::Path;

use platepick_core::{PipelineConfig, PlateInput, run_pipeline};

pub fn run(
    out: &str,
    plates: &[String],
    filetype: Option<&str>,
    force: bool,
    config: PipelineConfig,
) {
    let inputs: Vec<PlateInput> = plates
        .iter()
        .map(|arg| {
            super::parse_plate_arg(arg, filetype).unwrap_or_else(|e| super::fail("Bad plate", e))
        })
        .collect();

    let report = run_pipeline(&config, Path::new(out), &inputs, force)
        .unwrap_or_else(|e| super::fail("Run failed", e));

    for plate in &report.plates {
        super::cherrypick::print_report(plate);
    }
    for skipped in &report.skipped {
        println!("{}: SKIPPED ({})", skipped.plate, skipped.reason);
    }
    let flagged = report.flagged();
    if !flagged.is_empty() {
        println!("Flagged: {}", flagged.join(", "));
    }
    println!();
    super::aggregate::print_summary(&report.batches);
}
