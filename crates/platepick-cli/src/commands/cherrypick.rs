//! `platepick cherrypick`: QC one plate and write its output tree.

use std::path::PathBuf;

use platepick_core::{Cherrypicker, PipelineConfig, PlateInput, PlateReport};

pub struct CherrypickCommandConfig<'a> {
    pub file: &'a str,
    pub plate: &'a str,
    pub sample_id: &'a str,
    pub filetype: Option<&'a str>,
    pub output_folder: &'a str,
    pub config: PipelineConfig,
}

pub fn run(cfg: CherrypickCommandConfig<'_>) {
    let path = PathBuf::from(cfg.file);
    let format =
        super::resolve_format(&path, cfg.filetype).unwrap_or_else(|e| super::fail(cfg.file, e));
    let picker = Cherrypicker::new(&cfg.config, cfg.output_folder)
        .unwrap_or_else(|e| super::fail("Invalid configuration", e));

    let report = picker
        .process(&PlateInput {
            path,
            plate: cfg.plate.to_string(),
            sample_id: cfg.sample_id.to_string(),
            format,
        })
        .unwrap_or_else(|e| super::fail(cfg.plate, e));
    print_report(&report);
}

/// Human-readable summary of one plate.
pub fn print_report(report: &PlateReport) {
    let verdict = if report.passed() { "PASS" } else { "FLAGGED" };
    println!("{} ({}): {verdict}", report.plate, report.sample_id);
    println!(
        "  fit        slope {:.4}  intercept {:.4}  r {:.5}",
        report.regression.slope, report.regression.intercept, report.regression.r
    );
    println!(
        "  selection  {} well(s) above {:.4}",
        report.accepted_wells, report.blanks_threshold
    );
    for check in &report.gate.checks {
        let mark = if check.passed { "ok" } else { "FAIL" };
        println!("  {:<10} {mark:<4}  {}", check.check.to_string(), check.details);
    }
    if let Some(n) = report.gate.occurrence {
        println!("  flagged {n} time(s) so far");
    }
    println!("  output     {}", report.output_dir.display());
}
