//! End-to-end run: cherrypick every plate, then batch the ones that passed.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::batcher::{BatchSummary, PlateBatcher};
use crate::cherrypick::{Cherrypicker, PlateInput, PlateReport};
use crate::config::PipelineConfig;
use crate::error::{PickError, Result};

/// Pick lists of a full run go here, under the output root.
pub const PICKLISTS_DIR: &str = "picklists";

/// A plate that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPlate {
    pub plate: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub plates: Vec<PlateReport>,
    pub skipped: Vec<SkippedPlate>,
    pub batches: BatchSummary,
}

impl PipelineReport {
    /// Names of the plates routed to the flagged tree.
    pub fn flagged(&self) -> Vec<&str> {
        self.plates
            .iter()
            .filter(|p| !p.passed())
            .map(|p| p.plate.as_str())
            .collect()
    }
}

/// Process `inputs` in order and batch the passing plates into
/// `<output_root>/picklists`.
///
/// A plate whose standards cannot be fitted is skipped with a warning; any
/// other error ends the run.
pub fn run_pipeline(
    config: &PipelineConfig,
    output_root: &Path,
    inputs: &[PlateInput],
    force: bool,
) -> Result<PipelineReport> {
    let picker = Cherrypicker::new(config, output_root)?;
    let mut plates = Vec::new();
    let mut skipped = Vec::new();

    for input in inputs {
        match picker.process(input) {
            Ok(report) => plates.push(report),
            Err(err @ PickError::InsufficientStandards { .. }) => {
                log::warn!("{}: skipped, {err}", input.plate);
                skipped.push(SkippedPlate {
                    plate: input.plate.clone(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    let passing: Vec<PathBuf> = plates
        .iter()
        .filter(|p| p.passed())
        .map(|p| p.cherrypicked.clone())
        .collect();
    log::info!(
        "{} of {} plate(s) passed QC, batching their wells",
        passing.len(),
        inputs.len()
    );
    let batches = PlateBatcher::new(output_root.join(PICKLISTS_DIR), config.batch.clone())
        .force(force)
        .run(&passing)?;

    Ok(PipelineReport {
        plates,
        skipped,
        batches,
    })
}
