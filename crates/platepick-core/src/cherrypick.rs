//! Per-plate processing: regress, select, gate, write.
//!
//! # Output layout
//!
//! Passing plates write under the output root, flagged plates under
//! `flagged/flag_<n>/`:
//! - `cherrypicked/<plate>_echo.csv`: accepted wells, tidy
//! - `non_cherrypicked/<plate>_echo.csv`: every non-empty well, tidy
//! - `concentrations/<plate>_concentrations.csv`: concentration grid
//! - `fluorescence/<plate>_fluorescence.csv`: raw grid
//! - `regression/<plate>_regression.json`: fit and check results

use std::path::{Path, PathBuf};

use platepick_qc::RegressionResult;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::convert::StandardsRegressor;
use crate::error::Result;
use crate::format::{FileFormat, read_grid, write_grid_csv};
use crate::gate::{GateResult, QualityGate};
use crate::grid::{ConcentrationGrid, FluorescenceGrid};
use crate::persist::{write_atomic, write_json};
use crate::records::{records_from_cells, write_records};
use crate::select::WellSelector;

pub const CHERRYPICKED_DIR: &str = "cherrypicked";
pub const NON_CHERRYPICKED_DIR: &str = "non_cherrypicked";

/// One plate-reader export to process.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateInput {
    pub path: PathBuf,
    pub plate: String,
    pub sample_id: String,
    pub format: FileFormat,
}

/// Summary of one processed plate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateReport {
    pub plate: String,
    pub sample_id: String,
    pub regression: RegressionResult,
    pub blanks_threshold: f64,
    pub accepted_wells: usize,
    pub gate: GateResult,
    /// Directory the plate's outputs went to.
    pub output_dir: PathBuf,
    /// Tidy file of the accepted wells, ready for batching.
    pub cherrypicked: PathBuf,
}

impl PlateReport {
    pub fn passed(&self) -> bool {
        self.gate.passed
    }
}

/// Runs the per-plate steps with one configuration.
#[derive(Debug, Clone)]
pub struct Cherrypicker {
    regressor: StandardsRegressor,
    selector: WellSelector,
    gate: QualityGate,
    output_root: PathBuf,
}

impl Cherrypicker {
    pub fn new(config: &PipelineConfig, output_root: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let output_root = output_root.into();
        let plate = &config.plate;
        Ok(Self {
            regressor: StandardsRegressor::new(
                plate.standards_col,
                plate.standards_map()?,
                plate.trim_outer_standards,
            ),
            selector: WellSelector::new(plate.blanks_col),
            gate: QualityGate::for_output(config.thresholds, plate.blanks_col, &output_root),
            output_root,
        })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    /// Read a plate-reader export and process it.
    pub fn process(&self, input: &PlateInput) -> Result<PlateReport> {
        let fluorescence = read_grid(&input.path, input.format)?;
        self.process_grid(&input.plate, &input.sample_id, &fluorescence)
    }

    /// Process an already-parsed fluorescence grid.
    pub fn process_grid(
        &self,
        plate: &str,
        sample_id: &str,
        fluorescence: &FluorescenceGrid,
    ) -> Result<PlateReport> {
        let (regression, concentrations) = self.regressor.convert(fluorescence)?;
        let selection = self.selector.select(&concentrations)?;
        log::info!(
            "{plate} ({sample_id}): {} well(s) passing concentration threshold {:.4}, r = {:.5}",
            selection.len(),
            selection.threshold,
            regression.r
        );

        let gate = self
            .gate
            .evaluate(plate, &concentrations, regression.r, &selection)?;
        let output_dir = if gate.passed {
            self.output_root.clone()
        } else {
            self.output_root.join(&gate.output_subdir)
        };

        let accepted = records_from_cells(&selection.wells, plate, sample_id);
        let cherrypicked = output_dir
            .join(CHERRYPICKED_DIR)
            .join(format!("{plate}_echo.csv"));
        write_atomic(&cherrypicked, &write_records(&accepted)?)?;
        log::info!("wrote cherrypicked pick list to {}", cherrypicked.display());

        let all_cells: Vec<_> = concentrations.cells().collect();
        let everything = records_from_cells(&all_cells, plate, sample_id);
        write_atomic(
            &output_dir
                .join(NON_CHERRYPICKED_DIR)
                .join(format!("{plate}_echo.csv")),
            &write_records(&everything)?,
        )?;

        write_grids(&output_dir, plate, fluorescence, &concentrations)?;

        let report = PlateReport {
            plate: plate.to_string(),
            sample_id: sample_id.to_string(),
            regression,
            blanks_threshold: selection.threshold,
            accepted_wells: selection.len(),
            gate,
            output_dir,
            cherrypicked,
        };
        write_json(
            &report
                .output_dir
                .join("regression")
                .join(format!("{plate}_regression.json")),
            &report,
        )?;
        Ok(report)
    }
}

fn write_grids(
    output_dir: &Path,
    plate: &str,
    fluorescence: &FluorescenceGrid,
    concentrations: &ConcentrationGrid,
) -> Result<()> {
    write_atomic(
        &output_dir
            .join("fluorescence")
            .join(format!("{plate}_fluorescence.csv")),
        &write_grid_csv(fluorescence)?,
    )?;
    write_atomic(
        &output_dir
            .join("concentrations")
            .join(format!("{plate}_concentrations.csv")),
        &write_grid_csv(concentrations)?,
    )
}
