//! Plate quality gate with repeat-offender tracking.
//!
//! The checks themselves live in `platepick-qc`; this module wires them to a
//! plate and, on failure, records the plate in the [`FlagLog`] and picks the
//! `flagged/flag_<n>` directory its output is routed to.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use platepick_qc::{CheckInputs, CheckResult, QcCheck, QcThresholds, failed_checks, run_all_checks};
use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};
use crate::flags::FlagLog;
use crate::grid::ConcentrationGrid;
use crate::select::WellSelection;

/// Directory under the output root that holds flagged plates and the flag log.
pub const FLAGGED_DIR: &str = "flagged";
/// File name of the flag log inside [`FLAGGED_DIR`].
pub const FLAG_RECORD_FILE: &str = "flag_record.csv";

/// Outcome of gating one plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
    pub failed: BTreeSet<QcCheck>,
    /// Occurrence count after this failure; `None` when the plate passed.
    pub occurrence: Option<usize>,
    /// Output location relative to the output root; empty when passed.
    pub output_subdir: PathBuf,
}

/// Relative directory for the `n`th failure of a plate.
pub fn flagged_subdir(occurrence: usize) -> PathBuf {
    PathBuf::from(FLAGGED_DIR).join(format!("flag_{occurrence}"))
}

/// Applies the quality checks and maintains the flag log.
#[derive(Debug, Clone)]
pub struct QualityGate {
    thresholds: QcThresholds,
    blanks_col: usize,
    log: FlagLog,
}

impl QualityGate {
    pub fn new(thresholds: QcThresholds, blanks_col: usize, log: FlagLog) -> Self {
        Self {
            thresholds,
            blanks_col,
            log,
        }
    }

    /// Gate whose flag log lives in the standard place under `output_root`.
    pub fn for_output(thresholds: QcThresholds, blanks_col: usize, output_root: &Path) -> Self {
        let log = FlagLog::new(output_root.join(FLAGGED_DIR).join(FLAG_RECORD_FILE));
        Self::new(thresholds, blanks_col, log)
    }

    pub fn flag_log(&self) -> &FlagLog {
        &self.log
    }

    /// Evaluate a plate now.
    pub fn evaluate(
        &self,
        plate: &str,
        concentrations: &ConcentrationGrid,
        r: f64,
        selection: &WellSelection,
    ) -> Result<GateResult> {
        let now = chrono::Local::now().naive_local();
        self.evaluate_at(plate, concentrations, r, selection, now)
    }

    /// Evaluate a plate, stamping any flag with `at`.
    pub fn evaluate_at(
        &self,
        plate: &str,
        concentrations: &ConcentrationGrid,
        r: f64,
        selection: &WellSelection,
        at: NaiveDateTime,
    ) -> Result<GateResult> {
        let blanks = concentrations.column(self.blanks_col).ok_or_else(|| {
            PickError::Config(format!(
                "blanks column {} is outside the plate",
                self.blanks_col
            ))
        })?;
        let accepted = selection.concentrations();
        let inputs = CheckInputs {
            blanks: &blanks,
            r,
            accepted: &accepted,
            all: concentrations.values(),
        };
        let checks = run_all_checks(&inputs, &self.thresholds);
        let failed = failed_checks(&checks);

        if failed.is_empty() {
            log::info!("{plate}: passed all checks");
            return Ok(GateResult {
                passed: true,
                checks,
                failed,
                occurrence: None,
                output_subdir: PathBuf::new(),
            });
        }

        for check in checks.iter().filter(|c| !c.passed) {
            log::warn!("{plate}: {} check failed ({})", check.check, check.details);
        }
        let occurrence = self.log.record(plate, at)?;
        let output_subdir = flagged_subdir(occurrence);
        log::warn!(
            "{plate}: flagged (occurrence {occurrence}), output goes to {}",
            output_subdir.display()
        );
        Ok(GateResult {
            passed: false,
            checks,
            failed,
            occurrence: Some(occurrence),
            output_subdir,
        })
    }
}
