//! Blank-threshold well selection.

use platepick_qc::stats;

use crate::error::{PickError, Result};
use crate::grid::{ConcentrationGrid, GridCell};

/// Wells whose concentration clears the blanks threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct WellSelection {
    /// Mean + sample sd of the blanks column.
    pub threshold: f64,
    /// Accepted wells, row-major.
    pub wells: Vec<GridCell>,
}

impl WellSelection {
    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }

    /// Concentrations of the accepted wells.
    pub fn concentrations(&self) -> Vec<f64> {
        self.wells.iter().map(|c| c.value).collect()
    }
}

/// Selects candidate wells against the noise floor of the blanks column.
#[derive(Debug, Clone, Copy)]
pub struct WellSelector {
    blanks_col: usize,
}

impl WellSelector {
    pub fn new(blanks_col: usize) -> Self {
        Self { blanks_col }
    }

    /// Concentrations of the blanks column.
    pub fn blanks(&self, concentrations: &ConcentrationGrid) -> Result<Vec<f64>> {
        concentrations.column(self.blanks_col).ok_or_else(|| {
            PickError::Config(format!(
                "blanks column {} is outside the plate (1..={})",
                self.blanks_col,
                concentrations.cols()
            ))
        })
    }

    /// Keep wells strictly above `mean(blanks) + sd(blanks)`.
    ///
    /// Only columns before the blanks column are candidates. NaN wells never
    /// pass, and an all-NaN blanks column accepts nothing.
    pub fn select(&self, concentrations: &ConcentrationGrid) -> Result<WellSelection> {
        let threshold = stats::mean_plus_std(&self.blanks(concentrations)?);
        let wells: Vec<GridCell> = concentrations
            .cells()
            .filter(|c| c.position.column < self.blanks_col && c.value > threshold)
            .collect();
        log::debug!(
            "selected {} well(s) above blanks threshold {threshold:.4}",
            wells.len()
        );
        Ok(WellSelection { threshold, wells })
    }
}
