//! Fluorescence to concentration conversion.

use platepick_qc::{RegressionResult, fit_standards};

use crate::error::Result;
use crate::grid::{ConcentrationGrid, FluorescenceGrid};
use crate::standards::StandardsMap;

/// Fits the standards column of a plate and applies the fit to every well.
#[derive(Debug, Clone)]
pub struct StandardsRegressor {
    standards_col: usize,
    standards: StandardsMap,
    trim_outer_levels: bool,
}

impl StandardsRegressor {
    pub fn new(standards_col: usize, standards: StandardsMap, trim_outer_levels: bool) -> Self {
        Self {
            standards_col,
            standards,
            trim_outer_levels,
        }
    }

    /// Fit nominal concentration against mean fluorescence per standards level.
    ///
    /// A poor fit is not an error; only fewer than two usable levels is.
    pub fn regress(&self, grid: &FluorescenceGrid) -> Result<RegressionResult> {
        let points = self.standards.pair_with_column(grid, self.standards_col)?;
        Ok(fit_standards(&points, self.trim_outer_levels)?)
    }

    /// Fit and convert in one step.
    pub fn convert(&self, grid: &FluorescenceGrid) -> Result<(RegressionResult, ConcentrationGrid)> {
        let fit = self.regress(grid)?;
        let concentrations = to_concentrations(grid, &fit);
        Ok((fit, concentrations))
    }
}

/// Apply `(F - intercept) / slope` to every reading.
pub fn to_concentrations(grid: &FluorescenceGrid, fit: &RegressionResult) -> ConcentrationGrid {
    grid.map(|f| fit.concentration(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PickError;
    use crate::grid::{PLATE_COLS, PLATE_ROWS, PlateGrid};

    /// 16x24 plate whose standards column reads `10 * nominal + 5`.
    fn plate(standards: &StandardsMap) -> PlateGrid {
        let mut rows = vec![vec![25.0; PLATE_COLS]; PLATE_ROWS];
        for (i, (_, nominal)) in standards.iter().enumerate() {
            rows[i][PLATE_COLS - 1] = 10.0 * nominal + 5.0;
        }
        PlateGrid::from_rows(rows).unwrap()
    }

    #[test]
    fn test_regress_recovers_linear_standards() {
        let standards = StandardsMap::default();
        let regressor = StandardsRegressor::new(24, standards.clone(), true);
        let fit = regressor.regress(&plate(&standards)).unwrap();
        assert!((fit.slope - 10.0).abs() < 1e-9);
        assert!((fit.intercept - 5.0).abs() < 1e-9);
        assert!((fit.r - 1.0).abs() < 1e-12);
        // 8 levels, outer two trimmed
        assert_eq!(fit.levels.len(), 6);
    }

    #[test]
    fn test_regress_is_deterministic() {
        let standards = StandardsMap::default();
        let regressor = StandardsRegressor::new(24, standards.clone(), true);
        let grid = plate(&standards);
        assert_eq!(regressor.regress(&grid).unwrap(), regressor.regress(&grid).unwrap());
    }

    #[test]
    fn test_convert_applies_fit() {
        let standards = StandardsMap::default();
        let regressor = StandardsRegressor::new(24, standards.clone(), false);
        let (_, conc) = regressor.convert(&plate(&standards)).unwrap();
        // 25 = 10 * 2 + 5
        assert!((conc.get('A', 1).unwrap() - 2.0).abs() < 1e-9);
        assert!((conc.get('A', 24).unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_levels_after_trim() {
        let standards = StandardsMap::from_values(&[4.0, 4.0, 2.0, 2.0, 1.0, 1.0]).unwrap();
        let regressor = StandardsRegressor::new(24, standards.clone(), true);
        let err = regressor.regress(&plate(&standards)).unwrap_err();
        assert!(matches!(err, PickError::InsufficientStandards { groups: 1 }));
    }

    #[test]
    fn test_standards_column_out_of_range() {
        let standards = StandardsMap::default();
        let regressor = StandardsRegressor::new(30, standards.clone(), true);
        assert!(regressor.regress(&plate(&standards)).is_err());
    }
}
