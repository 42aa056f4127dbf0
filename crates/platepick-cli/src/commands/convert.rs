//! `platepick convert`: fluorescence grid to concentration grid.

use std::io::Write;
use std::path::Path;

use platepick_core::{PipelineConfig, StandardsRegressor, read_grid, write_grid_csv};

pub fn run(file: &str, filetype: Option<&str>, config: PipelineConfig) {
    let path = Path::new(file);
    let format = super::resolve_format(path, filetype).unwrap_or_else(|e| super::fail(file, e));
    let grid = read_grid(path, format).unwrap_or_else(|e| super::fail(file, e));
    let standards = config
        .plate
        .standards_map()
        .unwrap_or_else(|e| super::fail("Invalid standards", e));

    let regressor = StandardsRegressor::new(
        config.plate.standards_col,
        standards,
        config.plate.trim_outer_standards,
    );
    let (fit, concentrations) = regressor
        .convert(&grid)
        .unwrap_or_else(|e| super::fail(file, e));

    log::info!(
        "fit: slope {:.4}, intercept {:.4}, r {:.5}",
        fit.slope,
        fit.intercept,
        fit.r
    );
    if fit.r < config.thresholds.r_minimum {
        log::warn!(
            "{file}: r = {:.5} is below the minimum {}",
            fit.r,
            config.thresholds.r_minimum
        );
    }

    let bytes = write_grid_csv(&concentrations).unwrap_or_else(|e| super::fail(file, e));
    if let Err(e) = std::io::stdout().lock().write_all(&bytes) {
        super::fail("Failed to write output", e);
    }
}
