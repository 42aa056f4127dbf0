//! Ordinary least-squares fit of standards fluorescence against nominal
//! concentration.
//!
//! Replicate standards are averaged per nominal concentration level before
//! fitting, so duplicated rows weigh the same as single ones. The fit is
//! `fluorescence = slope * concentration + intercept`; converting a reading
//! back to a concentration is therefore `(f - intercept) / slope`.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;

/// Errors raised by the standards regression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegressionError {
    /// Fewer than two concentration levels are left to fit a line through.
    #[error("insufficient standards: {groups} concentration level(s) left after grouping, need at least 2")]
    InsufficientStandards { groups: usize },
}

/// Mean measured fluorescence of one nominal concentration level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelMean {
    pub concentration: f64,
    pub mean_fluorescence: f64,
    /// Number of replicate readings averaged.
    pub replicates: usize,
}

/// Outcome of a standards regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient, always within [-1, 1].
    pub r: f64,
    /// The level means the line was fitted through, ascending by concentration.
    pub levels: Vec<LevelMean>,
}

impl RegressionResult {
    /// Convert a fluorescence reading into a concentration.
    pub fn concentration(&self, fluorescence: f64) -> f64 {
        (fluorescence - self.intercept) / self.slope
    }
}

/// Group `(nominal concentration, measured fluorescence)` pairs by nominal
/// concentration and average each group.
///
/// NaN readings are ignored; a level whose readings are all NaN is dropped.
/// Levels come back sorted by ascending concentration.
pub fn level_means(points: &[(f64, f64)]) -> Vec<LevelMean> {
    let mut sorted: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(_, f)| !f.is_nan())
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut levels: Vec<LevelMean> = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let concentration = sorted[start].0;
        let end = sorted[start..]
            .iter()
            .position(|(c, _)| *c != concentration)
            .map_or(sorted.len(), |offset| start + offset);
        let readings: Vec<f64> = sorted[start..end].iter().map(|(_, f)| *f).collect();
        levels.push(LevelMean {
            concentration,
            mean_fluorescence: readings.iter().mean(),
            replicates: readings.len(),
        });
        start = end;
    }
    levels
}

/// Least-squares line through `(x, y)` returning `(slope, intercept, r)`.
///
/// When `y` has no variance the correlation is reported as 0. `x` must contain
/// at least two distinct values.
pub fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    let mean_x = x.iter().mean();
    let mean_y = y.iter().mean();
    let var_x = x.iter().variance();
    let var_y = y.iter().variance();
    let cov = x.iter().covariance(y.iter());

    let slope = cov / var_x;
    let intercept = mean_y - slope * mean_x;
    let r = if var_y == 0.0 || var_x == 0.0 {
        0.0
    } else {
        (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
    };
    (slope, intercept, r)
}

/// Fit the standards curve.
///
/// With `trim_outer_levels` the lowest and highest concentration levels are
/// discarded before fitting, which keeps saturated and floor readings out of
/// the line. A poor fit is not an error here; only a degenerate one is.
pub fn fit_standards(
    points: &[(f64, f64)],
    trim_outer_levels: bool,
) -> Result<RegressionResult, RegressionError> {
    let mut levels = level_means(points);
    if trim_outer_levels {
        if levels.len() <= 2 {
            return Err(RegressionError::InsufficientStandards {
                groups: levels.len().saturating_sub(2),
            });
        }
        levels.pop();
        levels.remove(0);
    }
    if levels.len() < 2 {
        return Err(RegressionError::InsufficientStandards {
            groups: levels.len(),
        });
    }

    let x: Vec<f64> = levels.iter().map(|l| l.concentration).collect();
    let y: Vec<f64> = levels.iter().map(|l| l.mean_fluorescence).collect();
    let (slope, intercept, r) = linear_fit(&x, &y);
    log::debug!(
        "standards fit over {} levels: slope={slope:.6} intercept={intercept:.6} r={r:.6}",
        levels.len()
    );

    Ok(RegressionResult {
        slope,
        intercept,
        r,
        levels,
    })
}
