//! The four plate quality checks.
//!
//! Each check is independent and returns a [`CheckResult`]; a plate passes only
//! when every check passes. None of them has side effects; tracking repeat
//! failures is the caller's business.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::stats;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifies one quality check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcCheck {
    /// Blanks must average above zero.
    Blanks,
    /// Standards fit must correlate well enough.
    Regression,
    /// Accepted wells must be bright enough to trust.
    Samples,
    /// No well may exceed the concentration ceiling.
    Ceiling,
}

impl std::fmt::Display for QcCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blanks => write!(f, "blanks"),
            Self::Regression => write!(f, "regression"),
            Self::Samples => write!(f, "samples"),
            Self::Ceiling => write!(f, "ceiling"),
        }
    }
}

/// Pass/fail limits for the checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcThresholds {
    /// Minimum Pearson r of the standards fit.
    pub r_minimum: f64,
    /// Mean + sd of accepted wells must exceed this.
    pub sample_floor: f64,
    /// Largest allowed concentration anywhere on the plate.
    pub concentration_ceiling: f64,
}

impl Default for QcThresholds {
    fn default() -> Self {
        Self {
            r_minimum: 0.98,
            sample_floor: 0.7,
            concentration_ceiling: 10.0,
        }
    }
}

/// Result of a single quality check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: QcCheck,
    pub passed: bool,
    pub statistic: f64,
    pub threshold: f64,
    pub details: String,
}

/// Everything the checks look at for one plate.
#[derive(Debug, Clone, Copy)]
pub struct CheckInputs<'a> {
    /// Concentrations of the blanks column.
    pub blanks: &'a [f64],
    /// Correlation coefficient of the standards fit.
    pub r: f64,
    /// Concentrations of the wells accepted by selection.
    pub accepted: &'a [f64],
    /// Every concentration on the plate.
    pub all: &'a [f64],
}

// ═══════════════════════════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════════════════════════

/// Blanks check: the mean blank concentration must be strictly positive.
///
/// A non-positive mean means the regression turned the noise floor negative.
pub fn blanks_check(blanks: &[f64]) -> CheckResult {
    let m = stats::mean(blanks);
    let passed = m > 0.0;
    CheckResult {
        check: QcCheck::Blanks,
        passed,
        statistic: m,
        threshold: 0.0,
        details: format!("mean of {} blanks = {m:.4}", blanks.len()),
    }
}

/// Regression check: r must reach the configured minimum.
pub fn regression_check(r: f64, r_minimum: f64) -> CheckResult {
    CheckResult {
        check: QcCheck::Regression,
        passed: r >= r_minimum,
        statistic: r,
        threshold: r_minimum,
        details: format!("r = {r:.5}, minimum {r_minimum}"),
    }
}

/// Samples check: mean + sd of the accepted wells must exceed the floor.
pub fn samples_check(accepted: &[f64], floor: f64) -> CheckResult {
    if accepted.iter().all(|v| v.is_nan()) {
        return CheckResult {
            check: QcCheck::Samples,
            passed: false,
            statistic: f64::NAN,
            threshold: floor,
            details: "no accepted wells".to_string(),
        };
    }
    let value = stats::mean_plus_std(accepted);
    CheckResult {
        check: QcCheck::Samples,
        passed: value > floor,
        statistic: value,
        threshold: floor,
        details: format!(
            "mean + sd of {} accepted wells = {value:.4}, floor {floor}",
            accepted.len()
        ),
    }
}

/// Ceiling check: no concentration may exceed the ceiling.
pub fn ceiling_check(all: &[f64], ceiling: f64) -> CheckResult {
    let max = stats::max_present(all);
    let over = all.iter().filter(|v| **v > ceiling).count();
    CheckResult {
        check: QcCheck::Ceiling,
        passed: over == 0,
        statistic: max.unwrap_or(f64::NAN),
        threshold: ceiling,
        details: match max {
            Some(m) => format!("max = {m:.4}, {over} well(s) above {ceiling}"),
            None => "no readings".to_string(),
        },
    }
}

/// Run every check in a fixed order.
pub fn run_all_checks(inputs: &CheckInputs<'_>, thresholds: &QcThresholds) -> Vec<CheckResult> {
    vec![
        blanks_check(inputs.blanks),
        regression_check(inputs.r, thresholds.r_minimum),
        samples_check(inputs.accepted, thresholds.sample_floor),
        ceiling_check(inputs.all, thresholds.concentration_ceiling),
    ]
}

/// The checks that did not pass.
pub fn failed_checks(results: &[CheckResult]) -> BTreeSet<QcCheck> {
    results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| r.check)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blanks_positive_passes() {
        assert!(blanks_check(&[0.01, 0.02, 0.0]).passed);
    }

    #[test]
    fn test_blanks_zero_or_negative_fails() {
        assert!(!blanks_check(&[0.0, 0.0]).passed);
        assert!(!blanks_check(&[-0.1, 0.05]).passed);
    }

    #[test]
    fn test_blanks_all_nan_fails() {
        assert!(!blanks_check(&[f64::NAN]).passed);
    }

    #[test]
    fn test_regression_boundary_is_inclusive() {
        assert!(regression_check(0.98, 0.98).passed);
        assert!(!regression_check(0.9799, 0.98).passed);
    }

    #[test]
    fn test_samples_floor() {
        // mean 0.5, sample sd 0.1 -> 0.6
        let accepted = [0.4, 0.5, 0.6];
        let result = samples_check(&accepted, 0.7);
        assert!(!result.passed);
        assert!((result.statistic - 0.6).abs() < 1e-9);
        assert!(samples_check(&accepted, 0.55).passed);
    }

    #[test]
    fn test_samples_empty_fails() {
        let result = samples_check(&[], 0.7);
        assert!(!result.passed);
        assert!(result.details.contains("no accepted"));
    }

    #[test]
    fn test_ceiling() {
        assert!(ceiling_check(&[1.0, 9.99, f64::NAN], 10.0).passed);
        assert!(ceiling_check(&[10.0], 10.0).passed);
        let failed = ceiling_check(&[1.0, 12.0, 15.0], 10.0);
        assert!(!failed.passed);
        assert!(failed.details.contains("2 well(s)"));
        assert!(!ceiling_check(&[f64::INFINITY], 10.0).passed);
    }

    #[test]
    fn test_run_all_checks_order_and_failures() {
        let inputs = CheckInputs {
            blanks: &[-0.2, -0.1],
            r: 0.5,
            accepted: &[2.0, 3.0],
            all: &[2.0, 3.0, -0.2, -0.1],
        };
        let results = run_all_checks(&inputs, &QcThresholds::default());
        let order: Vec<QcCheck> = results.iter().map(|r| r.check).collect();
        assert_eq!(
            order,
            vec![QcCheck::Blanks, QcCheck::Regression, QcCheck::Samples, QcCheck::Ceiling]
        );
        let failed = failed_checks(&results);
        assert!(failed.contains(&QcCheck::Blanks));
        assert!(failed.contains(&QcCheck::Regression));
        assert_eq!(failed.len(), 2);
    }

    #[test]
    fn test_default_thresholds() {
        let t = QcThresholds::default();
        assert_eq!(t.r_minimum, 0.98);
        assert_eq!(t.sample_floor, 0.7);
        assert_eq!(t.concentration_ceiling, 10.0);
    }

    #[test]
    fn test_check_display() {
        assert_eq!(QcCheck::Ceiling.to_string(), "ceiling");
    }
}
