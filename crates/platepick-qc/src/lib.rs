//! Standards regression and plate quality checks.
//!
//! Provides the numeric half of plate QC: descriptive statistics with a
//! pinned sample (n-1) convention, the least-squares fit of standards
//! fluorescence against nominal concentration, and four independent
//! pass/fail checks that each return a [`CheckResult`].

pub mod checks;
pub mod regression;
pub mod stats;

pub use checks::{
    CheckInputs, CheckResult, QcCheck, QcThresholds, blanks_check, ceiling_check, failed_checks,
    regression_check, run_all_checks, samples_check,
};
pub use regression::{LevelMean, RegressionError, RegressionResult, fit_standards, level_means};
