//! Pipeline configuration.
//!
//! One immutable [`PipelineConfig`] is built at startup (defaults, optionally
//! overlaid by a TOML file, then by command-line flags) and handed to each
//! component. Every TOML key is optional:
//!
//! ```toml
//! [plate]
//! standards_col = 24
//! blanks_col = 23
//! standards = "8,8,6,6,4,4,2,2,1,1,0.5,0.5,0.25,0.25,0,0"
//! trim_outer_standards = true
//!
//! [thresholds]
//! r_minimum = 0.98
//! sample_floor = 0.7
//! concentration_ceiling = 10.0
//!
//! [batch]
//! capacity = 384
//! desired_concentration = 0.5
//! final_volume = 400.0
//! rounding_increment = 0.5
//! ```

use std::path::Path;

use platepick_qc::QcThresholds;
use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};
use crate::grid::{PLATE_COLS, PLATE_WELLS};
use crate::standards::{DEFAULT_STANDARDS, StandardsMap};

/// Plate layout: where the standards and blanks live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateConfig {
    /// 1-based column holding the standards dilution series.
    pub standards_col: usize,
    /// 1-based column holding the blanks. Columns from here on are never picked.
    pub blanks_col: usize,
    /// Comma-separated nominal concentrations of the standards, row order.
    pub standards: String,
    /// Drop the lowest and highest standards levels before fitting.
    pub trim_outer_standards: bool,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            standards_col: 24,
            blanks_col: 23,
            standards: DEFAULT_STANDARDS.to_string(),
            trim_outer_standards: true,
        }
    }
}

impl PlateConfig {
    /// Parse the standards string.
    pub fn standards_map(&self) -> Result<StandardsMap> {
        self.standards.parse()
    }
}

/// Batching and dilution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Wells per output pick list.
    pub capacity: usize,
    /// Target concentration after dilution (ng/ul).
    pub desired_concentration: f64,
    /// Volume every sample is diluted to.
    pub final_volume: f64,
    /// Volumes are rounded to the nearest multiple of this.
    pub rounding_increment: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            capacity: PLATE_WELLS,
            desired_concentration: 0.5,
            final_volume: 400.0,
            rounding_increment: 0.5,
        }
    }
}

/// Complete configuration for a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub plate: PlateConfig,
    pub thresholds: QcThresholds,
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let plate = &self.plate;
        for (name, col) in [
            ("standards_col", plate.standards_col),
            ("blanks_col", plate.blanks_col),
        ] {
            if col == 0 || col > PLATE_COLS {
                return Err(PickError::Config(format!(
                    "{name} = {col} is outside 1..={PLATE_COLS}"
                )));
            }
        }
        if plate.standards_col == plate.blanks_col {
            return Err(PickError::Config(
                "standards_col and blanks_col must differ".to_string(),
            ));
        }
        plate.standards_map()?;

        let batch = &self.batch;
        if batch.capacity == 0 || batch.capacity > PLATE_WELLS {
            return Err(PickError::Config(format!(
                "capacity = {} is outside 1..={PLATE_WELLS}",
                batch.capacity
            )));
        }
        for (name, value) in [
            ("desired_concentration", batch.desired_concentration),
            ("final_volume", batch.final_volume),
            ("rounding_increment", batch.rounding_increment),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(PickError::Config(format!("{name} = {value} must be positive")));
            }
        }
        if !(-1.0..=1.0).contains(&self.thresholds.r_minimum) {
            return Err(PickError::Config(format!(
                "r_minimum = {} is outside [-1, 1]",
                self.thresholds.r_minimum
            )));
        }
        Ok(())
    }
}
