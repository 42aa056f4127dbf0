//! # platepick-core
//!
//! Plate-reader QC and pick-list batching for liquid-handling robots.
//!
//! A 384-well plate of fluorescence readings goes through these steps:
//!
//! Grid → [`StandardsRegressor`] → concentrations → [`WellSelector`] →
//! [`QualityGate`] → tidy cherrypick file → [`PlateBatcher`] → pick lists
//!
//! - The regressor fits the standards column and converts every reading.
//! - The selector keeps wells above the blanks' mean plus one sample sd.
//! - The gate runs the four quality checks and routes failing plates into
//!   `flagged/flag_<n>/`, recording each failure in a persistent flag log.
//! - The batcher packs accepted wells into fixed-capacity pick lists and
//!   resumes from a [`BatchLedger`] on the next run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//! use platepick_core::{FileFormat, PipelineConfig, PlateInput, run_pipeline};
//!
//! let config = PipelineConfig::default();
//! let inputs = vec![PlateInput {
//!     path: PathBuf::from("MAA1.txt"),
//!     plate: "MAA1".to_string(),
//!     sample_id: "mouse7".to_string(),
//!     format: FileFormat::Table,
//! }];
//! let report = run_pipeline(&config, Path::new("out"), &inputs, false).unwrap();
//! println!("{} pick list(s) sealed", report.batches.sealed.len());
//! ```

pub mod batcher;
pub mod cherrypick;
pub mod config;
pub mod convert;
pub mod error;
pub mod flags;
pub mod format;
pub mod gate;
pub mod grid;
pub mod ledger;
pub mod packer;
pub mod persist;
pub mod picklist;
pub mod pipeline;
pub mod records;
pub mod select;
pub mod standards;

pub use batcher::{BatchSummary, PlateBatcher};
pub use cherrypick::{Cherrypicker, PlateInput, PlateReport};
pub use config::{BatchConfig, PipelineConfig, PlateConfig};
pub use convert::{StandardsRegressor, to_concentrations};
pub use error::{PickError, Result};
pub use flags::{FlagLog, FlagRecord};
pub use format::{FileFormat, GridParser, read_grid, write_grid_csv};
pub use gate::{GateResult, QualityGate};
pub use grid::{ConcentrationGrid, FluorescenceGrid, PlateGrid, WellPosition};
pub use ledger::{BatchLedger, BatchStatus, PendingRow};
pub use packer::{BatchPacker, SealedBatch};
pub use picklist::{PickListRow, dilution_volumes};
pub use pipeline::{PipelineReport, run_pipeline};
pub use records::WellRecord;
pub use select::{WellSelection, WellSelector};
pub use standards::StandardsMap;

// Re-export the QC crate's public surface so callers need one dependency.
pub use platepick_qc::{QcCheck, QcThresholds, RegressionResult};
