pub mod aggregate;
pub mod cherrypick;
pub mod convert;
pub mod flags;
pub mod parse;
pub mod run;

use std::fmt::Display;
use std::path::{Path, PathBuf};

use platepick_core::{FileFormat, PickError, PipelineConfig, PlateInput};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub standards_col: Option<usize>,
    pub blanks_col: Option<usize>,
    pub standards: Option<String>,
    pub r_minimum: Option<f64>,
    pub plate_size: Option<usize>,
    pub desired_concentration: Option<f64>,
    pub final_volume: Option<f64>,
    pub round_volume_to: Option<f64>,
}

/// Print `context: err` to stderr and exit with status 1.
pub fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}

/// Defaults, then the TOML file, then the overrides; validated.
pub fn build_config(
    path: Option<&str>,
    overrides: &Overrides,
) -> Result<PipelineConfig, PickError> {
    let mut config = match path {
        Some(p) => PipelineConfig::from_toml_file(Path::new(p))?,
        None => PipelineConfig::default(),
    };
    if let Some(col) = overrides.standards_col {
        config.plate.standards_col = col;
    }
    if let Some(col) = overrides.blanks_col {
        config.plate.blanks_col = col;
    }
    if let Some(standards) = &overrides.standards {
        config.plate.standards = standards.clone();
    }
    if let Some(r) = overrides.r_minimum {
        config.thresholds.r_minimum = r;
    }
    if let Some(size) = overrides.plate_size {
        config.batch.capacity = size;
    }
    if let Some(c) = overrides.desired_concentration {
        config.batch.desired_concentration = c;
    }
    if let Some(v) = overrides.final_volume {
        config.batch.final_volume = v;
    }
    if let Some(inc) = overrides.round_volume_to {
        config.batch.rounding_increment = inc;
    }
    config.validate()?;
    Ok(config)
}

/// [`build_config`], exiting on error.
pub fn load_config(path: Option<&str>, overrides: &Overrides) -> PipelineConfig {
    build_config(path, overrides).unwrap_or_else(|e| fail("Invalid configuration", e))
}

/// The explicit `--filetype`, or the format implied by the file extension.
pub fn resolve_format(file: &Path, filetype: Option<&str>) -> Result<FileFormat, PickError> {
    match filetype {
        Some(t) => t.parse(),
        None => FileFormat::from_path(file),
    }
}

/// Parse `FILE:PLATE:SAMPLE_ID`. The file part may itself contain colons.
pub fn parse_plate_arg(arg: &str, filetype: Option<&str>) -> Result<PlateInput, String> {
    let mut parts = arg.rsplitn(3, ':');
    let (Some(sample_id), Some(plate), Some(file)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("'{arg}' is not FILE:PLATE:SAMPLE_ID"));
    };
    if file.is_empty() || plate.is_empty() || sample_id.is_empty() {
        return Err(format!("'{arg}' has an empty field"));
    }
    let path = PathBuf::from(file);
    let format = resolve_format(&path, filetype).map_err(|e| e.to_string())?;
    Ok(PlateInput {
        path,
        plate: plate.to_string(),
        sample_id: sample_id.to_string(),
        format,
    })
}
