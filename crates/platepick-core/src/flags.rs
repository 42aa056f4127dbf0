//! Persistent log of plates that failed quality control.
//!
//! One line per plate that has ever been flagged: the plate name followed by
//! the time of every failing run.
//!
//! ```text
//! MAA1,2017-09-21 18:44:44
//! MAA2,2017-09-21 18:44:44,2017-09-22 09:10:03
//! ```
//!
//! The log is re-read on every update, so repeated runs against the same
//! output directory (or several flags within one run) always see the full
//! history.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, WriterBuilder};

use crate::error::{PickError, Result};
use crate::persist::write_atomic;

/// Timestamp layout used in the flag log.
pub const FLAG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time in [`FLAG_TIME_FORMAT`].
pub fn local_timestamp() -> String {
    chrono::Local::now().format(FLAG_TIME_FORMAT).to_string()
}

/// Every recorded failure of one plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRecord {
    pub plate: String,
    pub timestamps: Vec<String>,
}

impl FlagRecord {
    /// How many times this plate has been flagged.
    pub fn occurrences(&self) -> usize {
        self.timestamps.len()
    }
}

/// The on-disk flag log.
#[derive(Debug, Clone)]
pub struct FlagLog {
    path: PathBuf,
}

impl FlagLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record; a missing file is an empty log.
    pub fn load(&self) -> Result<Vec<FlagRecord>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut fields = row.iter().map(str::trim);
            let Some(plate) = fields.next().filter(|p| !p.is_empty()) else {
                continue;
            };
            records.push(FlagRecord {
                plate: plate.to_string(),
                timestamps: fields.filter(|t| !t.is_empty()).map(String::from).collect(),
            });
        }
        Ok(records)
    }

    /// Number of times `plate` has been flagged so far.
    pub fn occurrences(&self, plate: &str) -> Result<usize> {
        Ok(self
            .load()?
            .iter()
            .find(|r| r.plate == plate)
            .map_or(0, FlagRecord::occurrences))
    }

    /// Append a failure of `plate` at `at` and return its new occurrence count.
    pub fn record(&self, plate: &str, at: NaiveDateTime) -> Result<usize> {
        if plate.is_empty() {
            return Err(PickError::Config("cannot flag a plate with an empty name".to_string()));
        }
        let stamp = at.format(FLAG_TIME_FORMAT).to_string();
        let mut records = self.load()?;
        let count = match records.iter_mut().find(|r| r.plate == plate) {
            Some(existing) => {
                existing.timestamps.push(stamp);
                existing.occurrences()
            }
            None => {
                records.push(FlagRecord {
                    plate: plate.to_string(),
                    timestamps: vec![stamp],
                });
                1
            }
        };
        self.save(&records)?;
        log::info!("flag log: {plate} flagged {count} time(s)");
        Ok(count)
    }

    fn save(&self, records: &[FlagRecord]) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for record in records {
            let mut line = vec![record.plate.as_str()];
            line.extend(record.timestamps.iter().map(String::as_str));
            writer.write_record(&line)?;
        }
        let bytes = writer.into_inner().map_err(|e| PickError::Io(e.into_error()))?;
        write_atomic(&self.path, &bytes)
    }
}
