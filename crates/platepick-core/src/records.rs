//! Tidy per-well records.
//!
//! A tidy file has one line per well:
//!
//! ```text
//! well,row_letter,column_number,concentration,plate,sample_id,name
//! A1,A,1,1.92,MAA1,mouse7,A1-MAA1-mouse7-1
//! ```
//!
//! The cherrypick step writes them and the batcher reads them back.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};
use crate::grid::{GridCell, row_index};

/// Columns a tidy file must carry to be batched.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "well",
    "row_letter",
    "column_number",
    "concentration",
    "plate",
    "name",
];

/// One accepted well of one plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellRecord {
    pub well: String,
    pub row_letter: char,
    pub column_number: usize,
    pub concentration: f64,
    pub plate: String,
    #[serde(default, alias = "mouse_id")]
    pub sample_id: String,
    pub name: String,
}

impl WellRecord {
    /// Build the record for a grid cell; the name is `<well>-<plate>-<sample>-1`.
    pub fn from_cell(cell: &GridCell, plate: &str, sample_id: &str) -> Self {
        let well = cell.position.to_string();
        let name = format!("{well}-{plate}-{sample_id}-1");
        Self {
            well,
            row_letter: cell.position.row,
            column_number: cell.position.column,
            concentration: cell.value,
            plate: plate.to_string(),
            sample_id: sample_id.to_string(),
            name,
        }
    }

    /// Row-major sort key.
    fn sort_key(&self) -> (usize, usize) {
        (
            row_index(self.row_letter).unwrap_or(usize::MAX),
            self.column_number,
        )
    }
}

/// Tidy records for a set of cells, skipping empty (NaN) wells.
pub fn records_from_cells<'a>(
    cells: impl IntoIterator<Item = &'a GridCell>,
    plate: &str,
    sample_id: &str,
) -> Vec<WellRecord> {
    cells
        .into_iter()
        .filter(|c| !c.value.is_nan())
        .map(|c| WellRecord::from_cell(c, plate, sample_id))
        .collect()
}

/// Render records as a tidy CSV document.
pub fn write_records(records: &[WellRecord]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record([
        "well",
        "row_letter",
        "column_number",
        "concentration",
        "plate",
        "sample_id",
        "name",
    ])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.into_inner().map_err(|e| PickError::Io(e.into_error()))
}

/// Read a tidy file, sorted row-major.
///
/// A missing required column or an unreadable line is a
/// [`PickError::MalformedPlateInput`].
pub fn read_records(path: &Path) -> Result<Vec<WellRecord>> {
    let bytes = std::fs::read(path)?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes.as_slice());
    let headers = reader
        .headers()
        .map_err(|e| PickError::malformed(path, e.to_string()))?
        .clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        return Err(PickError::malformed(
            path,
            format!("missing column(s): {}", missing.join(", ")),
        ));
    }

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<WellRecord>().enumerate() {
        let record = row.map_err(|e| PickError::malformed(path, format!("line {}: {e}", i + 2)))?;
        records.push(record);
    }
    records.sort_by_key(WellRecord::sort_key);
    Ok(records)
}
