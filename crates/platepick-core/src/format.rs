//! Plate-reader grid formats.
//!
//! Every supported input format implements [`GridParser`]; [`FileFormat`]
//! names the closed set of formats and hands out the matching parser.
//!
//! - **Table**: the plate reader's text export. UTF-16 (with BOM) or UTF-8,
//!   tab separated, two preamble lines, a header line, then one line per
//!   plate row with the 24 readings in fields 3 to 26.
//! - **Csv**: the grid layout this crate writes itself: a header of
//!   `,1,2,...,24` followed by `A,v1,...,v24` rows.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::{PickError, Result};
use crate::grid::{PLATE_COLS, PLATE_ROWS, PlateGrid, row_label};

/// Preamble lines before the header in a plate-reader text export.
const TABLE_PREAMBLE_LINES: usize = 2;
/// Index of the first reading within a text-export row.
const TABLE_FIRST_VALUE_FIELD: usize = 2;

/// Turns raw file bytes into a plate grid.
pub trait GridParser {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Parse a whole file.
    fn parse(&self, bytes: &[u8]) -> Result<PlateGrid>;
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    /// Plate-reader text export.
    #[default]
    Table,
    /// Grid CSV as written by this crate.
    Csv,
}

impl FileFormat {
    /// Parser for this format.
    pub fn parser(&self) -> &'static dyn GridParser {
        match self {
            Self::Table => &TableParser,
            Self::Csv => &CsvGridParser,
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "txt"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = PickError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "table" => Ok(Self::Table),
            "csv" => Ok(Self::Csv),
            other => Err(PickError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Read and parse a grid file.
pub fn read_grid(path: &Path, format: FileFormat) -> Result<PlateGrid> {
    let bytes = std::fs::read(path)?;
    let grid = format.parser().parse(&bytes).map_err(|e| match e {
        PickError::GridParse { reason } => PickError::grid(format!("{}: {reason}", path.display())),
        other => other,
    })?;
    log::debug!(
        "parsed {} as {} ({}x{})",
        path.display(),
        format.parser().name(),
        grid.rows(),
        grid.cols()
    );
    Ok(grid)
}

// ---------------------------------------------------------------------------
// Text export
// ---------------------------------------------------------------------------

/// Parser for the plate reader's tab-separated text export.
pub struct TableParser;

impl GridParser for TableParser {
    fn name(&self) -> &'static str {
        "table"
    }

    fn parse(&self, bytes: &[u8]) -> Result<PlateGrid> {
        let text = decode_text(bytes)?;
        // The plate block ends at the first blank line; anything after it
        // (summaries, footers) is not part of the grid.
        let body: String = text
            .lines()
            .skip(TABLE_PREAMBLE_LINES)
            .take_while(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(body.as_bytes());

        let last_field = TABLE_FIRST_VALUE_FIELD + PLATE_COLS;
        let mut rows = Vec::with_capacity(PLATE_ROWS);
        for record in reader.records().take(PLATE_ROWS) {
            let record = record?;
            if record.len() < last_field {
                return Err(PickError::grid(format!(
                    "row {} has {} fields, expected at least {last_field}",
                    row_label(rows.len()),
                    record.len()
                )));
            }
            rows.push(parse_fields(&record, TABLE_FIRST_VALUE_FIELD..last_field, rows.len())?);
        }
        if rows.len() < PLATE_ROWS {
            return Err(PickError::grid(format!(
                "found {} plate rows, expected {PLATE_ROWS}",
                rows.len()
            )));
        }
        PlateGrid::from_rows(rows)
    }
}

/// Decode UTF-16 (by BOM) or UTF-8 text.
fn decode_text(bytes: &[u8]) -> Result<String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, false),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, true),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec())
            .map_err(|e| PickError::grid(format!("invalid UTF-8: {e}"))),
        _ => String::from_utf8(bytes.to_vec())
            .map_err(|e| PickError::grid(format!("invalid UTF-8: {e}"))),
    }
}

fn decode_utf16(bytes: &[u8], big_endian: bool) -> Result<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| {
            if big_endian {
                u16::from_be_bytes([c[0], c[1]])
            } else {
                u16::from_le_bytes([c[0], c[1]])
            }
        })
        .collect();
    String::from_utf16(&units).map_err(|e| PickError::grid(format!("invalid UTF-16: {e}")))
}

/// Parse a range of fields as readings; blanks become NaN.
fn parse_fields(
    record: &StringRecord,
    fields: std::ops::Range<usize>,
    row: usize,
) -> Result<Vec<f64>> {
    fields
        .map(|i| {
            let raw = record.get(i).unwrap_or("").trim();
            if raw.is_empty() {
                return Ok(f64::NAN);
            }
            raw.parse::<f64>().map_err(|_| {
                PickError::grid(format!(
                    "row {} field {}: '{raw}' is not a number",
                    row_label(row),
                    i + 1
                ))
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Grid CSV
// ---------------------------------------------------------------------------

/// Parser for grid CSV files written by [`write_grid_csv`].
pub struct CsvGridParser;

impl GridParser for CsvGridParser {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn parse(&self, bytes: &[u8]) -> Result<PlateGrid> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let n_cols = reader.headers()?.len().saturating_sub(1);
        if n_cols == 0 {
            return Err(PickError::grid("header has no reading columns"));
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(parse_fields(&record, 1..n_cols + 1, rows.len())?);
        }
        if rows.is_empty() {
            return Err(PickError::grid("no plate rows"));
        }
        PlateGrid::from_rows(rows)
    }
}

/// Render a grid as CSV: `,1,2,...` header and one labelled line per row.
pub fn write_grid_csv(grid: &PlateGrid) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let mut header = vec![String::new()];
    header.extend((1..=grid.cols()).map(|c| c.to_string()));
    writer.write_record(&header)?;
    for r in 0..grid.rows() {
        let mut line = vec![row_label(r).to_string()];
        line.extend((0..grid.cols()).map(|c| {
            let v = grid.at(r, c);
            if v.is_nan() { String::new() } else { v.to_string() }
        }));
        writer.write_record(&line)?;
    }
    writer
        .into_inner()
        .map_err(|e| PickError::Io(e.into_error()))
}
