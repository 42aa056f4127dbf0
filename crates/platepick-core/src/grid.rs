//! Fixed-shape plate grids.
//!
//! A grid is a dense row-major matrix of readings with rows labelled `A`, `B`,
//! ... and columns numbered from 1. Fluorescence and concentration grids share
//! the same representation; the aliases only document intent.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PickError, Result};

/// Rows on a 384-well plate (`A`..=`P`).
pub const PLATE_ROWS: usize = 16;
/// Columns on a 384-well plate (`1`..=`24`).
pub const PLATE_COLS: usize = 24;
/// Wells on a 384-well plate.
pub const PLATE_WELLS: usize = PLATE_ROWS * PLATE_COLS;

/// Raw plate-reader output.
pub type FluorescenceGrid = PlateGrid;
/// Fluorescence converted through the standards regression.
pub type ConcentrationGrid = PlateGrid;

/// Letter label of a zero-based row index.
pub fn row_label(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Zero-based index of a row label, accepting lower case.
pub fn row_index(label: char) -> Option<usize> {
    let upper = label.to_ascii_uppercase();
    upper
        .is_ascii_uppercase()
        .then(|| (upper as u8 - b'A') as usize)
}

/// A well coordinate such as `B7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WellPosition {
    pub row: char,
    /// 1-based column number.
    pub column: usize,
}

impl WellPosition {
    pub fn new(row: char, column: usize) -> Self {
        Self {
            row: row.to_ascii_uppercase(),
            column,
        }
    }
}

impl fmt::Display for WellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.column)
    }
}

impl FromStr for WellPosition {
    type Err = PickError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let row = chars
            .next()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| PickError::grid(format!("bad well coordinate '{s}'")))?;
        let column: usize = chars
            .as_str()
            .parse()
            .map_err(|_| PickError::grid(format!("bad well coordinate '{s}'")))?;
        if column == 0 {
            return Err(PickError::grid(format!("bad well coordinate '{s}'")));
        }
        Ok(Self::new(row, column))
    }
}

/// Every well of a 384-well plate in row-major order: `A1..A24, B1..B24, ..., P24`.
pub fn destination_wells() -> Vec<WellPosition> {
    (0..PLATE_ROWS)
        .flat_map(|r| (1..=PLATE_COLS).map(move |c| WellPosition::new(row_label(r), c)))
        .collect()
}

/// One cell of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub position: WellPosition,
    pub value: f64,
}

/// Dense plate grid of `rows x cols` readings.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl PlateGrid {
    /// Build a grid from row-major values.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 || rows > 26 {
            return Err(PickError::grid(format!("unsupported plate shape {rows}x{cols}")));
        }
        if values.len() != rows * cols {
            return Err(PickError::grid(format!(
                "expected {} readings for a {rows}x{cols} plate, got {}",
                rows * cols,
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Build a grid from equally long rows.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(PickError::grid(format!(
                "row {} has {} values, expected {n_cols}",
                row_label(i),
                row.len()
            )));
        }
        Self::new(n_rows, n_cols, rows.into_iter().flatten().collect())
    }

    /// A grid with every reading set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Result<Self> {
        Self::new(rows, cols, vec![value; rows * cols])
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Row labels in order.
    pub fn row_labels(&self) -> impl Iterator<Item = char> + '_ {
        (0..self.rows).map(row_label)
    }

    /// All readings, row-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Reading at zero-based row and column indices.
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    /// Reading at a row label and 1-based column number.
    pub fn get(&self, row: char, column: usize) -> Option<f64> {
        let r = row_index(row).filter(|r| *r < self.rows)?;
        if column == 0 || column > self.cols {
            return None;
        }
        Some(self.at(r, column - 1))
    }

    /// All readings of a 1-based column, top to bottom.
    pub fn column(&self, column: usize) -> Option<Vec<f64>> {
        if column == 0 || column > self.cols {
            return None;
        }
        Some((0..self.rows).map(|r| self.at(r, column - 1)).collect())
    }

    /// Apply `f` to every reading.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> PlateGrid {
        PlateGrid {
            rows: self.rows,
            cols: self.cols,
            values: self.values.iter().map(|v| f(*v)).collect(),
        }
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.values.iter().enumerate().map(|(i, v)| GridCell {
            position: WellPosition::new(row_label(i / self.cols), i % self.cols + 1),
            value: *v,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlateGrid {
        PlateGrid::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap()
    }

    #[test]
    fn test_row_labels() {
        assert_eq!(row_label(0), 'A');
        assert_eq!(row_label(15), 'P');
        assert_eq!(row_index('p'), Some(15));
        assert_eq!(row_index('1'), None);
    }

    #[test]
    fn test_get_by_label_and_column() {
        let g = sample();
        assert_eq!(g.get('A', 1), Some(1.0));
        assert_eq!(g.get('B', 3), Some(6.0));
        assert_eq!(g.get('C', 1), None);
        assert_eq!(g.get('A', 0), None);
        assert_eq!(g.get('A', 4), None);
    }

    #[test]
    fn test_column() {
        assert_eq!(sample().column(2), Some(vec![2.0, 5.0]));
        assert_eq!(sample().column(9), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(PlateGrid::from_rows(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(PlateGrid::new(16, 24, vec![0.0; 10]).is_err());
    }

    #[test]
    fn test_cells_row_major() {
        let cells: Vec<String> = sample().cells().map(|c| c.position.to_string()).collect();
        assert_eq!(cells, vec!["A1", "A2", "A3", "B1", "B2", "B3"]);
    }

    #[test]
    fn test_map() {
        let doubled = sample().map(|v| v * 2.0);
        assert_eq!(doubled.get('B', 2), Some(10.0));
    }

    #[test]
    fn test_destination_wells_order() {
        let wells = destination_wells();
        assert_eq!(wells.len(), PLATE_WELLS);
        assert_eq!(wells[0].to_string(), "A1");
        assert_eq!(wells[23].to_string(), "A24");
        assert_eq!(wells[24].to_string(), "B1");
        assert_eq!(wells[383].to_string(), "P24");
    }

    #[test]
    fn test_well_position_parse() {
        let w: WellPosition = "c12".parse().unwrap();
        assert_eq!(w, WellPosition::new('C', 12));
        assert_eq!(w.to_string(), "C12");
        assert!("12".parse::<WellPosition>().is_err());
        assert!("A0".parse::<WellPosition>().is_err());
        assert!("A".parse::<WellPosition>().is_err());
    }
}
