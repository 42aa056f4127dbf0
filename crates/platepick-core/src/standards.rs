//! Known standard concentrations keyed by row label.

use std::fmt;
use std::str::FromStr;

use crate::error::{PickError, Result};
use crate::grid::{PlateGrid, row_index, row_label};

/// Standards loaded into the standards column of a 384-well plate, top to bottom.
pub const DEFAULT_STANDARDS: &str = "8,8,6,6,4,4,2,2,1,1,0.5,0.5,0.25,0.25,0,0";

const DEFAULT_VALUES: [f64; 16] = [
    8.0, 8.0, 6.0, 6.0, 4.0, 4.0, 2.0, 2.0, 1.0, 1.0, 0.5, 0.5, 0.25, 0.25, 0.0, 0.0,
];

/// Ordered mapping from row label to nominal standard concentration.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardsMap {
    entries: Vec<(char, f64)>,
}

impl StandardsMap {
    /// Assign `values` to rows `A`, `B`, ... in order.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(PickError::InvalidStandards("no standards given".to_string()));
        }
        if values.len() > 26 {
            return Err(PickError::InvalidStandards(format!(
                "{} standards given, at most 26 rows can be labelled",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(PickError::InvalidStandards(format!(
                "standard concentration {bad} is not finite"
            )));
        }
        Ok(Self {
            entries: values
                .iter()
                .enumerate()
                .map(|(i, v)| (row_label(i), *v))
                .collect(),
        })
    }

    /// Nominal concentration of a row.
    pub fn get(&self, row: char) -> Option<f64> {
        let upper = row.to_ascii_uppercase();
        self.entries.iter().find(|(r, _)| *r == upper).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Pair each standard with the reading of its row in `column` of `grid`.
    ///
    /// Returns `(nominal, measured)` pairs; rows beyond the grid are an error.
    pub fn pair_with_column(&self, grid: &PlateGrid, column: usize) -> Result<Vec<(f64, f64)>> {
        if column == 0 || column > grid.cols() {
            return Err(PickError::Config(format!(
                "standards column {column} is outside the plate (1..={})",
                grid.cols()
            )));
        }
        self.entries
            .iter()
            .map(|(row, nominal)| {
                let measured = row_index(*row)
                    .filter(|r| *r < grid.rows())
                    .map(|r| grid.at(r, column - 1))
                    .ok_or_else(|| {
                        PickError::InvalidStandards(format!(
                            "standard for row {row} but the plate has only {} rows",
                            grid.rows()
                        ))
                    })?;
                Ok((*nominal, measured))
            })
            .collect()
    }
}

impl FromStr for StandardsMap {
    type Err = PickError;

    /// Parse a comma-separated list such as `8,8,6,6,...,0,0`.
    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<f64>()
                    .map_err(|_| PickError::InvalidStandards(format!("'{t}' is not a number")))
            })
            .collect::<Result<Vec<f64>>>()?;
        Self::from_values(&values)
    }
}

impl Default for StandardsMap {
    fn default() -> Self {
        Self {
            entries: DEFAULT_VALUES
                .iter()
                .enumerate()
                .map(|(i, v)| (row_label(i), *v))
                .collect(),
        }
    }
}

impl fmt::Display for StandardsMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.entries.iter().map(|(_, v)| v.to_string()).collect();
        write!(f, "{}", joined.join(","))
    }
}
