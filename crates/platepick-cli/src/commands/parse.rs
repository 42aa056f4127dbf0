//! `platepick parse`: print a plate-reader file as grid CSV.

use std::io::Write;
use std::path::Path;

use platepick_core::{read_grid, write_grid_csv};

pub fn run(file: &str, filetype: Option<&str>) {
    let path = Path::new(file);
    let format = super::resolve_format(path, filetype).unwrap_or_else(|e| super::fail(file, e));
    let grid = read_grid(path, format).unwrap_or_else(|e| super::fail(file, e));
    let bytes = write_grid_csv(&grid).unwrap_or_else(|e| super::fail(file, e));
    if let Err(e) = std::io::stdout().lock().write_all(&bytes) {
        super::fail("Failed to write output", e);
    }
}
