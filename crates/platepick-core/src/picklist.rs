//! Pick-list formatting for the acoustic liquid handler.
//!
//! One CSV per batch, named `echo_picklist_<nnnnn>.csv` when complete and
//! `echo_picklist_<nnnnn>_incomplete.csv` when partial. Rows carry dilution
//! volumes and a destination well assigned in row-major order.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;
use crate::error::{PickError, Result};
use crate::grid::{WellPosition, destination_wells};
use crate::records::WellRecord;

pub const PICKLIST_PREFIX: &str = "echo_picklist_";
pub const INCOMPLETE_MARKER: &str = "_incomplete";

/// One line of a pick list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickListRow {
    #[serde(rename = "Source well")]
    pub source_well: String,
    #[serde(rename = "Plate number")]
    pub plate_number: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "C(ng/ul)")]
    pub concentration: f64,
    #[serde(rename = "Type")]
    pub sample_type: String,
    #[serde(rename = "Verdict")]
    pub verdict: u8,
    #[serde(rename = "Combined name")]
    pub combined_name: String,
    #[serde(rename = "Desired C")]
    pub desired_concentration: f64,
    #[serde(rename = "Final V")]
    pub final_volume: f64,
    #[serde(rename = "Sample V")]
    pub sample_volume: f64,
    #[serde(rename = "Buffer V")]
    pub buffer_volume: f64,
    #[serde(rename = "Rounded Sample V")]
    pub rounded_sample_volume: f64,
    #[serde(rename = "Rounded Buffer V")]
    pub rounded_buffer_volume: f64,
    #[serde(rename = "Destination well")]
    pub destination_well: String,
}

impl PickListRow {
    /// Recover the well record a pick-list line was made from.
    ///
    /// The sample id is not part of a pick list and comes back empty.
    pub fn to_record(&self) -> Result<WellRecord> {
        let position: WellPosition = self.source_well.parse()?;
        Ok(WellRecord {
            well: self.source_well.clone(),
            row_letter: position.row,
            column_number: position.column,
            concentration: self.concentration,
            plate: self.plate_number.clone(),
            sample_id: String::new(),
            name: self.name.clone(),
        })
    }
}

/// Dilution volumes for one well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Volumes {
    pub sample: f64,
    pub buffer: f64,
    pub rounded_sample: f64,
    pub rounded_buffer: f64,
}

/// Round to the nearest multiple of `increment`, halves away from zero.
pub fn round_to_increment(value: f64, increment: f64) -> f64 {
    (value / increment).round() * increment
}

/// Volumes needed to bring a well of `concentration` to the target.
///
/// The sample volume never exceeds the final volume; a well at or below zero
/// concentration uses the full final volume.
pub fn dilution_volumes(concentration: f64, settings: &BatchConfig) -> Volumes {
    let final_volume = settings.final_volume;
    let mass = settings.desired_concentration * final_volume;
    let sample = if concentration > 0.0 {
        (mass / concentration).min(final_volume)
    } else {
        final_volume
    };
    let rounded_sample = round_to_increment(sample, settings.rounding_increment).min(final_volume);
    Volumes {
        sample,
        buffer: final_volume - sample,
        rounded_sample,
        rounded_buffer: final_volume - rounded_sample,
    }
}

/// Format a batch into pick-list rows with destination wells `A1, A2, ...`.
pub fn format(batch: &[WellRecord], settings: &BatchConfig) -> Result<Vec<PickListRow>> {
    let destinations = destination_wells();
    if batch.len() > destinations.len() {
        return Err(PickError::Config(format!(
            "batch of {} rows does not fit a {}-well destination plate",
            batch.len(),
            destinations.len()
        )));
    }
    Ok(batch
        .iter()
        .zip(destinations)
        .map(|(record, destination)| {
            let volumes = dilution_volumes(record.concentration, settings);
            let verdict = 1;
            PickListRow {
                source_well: record.well.clone(),
                plate_number: record.plate.clone(),
                name: record.name.clone(),
                concentration: record.concentration,
                sample_type: "Unknown".to_string(),
                verdict,
                combined_name: format!("{}-{verdict}", record.name),
                desired_concentration: settings.desired_concentration,
                final_volume: settings.final_volume,
                sample_volume: volumes.sample,
                buffer_volume: volumes.buffer,
                rounded_sample_volume: volumes.rounded_sample,
                rounded_buffer_volume: volumes.rounded_buffer,
                destination_well: destination.to_string(),
            }
        })
        .collect())
}

/// Render pick-list rows as CSV.
pub fn write_picklist(rows: &[PickListRow]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| PickError::Io(e.into_error()))
}

/// Read a pick list written by [`write_picklist`].
pub fn read_picklist(path: &Path) -> Result<Vec<PickListRow>> {
    let bytes = std::fs::read(path)?;
    let mut reader = ReaderBuilder::new().from_reader(bytes.as_slice());
    reader
        .deserialize()
        .map(|row| row.map_err(|e| PickError::malformed(path, e.to_string())))
        .collect()
}

/// File name of batch `number`.
pub fn picklist_file_name(number: u32, complete: bool) -> String {
    if complete {
        format!("{PICKLIST_PREFIX}{number:05}.csv")
    } else {
        format!("{PICKLIST_PREFIX}{number:05}{INCOMPLETE_MARKER}.csv")
    }
}

/// Batch number and completeness encoded in a pick-list file name.
pub fn parse_picklist_file_name(name: &str) -> Option<(u32, bool)> {
    let stem = name.strip_prefix(PICKLIST_PREFIX)?.strip_suffix(".csv")?;
    let (digits, complete) = match stem.strip_suffix(INCOMPLETE_MARKER) {
        Some(d) => (d, false),
        None => (stem, true),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, complete))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(well: &str, concentration: f64) -> WellRecord {
        let position: WellPosition = well.parse().unwrap();
        WellRecord {
            well: well.to_string(),
            row_letter: position.row,
            column_number: position.column,
            concentration,
            plate: "MAA1".to_string(),
            sample_id: "m1".to_string(),
            name: format!("{well}-MAA1-m1-1"),
        }
    }

    #[test]
    fn test_volumes_dilute_to_target() {
        // mass = 0.5 * 400 = 200; 200 / 1.6 = 125
        let v = dilution_volumes(1.6, &BatchConfig::default());
        assert_eq!(v.sample, 125.0);
        assert_eq!(v.buffer, 275.0);
        assert_eq!(v.rounded_sample, 125.0);
        assert_eq!(v.rounded_buffer, 275.0);
    }

    #[test]
    fn test_volumes_capped_at_final() {
        let v = dilution_volumes(0.1, &BatchConfig::default());
        assert_eq!(v.sample, 400.0);
        assert_eq!(v.buffer, 0.0);
        assert_eq!(dilution_volumes(0.0, &BatchConfig::default()).sample, 400.0);
        assert_eq!(dilution_volumes(-1.0, &BatchConfig::default()).buffer, 0.0);
    }

    #[test]
    fn test_volume_bounds_hold() {
        let settings = BatchConfig::default();
        for c in [1e-6, 0.3, 0.5, 0.51, 1.0, 3.7, 9.99, 250.0] {
            let v = dilution_volumes(c, &settings);
            assert!(v.sample >= 0.0 && v.sample <= settings.final_volume);
            assert!(v.buffer >= 0.0);
            assert!(v.rounded_sample >= 0.0 && v.rounded_sample <= settings.final_volume);
            assert!(v.rounded_buffer >= 0.0);
        }
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(round_to_increment(1.25, 0.5), 1.5);
        assert_eq!(round_to_increment(1.24, 0.5), 1.0);
        assert_eq!(round_to_increment(0.75, 0.5), 1.0);
        assert_eq!(round_to_increment(7.0, 2.0), 8.0);
    }

    #[test]
    fn test_rounded_buffer_complements_rounded_sample() {
        // 200 / 3 = 66.67 -> 66.5, buffer 333.5
        let v = dilution_volumes(3.0, &BatchConfig::default());
        assert_eq!(v.rounded_sample, 66.5);
        assert_eq!(v.rounded_buffer, 333.5);
    }

    #[test]
    fn test_format_assigns_destinations() {
        let batch = vec![record("C5", 2.0), record("A1", 1.0), record("P22", 4.0)];
        let rows = format(&batch, &BatchConfig::default()).unwrap();
        let dest: Vec<&str> = rows.iter().map(|r| r.destination_well.as_str()).collect();
        assert_eq!(dest, vec!["A1", "A2", "A3"]);
        assert_eq!(rows[0].source_well, "C5");
        assert_eq!(rows[0].combined_name, "C5-MAA1-m1-1-1");
        assert_eq!(rows[0].sample_type, "Unknown");
        assert_eq!(rows[0].verdict, 1);
        assert_eq!(rows[0].plate_number, "MAA1");
    }

    #[test]
    fn test_full_batch_ends_at_p24() {
        let batch: Vec<WellRecord> = (0..384).map(|_| record("A1", 1.0)).collect();
        let rows = format(&batch, &BatchConfig::default()).unwrap();
        assert_eq!(rows[24].destination_well, "B1");
        assert_eq!(rows[383].destination_well, "P24");
        let too_many: Vec<WellRecord> = (0..385).map(|_| record("A1", 1.0)).collect();
        assert!(format(&too_many, &BatchConfig::default()).is_err());
    }

    #[test]
    fn test_csv_header_and_readback() {
        let rows = format(&[record("B2", 2.0)], &BatchConfig::default()).unwrap();
        let bytes = write_picklist(&rows).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(
            "Source well,Plate number,Name,C(ng/ul),Type,Verdict,Combined name,\
             Desired C,Final V,Sample V,Buffer V,Rounded Sample V,Rounded Buffer V,\
             Destination well\n"
        ));

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(picklist_file_name(1, true));
        std::fs::write(&path, bytes).unwrap();
        let back = read_picklist(&path).unwrap();
        assert_eq!(back, rows);
        let recovered = back[0].to_record().unwrap();
        assert_eq!(recovered.well, "B2");
        assert_eq!(recovered.column_number, 2);
        assert_eq!(recovered.name, "B2-MAA1-m1-1");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(picklist_file_name(1, true), "echo_picklist_00001.csv");
        assert_eq!(picklist_file_name(42, false), "echo_picklist_00042_incomplete.csv");
        assert_eq!(parse_picklist_file_name("echo_picklist_00042_incomplete.csv"), Some((42, false)));
        assert_eq!(parse_picklist_file_name("echo_picklist_00007.csv"), Some((7, true)));
        assert_eq!(parse_picklist_file_name("echo_picklist_.csv"), None);
        assert_eq!(parse_picklist_file_name("echo_picklist_1x.csv"), None);
        assert_eq!(parse_picklist_file_name("batch_ledger.json"), None);
    }
}
