//! `platepick flags`: show the flag log of an output folder.

use std::path::Path;

use platepick_core::FlagLog;
use platepick_core::gate::{FLAG_RECORD_FILE, FLAGGED_DIR};

pub fn run(output_folder: &str) {
    let log = FlagLog::new(Path::new(output_folder).join(FLAGGED_DIR).join(FLAG_RECORD_FILE));
    let records = log
        .load()
        .unwrap_or_else(|e| super::fail(&log.path().display().to_string(), e));

    if records.is_empty() {
        println!("No flagged plates in {output_folder}");
        return;
    }
    println!("{:<16} {:>5}  last flagged", "plate", "count");
    for record in &records {
        println!(
            "{:<16} {:>5}  {}",
            record.plate,
            record.occurrences(),
            record.timestamps.last().map_or("-", String::as_str)
        );
    }
}
