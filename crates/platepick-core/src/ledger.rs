//! Persistent batching state.
//!
//! The ledger lives next to the pick lists as `batch_ledger.json` and answers
//! the questions a resumed run needs: which batch number comes next, which
//! plates have already been batched (and into which batches), and which rows
//! are waiting in the current partial batch.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "batches": { "1": { "status": "complete", "file": "echo_picklist_00001.csv", ... } },
//!   "plates": { "MAA1": { "batches": [1], "rows": 300, "fingerprint": "9f86...", ... } },
//!   "pending": [ { "source": "MAA2", "record": { ... } } ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PickError, Result};
use crate::persist::{hex_encode, write_json};
use crate::picklist::{parse_picklist_file_name, read_picklist};
use crate::records::WellRecord;

pub const LEDGER_FILE: &str = "batch_ledger.json";
pub const LEDGER_VERSION: u32 = 1;

/// A row on its way through batching, tagged with the plate it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRow {
    /// Plate identifier derived from the input file name.
    pub source: String,
    pub record: WellRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Complete,
    Partial,
}

/// Bookkeeping for one written batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub status: BatchStatus,
    pub file: String,
    pub rows: usize,
    /// Contributing plates in first-row order.
    pub plates: Vec<String>,
    pub sealed_at: String,
    pub run_id: String,
}

/// Bookkeeping for one batched plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateEntry {
    /// Batches holding this plate's rows, including a partial one.
    pub batches: BTreeSet<u32>,
    pub rows: usize,
    /// SHA-256 of the plate's rows; absent when rebuilt from old pick lists.
    pub fingerprint: Option<String>,
    pub first_seen: String,
    /// Names of the rows already written to a batch, complete or partial.
    #[serde(default)]
    pub names: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLedger {
    pub version: u32,
    pub batches: BTreeMap<u32, BatchEntry>,
    pub plates: BTreeMap<String, PlateEntry>,
    /// Rows of the current partial batch, the seed of the next run.
    pub pending: Vec<PendingRow>,
}

impl Default for BatchLedger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            batches: BTreeMap::new(),
            plates: BTreeMap::new(),
            pending: Vec::new(),
        }
    }
}

/// SHA-256 over a plate's rows, in order.
pub fn fingerprint(records: &[WellRecord]) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        hasher.update(r.name.as_bytes());
        hasher.update([0]);
        hasher.update(r.concentration.to_le_bytes());
    }
    hex_encode(&hasher.finalize())
}

/// Path of the ledger inside an output directory.
pub fn ledger_path(dir: &Path) -> PathBuf {
    dir.join(LEDGER_FILE)
}

impl BatchLedger {
    /// Load the ledger of `dir`, if there is one.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = ledger_path(dir);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let ledger: Self = serde_json::from_slice(&bytes)?;
        if ledger.version != LEDGER_VERSION {
            return Err(PickError::Config(format!(
                "{} has version {}, expected {LEDGER_VERSION}",
                path.display(),
                ledger.version
            )));
        }
        Ok(Some(ledger))
    }

    /// Write the ledger atomically into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        write_json(&ledger_path(dir), self)
    }

    /// Reconstruct a ledger from pick-list files alone.
    ///
    /// Used for output directories written before the ledger existed. Plates
    /// are keyed by the pick lists' plate column; the incomplete batch with
    /// the highest number becomes the pending seed.
    pub fn rebuild(dir: &Path, timestamp: &str) -> Result<Self> {
        let mut ledger = Self::default();
        let mut incomplete: Option<(u32, PathBuf)> = None;
        for (number, complete, path) in scan_picklists(dir)? {
            if !complete {
                if incomplete.as_ref().is_none_or(|(n, _)| number > *n) {
                    incomplete = Some((number, path));
                }
                continue;
            }
            let rows = read_picklist(&path)?;
            let sources = rows
                .iter()
                .map(|r| (r.plate_number.as_str(), r.name.as_str()));
            let plates = ledger.note_rows(number, sources, timestamp);
            ledger.batches.insert(
                number,
                BatchEntry {
                    status: BatchStatus::Complete,
                    file: file_name(&path),
                    rows: rows.len(),
                    plates,
                    sealed_at: String::new(),
                    run_id: String::new(),
                },
            );
        }

        if let Some((number, path)) = incomplete.filter(|(n, _)| *n >= ledger.next_number()) {
            let rows = read_picklist(&path)?;
            let sources = rows
                .iter()
                .map(|r| (r.plate_number.as_str(), r.name.as_str()));
            let plates = ledger.note_rows(number, sources, timestamp);
            ledger.pending = rows
                .iter()
                .map(|r| {
                    Ok(PendingRow {
                        source: r.plate_number.clone(),
                        record: r.to_record()?,
                    })
                })
                .collect::<Result<_>>()?;
            ledger.batches.insert(
                number,
                BatchEntry {
                    status: BatchStatus::Partial,
                    file: file_name(&path),
                    rows: rows.len(),
                    plates,
                    sealed_at: String::new(),
                    run_id: String::new(),
                },
            );
        }
        log::info!(
            "rebuilt ledger from {} pick list(s) covering {} plate(s)",
            ledger.batches.len(),
            ledger.plates.len()
        );
        Ok(ledger)
    }

    /// Highest complete batch number, if any.
    pub fn last_complete(&self) -> Option<u32> {
        self.batches
            .iter()
            .filter(|(_, b)| b.status == BatchStatus::Complete)
            .map(|(n, _)| *n)
            .max()
    }

    /// Number the next sealed batch receives. Numbering starts at 1.
    pub fn next_number(&self) -> u32 {
        self.last_complete().map_or(1, |n| n + 1)
    }

    pub fn contains_plate(&self, plate: &str) -> bool {
        self.plates.contains_key(plate)
    }

    /// `true` for a ledger written before row names were recorded.
    pub fn lacks_row_names(&self) -> bool {
        self.plates
            .values()
            .any(|e| !e.batches.is_empty() && e.names.is_empty())
    }

    /// Names of `plate`'s rows that already sit in a batch or in the
    /// pending seed.
    pub fn batched_names(&self, plate: &str) -> BTreeSet<&str> {
        let mut names: BTreeSet<&str> = self
            .plates
            .get(plate)
            .map(|e| e.names.iter().map(String::as_str).collect())
            .unwrap_or_default();
        names.extend(
            self.pending
                .iter()
                .filter(|r| r.source == plate)
                .map(|r| r.record.name.as_str()),
        );
        names
    }

    /// Register a plate about to be batched. A plate seen before keeps its
    /// batches, names and first-seen time.
    pub fn add_plate(&mut self, plate: &str, rows: usize, fingerprint: String, timestamp: &str) {
        let entry = self
            .plates
            .entry(plate.to_string())
            .or_insert_with(|| PlateEntry {
                batches: BTreeSet::new(),
                rows: 0,
                fingerprint: None,
                first_seen: timestamp.to_string(),
                names: BTreeSet::new(),
            });
        entry.rows = rows;
        entry.fingerprint = Some(fingerprint);
    }

    /// Record a written batch and attribute it to its plates.
    pub fn record_batch(
        &mut self,
        number: u32,
        status: BatchStatus,
        file: String,
        rows: &[PendingRow],
        sealed_at: &str,
        run_id: &str,
    ) {
        let sources = rows
            .iter()
            .map(|r| (r.source.as_str(), r.record.name.as_str()));
        let plates = self.note_rows(number, sources, sealed_at);
        self.batches.insert(
            number,
            BatchEntry {
                status,
                file,
                rows: rows.len(),
                plates,
                sealed_at: sealed_at.to_string(),
                run_id: run_id.to_string(),
            },
        );
    }

    /// Forget partial batches that a complete batch has since replaced.
    pub fn drop_stale_partials(&mut self, keep: Option<u32>) {
        self.batches
            .retain(|n, b| b.status == BatchStatus::Complete || Some(*n) == keep);
    }

    /// Add `number` and the row names to every plate in `sources`
    /// (`(plate, row name)` pairs), returning the distinct plates in
    /// first-appearance order.
    fn note_rows<'a>(
        &mut self,
        number: u32,
        sources: impl Iterator<Item = (&'a str, &'a str)>,
        timestamp: &str,
    ) -> Vec<String> {
        let mut plates: Vec<String> = Vec::new();
        for (source, name) in sources {
            if !plates.iter().any(|p| p == source) {
                plates.push(source.to_string());
            }
            let entry = self
                .plates
                .entry(source.to_string())
                .or_insert_with(|| PlateEntry {
                    batches: BTreeSet::new(),
                    rows: 0,
                    fingerprint: None,
                    first_seen: timestamp.to_string(),
                    names: BTreeSet::new(),
                });
            // Entries rebuilt from pick lists have no fingerprint and count
            // their rows as they are seen.
            let first_time = entry.names.insert(name.to_string());
            if entry.fingerprint.is_none() && first_time {
                entry.rows += 1;
            }
            entry.batches.insert(number);
        }
        plates
    }
}

/// Pick-list files in `dir` as `(number, complete, path)`, sorted by number.
pub fn scan_picklists(dir: &Path) -> Result<Vec<(u32, bool, PathBuf)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some((number, complete)) = name.to_str().and_then(parse_picklist_file_name) {
            found.push((number, complete, entry.path()));
        }
    }
    found.sort_by_key(|(n, complete, _)| (*n, *complete));
    Ok(found)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
