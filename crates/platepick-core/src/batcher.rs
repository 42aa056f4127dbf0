//! Resumable aggregation of tidy plate files into pick lists.
//!
//! [`PlateBatcher::run`] streams plates through a [`BatchPacker`], writes every
//! sealed batch as it is produced, and keeps the [`BatchLedger`] in step so a
//! later run against the same directory can pick up where this one stopped:
//! - numbering continues after the highest complete batch;
//! - rows of the last incomplete batch seed the first batch of the new run;
//! - plates already in the ledger are skipped, except for rows that never
//!   reached a batch, which are queued again.
//!
//! A plate is identified by the `plate` column of its rows, never by the file
//! name. A file mixing several plates, or two files holding the same plate in
//! one run, is malformed input.
//!
//! A malformed input file aborts the run. Batches sealed before it stay on
//! disk and in the ledger.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::config::BatchConfig;
use crate::error::{PickError, Result};
use crate::flags::local_timestamp;
use crate::ledger::{BatchLedger, BatchStatus, PendingRow, fingerprint, ledger_path, scan_picklists};
use crate::packer::{BatchPacker, SealedBatch};
use crate::persist::{remove_if_exists, write_atomic};
use crate::picklist::{format, picklist_file_name, write_picklist};
use crate::records::{WellRecord, read_records};

/// What one batching run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub run_id: String,
    /// Plates whose rows were batched in this run.
    pub processed_plates: Vec<String>,
    /// Plates skipped because an earlier run already batched them.
    pub skipped_plates: Vec<String>,
    /// Complete batches written in this run.
    pub sealed: Vec<u32>,
    /// Incomplete batch left at the end, if any.
    pub partial: Option<u32>,
    /// Plates with rows in the incomplete batch.
    pub pending_plates: Vec<String>,
    /// Rows taken in: the resumed seed plus every processed plate.
    pub rows_in: usize,
    /// Rows written to complete or incomplete batches.
    pub rows_written: usize,
    pub pending_rows: usize,
}

impl BatchSummary {
    /// Rows that reached no pick list. Always zero unless something is wrong.
    pub fn orphaned_rows(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_written)
    }
}

/// Packs tidy plate files into fixed-size pick lists in one output directory.
#[derive(Debug, Clone)]
pub struct PlateBatcher {
    output_dir: PathBuf,
    settings: BatchConfig,
    force: bool,
}

impl PlateBatcher {
    pub fn new(output_dir: impl Into<PathBuf>, settings: BatchConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            settings,
            force: false,
        }
    }

    /// Discard earlier pick lists and bookkeeping and number from 1 again.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Batch `files` in order.
    pub fn run(&self, files: &[PathBuf]) -> Result<BatchSummary> {
        std::fs::create_dir_all(&self.output_dir)?;
        let now = local_timestamp();
        let mut summary = BatchSummary {
            run_id: Uuid::new_v4().to_string(),
            ..Default::default()
        };

        let mut ledger = if self.force {
            self.discard_existing()?;
            BatchLedger::default()
        } else {
            self.load_ledger(&now)?
        };

        let next = ledger.next_number();
        log::info!(
            "{} complete pick list(s) in {}, next is {}",
            next - 1,
            self.output_dir.display(),
            picklist_file_name(next, true)
        );

        let mut packer = BatchPacker::new(self.settings.capacity, next);
        // The seed stays in the ledger until a seal or the final partial
        // replaces it, so it still counts as batched for the plates below.
        let seed = ledger.pending.clone();
        if !seed.is_empty() {
            log::info!("resuming incomplete batch {next} with {} row(s)", seed.len());
        }
        summary.rows_in += seed.len();
        let sealed = packer.push(seed);
        self.seal_all(sealed, &packer, &mut ledger, &mut summary, &now)?;

        let mut seen: BTreeMap<String, &PathBuf> = BTreeMap::new();
        for path in files {
            let records = read_records(path)?;
            let Some(plate) = plate_of(path, &records)? else {
                log::info!("{}: no rows, nothing to batch", path.display());
                continue;
            };
            if let Some(first) = seen.get(&plate) {
                if *first != path {
                    return Err(PickError::malformed(
                        path,
                        format!("plate {plate} is also in {}", first.display()),
                    ));
                }
                log::info!("{plate} is already queued in this run, skipping");
                summary.skipped_plates.push(plate);
                continue;
            }
            seen.insert(plate.clone(), path);

            let total = records.len();
            let print = fingerprint(&records);
            let Some(records) = self.unbatched(&ledger, &plate, &print, records) else {
                summary.skipped_plates.push(plate);
                continue;
            };

            log::info!("{plate}: {} row(s) from {}", records.len(), path.display());
            ledger.add_plate(&plate, total, print, &now);
            summary.rows_in += records.len();
            let rows: Vec<PendingRow> = records
                .into_iter()
                .map(|record| PendingRow {
                    source: plate.clone(),
                    record,
                })
                .collect();
            let sealed = packer.push(rows);
            self.seal_all(sealed, &packer, &mut ledger, &mut summary, &now)?;
            summary.processed_plates.push(plate);
        }

        match packer.finish() {
            Some(batch) => self.write_partial(batch, &mut ledger, &mut summary, &now)?,
            None => {
                ledger.pending.clear();
                ledger.drop_stale_partials(None);
                self.remove_incomplete_except(None)?;
            }
        }
        ledger.save(&self.output_dir)?;
        report(&summary);
        Ok(summary)
    }

    /// Load the ledger, or rebuild it from the pick lists when it is missing
    /// or behind the files on disk.
    fn load_ledger(&self, now: &str) -> Result<BatchLedger> {
        let existing = scan_picklists(&self.output_dir)?;
        let on_disk = existing
            .iter()
            .filter(|(_, complete, _)| *complete)
            .map(|(n, _, _)| *n)
            .max();
        match BatchLedger::load(&self.output_dir)? {
            Some(ledger) if ledger.lacks_row_names() => {
                log::warn!(
                    "{} has no row names, rebuilding it",
                    ledger_path(&self.output_dir).display()
                );
                BatchLedger::rebuild(&self.output_dir, now)
            }
            Some(ledger) if on_disk <= ledger.last_complete() => Ok(ledger),
            Some(_) => {
                log::warn!(
                    "{} is behind the pick lists on disk, rebuilding it",
                    ledger_path(&self.output_dir).display()
                );
                BatchLedger::rebuild(&self.output_dir, now)
            }
            None if !existing.is_empty() => BatchLedger::rebuild(&self.output_dir, now),
            None => Ok(BatchLedger::default()),
        }
    }

    fn discard_existing(&self) -> Result<()> {
        let existing = scan_picklists(&self.output_dir)?;
        log::warn!(
            "starting over: removing {} existing pick list(s) and the batch ledger",
            existing.len()
        );
        for (_, _, path) in existing {
            remove_if_exists(&path)?;
        }
        remove_if_exists(&ledger_path(&self.output_dir))?;
        Ok(())
    }

    /// Rows of `plate` that still need a batch, or `None` when an earlier
    /// run already batched all of them.
    fn unbatched(
        &self,
        ledger: &BatchLedger,
        plate: &str,
        print: &str,
        records: Vec<WellRecord>,
    ) -> Option<Vec<WellRecord>> {
        let Some(entry) = ledger.plates.get(plate) else {
            return Some(records);
        };
        if entry.fingerprint.as_deref().is_some_and(|f| f != print) {
            log::warn!("{plate}: contents changed since it was batched");
        }
        let done = ledger.batched_names(plate);
        let total = records.len();
        let missing: Vec<WellRecord> = records
            .into_iter()
            .filter(|r| !done.contains(r.name.as_str()))
            .collect();
        if missing.is_empty() {
            let files: Vec<String> = entry
                .batches
                .iter()
                .map(|n| {
                    let complete = ledger
                        .batches
                        .get(n)
                        .is_some_and(|b| b.status == BatchStatus::Complete);
                    picklist_file_name(*n, complete)
                })
                .collect();
            log::info!("already saw {plate} in {}, skipping", files.join(","));
            return None;
        }
        log::warn!(
            "{plate}: {} of {total} row(s) never reached a pick list, queueing them",
            missing.len()
        );
        Some(missing)
    }

    fn seal_all(
        &self,
        sealed: Vec<SealedBatch<PendingRow>>,
        packer: &BatchPacker<PendingRow>,
        ledger: &mut BatchLedger,
        summary: &mut BatchSummary,
        now: &str,
    ) -> Result<()> {
        if sealed.is_empty() {
            return Ok(());
        }
        for batch in sealed {
            let file = self.write_batch(&batch)?;
            remove_if_exists(&self.output_dir.join(picklist_file_name(batch.number, false)))?;
            ledger.record_batch(
                batch.number,
                BatchStatus::Complete,
                file,
                &batch.rows,
                now,
                &summary.run_id,
            );
            summary.sealed.push(batch.number);
            summary.rows_written += batch.len();
        }
        ledger.drop_stale_partials(None);
        ledger.pending = packer.pending().to_vec();
        ledger.save(&self.output_dir)
    }

    fn write_partial(
        &self,
        batch: SealedBatch<PendingRow>,
        ledger: &mut BatchLedger,
        summary: &mut BatchSummary,
        now: &str,
    ) -> Result<()> {
        let file = self.write_batch(&batch)?;
        self.remove_incomplete_except(Some(batch.number))?;
        ledger.record_batch(
            batch.number,
            BatchStatus::Partial,
            file,
            &batch.rows,
            now,
            &summary.run_id,
        );
        ledger.drop_stale_partials(Some(batch.number));

        for row in &batch.rows {
            if !summary.pending_plates.contains(&row.source) {
                summary.pending_plates.push(row.source.clone());
            }
        }
        summary.partial = Some(batch.number);
        summary.rows_written += batch.len();
        summary.pending_rows = batch.len();
        ledger.pending = batch.rows;
        Ok(())
    }

    /// Format and write one batch; returns the file name.
    fn write_batch(&self, batch: &SealedBatch<PendingRow>) -> Result<String> {
        let records: Vec<WellRecord> = batch.rows.iter().map(|r| r.record.clone()).collect();
        let rows = format(&records, &self.settings)?;
        let name = picklist_file_name(batch.number, batch.complete);
        let path = self.output_dir.join(&name);
        write_atomic(&path, &write_picklist(&rows)?)?;
        log::info!("wrote {} row(s) to {}", batch.len(), path.display());
        Ok(name)
    }

    fn remove_incomplete_except(&self, keep: Option<u32>) -> Result<()> {
        for (number, complete, path) in scan_picklists(&self.output_dir)? {
            if !complete && Some(number) != keep && remove_if_exists(&path)? {
                log::debug!("removed superseded {}", path.display());
            }
        }
        Ok(())
    }
}

/// The single plate named by `records`, or `None` for an empty file.
fn plate_of(path: &Path, records: &[WellRecord]) -> Result<Option<String>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    if first.plate.trim().is_empty() {
        return Err(PickError::malformed(path, "empty plate name"));
    }
    if let Some(other) = records.iter().find(|r| r.plate != first.plate) {
        return Err(PickError::malformed(
            path,
            format!("mixes plates {} and {}", first.plate, other.plate),
        ));
    }
    Ok(Some(first.plate.clone()))
}

fn report(summary: &BatchSummary) {
    log::info!(
        "batched {} plate(s), skipped {}, sealed {} pick list(s)",
        summary.processed_plates.len(),
        summary.skipped_plates.len(),
        summary.sealed.len()
    );
    if let Some(number) = summary.partial {
        log::info!(
            "{} row(s) from ({}) wait in {} for more plates",
            summary.pending_rows,
            summary.pending_plates.join(", "),
            picklist_file_name(number, false)
        );
    }
    let orphaned = summary.orphaned_rows();
    if orphaned > 0 || summary.rows_written > summary.rows_in {
        log::error!(
            "row count mismatch: {} row(s) in, {} written ({orphaned} orphaned)",
            summary.rows_in,
            summary.rows_written
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picklist::read_picklist;
    use crate::records::write_records;

    fn tidy(dir: &Path, plate: &str, n: usize) -> PathBuf {
        let records: Vec<WellRecord> = (0..n)
            .map(|i| {
                let row = (b'A' + (i / 22) as u8) as char;
                let col = i % 22 + 1;
                WellRecord {
                    well: format!("{row}{col}"),
                    row_letter: row,
                    column_number: col,
                    concentration: 0.5 + (i % 7) as f64,
                    plate: plate.to_string(),
                    sample_id: "m".to_string(),
                    name: format!("{row}{col}-{plate}-m-1"),
                }
            })
            .collect();
        let path = dir.join(format!("{plate}_echo.csv"));
        std::fs::write(&path, write_records(&records).unwrap()).unwrap();
        path
    }

    fn settings(capacity: usize) -> BatchConfig {
        BatchConfig {
            capacity,
            ..BatchConfig::default()
        }
    }

    #[test]
    fn test_two_plates_one_complete_one_partial() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = vec![tidy(input.path(), "P1", 300), tidy(input.path(), "P2", 150)];

        let summary = PlateBatcher::new(out.path(), settings(384)).run(&files).unwrap();
        assert_eq!(summary.sealed, vec![1]);
        assert_eq!(summary.partial, Some(2));
        assert_eq!(summary.rows_in, 450);
        assert_eq!(summary.orphaned_rows(), 0);
        assert_eq!(summary.pending_plates, vec!["P2"]);

        let first = read_picklist(&out.path().join("echo_picklist_00001.csv")).unwrap();
        assert_eq!(first.len(), 384);
        assert_eq!(first[300].plate_number, "P2");
        let second =
            read_picklist(&out.path().join("echo_picklist_00002_incomplete.csv")).unwrap();
        assert_eq!(second.len(), 66);
        assert_eq!(second[0].destination_well, "A1");
    }

    #[test]
    fn test_resume_completes_partial() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let first = vec![tidy(input.path(), "P1", 6)];
        PlateBatcher::new(out.path(), settings(10)).run(&first).unwrap();
        assert!(out.path().join("echo_picklist_00001_incomplete.csv").exists());

        let second = vec![tidy(input.path(), "P2", 7)];
        let summary = PlateBatcher::new(out.path(), settings(10)).run(&second).unwrap();
        assert_eq!(summary.sealed, vec![1]);
        assert_eq!(summary.partial, Some(2));
        assert_eq!(summary.rows_in, 13);
        assert!(!out.path().join("echo_picklist_00001_incomplete.csv").exists());

        let batch = read_picklist(&out.path().join("echo_picklist_00001.csv")).unwrap();
        let plates: Vec<&str> = batch.iter().map(|r| r.plate_number.as_str()).collect();
        assert_eq!(plates[..6], ["P1"; 6]);
        assert_eq!(plates[6..], ["P2"; 4]);

        let ledger = BatchLedger::load(out.path()).unwrap().unwrap();
        assert_eq!(ledger.plates["P1"].batches.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(ledger.plates["P2"].batches.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(ledger.pending.len(), 3);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = vec![tidy(input.path(), "P1", 8), tidy(input.path(), "P2", 5)];
        let batcher = PlateBatcher::new(out.path(), settings(10));
        batcher.run(&files).unwrap();
        let summary = batcher.run(&files).unwrap();

        assert_eq!(summary.skipped_plates, vec!["P1", "P2"]);
        assert!(summary.sealed.is_empty());
        assert_eq!(summary.partial, Some(2));
        assert_eq!(summary.pending_rows, 3);

        let mut names: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["batch_ledger.json", "echo_picklist_00001.csv", "echo_picklist_00002_incomplete.csv"]
        );
    }

    #[test]
    fn test_force_starts_over() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = vec![tidy(input.path(), "P1", 25)];
        PlateBatcher::new(out.path(), settings(10)).run(&files).unwrap();
        let summary = PlateBatcher::new(out.path(), settings(20))
            .force(true)
            .run(&files)
            .unwrap();
        assert_eq!(summary.sealed, vec![1]);
        assert_eq!(summary.partial, Some(2));
        assert!(!out.path().join("echo_picklist_00003_incomplete.csv").exists());
        assert_eq!(
            read_picklist(&out.path().join("echo_picklist_00001.csv")).unwrap().len(),
            20
        );
    }

    #[test]
    fn test_malformed_input_keeps_sealed_batches() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let bad = input.path().join("BAD_echo.csv");
        std::fs::write(&bad, "well,plate\nA1,BAD\n").unwrap();
        let files = vec![tidy(input.path(), "P1", 12), bad, tidy(input.path(), "P3", 4)];

        let err = PlateBatcher::new(out.path(), settings(10)).run(&files).unwrap_err();
        assert!(matches!(err, PickError::MalformedPlateInput { .. }));
        assert!(out.path().join("echo_picklist_00001.csv").exists());

        let ledger = BatchLedger::load(out.path()).unwrap().unwrap();
        assert_eq!(ledger.next_number(), 2);
        assert_eq!(ledger.pending.len(), 2);
        assert!(!ledger.contains_plate("BAD"));
    }

    #[test]
    fn test_missing_ledger_is_rebuilt() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let batcher = PlateBatcher::new(out.path(), settings(10));
        batcher.run(&[tidy(input.path(), "P1", 14)]).unwrap();
        std::fs::remove_file(ledger_path(out.path())).unwrap();

        let summary = batcher
            .run(&[tidy(input.path(), "P1", 14), tidy(input.path(), "P2", 6)])
            .unwrap();
        assert_eq!(summary.skipped_plates, vec!["P1"]);
        assert_eq!(summary.sealed, vec![2]);
        assert_eq!(summary.partial, None);
        assert_eq!(summary.rows_in, 10);
        assert!(!out.path().join("echo_picklist_00002_incomplete.csv").exists());
    }

    #[test]
    fn test_plate_names_with_underscores_stay_distinct() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let files = vec![tidy(input.path(), "MAA_1", 6), tidy(input.path(), "MAA_2", 6)];

        let summary = PlateBatcher::new(out.path(), settings(10)).run(&files).unwrap();
        assert_eq!(summary.processed_plates, vec!["MAA_1", "MAA_2"]);
        assert!(summary.skipped_plates.is_empty());
        assert_eq!(summary.rows_in, 12);
        assert_eq!(summary.orphaned_rows(), 0);

        let ledger = BatchLedger::load(out.path()).unwrap().unwrap();
        assert!(ledger.contains_plate("MAA_1"));
        assert!(ledger.contains_plate("MAA_2"));
        assert!(!ledger.contains_plate("MAA"));
    }

    #[test]
    fn test_file_mixing_plates_is_malformed() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mixed = tidy(input.path(), "P1", 3);
        let mut records = read_records(&mixed).unwrap();
        records[2].plate = "P9".to_string();
        std::fs::write(&mixed, write_records(&records).unwrap()).unwrap();

        let err = PlateBatcher::new(out.path(), settings(10)).run(&[mixed]).unwrap_err();
        assert!(matches!(err, PickError::MalformedPlateInput { .. }));
        assert!(err.to_string().contains("mixes plates"));
    }

    #[test]
    fn test_same_plate_in_two_files_is_malformed() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let first = tidy(input.path(), "P1", 4);
        let copy = input.path().join("P1 copy.csv");
        std::fs::copy(&first, &copy).unwrap();

        let err = PlateBatcher::new(out.path(), settings(10))
            .run(&[first, copy])
            .unwrap_err();
        assert!(matches!(err, PickError::MalformedPlateInput { .. }));
        assert!(err.to_string().contains("also in"));
    }

    #[test]
    fn test_same_file_twice_is_batched_once() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let file = tidy(input.path(), "P1", 4);

        let summary = PlateBatcher::new(out.path(), settings(10))
            .run(&[file.clone(), file])
            .unwrap();
        assert_eq!(summary.processed_plates, vec!["P1"]);
        assert_eq!(summary.skipped_plates, vec!["P1"]);
        assert_eq!(summary.rows_in, 4);
        assert_eq!(summary.rows_written, 4);
    }

    #[test]
    fn test_empty_file_is_ignored() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let empty = input.path().join("EMPTY_echo.csv");
        std::fs::write(&empty, write_records(&[]).unwrap()).unwrap();

        let summary = PlateBatcher::new(out.path(), settings(10))
            .run(&[empty, tidy(input.path(), "P1", 3)])
            .unwrap();
        assert_eq!(summary.processed_plates, vec!["P1"]);
        assert!(summary.skipped_plates.is_empty());
    }

    #[test]
    fn test_rebuilt_ledger_requeues_unbatched_rows() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let batcher = PlateBatcher::new(out.path(), settings(10));
        batcher.run(&[tidy(input.path(), "P1", 6)]).unwrap();
        let stale = std::fs::read(ledger_path(out.path())).unwrap();

        batcher.run(&[tidy(input.path(), "P2", 8)]).unwrap();
        // Crash after sealing batch 1 but before the ledger caught up: the
        // ledger is from the first run and the new partial never landed.
        std::fs::write(ledger_path(out.path()), stale).unwrap();
        std::fs::remove_file(out.path().join("echo_picklist_00002_incomplete.csv")).unwrap();

        let summary = batcher.run(&[tidy(input.path(), "P2", 8)]).unwrap();
        assert_eq!(summary.processed_plates, vec!["P2"]);
        assert_eq!(summary.rows_in, 4);
        assert_eq!(summary.partial, Some(2));
        assert_eq!(summary.orphaned_rows(), 0);

        let complete = read_picklist(&out.path().join("echo_picklist_00001.csv")).unwrap();
        let partial =
            read_picklist(&out.path().join("echo_picklist_00002_incomplete.csv")).unwrap();
        assert_eq!(complete.len() + partial.len(), 14);
        assert!(partial.iter().all(|r| r.plate_number == "P2"));
    }

    #[test]
    fn test_ledger_without_row_names_is_rebuilt() {
        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let batcher = PlateBatcher::new(out.path(), settings(10));
        let file = tidy(input.path(), "P1", 14);
        batcher.run(&[file.clone()]).unwrap();

        let mut ledger = BatchLedger::load(out.path()).unwrap().unwrap();
        for entry in ledger.plates.values_mut() {
            entry.names.clear();
        }
        ledger.save(out.path()).unwrap();

        let summary = batcher.run(&[file]).unwrap();
        assert_eq!(summary.skipped_plates, vec!["P1"]);
        assert_eq!(summary.rows_in, 4);
        assert_eq!(summary.rows_written, 4);
        assert!(summary.sealed.is_empty());
    }
}
