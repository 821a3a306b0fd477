//! Batch orchestration.
//!
//! Every candidate goes through the same small state machine:
//!
//! ```text
//! Pending ─► gate ─┬─► Skipped{NotAnImage, TooLarge, AlreadyTiled}
//!                  ├─► Pending            (dry run)
//!                  └─► relocate ─┬─► Succeeded
//!                                └─► Failed
//! ```
//!
//! A failed candidate never stops the batch. A storage fault does: the
//! candidate that hit it is recorded as failed, the report gets an
//! [`AbortInfo`], and no candidate that has not started yet is touched.
//!
//! ## Parallel Processing
//!
//! With `threads > 1` candidates run on a local [rayon](https://docs.rs/rayon)
//! pool. Two workers never gate-and-relocate the same storage path at once
//! (a destination lock table serializes them), an atomic flag stops new
//! candidates after a storage fault, and outcomes come back in input order.
//!
//! Progress is streamed as [`BatchEvent`]s over an optional channel so the CLI
//! can print while workers run.

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::gate::{self, Decision, HumanSize};
use crate::relocate::{self, RelocationError};
use crate::select::{self, SelectError, SelectionCriteria};
use crate::tiling::TileGenerator;
use crate::types::{Candidate, ProcessingOutcome, Status};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Condvar, Mutex, PoisonError};

/// Progress events emitted during a batch.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
        dry_run: bool,
        uses_tile_server: bool,
    },
    /// A candidate passed the gate and is being tiled.
    Processing {
        index: usize,
        relative_path: String,
        size_bytes: u64,
    },
    Finished(ProcessingOutcome),
    Aborted(AbortInfo),
}

/// The storage fault that ended a batch early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortInfo {
    pub index: usize,
    pub candidate: Candidate,
    pub error: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Gate every candidate but never generate or move anything.
    pub dry_run: bool,
}

/// Per-status counts of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Candidates selected for the batch.
    pub total: usize,
    /// Candidates never started because the batch was aborted.
    pub not_started: usize,
    pub counts: BTreeMap<Status, usize>,
}

impl BatchSummary {
    /// Count `outcomes` out of `selected` candidates.
    pub fn from_outcomes(outcomes: &[ProcessingOutcome], selected: usize) -> Self {
        let mut counts = BTreeMap::new();
        for outcome in outcomes {
            *counts.entry(outcome.status).or_insert(0) += 1;
        }
        Self {
            total: selected,
            not_started: selected.saturating_sub(outcomes.len()),
            counts,
        }
    }

    pub fn count(&self, status: Status) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn skipped(&self) -> usize {
        Status::ALL
            .into_iter()
            .filter(|s| s.is_skip())
            .map(|s| self.count(s))
            .sum()
    }

    /// No candidate needed tiling.
    pub fn nothing_to_do(&self) -> bool {
        self.count(Status::Succeeded) + self.count(Status::Failed) + self.count(Status::Pending)
            == 0
    }
}

/// Result of a batch: one outcome per candidate that was started, in input
/// order, plus the abort marker when a storage fault cut the run short.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ProcessingOutcome>,
    pub summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortInfo>,
}

impl BatchReport {
    fn new(outcomes: Vec<ProcessingOutcome>, selected: usize, aborted: Option<AbortInfo>) -> Self {
        Self {
            summary: BatchSummary::from_outcomes(&outcomes, selected),
            outcomes,
            aborted,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Select candidates and run them.
pub fn run_selection(
    criteria: &SelectionCriteria,
    catalog: &impl Catalog,
    settings: &Settings,
    generator: &dyn TileGenerator,
    options: &BatchOptions,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchReport, SelectError> {
    let candidates = select::select(criteria, catalog)?;
    Ok(run(&candidates, settings, generator, options, events))
}

/// Run a batch over an ordered candidate list.
///
/// The channel is dropped when the batch is done, which ends a printer loop
/// reading from its receiver.
pub fn run(
    candidates: &[Candidate],
    settings: &Settings,
    generator: &dyn TileGenerator,
    options: &BatchOptions,
    events: Option<Sender<BatchEvent>>,
) -> BatchReport {
    let events = events.as_ref();
    log::info!(
        "batch of {} candidates ({} worker{}{})",
        candidates.len(),
        settings.threads,
        if settings.threads == 1 { "" } else { "s" },
        if options.dry_run { ", dry run" } else { "" }
    );
    emit(
        events,
        BatchEvent::Started {
            total: candidates.len(),
            dry_run: options.dry_run,
            uses_tile_server: settings.uses_tile_server(),
        },
    );

    let report = if settings.threads > 1 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(settings.threads)
            .build()
        {
            Ok(pool) => pool.install(|| run_parallel(candidates, settings, generator, options, events)),
            Err(e) => {
                log::warn!("cannot start worker pool ({e}), running sequentially");
                run_sequential(candidates, settings, generator, options, events)
            }
        }
    } else {
        run_sequential(candidates, settings, generator, options, events)
    };

    if let Some(abort) = &report.aborted {
        log::error!(
            "batch aborted at {}: {}",
            abort.candidate.relative_path,
            abort.error
        );
        emit(events, BatchEvent::Aborted(abort.clone()));
    }
    log::info!(
        "batch finished: {} tiled, {} failed, {} skipped",
        report.summary.count(Status::Succeeded),
        report.summary.count(Status::Failed),
        report.summary.skipped()
    );
    report
}

fn run_sequential(
    candidates: &[Candidate],
    settings: &Settings,
    generator: &dyn TileGenerator,
    options: &BatchOptions,
    events: Option<&Sender<BatchEvent>>,
) -> BatchReport {
    let mut outcomes = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let (outcome, fatal) = run_candidate(index, candidate, settings, generator, options, events);
        outcomes.push(outcome);
        if let Some(abort) = fatal {
            return BatchReport::new(outcomes, candidates.len(), Some(abort));
        }
    }
    BatchReport::new(outcomes, candidates.len(), None)
}

fn run_parallel(
    candidates: &[Candidate],
    settings: &Settings,
    generator: &dyn TileGenerator,
    options: &BatchOptions,
    events: Option<&Sender<BatchEvent>>,
) -> BatchReport {
    let abort = AtomicBool::new(false);
    let first_abort: Mutex<Option<AbortInfo>> = Mutex::new(None);
    let locks = DestinationLocks::default();

    let outcomes: Vec<ProcessingOutcome> = candidates
        .par_iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            if abort.load(Ordering::SeqCst) {
                return None;
            }
            let _guard = locks.acquire(settings.paths.storage_path_for_candidate(candidate));
            // Re-check: a fault may have happened while waiting for the lock
            if abort.load(Ordering::SeqCst) {
                return None;
            }
            let (outcome, fatal) =
                run_candidate(index, candidate, settings, generator, options, events);
            if let Some(info) = fatal {
                abort.store(true, Ordering::SeqCst);
                let mut slot = first_abort.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().is_none_or(|held| info.index < held.index) {
                    *slot = Some(info);
                }
            }
            Some(outcome)
        })
        .collect();

    let aborted = first_abort
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    BatchReport::new(outcomes, candidates.len(), aborted)
}

/// Gate and, when eligible, relocate one candidate.
///
/// Returns the outcome and, for a storage fault, the abort marker.
fn run_candidate(
    index: usize,
    candidate: &Candidate,
    settings: &Settings,
    generator: &dyn TileGenerator,
    options: &BatchOptions,
    events: Option<&Sender<BatchEvent>>,
) -> (ProcessingOutcome, Option<AbortInfo>) {
    let (outcome, fatal) = match gate::evaluate(candidate, settings) {
        Err(e) => {
            let source = settings.paths.tile_paths_for_candidate(candidate).source;
            log::warn!("cannot stat {}: {}", source.display(), e);
            let message = format!("cannot stat {}: {}", source.display(), e);
            (
                ProcessingOutcome::new(index, candidate, Status::Failed, 0, message),
                None,
            )
        }
        Ok(Decision::Skip { reason, size_bytes }) => {
            let message = match reason {
                gate::SkipReason::NotAnImage => "unsupported file type".to_string(),
                gate::SkipReason::TooLarge => HumanSize(size_bytes).to_string(),
                gate::SkipReason::AlreadyTiled => settings
                    .paths
                    .storage_path_for_candidate(candidate)
                    .display()
                    .to_string(),
            };
            log::debug!("skipping {}: {}", candidate.relative_path, reason.status());
            (
                ProcessingOutcome::new(index, candidate, reason.status(), size_bytes, message),
                None,
            )
        }
        Ok(Decision::Proceed { size_bytes }) if options.dry_run => (
            ProcessingOutcome::new(
                index,
                candidate,
                Status::Pending,
                size_bytes,
                HumanSize(size_bytes).to_string(),
            ),
            None,
        ),
        Ok(Decision::Proceed { size_bytes }) => {
            emit(
                events,
                BatchEvent::Processing {
                    index,
                    relative_path: candidate.relative_path.clone(),
                    size_bytes,
                },
            );
            relocate_candidate(index, candidate, settings, generator, size_bytes)
        }
    };
    emit(events, BatchEvent::Finished(outcome.clone()));
    (outcome, fatal)
}

fn relocate_candidate(
    index: usize,
    candidate: &Candidate,
    settings: &Settings,
    generator: &dyn TileGenerator,
    size_bytes: u64,
) -> (ProcessingOutcome, Option<AbortInfo>) {
    match relocate::process(candidate, settings, generator) {
        Ok(destination) => (
            ProcessingOutcome::new(
                index,
                candidate,
                Status::Succeeded,
                size_bytes,
                destination.display().to_string(),
            ),
            None,
        ),
        Err(e) => {
            let fatal = e.is_fatal().then(|| AbortInfo {
                index,
                candidate: candidate.clone(),
                error: e.to_string(),
            });
            if fatal.is_none() {
                log::warn!("{}: {}", candidate.relative_path, e);
            }
            (
                ProcessingOutcome::new(index, candidate, Status::Failed, size_bytes, describe(&e)),
                fatal,
            )
        }
    }
}

/// Outcome message for a relocation error. A failed move names the staging
/// directory that was left behind.
fn describe(error: &RelocationError) -> String {
    match error {
        RelocationError::MoveFailed { staging, .. } => {
            format!("{error} (staging left at {})", staging.display())
        }
        _ => error.to_string(),
    }
}

fn emit(events: Option<&Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is listening
        tx.send(event).ok();
    }
}

/// Storage paths currently being gated or relocated by some worker.
#[derive(Default)]
struct DestinationLocks {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

struct DestinationGuard<'a> {
    locks: &'a DestinationLocks,
    path: PathBuf,
}

impl DestinationLocks {
    fn acquire(&self, path: PathBuf) -> DestinationGuard<'_> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while held.contains(&path) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(path.clone());
        DestinationGuard { locks: self, path }
    }
}

impl Drop for DestinationGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        held.remove(&self.path);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogRecord, JsonCatalog};
    use crate::config::TilerConfig;
    use crate::tiling::generator::tests::MockGenerator;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn settings_in(tmp: &TempDir) -> Settings {
        let config = TilerConfig {
            source_root: tmp.path().join("original"),
            storage_root: tmp.path().join("zoom_tiles"),
            size_ceiling_bytes: 1000,
            ..Default::default()
        };
        Settings::from_config(&config)
    }

    fn parallel_settings_in(tmp: &TempDir) -> Settings {
        let mut settings = settings_in(tmp);
        settings.threads = 4;
        settings
    }

    fn write_sources(tmp: &TempDir, relatives: &[&str]) {
        for relative in relatives {
            let path = tmp.path().join("original").join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"pixels").unwrap();
        }
    }

    fn candidates(relatives: &[&str]) -> Vec<Candidate> {
        relatives
            .iter()
            .enumerate()
            .map(|(i, r)| Candidate::new(i as u64 + 1, 1, None, *r).unwrap())
            .collect()
    }

    fn statuses(report: &BatchReport) -> Vec<Status> {
        report.outcomes.iter().map(|o| o.status).collect()
    }

    fn source_names(generator: &MockGenerator) -> Vec<String> {
        let mut names: Vec<String> = generator
            .calls()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Make `zoom_tiles/<dir>` a regular file so nothing can be created below it.
    fn block_storage_dir(tmp: &TempDir, dir: &str) {
        let storage = tmp.path().join("zoom_tiles");
        fs::create_dir_all(&storage).unwrap();
        fs::write(storage.join(dir), b"blocker").unwrap();
    }

    // =========================================================================
    // Sequential runs
    // =========================================================================

    #[test]
    fn mixed_batch_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "b.txt", "c.png"]);
        let generator = MockGenerator::new();

        let report = run(
            &candidates(&["a.jpg", "b.txt", "c.png"]),
            &settings,
            &generator,
            &BatchOptions::default(),
            None,
        );

        assert_eq!(
            statuses(&report),
            vec![Status::Succeeded, Status::SkippedNotAnImage, Status::Succeeded]
        );
        assert!(tmp.path().join("zoom_tiles/a_zdata").is_dir());
        assert!(tmp.path().join("zoom_tiles/c_zdata").is_dir());
        assert!(!tmp.path().join("zoom_tiles/b_zdata").exists());
        assert_eq!(source_names(&generator), vec!["a.jpg", "c.png"]);
        assert!(!report.is_aborted());
        assert_eq!(report.summary.count(Status::Succeeded), 2);
        assert_eq!(report.summary.skipped(), 1);
    }

    #[test]
    fn already_tiled_is_skipped_without_generating() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg"]);
        fs::create_dir_all(tmp.path().join("zoom_tiles/a_zdata")).unwrap();
        let generator = MockGenerator::new();

        let report = run(
            &candidates(&["a.jpg"]),
            &settings,
            &generator,
            &BatchOptions::default(),
            None,
        );

        assert_eq!(statuses(&report), vec![Status::SkippedAlreadyTiled]);
        assert!(generator.calls().is_empty());
        assert!(report.summary.nothing_to_do());
    }

    #[test]
    fn rerun_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "b.jpg"]);
        let list = candidates(&["a.jpg", "b.jpg"]);

        let first = run(&list, &settings, &MockGenerator::new(), &BatchOptions::default(), None);
        let generator = MockGenerator::new();
        let second = run(&list, &settings, &generator, &BatchOptions::default(), None);

        assert_eq!(first.summary.count(Status::Succeeded), 2);
        assert_eq!(second.summary.count(Status::SkippedAlreadyTiled), 2);
        assert!(generator.calls().is_empty());
    }

    #[test]
    fn generator_failure_does_not_stop_the_batch() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "b.jpg", "c.jpg"]);
        let generator = MockGenerator::failing_for(&["b.jpg"]);

        let report = run(
            &candidates(&["a.jpg", "b.jpg", "c.jpg"]),
            &settings,
            &generator,
            &BatchOptions::default(),
            None,
        );

        assert_eq!(
            statuses(&report),
            vec![Status::Succeeded, Status::Failed, Status::Succeeded]
        );
        assert!(report.outcomes[1].message.contains("refusing b.jpg"));
        assert!(!report.is_aborted());
    }

    #[test]
    fn missing_source_fails_only_that_candidate() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["b.jpg"]);

        let report = run(
            &candidates(&["gone.jpg", "b.jpg"]),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );

        assert_eq!(statuses(&report), vec![Status::Failed, Status::Succeeded]);
        assert_eq!(report.outcomes[0].size_bytes, 0);
        assert!(report.outcomes[0].message.starts_with("cannot stat"));
    }

    #[test]
    fn too_large_reports_human_size() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        let path = tmp.path().join("original/big.tif");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, vec![0u8; 1536]).unwrap();

        let report = run(
            &candidates(&["big.tif"]),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );

        assert_eq!(statuses(&report), vec![Status::SkippedTooLarge]);
        assert_eq!(report.outcomes[0].size_bytes, 1536);
        assert_eq!(report.outcomes[0].message, "1.50K");
    }

    #[test]
    fn storage_fault_halts_remaining_candidates() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "blocked/deep/b.jpg", "c.jpg"]);
        block_storage_dir(&tmp, "blocked");
        let generator = MockGenerator::new();

        let report = run(
            &candidates(&["a.jpg", "blocked/deep/b.jpg", "c.jpg"]),
            &settings,
            &generator,
            &BatchOptions::default(),
            None,
        );

        assert_eq!(statuses(&report), vec![Status::Succeeded, Status::Failed]);
        let abort = report.aborted.as_ref().unwrap();
        assert_eq!(abort.index, 1);
        assert_eq!(abort.candidate.relative_path, "blocked/deep/b.jpg");
        assert!(abort.error.contains("cannot create destination directory"));
        assert_eq!(source_names(&generator), vec!["a.jpg", "b.jpg"]);
        assert!(!tmp.path().join("zoom_tiles/c_zdata").exists());
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.not_started, 1);
    }

    #[test]
    fn parent_that_is_a_file_aborts() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["sub/a.jpg", "b.jpg"]);
        block_storage_dir(&tmp, "sub");

        let report = run(
            &candidates(&["sub/a.jpg", "b.jpg"]),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );

        assert_eq!(statuses(&report), vec![Status::Failed]);
        assert!(report.aborted.unwrap().error.contains("not a directory"));
    }

    #[test]
    fn dry_run_gates_without_generating() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "b.txt", "c.png"]);
        fs::create_dir_all(tmp.path().join("zoom_tiles/c_zdata")).unwrap();
        let generator = MockGenerator::new();

        let report = run(
            &candidates(&["a.jpg", "b.txt", "c.png"]),
            &settings,
            &generator,
            &BatchOptions { dry_run: true },
            None,
        );

        assert_eq!(
            statuses(&report),
            vec![
                Status::Pending,
                Status::SkippedNotAnImage,
                Status::SkippedAlreadyTiled
            ]
        );
        assert!(generator.calls().is_empty());
        assert!(!tmp.path().join("zoom_tiles/a_zdata").exists());
    }

    #[test]
    fn empty_batch_has_nothing_to_do() {
        let tmp = TempDir::new().unwrap();
        let report = run(
            &[],
            &settings_in(&tmp),
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );
        assert!(report.outcomes.is_empty());
        assert_eq!(report.summary.total, 0);
        assert!(report.summary.nothing_to_do());
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn events_follow_the_batch() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "b.txt"]);
        let (tx, rx) = mpsc::channel();

        run(
            &candidates(&["a.jpg", "b.txt"]),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            Some(tx),
        );
        let events: Vec<BatchEvent> = rx.iter().collect();

        assert!(matches!(
            events[0],
            BatchEvent::Started {
                total: 2,
                dry_run: false,
                uses_tile_server: false
            }
        ));
        assert!(matches!(events[1], BatchEvent::Processing { index: 0, .. }));
        assert!(
            matches!(&events[2], BatchEvent::Finished(o) if o.status == Status::Succeeded)
        );
        assert!(
            matches!(&events[3], BatchEvent::Finished(o) if o.status == Status::SkippedNotAnImage)
        );
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn abort_is_announced() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["sub/a.jpg"]);
        block_storage_dir(&tmp, "sub");
        let (tx, rx) = mpsc::channel();

        run(
            &candidates(&["sub/a.jpg"]),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            Some(tx),
        );

        let last = rx.iter().last().unwrap();
        assert!(matches!(last, BatchEvent::Aborted(AbortInfo { index: 0, .. })));
    }

    // =========================================================================
    // Parallel runs
    // =========================================================================

    #[test]
    fn parallel_outcomes_keep_input_order() {
        let tmp = TempDir::new().unwrap();
        let settings = parallel_settings_in(&tmp);
        let names: Vec<String> = (0..40)
            .map(|i| {
                if i % 3 == 0 {
                    format!("f{i:02}.txt")
                } else {
                    format!("f{i:02}.jpg")
                }
            })
            .collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        write_sources(&tmp, &refs);

        let report = run(
            &candidates(&refs),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );

        let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
        assert_eq!(indices, (0..40).collect::<Vec<_>>());
        for (outcome, name) in report.outcomes.iter().zip(&names) {
            assert_eq!(&outcome.candidate.relative_path, name);
            let expected = if name.ends_with(".txt") {
                Status::SkippedNotAnImage
            } else {
                Status::Succeeded
            };
            assert_eq!(outcome.status, expected);
        }
    }

    #[test]
    fn parallel_workers_never_share_a_destination() {
        let tmp = TempDir::new().unwrap();
        let settings = parallel_settings_in(&tmp);
        // Both sources map to the same pyramid directory
        write_sources(&tmp, &["a.jpg", "a.png"]);
        let generator = MockGenerator::new();

        let report = run(
            &candidates(&["a.jpg", "a.png"]),
            &settings,
            &generator,
            &BatchOptions::default(),
            None,
        );

        let mut got = statuses(&report);
        got.sort();
        assert_eq!(got, vec![Status::SkippedAlreadyTiled, Status::Succeeded]);
        assert_eq!(generator.calls().len(), 1);
    }

    #[test]
    fn parallel_storage_fault_stops_unstarted_candidates() {
        let tmp = TempDir::new().unwrap();
        let mut settings = settings_in(&tmp);
        settings.threads = 2;
        let names: Vec<String> = std::iter::once("sub/a.jpg".to_string())
            .chain((1..200).map(|i| format!("f{i:03}.jpg")))
            .collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        write_sources(&tmp, &refs);
        block_storage_dir(&tmp, "sub");
        let batch = candidates(&refs);
        let generator = MockGenerator::new().with_delay(std::time::Duration::from_millis(5));

        let report = run(
            &batch,
            &settings,
            &generator,
            &BatchOptions::default(),
            None,
        );

        let abort = report.aborted.as_ref().unwrap();
        assert_eq!(abort.index, 0);
        assert_eq!(report.outcomes[0].status, Status::Failed);
        assert!(report.outcomes.len() < batch.len());
        assert!(report.outcomes.len() < 20);
        assert_eq!(generator.calls().len(), report.outcomes.len());
    }

    #[test]
    fn destination_lock_blocks_until_released() {
        let locks = DestinationLocks::default();
        let path = PathBuf::from("/tiles/a_zdata");
        let order = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            let guard = locks.acquire(path.clone());
            scope.spawn(|| {
                let _second = locks.acquire(path.clone());
                order.lock().unwrap().push("second");
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            order.lock().unwrap().push("first");
            drop(guard);
        });

        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    // =========================================================================
    // Selection
    // =========================================================================

    #[test]
    fn run_selection_applies_criteria() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        write_sources(&tmp, &["a.jpg", "b.jpg"]);
        let catalog = JsonCatalog::from_records(vec![
            CatalogRecord {
                file_id: 1,
                item_id: 1,
                collection_id: None,
                filename: "a.jpg".into(),
            },
            CatalogRecord {
                file_id: 2,
                item_id: 1,
                collection_id: None,
                filename: "b.jpg".into(),
            },
        ]);
        let criteria = SelectionCriteria {
            include_all: true,
            exclude_candidate_ids: BTreeSet::from([1]),
            ..Default::default()
        };

        let report = run_selection(
            &criteria,
            &catalog,
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].candidate.relative_path, "b.jpg");
        assert!(Path::new(&report.outcomes[0].message).ends_with("zoom_tiles/b_zdata"));
    }

    #[test]
    fn run_selection_without_inclusion_fails() {
        let tmp = TempDir::new().unwrap();
        let result = run_selection(
            &SelectionCriteria::default(),
            &JsonCatalog::default(),
            &settings_in(&tmp),
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );
        assert!(matches!(result, Err(SelectError::InvalidSelection)));
    }

    #[test]
    fn report_serializes_statuses() {
        let tmp = TempDir::new().unwrap();
        let settings = settings_in(&tmp);
        let report = run(
            &candidates(&["x.doc"]),
            &settings,
            &MockGenerator::new(),
            &BatchOptions::default(),
            None,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "skipped_not_an_image");
        assert_eq!(json["summary"]["counts"]["skipped_not_an_image"], 1);
        assert!(json.get("aborted").is_none());
    }
}
