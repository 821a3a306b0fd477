//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build / Check
//!
//! ```text
//! Tiling 4 candidates
//! 001 2019/plate-04.tif: processing (12.40M)
//! 001 2019/plate-04.tif: processed → files/zoom_tiles/2019/plate-04_zdata
//! 002 notes.txt: not an image
//! 003 scans/huge.tif: too large (301.22M)
//! 004 b.jpg: failed
//!     tile generation failed for files/original/b.jpg: ...
//!
//! Tiled 1 of 4 candidates: 1 failed, 2 skipped (1 not an image, 1 too large)
//! ```
//!
//! A storage fault adds a `fatal error` line, an `N not started` count and an
//! `Aborted` summary line.
//! With `all_messages = false` skipped candidates get no line of their own;
//! the summary still counts them.
//!
//! ## Paths
//!
//! ```text
//! 2019/plate-04.tif
//!     Source:  files/original/2019/plate-04.tif
//!     Staging: files/original/2019/plate-04_zdata
//!     Storage: files/zoom_tiles/2019/plate-04_zdata
//!     URL:     /files/zoom_tiles/2019/plate-04_zdata
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::batch::{BatchEvent, BatchReport};
use crate::config::Settings;
use crate::gate::HumanSize;
use crate::relocate::RemoveOutcome;
use crate::types::{ProcessingOutcome, Status};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 0-based batch index as a 1-based, 3-digit zero-padded position.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index + 1)
}

fn candidate_line(index: usize, relative_path: &str, detail: &str) -> String {
    format!("{} {}: {}", format_index(index), relative_path, detail)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Batch events
// ============================================================================

/// Format a single batch progress event as display lines.
///
/// Skipped candidates produce no lines when `all_messages` is false.
pub fn format_event(event: &BatchEvent, all_messages: bool) -> Vec<String> {
    match event {
        BatchEvent::Started {
            total,
            dry_run,
            uses_tile_server,
        } => {
            let verb = if *dry_run { "Checking" } else { "Tiling" };
            let mut line = format!("{} {}", verb, plural(*total, "candidate"));
            if *uses_tile_server {
                line.push_str(" (tile server configured)");
            }
            vec![line]
        }
        BatchEvent::Processing {
            index,
            relative_path,
            size_bytes,
        } => vec![candidate_line(
            *index,
            relative_path,
            &format!("processing ({})", HumanSize(*size_bytes)),
        )],
        BatchEvent::Finished(outcome) => format_outcome(outcome, all_messages),
        BatchEvent::Aborted(abort) => vec![candidate_line(
            abort.index,
            &abort.candidate.relative_path,
            &format!("fatal error: {}", abort.error),
        )],
    }
}

fn format_outcome(outcome: &ProcessingOutcome, all_messages: bool) -> Vec<String> {
    if outcome.status.is_skip() && !all_messages {
        return Vec::new();
    }
    let path = &outcome.candidate.relative_path;
    match outcome.status {
        Status::SkippedNotAnImage => vec![candidate_line(outcome.index, path, "not an image")],
        Status::SkippedTooLarge => vec![candidate_line(
            outcome.index,
            path,
            &format!("too large ({})", HumanSize(outcome.size_bytes)),
        )],
        Status::SkippedAlreadyTiled => vec![candidate_line(outcome.index, path, "already tiled")],
        Status::Pending => vec![candidate_line(
            outcome.index,
            path,
            &format!("would tile ({})", HumanSize(outcome.size_bytes)),
        )],
        Status::Succeeded => vec![candidate_line(
            outcome.index,
            path,
            &format!("processed \u{2192} {}", outcome.message),
        )],
        Status::Failed => vec![
            candidate_line(outcome.index, path, "failed"),
            format!("    {}", outcome.message),
        ],
    }
}

/// Print a batch event to stdout.
pub fn print_event(event: &BatchEvent, all_messages: bool) {
    for line in format_event(event, all_messages) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch summary
// ============================================================================

/// Format the closing summary of a batch.
///
/// Distinguishes a batch with nothing to do from one that tiled (or would
/// tile) something, and reports an abort on its own line.
pub fn format_summary(report: &BatchReport) -> Vec<String> {
    let summary = &report.summary;
    let mut lines = vec![String::new()];

    let skipped_detail: Vec<String> = Status::ALL
        .into_iter()
        .filter(|s| s.is_skip())
        .filter_map(|s| match summary.count(s) {
            0 => None,
            n => Some(format!("{n} {s}")),
        })
        .collect();
    let skipped = match summary.skipped() {
        0 => String::new(),
        n => format!("{} skipped ({})", n, skipped_detail.join(", ")),
    };

    if summary.total == 0 {
        lines.push("Nothing to do: no candidates selected".to_string());
    } else if summary.nothing_to_do() && !report.is_aborted() {
        lines.push(format!(
            "Nothing to do: {}, {}",
            plural(summary.total, "candidate"),
            skipped
        ));
    } else {
        let pending = summary.count(Status::Pending);
        let headline = if pending > 0 {
            format!(
                "{} of {} would be tiled",
                pending,
                plural(summary.total, "candidate")
            )
        } else {
            format!(
                "Tiled {} of {}",
                summary.count(Status::Succeeded),
                plural(summary.total, "candidate")
            )
        };
        let mut details = Vec::new();
        if summary.count(Status::Failed) > 0 {
            details.push(format!("{} failed", summary.count(Status::Failed)));
        }
        if !skipped.is_empty() {
            details.push(skipped);
        }
        if summary.not_started > 0 {
            details.push(format!("{} not started", summary.not_started));
        }
        if details.is_empty() {
            lines.push(headline);
        } else {
            lines.push(format!("{}: {}", headline, details.join(", ")));
        }
    }

    if let Some(abort) = &report.aborted {
        lines.push(format!(
            "Aborted at {} {}: {}",
            format_index(abort.index),
            abort.candidate.relative_path,
            abort.error
        ));
    }
    lines
}

/// Print the batch summary to stdout.
pub fn print_summary(report: &BatchReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Paths
// ============================================================================

/// Format every location derived from one relative path.
pub fn format_paths(relative_path: &str, settings: &Settings, absolute: Option<bool>) -> Vec<String> {
    let paths = settings.paths.tile_paths_for_path(relative_path);
    let mut lines = vec![
        relative_path.to_string(),
        format!("    Source:  {}", paths.source.display()),
        format!("    Staging: {}", paths.staging.display()),
        format!("    Storage: {}", paths.storage.display()),
        format!(
            "    URL:     {}",
            settings.paths.publish_url_for_path(relative_path, absolute)
        ),
    ];
    if let Some(url) = &settings.tile_server_url {
        lines.push(format!("    Tile server: {}", url));
    }
    lines
}

/// Print path derivation to stdout.
pub fn print_paths(relative_path: &str, settings: &Settings, absolute: Option<bool>) {
    for line in format_paths(relative_path, settings, absolute) {
        println!("{}", line);
    }
}

// ============================================================================
// Removal
// ============================================================================

/// Format the result of removing one pyramid.
pub fn format_remove_outcome(relative_path: &str, outcome: &RemoveOutcome) -> Vec<String> {
    match outcome {
        RemoveOutcome::Removed(dir) => {
            vec![format!("{}: removed {}", relative_path, dir.display())]
        }
        RemoveOutcome::NotTiled(dir) => {
            vec![format!("{}: not tiled ({} missing)", relative_path, dir.display())]
        }
        RemoveOutcome::Unconfirmed(derivative) => vec![
            format!("{}: kept", relative_path),
            format!("    No derivative at {}", derivative.display()),
        ],
    }
}

/// Print a removal result to stdout.
pub fn print_remove_outcome(relative_path: &str, outcome: &RemoveOutcome) {
    for line in format_remove_outcome(relative_path, outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
