//! Shared types flowing from selection through the batch report.
//!
//! Outcomes serialize to JSON for `build --json`, so field names here are
//! part of the report format.

use crate::paths::{UnsafePath, validate_relative_path};
use serde::Serialize;
use std::fmt;

/// One source image selected for possible tiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Catalog id of the file row (target of `--exclude-file`).
    pub candidate_id: u64,
    /// Owning item.
    pub record_id: u64,
    /// Collection of the owning item, if any.
    pub group_id: Option<u64>,
    /// Path of the source image relative to the source root.
    pub relative_path: String,
}

impl Candidate {
    /// Build a candidate, rejecting paths that would escape the source root.
    pub fn new(
        candidate_id: u64,
        record_id: u64,
        group_id: Option<u64>,
        relative_path: impl Into<String>,
    ) -> Result<Self, UnsafePath> {
        let relative_path = relative_path.into();
        validate_relative_path(&relative_path)?;
        Ok(Self {
            candidate_id,
            record_id,
            group_id,
            relative_path,
        })
    }
}

/// Final state of a candidate once the batch has finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    SkippedNotAnImage,
    SkippedTooLarge,
    SkippedAlreadyTiled,
    /// Eligible but not tiled because the run was a dry run.
    Pending,
    Succeeded,
    Failed,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::SkippedNotAnImage,
        Status::SkippedTooLarge,
        Status::SkippedAlreadyTiled,
        Status::Pending,
        Status::Succeeded,
        Status::Failed,
    ];

    pub fn is_skip(self) -> bool {
        matches!(
            self,
            Status::SkippedNotAnImage | Status::SkippedTooLarge | Status::SkippedAlreadyTiled
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::SkippedNotAnImage => "not an image",
            Status::SkippedTooLarge => "too large",
            Status::SkippedAlreadyTiled => "already tiled",
            Status::Pending => "pending",
            Status::Succeeded => "tiled",
            Status::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What happened to one candidate. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingOutcome {
    /// Position of the candidate in the selection.
    pub index: usize,
    pub candidate: Candidate,
    pub status: Status,
    /// Source file size; 0 when the file was never stat'ed.
    pub size_bytes: u64,
    /// Destination path, human-readable size, or error text.
    pub message: String,
}

impl ProcessingOutcome {
    pub fn new(
        index: usize,
        candidate: &Candidate,
        status: Status,
        size_bytes: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            index,
            candidate: candidate.clone(),
            status,
            size_bytes,
            message: message.into(),
        }
    }
}
