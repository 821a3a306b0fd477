//! Per-candidate eligibility.
//!
//! Checks run cheapest first and stop at the first that fails:
//!
//! 1. extension on the allow-list (string check, no I/O)
//! 2. source size within the ceiling (one stat)
//! 3. no pyramid at the storage path yet (one stat)
//!
//! The third check is what makes a batch idempotent: the existence of the
//! destination directory is the only record that an image has been tiled.

use crate::config::Settings;
use crate::paths::root_and_extension;
use crate::types::{Candidate, Status};
use std::fmt;
use std::io;

/// Why a candidate is not tiled. These are routing decisions, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAnImage,
    TooLarge,
    AlreadyTiled,
}

impl SkipReason {
    pub fn status(self) -> Status {
        match self {
            SkipReason::NotAnImage => Status::SkippedNotAnImage,
            SkipReason::TooLarge => Status::SkippedTooLarge,
            SkipReason::AlreadyTiled => Status::SkippedAlreadyTiled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed { size_bytes: u64 },
    Skip { reason: SkipReason, size_bytes: u64 },
}

/// Case-insensitive allow-list check on the final extension.
pub fn is_supported_image(relative_path: &str, supported_extensions: &[String]) -> bool {
    let (_, extension) = root_and_extension(relative_path);
    !extension.is_empty()
        && supported_extensions
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(extension))
}

/// Decide whether a candidate should be tiled.
///
/// Errors only when the source file cannot be stat'ed.
pub fn evaluate(candidate: &Candidate, settings: &Settings) -> io::Result<Decision> {
    if !is_supported_image(&candidate.relative_path, &settings.supported_extensions) {
        return Ok(Decision::Skip {
            reason: SkipReason::NotAnImage,
            size_bytes: 0,
        });
    }

    let paths = settings.paths.tile_paths_for_candidate(candidate);
    let size_bytes = std::fs::metadata(&paths.source)?.len();

    if size_bytes > settings.size_ceiling {
        return Ok(Decision::Skip {
            reason: SkipReason::TooLarge,
            size_bytes,
        });
    }
    // Anything at the path counts, a dangling symlink included
    if std::fs::symlink_metadata(&paths.storage).is_ok() {
        return Ok(Decision::Skip {
            reason: SkipReason::AlreadyTiled,
            size_bytes,
        });
    }
    Ok(Decision::Proceed { size_bytes })
}

const SIZE_SUFFIXES: &[u8] = b"BKMGTP";

/// Binary-unit file size with two decimals, e.g. `1.50K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanSize(pub u64);

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // floor(log1024(bytes)), clamped to the last suffix
        let mut factor = 0;
        let mut scaled = self.0;
        while scaled >= 1024 && factor + 1 < SIZE_SUFFIXES.len() {
            scaled /= 1024;
            factor += 1;
        }
        let value = self.0 as f64 / 1024f64.powi(factor as i32);
        write!(f, "{:.2}{}", value, SIZE_SUFFIXES[factor] as char)
    }
}
