//! Generation and relocation of one pyramid, and its removal.
//!
//! ```text
//! generate(source, staging)          ← TileGenerator
//!     │
//!     ▼
//! ensure parent of storage dir       ← mkdir -p (0755), fatal on failure
//!     │
//!     ▼
//! rename(staging, storage)           ← single directory move
//! ```
//!
//! Storage faults (the destination parent cannot be created, or is not a
//! directory) affect every later candidate too, so they are marked fatal and
//! the batch stops. Everything else fails only the candidate at hand; the
//! staging directory is then left where it is for inspection.

use crate::config::Settings;
use crate::paths::{UnsafePath, derivative_path, validate_relative_path};
use crate::tiling::{GeneratorError, TileGenerator};
use crate::types::Candidate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RelocationError {
    #[error("tile generation failed for {path}: {source}")]
    GeneratorFailed {
        path: PathBuf,
        source: GeneratorError,
    },
    #[error("cannot create destination directory {path}: {source}")]
    CannotCreateDestinationDir { path: PathBuf, source: io::Error },
    #[error("destination parent is not a directory: {0}")]
    DestinationNotADirectory(PathBuf),
    #[error("cannot move {staging} to {destination}: {source}")]
    MoveFailed {
        staging: PathBuf,
        destination: PathBuf,
        source: io::Error,
    },
}

impl RelocationError {
    /// Whether the error ends the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelocationError::CannotCreateDestinationDir { .. }
                | RelocationError::DestinationNotADirectory(_)
        )
    }
}

/// Tile one candidate and move the pyramid to its storage path.
///
/// Returns the storage path on success.
pub fn process(
    candidate: &Candidate,
    settings: &Settings,
    generator: &dyn TileGenerator,
) -> Result<PathBuf, RelocationError> {
    let paths = settings.paths.tile_paths_for_candidate(candidate);
    log::debug!(
        "generating {} -> {}",
        paths.source.display(),
        paths.staging.display()
    );

    generator
        .generate(&paths.source, &paths.staging)
        .map_err(|source| RelocationError::GeneratorFailed {
            path: paths.source.clone(),
            source,
        })?;

    if let Some(parent) = paths.storage.parent() {
        ensure_directory(parent)?;
    }

    if !paths.staging.is_dir() {
        return Err(RelocationError::GeneratorFailed {
            path: paths.source.clone(),
            source: GeneratorError::NoOutput(paths.staging.clone()),
        });
    }

    log::debug!(
        "moving {} -> {}",
        paths.staging.display(),
        paths.storage.display()
    );
    fs::rename(&paths.staging, &paths.storage).map_err(|source| RelocationError::MoveFailed {
        staging: paths.staging.clone(),
        destination: paths.storage.clone(),
        source,
    })?;
    Ok(paths.storage)
}

fn ensure_directory(dir: &Path) -> Result<(), RelocationError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(RelocationError::DestinationNotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_dir_all(dir).map_err(|source| RelocationError::CannotCreateDestinationDir {
                path: dir.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(RelocationError::CannotCreateDestinationDir {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

// =============================================================================
// Removal
// =============================================================================

#[derive(Error, Debug)]
pub enum RemoveError {
    #[error(transparent)]
    UnsafePath(#[from] UnsafePath),
    #[error("no derivative_root configured; refusing to remove tiles")]
    NoDerivativeRoot,
    #[error("not a tile directory, refusing to remove: {0}")]
    NotADirectory(PathBuf),
    #[error("cannot remove {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The pyramid at this path was deleted.
    Removed(PathBuf),
    /// No pyramid exists at this path.
    NotTiled(PathBuf),
    /// The derivative at this path is missing, so nothing was deleted.
    Unconfirmed(PathBuf),
}

/// Remove the pyramid of a source image.
///
/// Deletes only when a derivative of the same image exists, which confirms
/// the directory really is a pyramid of a catalogued image.
pub fn remove_tiles(relative_path: &str, settings: &Settings) -> Result<RemoveOutcome, RemoveError> {
    validate_relative_path(relative_path)?;

    let storage = settings.paths.storage_path_for_path(relative_path);
    let meta = match fs::symlink_metadata(&storage) {
        Ok(meta) => meta,
        Err(_) => return Ok(RemoveOutcome::NotTiled(storage)),
    };
    // Symlinks and plain files are never pyramids
    if !meta.file_type().is_dir() {
        return Err(RemoveError::NotADirectory(storage));
    }

    let derivative = settings.derivative.as_ref().ok_or(RemoveError::NoDerivativeRoot)?;
    let check = derivative_path(&derivative.root, relative_path, &derivative.extension);
    if !check.exists() {
        log::warn!(
            "not removing {}: no derivative at {}",
            storage.display(),
            check.display()
        );
        return Ok(RemoveOutcome::Unconfirmed(check));
    }

    remove_dir_depth_first(&storage)?;
    log::info!("removed {}", storage.display());
    Ok(RemoveOutcome::Removed(storage))
}

/// Delete a directory tree bottom-up: entries first, each directory once it
/// is empty, `dir` itself last. Symlinks are unlinked, never followed.
pub fn remove_dir_depth_first(dir: &Path) -> Result<(), RemoveError> {
    for entry in WalkDir::new(dir).contents_first(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            RemoveError::Io {
                path,
                source: e.into(),
            }
        })?;
        let path = entry.path();
        let result = if entry.file_type().is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|source| RemoveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
