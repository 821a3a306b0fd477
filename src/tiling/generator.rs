//! Tile generator trait and shared error type.
//!
//! A generator turns one source image into a pyramid directory at a staging
//! path. It knows nothing about catalogs, storage roots or URLs; the
//! relocator decides where the staging path is and what happens afterwards.
//!
//! Two implementations ship with the crate:
//! [`ZoomifyGenerator`](super::zoomify::ZoomifyGenerator) (pure Rust) and
//! [`CommandGenerator`](super::command::CommandGenerator) (external tool).

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("cannot encode tile {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("image has no pixels: {0}")]
    EmptyImage(PathBuf),
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("generator produced no directory at {0}")]
    NoOutput(PathBuf),
}

/// Builds a tile pyramid for one image.
///
/// `Sync` so a single generator can serve every worker of a parallel batch.
pub trait TileGenerator: Sync {
    /// Read `source` and write a complete pyramid directory at `staging`.
    fn generate(&self, source: &Path, staging: &Path) -> Result<(), GeneratorError>;
}
