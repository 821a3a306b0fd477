//! Path and URL derivation for tile pyramids.
//!
//! Every tile pyramid lives in a directory named after its source image with
//! the extension dropped and a zoom suffix appended:
//!
//! ```text
//! source_root/2019/plate-04.tif        ← source image
//! source_root/2019/plate-04_zdata/     ← staging (where the generator writes)
//! storage_root/2019/plate-04_zdata/    ← storage (permanent, web-addressable)
//! {base_url}/2019/plate-04_zdata       ← publish URL
//! ```
//!
//! All functions here are pure string/path composition. Nothing touches the
//! filesystem, so the source and published namespaces can never drift apart:
//! both are derived from the same `root + suffix` string.
//!
//! Callers holding a bare relative path use the `*_for_path` entry points on
//! [`PathResolver`]; callers holding a [`Candidate`] use the `*_for_candidate`
//! ones. Both funnel into [`zoom_dir_name`].

use crate::types::Candidate;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Default suffix marking a tile-pyramid directory.
pub const DEFAULT_ZOOM_SUFFIX: &str = "_zdata";

/// A relative path that would escape (or not name anything inside) its root.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsafe relative path: {0:?}")]
pub struct UnsafePath(pub String);

/// Split a path into everything before the extension and the extension.
///
/// Only the final component is considered, so dots in directory names never
/// count. A leading dot (`.hidden`) or a trailing dot (`file.`) is not an
/// extension separator; in both cases the whole path is the root.
///
/// ```
/// # use zoom_tiles::paths::root_and_extension;
/// assert_eq!(root_and_extension("/a/b/file.tif"), ("/a/b/file", "tif"));
/// assert_eq!(root_and_extension("/a/b/noext"), ("/a/b/noext", ""));
/// ```
pub fn root_and_extension(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |slash| slash + 1);
    let name = &path[name_start..];
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => {
            let split = name_start + dot;
            (&path[..split], &path[split + 1..])
        }
        _ => (path, ""),
    }
}

/// Name of the pyramid directory for a relative path: `root + suffix`.
pub fn zoom_dir_name(relative_path: &str, suffix: &str) -> String {
    let (root, _) = root_and_extension(relative_path);
    format!("{root}{suffix}")
}

/// `source_root / root(relative_path) + suffix`
pub fn staging_path(source_root: &Path, relative_path: &str, suffix: &str) -> PathBuf {
    source_root.join(zoom_dir_name(relative_path, suffix))
}

/// `storage_root / root(relative_path) + suffix`
pub fn storage_path(storage_root: &Path, relative_path: &str, suffix: &str) -> PathBuf {
    storage_root.join(zoom_dir_name(relative_path, suffix))
}

/// `derivative_root / root(relative_path) + "." + extension`
pub fn derivative_path(derivative_root: &Path, relative_path: &str, extension: &str) -> PathBuf {
    let (root, _) = root_and_extension(relative_path);
    derivative_root.join(format!("{root}.{extension}"))
}

/// Whether a URL already carries a scheme we serve tiles from.
pub fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Compose the public URL of a pyramid directory.
///
/// - `absolute = true`: a relative `base_url` is prefixed with `site_base_url`.
/// - `absolute = false`: an absolute `base_url` under `site_base_url` has that
///   prefix stripped. Absolute URLs on other hosts are left alone.
pub fn publish_url(base_url: &str, site_base_url: &str, zoom_dir: &str, absolute: bool) -> String {
    let site = site_base_url.trim_end_matches('/');
    let base = if absolute {
        if is_absolute_url(base_url) {
            base_url.to_string()
        } else {
            format!("{}/{}", site, base_url.trim_start_matches('/'))
        }
    } else {
        match base_url.strip_prefix(site) {
            Some(rest) if is_absolute_url(base_url) && (rest.is_empty() || rest.starts_with('/')) => {
                rest.to_string()
            }
            _ => base_url.to_string(),
        }
    };
    format!("{}/{}", base.trim_end_matches('/'), zoom_dir.trim_start_matches('/'))
}

/// Check that a catalog path stays inside the root it is joined onto.
///
/// Accepts only normal components (and `.`), and at least one normal one.
pub fn validate_relative_path(path: &str) -> Result<(), UnsafePath> {
    let mut named = false;
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => named = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(UnsafePath(path.to_string()));
            }
        }
    }
    if named {
        Ok(())
    } else {
        Err(UnsafePath(path.to_string()))
    }
}

/// Staging and storage locations of one pyramid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePaths {
    pub source: PathBuf,
    pub staging: PathBuf,
    pub storage: PathBuf,
}

/// Root directories and URL settings every derivation is made against.
#[derive(Debug, Clone)]
pub struct PathResolver {
    pub source_root: PathBuf,
    pub storage_root: PathBuf,
    pub zoom_suffix: String,
    pub base_url: String,
    pub site_base_url: String,
    /// Used when a caller passes `None` for `absolute`.
    pub absolute_by_default: bool,
}

impl PathResolver {
    pub fn tile_paths_for_path(&self, relative_path: &str) -> TilePaths {
        TilePaths {
            source: self.source_root.join(relative_path),
            staging: staging_path(&self.source_root, relative_path, &self.zoom_suffix),
            storage: storage_path(&self.storage_root, relative_path, &self.zoom_suffix),
        }
    }

    pub fn tile_paths_for_candidate(&self, candidate: &Candidate) -> TilePaths {
        self.tile_paths_for_path(&candidate.relative_path)
    }

    pub fn storage_path_for_path(&self, relative_path: &str) -> PathBuf {
        storage_path(&self.storage_root, relative_path, &self.zoom_suffix)
    }

    pub fn storage_path_for_candidate(&self, candidate: &Candidate) -> PathBuf {
        self.storage_path_for_path(&candidate.relative_path)
    }

    pub fn publish_url_for_path(&self, relative_path: &str, absolute: Option<bool>) -> String {
        publish_url(
            &self.base_url,
            &self.site_base_url,
            &zoom_dir_name(relative_path, &self.zoom_suffix),
            absolute.unwrap_or(self.absolute_by_default),
        )
    }

    pub fn publish_url_for_candidate(&self, candidate: &Candidate, absolute: Option<bool>) -> String {
        self.publish_url_for_path(&candidate.relative_path, absolute)
    }
}
