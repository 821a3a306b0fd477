//! Tiler configuration module.
//!
//! Handles loading and validating the `zoom-tiles.toml` file, and resolving it
//! once into the immutable [`Settings`] value every stage receives.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source_root = "files/original"      # Source images (and staging dirs)
//! storage_root = "files/zoom_tiles"   # Published tile pyramids
//! derivative_root = "files/fullsize"  # Checked before removing a pyramid ("" disables removal)
//! derivative_extension = "jpg"
//! zoom_suffix = "_zdata"
//! size_ceiling_bytes = 256000000      # Larger sources are skipped
//! supported_extensions = ["jpeg", "jpg", "png", "gif", "tif", "tiff"]
//! all_messages = true                 # Print skipped candidates too
//!
//! [publish]
//! base_url = "/files/zoom_tiles"
//! site_base_url = "http://localhost"
//! absolute_urls = false
//! # tile_server_url = "https://iip.example.org/fcgi-bin/iipsrv.fcgi"
//!
//! [tiles]
//! tile_size = 256
//! quality = 80
//! # command = ["vips", "dzsave", "{source}", "{staging}", "--layout", "zoomify"]
//!
//! [processing]
//! max_processes = 1                   # 0 = one worker per CPU core
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! storage_root = "/var/www/tiles"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::paths::{DEFAULT_ZOOM_SUFFIX, PathResolver};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "zoom-tiles.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tiler configuration loaded from `zoom-tiles.toml`.
///
/// All fields have defaults matching a stock archive layout. Unknown keys are
/// rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilerConfig {
    /// Root of the source images. Staging directories are created here.
    pub source_root: PathBuf,
    /// Root of the published tile pyramids.
    pub storage_root: PathBuf,
    /// Root of the derivative images consulted before removing a pyramid.
    /// An empty path disables removal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivative_root: Option<PathBuf>,
    /// Extension of that derivative (without the dot).
    pub derivative_extension: String,
    /// Suffix appended to a source root name to form its pyramid directory.
    pub zoom_suffix: String,
    /// Sources strictly larger than this are skipped.
    pub size_ceiling_bytes: u64,
    /// Case-insensitive allow-list of source extensions.
    pub supported_extensions: Vec<String>,
    /// Print one line per skipped candidate (the summary always counts them).
    pub all_messages: bool,
    pub publish: PublishConfig,
    pub tiles: TilesConfig,
    pub processing: ProcessingConfig,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("files/original"),
            storage_root: PathBuf::from("files/zoom_tiles"),
            derivative_root: Some(PathBuf::from("files/fullsize")),
            derivative_extension: "jpg".to_string(),
            zoom_suffix: DEFAULT_ZOOM_SUFFIX.to_string(),
            size_ceiling_bytes: 256_000_000,
            supported_extensions: ["jpeg", "jpg", "png", "gif", "tif", "tiff"]
                .into_iter()
                .map(String::from)
                .collect(),
            all_messages: true,
            publish: PublishConfig::default(),
            tiles: TilesConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl TilerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zoom_suffix.is_empty() {
            return Err(ConfigError::Validation(
                "zoom_suffix must not be empty".into(),
            ));
        }
        if self.zoom_suffix.contains('/') {
            return Err(ConfigError::Validation(
                "zoom_suffix must not contain '/'".into(),
            ));
        }
        if self.supported_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "supported_extensions must not be empty".into(),
            ));
        }
        if self.derivative_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Validation(
                "derivative_extension must not be empty".into(),
            ));
        }
        if self.tiles.quality == 0 || self.tiles.quality > 100 {
            return Err(ConfigError::Validation("tiles.quality must be 1-100".into()));
        }
        if self.tiles.tile_size < 16 {
            return Err(ConfigError::Validation(
                "tiles.tile_size must be at least 16".into(),
            ));
        }
        if let Some(command) = &self.tiles.command
            && command.first().is_none_or(|program| program.is_empty())
        {
            return Err(ConfigError::Validation(
                "tiles.command must name a program".into(),
            ));
        }
        Ok(())
    }
}

/// Where published pyramids are reachable on the web.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Base URL of the storage root, absolute or site-relative.
    pub base_url: String,
    /// Server URL used to absolutize or relativize `base_url`.
    pub site_base_url: String,
    /// Whether URLs are absolute when a caller does not say.
    pub absolute_urls: bool,
    /// Auxiliary image server that can serve pyramids on the fly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_server_url: Option<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            base_url: "/files/zoom_tiles".to_string(),
            site_base_url: "http://localhost".to_string(),
            absolute_urls: false,
            tile_server_url: None,
        }
    }
}

/// Tile generator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TilesConfig {
    /// Edge of a square tile in pixels.
    pub tile_size: u32,
    /// JPEG quality of the emitted tiles (1-100).
    pub quality: u8,
    /// External generator argv. `{source}` and `{staging}` are substituted.
    /// When absent the built-in Zoomify generator is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl Default for TilesConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            quality: 80,
            command: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of candidates tiled at once.
    /// `1` processes one candidate fully before the next; `0` means one
    /// worker per CPU core. Values larger than the core count are clamped.
    pub max_processes: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { max_processes: 1 }
    }
}

/// Resolve the effective worker count from config.
///
/// - `0` → use all available cores
/// - `n` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.max_processes {
        0 => cores,
        n => n.min(cores),
    }
}

/// Load config from a TOML file.
///
/// A missing file yields stock defaults; a present file is parsed sparsely on
/// top of them, rejecting unknown keys, and validated.
pub fn load_config(path: &Path) -> Result<TilerConfig, ConfigError> {
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(TilerConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config: TilerConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Derivative layout consulted before deleting a pyramid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeLayout {
    pub root: PathBuf,
    pub extension: String,
}

/// Resolved, read-only run settings.
///
/// Built once from [`TilerConfig`] and passed explicitly to every stage.
/// Derived flags (such as whether a tile server is configured) are computed
/// here and nowhere else.
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: PathResolver,
    pub derivative: Option<DerivativeLayout>,
    pub size_ceiling: u64,
    /// Lowercase, without leading dots.
    pub supported_extensions: Vec<String>,
    pub all_messages: bool,
    pub tiles: TilesConfig,
    pub threads: usize,
    pub tile_server_url: Option<String>,
    uses_tile_server: bool,
}

impl Settings {
    pub fn from_config(config: &TilerConfig) -> Self {
        let tile_server_url = config
            .publish
            .tile_server_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from);
        Self {
            paths: PathResolver {
                source_root: config.source_root.clone(),
                storage_root: config.storage_root.clone(),
                zoom_suffix: config.zoom_suffix.clone(),
                base_url: config.publish.base_url.clone(),
                site_base_url: config.publish.site_base_url.clone(),
                absolute_by_default: config.publish.absolute_urls,
            },
            derivative: config
                .derivative_root
                .as_ref()
                .filter(|root| !root.as_os_str().is_empty())
                .map(|root| DerivativeLayout {
                    root: root.clone(),
                    extension: config.derivative_extension.trim_start_matches('.').to_string(),
                }),
            size_ceiling: config.size_ceiling_bytes,
            supported_extensions: config
                .supported_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            all_messages: config.all_messages,
            tiles: config.tiles.clone(),
            threads: effective_threads(&config.processing),
            uses_tile_server: tile_server_url.is_some(),
            tile_server_url,
        }
    }

    /// Whether an auxiliary tile server is configured.
    pub fn uses_tile_server(&self) -> bool {
        self.uses_tile_server
    }
}

/// Returns a fully-commented stock `zoom-tiles.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# zoom-tiles configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Root of the source images. The tile generator writes its output next to
# each source (the staging directory) before it is moved to storage_root.
source_root = "files/original"

# Root of the published tile pyramids.
storage_root = "files/zoom_tiles"

# Before a pyramid is removed, a derivative of the same image must exist at
# derivative_root/<root>.<derivative_extension>. This guards against deleting
# a directory that is not a pyramid at all. Set to "" to disable removal.
derivative_root = "files/fullsize"
derivative_extension = "jpg"

# Suffix marking a pyramid directory: photos/a.tif -> photos/a_zdata
zoom_suffix = "_zdata"

# Sources larger than this many bytes are skipped.
size_ceiling_bytes = 256000000

# Source extensions that are tiled (case-insensitive).
supported_extensions = ["jpeg", "jpg", "png", "gif", "tif", "tiff"]

# Print a line for every skipped candidate. The summary counts them either way.
all_messages = true

# ---------------------------------------------------------------------------
# Publishing
# ---------------------------------------------------------------------------
[publish]
# URL of storage_root, absolute or relative to the site.
base_url = "/files/zoom_tiles"

# Server URL used to turn base_url into an absolute URL, or to strip it.
site_base_url = "http://localhost"

# Whether pyramid URLs are absolute by default.
absolute_urls = false

# Auxiliary image server able to serve pyramids on the fly.
# tile_server_url = "https://iip.example.org/fcgi-bin/iipsrv.fcgi"

# ---------------------------------------------------------------------------
# Tile generation
# ---------------------------------------------------------------------------
[tiles]
# Edge of a square tile, in pixels.
tile_size = 256

# JPEG quality of the tiles (1-100).
quality = 80

# External generator. {source} and {staging} are replaced with the absolute
# source image and the directory the tool must create. Without it the
# built-in Zoomify generator is used.
# command = ["vips", "dzsave", "{source}", "{staging}", "--layout", "zoomify"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Candidates tiled at once. 1 = strictly one after another,
# 0 = one worker per CPU core.
max_processes = 1
"##
}
