//! # Zoom Tiles
//!
//! Batch builder for deep-zoom tile pyramids. Picks images out of a catalog,
//! cuts each into a multi-resolution pyramid, and moves the pyramid to a
//! stable, web-addressable storage location. Running the same selection twice
//! never re-tiles an image.
//!
//! # Architecture: One Batch, Five Steps
//!
//! ```text
//! 1. Select    catalog + criteria  →  ordered candidates
//! 2. Gate      candidate           →  skip (why) | proceed
//! 3. Generate  source image        →  staging pyramid
//! 4. Relocate  staging pyramid     →  storage pyramid
//! 5. Report    outcomes            →  summary (+ abort marker)
//! ```
//!
//! Steps 2–4 run per candidate inside the batch runner; one candidate failing
//! never stops the others. Only a storage fault (the destination directory
//! cannot be created, or is not a directory) ends the batch early, since every
//! later candidate would hit it too.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`paths`] | Pure staging / storage / derivative path and publish URL derivation |
//! | [`select`] | Selection criteria, base-set precedence and exclusions |
//! | [`catalog`] | `Catalog` trait and the JSON-export catalog |
//! | [`gate`] | Per-candidate eligibility: format, size ceiling, already tiled |
//! | [`tiling`] | `TileGenerator` trait, Zoomify pyramid writer, external command |
//! | [`relocate`] | Generate + move one pyramid; guarded pyramid removal |
//! | [`batch`] | Batch runner, progress events, report and summary |
//! | [`config`] | `zoom-tiles.toml` loading, validation, resolved `Settings` |
//! | [`types`] | Candidate, status and outcome types shared by every step |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Destination Is the Only State
//!
//! There is no database of tiled images. A candidate is "already tiled" when
//! its storage directory exists, nothing more. The generator writes next to
//! the source (the staging directory) and the finished pyramid is moved into
//! place with a single `rename`, so a storage directory that exists is a
//! complete one.
//!
//! ## Settings Resolved Once
//!
//! `zoom-tiles.toml` is parsed into [`config::TilerConfig`] and turned into an
//! immutable [`config::Settings`] before anything runs. Derived facts (the
//! lowercase extension allow-list, whether a tile server is configured, the
//! worker count) are computed there and passed explicitly; no stage reads
//! configuration on its own.
//!
//! ## Generators Behind a Trait
//!
//! The batch only sees [`tiling::TileGenerator`]. The built-in Zoomify writer
//! uses the `image` crate; an external tool (`vips dzsave`, for instance) can
//! be plugged in through `tiles.command`. Tests use a mock that records calls.
//!
//! ## Sequential by Default
//!
//! `processing.max_processes = 1` tiles one image at a time. Larger values run
//! candidates on a rayon pool; a per-destination lock keeps two workers off the
//! same storage path, and outcomes are reported in selection order either way.

pub mod batch;
pub mod catalog;
pub mod config;
pub mod gate;
pub mod output;
pub mod paths;
pub mod relocate;
pub mod select;
pub mod tiling;
pub mod types;
