//! Tile pyramid generation.
//!
//! | Generator | Backend |
//! |---|---|
//! | [`ZoomifyGenerator`] | `image` crate, pure Rust |
//! | [`CommandGenerator`] | external tool from `tiles.command` |
//!
//! The module is split into:
//! - **Pyramid**: Pure tier and tile-naming math (unit testable)
//! - **Generator**: [`TileGenerator`] trait + shared error type
//! - **Zoomify / Command**: the two implementations

pub mod command;
pub mod generator;
pub mod pyramid;
pub mod zoomify;

pub use command::CommandGenerator;
pub use generator::{GeneratorError, TileGenerator};
pub use zoomify::ZoomifyGenerator;

use crate::config::TilesConfig;

/// Pick the generator a config asks for: the external command when one is
/// configured, the built-in Zoomify writer otherwise.
pub fn generator_for(config: &TilesConfig) -> Box<dyn TileGenerator> {
    match config.command.as_deref().and_then(CommandGenerator::from_argv) {
        Some(command) => {
            log::debug!("using external tile generator {}", command.program());
            Box::new(command)
        }
        None => Box::new(ZoomifyGenerator::new(config.tile_size, config.quality)),
    }
}
