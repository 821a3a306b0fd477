//! Pure Rust Zoomify generator.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF) | `image::ImageReader` |
//! | Downscale each tier | `DynamicImage::resize_exact` with `Triangle` |
//! | Cut tiles | `DynamicImage::crop_imm` |
//! | Encode tiles | `image::codecs::jpeg::JpegEncoder` |
//!
//! Tier geometry and file naming live in [`pyramid`](super::pyramid).

use super::generator::{GeneratorError, TileGenerator};
use super::pyramid::{
    image_properties_xml, tile_file_name, tile_group_dir, tiers, total_tiles,
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

/// Writes Zoomify pyramids (`ImageProperties.xml` + `TileGroupN/t-c-r.jpg`).
#[derive(Debug, Clone)]
pub struct ZoomifyGenerator {
    tile_size: u32,
    quality: u8,
}

impl ZoomifyGenerator {
    pub fn new(tile_size: u32, quality: u8) -> Self {
        Self {
            tile_size: tile_size.max(1),
            quality: quality.clamp(1, 100),
        }
    }
}

impl Default for ZoomifyGenerator {
    fn default() -> Self {
        Self::new(256, 80)
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, GeneratorError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|source| GeneratorError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn write_tile(tile: &DynamicImage, path: &Path, quality: u8) -> Result<(), GeneratorError> {
    let writer = BufWriter::new(File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(tile.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|source| GeneratorError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

impl TileGenerator for ZoomifyGenerator {
    fn generate(&self, source: &Path, staging: &Path) -> Result<(), GeneratorError> {
        let img = load_image(source)?;
        let (width, height) = img.dimensions();
        let levels = tiers(width, height, self.tile_size);
        if levels.is_empty() {
            return Err(GeneratorError::EmptyImage(source.to_path_buf()));
        }
        log::debug!(
            "zoomify {} ({}x{}): {} tiers, {} tiles",
            source.display(),
            width,
            height,
            levels.len(),
            total_tiles(&levels)
        );

        fs::create_dir_all(staging)?;
        let mut index = 0u32;
        let mut current_group = None;
        for (level, tier) in levels.iter().enumerate() {
            let scaled;
            let layer = if tier.width == width && tier.height == height {
                &img
            } else {
                scaled = img.resize_exact(tier.width, tier.height, FilterType::Triangle);
                &scaled
            };

            for row in 0..tier.rows {
                for column in 0..tier.columns {
                    let group = tile_group_dir(index);
                    let group_path = staging.join(&group);
                    if current_group.as_ref() != Some(&group) {
                        fs::create_dir_all(&group_path)?;
                        current_group = Some(group);
                    }

                    let (x, y, w, h) = tier.tile_rect(column, row, self.tile_size);
                    let tile = layer.crop_imm(x, y, w, h);
                    write_tile(&tile, &group_path.join(tile_file_name(level, column, row)), self.quality)?;
                    index += 1;
                }
            }
        }

        fs::write(
            staging.join("ImageProperties.xml"),
            image_properties_xml(width, height, index, self.tile_size),
        )?;
        Ok(())
    }
}
