//! Pure calculations for the Zoomify pyramid layout.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! ## Layout
//!
//! ```text
//! plate-04_zdata/
//! ├── ImageProperties.xml
//! ├── TileGroup0/
//! │   ├── 0-0-0.jpg          # tier-column-row
//! │   ├── 1-0-0.jpg
//! │   └── ...
//! └── TileGroup1/            # every 256 tiles start a new group
//! ```
//!
//! Tier 0 is the smallest level, the one that fits in a single tile. Each
//! following tier doubles the previous one (rounding up) until the last tier
//! is the full-resolution image. Tiles are numbered across all tiers, tier by
//! tier, row-major within a tier; the number decides the tile group.

/// Tiles per `TileGroupN` directory.
pub const TILES_PER_GROUP: u32 = 256;

/// One zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub width: u32,
    pub height: u32,
    pub columns: u32,
    pub rows: u32,
}

impl Tier {
    fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            width,
            height,
            columns: width.div_ceil(tile_size),
            rows: height.div_ceil(tile_size),
        }
    }

    pub fn tile_count(&self) -> u32 {
        self.columns * self.rows
    }

    /// Pixel rectangle `(x, y, width, height)` of a tile; edge tiles are cut short.
    pub fn tile_rect(&self, column: u32, row: u32, tile_size: u32) -> (u32, u32, u32, u32) {
        let x = column * tile_size;
        let y = row * tile_size;
        (
            x,
            y,
            tile_size.min(self.width - x),
            tile_size.min(self.height - y),
        )
    }
}

/// Zoom levels for an image, smallest first.
///
/// # Examples
/// ```
/// # use zoom_tiles::tiling::pyramid::tiers;
/// let levels = tiers(1000, 600, 256);
/// let sizes: Vec<(u32, u32)> = levels.iter().map(|t| (t.width, t.height)).collect();
/// assert_eq!(sizes, vec![(250, 150), (500, 300), (1000, 600)]);
/// ```
pub fn tiers(width: u32, height: u32, tile_size: u32) -> Vec<Tier> {
    if width == 0 || height == 0 || tile_size == 0 {
        return Vec::new();
    }
    let mut levels = vec![Tier::new(width, height, tile_size)];
    let (mut w, mut h) = (width, height);
    while w > tile_size || h > tile_size {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        levels.push(Tier::new(w, h, tile_size));
    }
    levels.reverse();
    levels
}

/// Total tiles across all tiers.
pub fn total_tiles(tiers: &[Tier]) -> u32 {
    tiers.iter().map(Tier::tile_count).sum()
}

/// Directory name holding the tile with this global index.
pub fn tile_group_dir(tile_index: u32) -> String {
    format!("TileGroup{}", tile_index / TILES_PER_GROUP)
}

/// File name of a tile: `tier-column-row.jpg`.
pub fn tile_file_name(tier: usize, column: u32, row: u32) -> String {
    format!("{tier}-{column}-{row}.jpg")
}

/// Contents of `ImageProperties.xml`.
pub fn image_properties_xml(width: u32, height: u32, num_tiles: u32, tile_size: u32) -> String {
    format!(
        "<IMAGE_PROPERTIES WIDTH=\"{width}\" HEIGHT=\"{height}\" NUMTILES=\"{num_tiles}\" \
         NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"{tile_size}\" />"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_image_is_a_single_tier() {
        let levels = tiers(200, 100, 256);
        assert_eq!(
            levels,
            vec![Tier {
                width: 200,
                height: 100,
                columns: 1,
                rows: 1
            }]
        );
        assert_eq!(total_tiles(&levels), 1);
    }

    #[test]
    fn exact_tile_size_is_a_single_tier() {
        assert_eq!(tiers(256, 256, 256).len(), 1);
        assert_eq!(tiers(257, 10, 256).len(), 2);
    }

    #[test]
    fn tiers_halve_rounding_up() {
        let levels = tiers(1001, 601, 256);
        let sizes: Vec<(u32, u32)> = levels.iter().map(|t| (t.width, t.height)).collect();
        assert_eq!(sizes, vec![(251, 151), (501, 301), (1001, 601)]);
    }

    #[test]
    fn tile_counts_per_tier() {
        let levels = tiers(1000, 600, 256);
        let counts: Vec<u32> = levels.iter().map(Tier::tile_count).collect();
        // 250x150 → 1, 500x300 → 2x2, 1000x600 → 4x3
        assert_eq!(counts, vec![1, 4, 12]);
        assert_eq!(total_tiles(&levels), 17);
    }

    #[test]
    fn edge_tiles_are_cut_short() {
        let tier = Tier::new(600, 300, 256);
        assert_eq!(tier.tile_rect(0, 0, 256), (0, 0, 256, 256));
        assert_eq!(tier.tile_rect(2, 0, 256), (512, 0, 88, 256));
        assert_eq!(tier.tile_rect(2, 1, 256), (512, 256, 88, 44));
    }

    #[test]
    fn degenerate_sizes_have_no_tiers() {
        assert!(tiers(0, 10, 256).is_empty());
        assert!(tiers(10, 0, 256).is_empty());
    }

    #[test]
    fn tile_groups_hold_256_tiles() {
        assert_eq!(tile_group_dir(0), "TileGroup0");
        assert_eq!(tile_group_dir(255), "TileGroup0");
        assert_eq!(tile_group_dir(256), "TileGroup1");
        assert_eq!(tile_group_dir(1000), "TileGroup3");
    }

    #[test]
    fn properties_xml_lists_dimensions() {
        assert_eq!(
            image_properties_xml(1000, 600, 18, 256),
            "<IMAGE_PROPERTIES WIDTH=\"1000\" HEIGHT=\"600\" NUMTILES=\"18\" \
             NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"256\" />"
        );
        assert_eq!(tile_file_name(3, 1, 2), "3-1-2.jpg");
    }
}
