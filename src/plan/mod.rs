//! Tile-pyramid planning.
//!
//! Everything in this module is pure arithmetic over the source
//! dimensions and a [`PyramidConfig`](crate::config::PyramidConfig); no
//! engine or filesystem access happens here.
//!
//! # Components
//!
//! - [`scale_factors`] / [`tile_grid`]: which zoom levels exist and how
//!   each one is cut into crops
//! - [`regularize`]: final pixel size of each crop after shrinking
//! - [`downsize_levels`]: widths of the reduced full-image derivatives
//! - [`PyramidPlan`]: the above bundled for one source image

mod downsize;
mod regularize;
mod scale;

pub use downsize::downsize_levels;
pub use regularize::{regularize, RegularizedTile, RoundingPolicy, TileGeometry};
pub use scale::{scale_factors, tile_grid, GridCell, SourceImage, TileGrid};

use crate::config::PyramidConfig;

/// Scale factors and derivative widths planned for one source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidPlan {
    pub image: SourceImage,
    pub tile_size: u32,
    pub scale_factors: Vec<u32>,
    pub downsize_levels: Vec<u32>,
}

impl PyramidPlan {
    /// Plan the pyramid for an image.
    pub fn new(image: SourceImage, config: &PyramidConfig) -> Self {
        Self {
            image,
            tile_size: config.tile_size,
            scale_factors: scale_factors(&image, config),
            downsize_levels: downsize_levels(&image, config),
        }
    }

    /// Tile grid at one of the planned scale factors.
    pub fn grid(&self, scale_factor: u32) -> TileGrid {
        tile_grid(&self.image, self.tile_size, scale_factor)
    }

    /// Total number of region tiles across all scale factors.
    pub fn tile_count(&self) -> usize {
        self.scale_factors.iter().map(|&sf| self.grid(sf).len()).sum()
    }
}
