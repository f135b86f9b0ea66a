//! Scale-level planning and tile grids.
//!
//! A scale factor `sf` means one output pixel covers `sf × sf` source
//! pixels. At scale factor `sf` the source is cut into square crops of
//! `tile_size * sf` pixels, each later shrunk to at most `tile_size`.
//!
//! # Grid Layout
//!
//! ```text
//!  (0,0)        c           2c      width
//!    ┌───────────┬───────────┬──────┐
//!    │  (0,0)    │  (1,0)    │(2,0) │
//!    ├───────────┼───────────┼──────┤ c
//!    │  (0,1)    │  (1,1)    │(2,1) │
//!    ├───────────┼───────────┼──────┤ 2c
//!    │  (0,2)    │  (1,2)    │(2,2) │
//!    └───────────┴───────────┴──────┘ height
//! ```
//!
//! The last column and row hold whatever pixels remain. When a dimension
//! divides evenly the last cell is a full `c`, never zero.

use crate::config::PyramidConfig;

// =============================================================================
// SourceImage
// =============================================================================

/// Pixel dimensions of the source image, as probed from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceImage {
    pub width: u32,
    pub height: u32,
}

impl SourceImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The shorter of the two sides.
    pub fn min_dimension(&self) -> u32 {
        self.width.min(self.height)
    }

    /// Whether either side is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// =============================================================================
// Scale Factors
// =============================================================================

/// Compute the valid scale factors for an image.
///
/// A candidate `sf` is kept while `sf < ceil(min_dimension / tile_size)`,
/// so the coarsest level always has at least a 2×2 grid. Candidates are
/// ascending, which makes the result a prefix of the candidate list.
///
/// Returns an empty list for a degenerate image.
pub fn scale_factors(image: &SourceImage, config: &PyramidConfig) -> Vec<u32> {
    if config.tile_size == 0 {
        return Vec::new();
    }
    let limit = image.min_dimension().div_ceil(config.tile_size);

    config
        .scale_factor_candidates
        .iter()
        .copied()
        .take_while(|&sf| sf < limit)
        .collect()
}

// =============================================================================
// Tile Grid
// =============================================================================

/// One cell of a tile grid, in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    /// Column index (0 = left)
    pub column: u32,

    /// Row index (0 = top)
    pub row: u32,

    /// Left edge in source pixels
    pub x: u32,

    /// Top edge in source pixels
    pub y: u32,

    /// Cell width in source pixels (smaller than the crop size on the last column)
    pub width: u32,

    /// Cell height in source pixels (smaller than the crop size on the last row)
    pub height: u32,
}

/// The regular grid of crops covering an image at one scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    image: SourceImage,
    scale_factor: u32,
    crop_size: u32,
    columns: u32,
    rows: u32,
}

impl TileGrid {
    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    /// Edge length of a full crop (`tile_size * scale_factor`).
    pub fn crop_size(&self) -> u32 {
        self.crop_size
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell at a column/row index.
    pub fn cell(&self, column: u32, row: u32) -> Option<GridCell> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        let x = column * self.crop_size;
        let y = row * self.crop_size;

        Some(GridCell {
            column,
            row,
            x,
            y,
            width: self.crop_size.min(self.image.width - x),
            height: self.crop_size.min(self.image.height - y),
        })
    }

    /// Cell whose top-left corner is exactly `(x, y)`.
    pub fn cell_at(&self, x: u32, y: u32) -> Option<GridCell> {
        if x % self.crop_size != 0 || y % self.crop_size != 0 {
            return None;
        }
        self.cell(x / self.crop_size, y / self.crop_size)
    }

    /// Iterate cells row-major.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.columns).filter_map(move |column| self.cell(column, row))
        })
    }
}

/// Build the tile grid for one scale factor.
///
/// `tile_size` and `scale_factor` must both be positive.
pub fn tile_grid(image: &SourceImage, tile_size: u32, scale_factor: u32) -> TileGrid {
    let crop_size = tile_size.saturating_mul(scale_factor).max(1);

    TileGrid {
        image: *image,
        scale_factor,
        crop_size,
        columns: image.width.div_ceil(crop_size),
        rows: image.height.div_ceil(crop_size),
    }
}

// =============================================================================
// Tests
// =============================================================================
