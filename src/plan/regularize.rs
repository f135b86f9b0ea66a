//! Tile regularization.
//!
//! A raw crop at scale factor `sf` covers up to `tile_size * sf` source
//! pixels per side. Regularizing it fixes the pixel size of the encoded
//! tile: full crops become exactly `tile_size`, edge crops shrink by `sf`
//! under a single [`RoundingPolicy`].

use clap::ValueEnum;

use crate::error::PyramidError;

// =============================================================================
// Rounding Policy
// =============================================================================

/// How a truncated edge dimension is divided by the scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RoundingPolicy {
    /// Round up on both axes. Never yields zero for a non-empty crop.
    #[default]
    Ceil,

    /// Round down on both axes.
    Floor,

    /// Round half up on both axes.
    Nearest,

    /// Round width up and height down, matching tile trees produced by
    /// older ImageMagick-based tilers.
    Legacy,
}

impl RoundingPolicy {
    /// Divide a width by the scale factor.
    pub fn scale_width(self, raw: u32, scale_factor: u32) -> u32 {
        match self {
            RoundingPolicy::Ceil | RoundingPolicy::Legacy => raw.div_ceil(scale_factor),
            RoundingPolicy::Floor => raw / scale_factor,
            RoundingPolicy::Nearest => nearest(raw, scale_factor),
        }
    }

    /// Divide a height by the scale factor.
    pub fn scale_height(self, raw: u32, scale_factor: u32) -> u32 {
        match self {
            RoundingPolicy::Ceil => raw.div_ceil(scale_factor),
            RoundingPolicy::Floor | RoundingPolicy::Legacy => raw / scale_factor,
            RoundingPolicy::Nearest => nearest(raw, scale_factor),
        }
    }
}

fn nearest(raw: u32, divisor: u32) -> u32 {
    ((raw as u64 + divisor as u64 / 2) / divisor as u64) as u32
}

// =============================================================================
// Tile Types
// =============================================================================

/// A raw crop as reported by the engine, before regularization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    pub scale_factor: u32,

    /// Left edge in source pixels
    pub x: u32,

    /// Top edge in source pixels
    pub y: u32,

    /// Crop width in source pixels
    pub raw_width: u32,

    /// Crop height in source pixels
    pub raw_height: u32,
}

/// A tile with its final encoded size fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegularizedTile {
    pub scale_factor: u32,
    pub x: u32,
    pub y: u32,

    /// Source region width (equal to the raw crop width)
    pub source_width: u32,

    /// Source region height (equal to the raw crop height)
    pub source_height: u32,

    /// Encoded tile width, `1..=tile_size`
    pub output_width: u32,

    /// Encoded tile height, `1..=tile_size`
    pub output_height: u32,
}

// =============================================================================
// Regularization
// =============================================================================

/// Compute the output size of one tile.
///
/// # Errors
///
/// Returns [`PyramidError::DegenerateTile`] if either output dimension
/// would be zero, and [`PyramidError::InvalidConfig`] for a zero tile
/// size or scale factor.
pub fn regularize(
    geometry: TileGeometry,
    tile_size: u32,
    rounding: RoundingPolicy,
) -> Result<RegularizedTile, PyramidError> {
    let sf = geometry.scale_factor;
    if tile_size == 0 || sf == 0 {
        return Err(PyramidError::InvalidConfig(format!(
            "cannot regularize with tile size {} and scale factor {}",
            tile_size, sf
        )));
    }
    let full = tile_size.saturating_mul(sf);

    let output_width = if geometry.raw_width == full {
        tile_size
    } else {
        rounding.scale_width(geometry.raw_width, sf).min(tile_size)
    };
    let output_height = if geometry.raw_height == full {
        tile_size
    } else {
        rounding.scale_height(geometry.raw_height, sf).min(tile_size)
    };

    if output_width == 0 || output_height == 0 {
        return Err(PyramidError::DegenerateTile {
            scale_factor: sf,
            x: geometry.x,
            y: geometry.y,
            width: output_width,
            height: output_height,
        });
    }

    Ok(RegularizedTile {
        scale_factor: sf,
        x: geometry.x,
        y: geometry.y,
        source_width: geometry.raw_width,
        source_height: geometry.raw_height,
        output_width,
        output_height,
    })
}

// =============================================================================
// Tests
// =============================================================================
