//! On-disk naming for a Level-0 tile tree.
//!
//! Paths follow the IIIF Image API `{region}/{size}/{rotation}/{quality}.{format}`
//! addressing, so a static file server answers the same URLs a dynamic
//! image server would:
//!
//! ```text
//! <out>/info.json
//! <out>/<x>,<y>,<w>,<h>/<tw>,/0/default.jpg    region tiles
//! <out>/full/<w>,/0/default.jpg                full-image derivatives
//! ```

use std::path::{Path, PathBuf};

use crate::plan::RegularizedTile;

/// Manifest file name.
pub const INFO_FILE: &str = "info.json";

/// Region segment for whole-image derivatives.
pub const FULL_REGION: &str = "full";

/// Rotation segment; Level 0 only serves unrotated images.
pub const ROTATION: &str = "0";

/// Quality and format segment.
pub const TILE_FILE: &str = "default.jpg";

/// Region segment `x,y,w,h`.
pub fn region_segment(x: u32, y: u32, width: u32, height: u32) -> String {
    format!("{},{},{},{}", x, y, width, height)
}

/// Size segment `w,` (width only, height implied).
pub fn size_segment(width: u32) -> String {
    format!("{},", width)
}

/// Parse a region segment `x,y,w,h` back into its parts.
///
/// Only plain decimal digits are accepted in each field.
pub fn parse_region_segment(segment: &str) -> Option<(u32, u32, u32, u32)> {
    let mut parts = segment.split(',');
    let mut next = || -> Option<u32> {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };

    let region = (next()?, next()?, next()?, next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(region)
}

/// Path of a region tile.
pub fn tile_path(output_dir: &Path, tile: &RegularizedTile) -> PathBuf {
    output_dir
        .join(region_segment(
            tile.x,
            tile.y,
            tile.source_width,
            tile.source_height,
        ))
        .join(size_segment(tile.output_width))
        .join(ROTATION)
        .join(TILE_FILE)
}

/// Path of a full-image derivative.
pub fn full_size_path(output_dir: &Path, width: u32) -> PathBuf {
    output_dir
        .join(FULL_REGION)
        .join(size_segment(width))
        .join(ROTATION)
        .join(TILE_FILE)
}

/// Path of the manifest.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(INFO_FILE)
}
