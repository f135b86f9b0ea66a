//! Image engine abstraction.
//!
//! All pixel work (decoding, cropping, resampling, JPEG encoding) is done
//! by an [`ImageEngine`]. The pyramid builder only sees this trait, so the
//! planning logic can be exercised against an in-memory fake.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            PyramidBuilder               │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           ImageEngine Trait             │
//! │  probe · crop grid · resize · full size │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  MagickEngine   │    │    NativeEngine     │
//! │ (convert CLI)   │    │  (image crate)      │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod magick;
mod native;

pub use magick::{parse_dimensions, MagickEngine, DEFAULT_CONVERT_BIN, DEFAULT_IDENTIFY_BIN};
pub use native::{encode_jpeg, NativeEngine};

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::EngineError;
use crate::pyramid::layout::parse_region_segment;

// =============================================================================
// Cropped Tile
// =============================================================================

/// One crop written by [`ImageEngine::crop_grid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedTile {
    /// Left edge in source pixels
    pub x: u32,

    /// Top edge in source pixels
    pub y: u32,

    /// Crop width as actually produced
    pub width: u32,

    /// Crop height as actually produced
    pub height: u32,

    /// Intermediate file holding the crop
    pub path: PathBuf,
}

impl CroppedTile {
    /// Recover a crop from a scratch file named `<x>,<y>,<w>,<h>.<ext>`.
    pub fn from_scratch_file(path: PathBuf) -> Result<Self, EngineError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| EngineError::UnexpectedOutput(path.display().to_string()))?;

        let (x, y, width, height) = parse_region_segment(stem).ok_or_else(|| {
            EngineError::UnexpectedOutput(format!("unrecognised crop file {}", path.display()))
        })?;

        Ok(Self {
            x,
            y,
            width,
            height,
            path,
        })
    }
}

/// File name for a crop in a scratch directory.
pub fn scratch_file_name(x: u32, y: u32, width: u32, height: u32) -> String {
    format!("{},{},{},{}.png", x, y, width, height)
}

/// Read back every crop from a scratch directory.
///
/// Results are sorted by `(y, x)` so callers see a stable order.
pub fn collect_scratch_crops(dir: &Path) -> Result<Vec<CroppedTile>, EngineError> {
    let mut crops = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            crops.push(CroppedTile::from_scratch_file(path)?);
        }
    }
    crops.sort_by_key(|c| (c.y, c.x));
    Ok(crops)
}

// =============================================================================
// ImageEngine Trait
// =============================================================================

/// Capability interface over the image-processing backend.
///
/// Implementations must be safe to call from several tasks at once; the
/// builder may drive independent scale levels concurrently.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Confirm the engine can run at all.
    ///
    /// Returns [`EngineError::Unavailable`] when a binary or library is missing.
    async fn check_available(&self) -> Result<(), EngineError>;

    /// Get `(width, height)` of the source image in pixels.
    async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), EngineError>;

    /// Cut the whole image into `crop_size × crop_size` tiles anchored at
    /// `(0, 0)`, writing each into `scratch_dir`.
    ///
    /// Edge tiles hold only the remaining pixels. Every returned crop must
    /// report the dimensions actually written.
    async fn crop_grid(
        &self,
        path: &Path,
        crop_size: u32,
        scratch_dir: &Path,
    ) -> Result<Vec<CroppedTile>, EngineError>;

    /// Resize `input` to exactly `width × height` and write a JPEG to `output`.
    async fn resize(
        &self,
        input: &Path,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<(), EngineError>;

    /// Resize the full source to `width`, keeping its aspect ratio, and
    /// write a JPEG to `output`.
    async fn resize_full_image(
        &self,
        path: &Path,
        width: u32,
        output: &Path,
    ) -> Result<(), EngineError>;
}
