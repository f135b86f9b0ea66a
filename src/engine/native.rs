//! Pure-Rust engine built on the `image` crate.
//!
//! # Design Decisions
//!
//! - **Whole-image decode**: the source is decoded fully for each crop
//!   grid and each derivative. Large sources need matching memory.
//!
//! - **No decoder limits by default**: the `image` crate caps decoder
//!   allocations at 512 MiB, well under a large scan. Callers that want
//!   a ceiling set one with [`NativeEngine::with_limits`].
//!
//! - **Lossless intermediates**: crops are written as PNG so the only
//!   lossy step is the final JPEG encode.
//!
//! - **Blocking work off the runtime**: decoding, resampling and encoding
//!   run under `spawn_blocking`.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Limits};

use crate::config::{clamp_quality, DEFAULT_JPEG_QUALITY};
use crate::error::EngineError;

use super::{scratch_file_name, CroppedTile, ImageEngine};

// =============================================================================
// NativeEngine
// =============================================================================

/// [`ImageEngine`] implemented in-process with the `image` crate.
#[derive(Debug, Clone)]
pub struct NativeEngine {
    quality: u8,
    limits: Limits,
}

/// Resampling filter for every resize.
const FILTER: FilterType = FilterType::Lanczos3;

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine {
    /// Create an engine with default JPEG quality, Lanczos3 resampling and
    /// no decoder limits.
    pub fn new() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
            limits: Limits::no_limits(),
        }
    }

    /// Set the JPEG quality of written tiles.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = clamp_quality(quality);
        self
    }

    /// Cap decoder dimensions and allocations.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

#[async_trait]
impl ImageEngine for NativeEngine {
    async fn check_available(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), EngineError> {
        let path = path.to_path_buf();
        blocking(move || {
            image::image_dimensions(&path).map_err(|e| EngineError::Decode {
                message: format!("{}: {}", path.display(), e),
            })
        })
        .await
    }

    async fn crop_grid(
        &self,
        path: &Path,
        crop_size: u32,
        scratch_dir: &Path,
    ) -> Result<Vec<CroppedTile>, EngineError> {
        if crop_size == 0 {
            return Err(EngineError::UnexpectedOutput(
                "crop size must be greater than 0".to_string(),
            ));
        }
        let path = path.to_path_buf();
        let scratch_dir = scratch_dir.to_path_buf();
        let limits = self.limits.clone();

        blocking(move || {
            let img = open(&path, limits)?;
            let (width, height) = (img.width(), img.height());
            let mut crops = Vec::new();

            for y in (0..height).step_by(crop_size as usize) {
                for x in (0..width).step_by(crop_size as usize) {
                    let w = crop_size.min(width - x);
                    let h = crop_size.min(height - y);
                    let tile = img.crop_imm(x, y, w, h);

                    let tile_path = scratch_dir.join(scratch_file_name(x, y, w, h));
                    tile.save_with_format(&tile_path, ImageFormat::Png)
                        .map_err(|e| EngineError::Encode {
                            message: format!("{}: {}", tile_path.display(), e),
                        })?;

                    crops.push(CroppedTile {
                        x,
                        y,
                        width: w,
                        height: h,
                        path: tile_path,
                    });
                }
            }

            Ok(crops)
        })
        .await
    }

    async fn resize(
        &self,
        input: &Path,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<(), EngineError> {
        let input = input.to_path_buf();
        let output = output.to_path_buf();
        let (quality, limits) = (self.quality, self.limits.clone());

        blocking(move || {
            let img = open(&input, limits)?;
            let resized = img.resize_exact(width, height, FILTER);
            write_jpeg(&resized, quality, &output)
        })
        .await
    }

    async fn resize_full_image(
        &self,
        path: &Path,
        width: u32,
        output: &Path,
    ) -> Result<(), EngineError> {
        let path = path.to_path_buf();
        let output = output.to_path_buf();
        let (quality, limits) = (self.quality, self.limits.clone());

        blocking(move || {
            let img = open(&path, limits)?;
            let height = proportional_height(img.width(), img.height(), width);
            let resized = img.resize_exact(width, height, FILTER);
            write_jpeg(&resized, quality, &output)
        })
        .await
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Encode an image as baseline JPEG at the given quality.
///
/// Alpha is dropped; JPEG has no transparency.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, EngineError> {
    let quality = clamp_quality(quality);
    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);

    let result = match img {
        DynamicImage::ImageLuma8(gray) => encoder.encode_image(gray),
        other => encoder.encode_image(&other.to_rgb8()),
    };
    result.map_err(|e| EngineError::Encode {
        message: e.to_string(),
    })?;

    Ok(Bytes::from(output))
}

/// Height that keeps the aspect ratio at `target_width`, rounded, at least 1.
fn proportional_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return 1;
    }
    let scaled = (height as u64 * target_width as u64 + width as u64 / 2) / width as u64;
    scaled.clamp(1, u32::MAX as u64) as u32
}

/// Decode an image under the given limits, sniffing the format from content.
fn open(path: &Path, limits: Limits) -> Result<DynamicImage, EngineError> {
    let decode_error = |message: String| EngineError::Decode {
        message: format!("{}: {}", path.display(), message),
    };

    let mut reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| decode_error(e.to_string()))?;
    reader.limits(limits);
    reader.decode().map_err(|e| decode_error(e.to_string()))
}

fn write_jpeg(img: &DynamicImage, quality: u8, output: &Path) -> Result<(), EngineError> {
    let data = encode_jpeg(img, quality)?;
    std::fs::write(output, &data)?;
    Ok(())
}

async fn blocking<T, F>(work: F) -> Result<T, EngineError>
where
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| EngineError::Io(format!("image worker failed: {}", e)))?
}

// =============================================================================
// Tests
// =============================================================================
