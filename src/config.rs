//! Configuration management for iiif-tiler.
//!
//! Two layers live here:
//! - [`Config`]: command-line arguments via clap, each with a `TILER_`
//!   environment variable fallback
//! - [`PyramidConfig`]: the immutable planning parameters threaded through
//!   the planner and builder
//!
//! # Environment Variables
//!
//! - `TILER_OUTPUT` - Destination directory for the tile tree
//! - `TILER_IDENTIFIER` - Image identifier written as the manifest `@id`
//! - `TILER_TILESIZE` - Tile size in pixels (default: 256)
//! - `TILER_ENGINE` - Image engine: `magick` or `native` (default: magick)
//! - `TILER_QUALITY` - JPEG quality for tiles (default: 80)
//! - `TILER_ROUNDING` - Edge tile rounding policy (default: ceil)
//! - `TILER_JOBS` - Concurrent scale/downsize levels (default: 1)
//! - `TILER_CONVERT_BIN` / `TILER_IDENTIFY_BIN` - ImageMagick binaries

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use crate::engine::{DEFAULT_CONVERT_BIN, DEFAULT_IDENTIFY_BIN};
use crate::error::PyramidError;
use crate::plan::RoundingPolicy;

// =============================================================================
// Default Values
// =============================================================================

/// Default tile edge length in output pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

/// Candidate scale factors, each double the previous.
pub const DEFAULT_SCALE_FACTORS: [u32; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

/// Candidate widths for full-image derivatives.
pub const DEFAULT_DOWNSIZE_WIDTHS: [u32; 9] = [16, 32, 64, 128, 256, 512, 1024, 2048, 4096];

// =============================================================================
// Pyramid Configuration
// =============================================================================

/// Planning parameters for one pyramid.
///
/// Built once per run and shared read-only by every planner component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidConfig {
    /// Edge length of a full tile, in output pixels
    pub tile_size: u32,

    /// Ascending powers of two starting at 1
    pub scale_factor_candidates: Vec<u32>,

    /// Strictly ascending derivative widths
    pub downsize_candidates: Vec<u32>,

    /// Rounding applied to truncated edge tiles
    pub rounding: RoundingPolicy,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            scale_factor_candidates: DEFAULT_SCALE_FACTORS.to_vec(),
            downsize_candidates: DEFAULT_DOWNSIZE_WIDTHS.to_vec(),
            rounding: RoundingPolicy::default(),
        }
    }
}

impl PyramidConfig {
    /// Check the invariants the planner relies on.
    pub fn validate(&self) -> Result<(), PyramidError> {
        if self.tile_size == 0 {
            return Err(PyramidError::InvalidConfig(
                "tile size must be greater than 0".to_string(),
            ));
        }

        match self.scale_factor_candidates.first() {
            Some(1) => {}
            _ => {
                return Err(PyramidError::InvalidConfig(
                    "scale factors must start at 1".to_string(),
                ))
            }
        }
        if self
            .scale_factor_candidates
            .windows(2)
            .any(|w| w[0].checked_mul(2) != Some(w[1]))
        {
            return Err(PyramidError::InvalidConfig(
                "each scale factor must be double the previous one".to_string(),
            ));
        }
        if let Some(&largest) = self.scale_factor_candidates.last() {
            if self.tile_size.checked_mul(largest).is_none() {
                return Err(PyramidError::InvalidConfig(format!(
                    "tile size {} times scale factor {} overflows",
                    self.tile_size, largest
                )));
            }
        }

        if self.downsize_candidates.contains(&0) {
            return Err(PyramidError::InvalidConfig(
                "downsize widths must be greater than 0".to_string(),
            ));
        }
        if self.downsize_candidates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PyramidError::InvalidConfig(
                "downsize widths must be strictly ascending".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Which image engine renders the tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum EngineKind {
    /// ImageMagick `convert`/`identify` on $PATH
    #[default]
    Magick,

    /// Built-in Rust decoder and resampler
    Native,
}

/// iiif-tiler - IIIF Image API Level-0 static tile generator.
///
/// Cuts a source image into a pyramid of JPEG tiles and reduced
/// derivatives laid out for plain file serving, plus an info.json.
#[derive(Parser, Debug, Clone)]
#[command(name = "iiif-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Source image to tile.
    pub source: PathBuf,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Destination directory for tiles.
    #[arg(short, long, env = "TILER_OUTPUT")]
    pub output: PathBuf,

    /// Image identifier written to info.json (e.g. https://example.com/iiif/my_image).
    ///
    /// Defaults to the source file name without its extension.
    #[arg(short, long, env = "TILER_IDENTIFIER")]
    pub identifier: Option<String>,

    // =========================================================================
    // Pyramid Configuration
    // =========================================================================
    /// Tile size to produce.
    #[arg(short, long = "tilesize", default_value_t = DEFAULT_TILE_SIZE, env = "TILER_TILESIZE")]
    pub tile_size: u32,

    /// Candidate scale factors (comma-separated, powers of two from 1).
    #[arg(long, env = "TILER_SCALE_FACTORS", value_delimiter = ',')]
    pub scale_factors: Option<Vec<u32>>,

    /// Candidate derivative widths (comma-separated, ascending).
    #[arg(long, env = "TILER_SIZES", value_delimiter = ',')]
    pub sizes: Option<Vec<u32>>,

    /// Rounding used when shrinking edge tiles.
    #[arg(long, value_enum, default_value_t = RoundingPolicy::Ceil, env = "TILER_ROUNDING")]
    pub rounding: RoundingPolicy,

    // =========================================================================
    // Engine Configuration
    // =========================================================================
    /// Image engine that decodes, crops and resizes.
    #[arg(long, value_enum, default_value_t = EngineKind::Magick, env = "TILER_ENGINE")]
    pub engine: EngineKind,

    /// JPEG quality for tiles and derivatives (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, env = "TILER_QUALITY")]
    pub quality: u8,

    /// ImageMagick `convert` binary.
    #[arg(long, default_value = DEFAULT_CONVERT_BIN, env = "TILER_CONVERT_BIN")]
    pub convert_bin: String,

    /// ImageMagick `identify` binary.
    #[arg(long, default_value = DEFAULT_IDENTIFY_BIN, env = "TILER_IDENTIFY_BIN")]
    pub identify_bin: String,

    // =========================================================================
    // Execution Configuration
    // =========================================================================
    /// Number of scale levels processed at once (capped at the CPU count).
    #[arg(short, long, default_value_t = 1, env = "TILER_JOBS")]
    pub jobs: usize,

    /// Directory for intermediate crops (defaults to the system temp dir).
    #[arg(long, env = "TILER_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.source.as_os_str().is_empty() {
            return Err("A source image path is required".to_string());
        }

        if self.output.as_os_str().is_empty() {
            return Err("An output directory is required. Set --output or TILER_OUTPUT".to_string());
        }

        if !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }

        if self.jobs == 0 {
            return Err("jobs must be greater than 0".to_string());
        }

        if let Some(ref id) = self.identifier {
            if id.trim().is_empty() {
                return Err("identifier must not be blank".to_string());
            }
        }

        self.pyramid_config().validate().map_err(|e| e.to_string())
    }

    /// Build the planning configuration from the arguments.
    pub fn pyramid_config(&self) -> PyramidConfig {
        let defaults = PyramidConfig::default();
        PyramidConfig {
            tile_size: self.tile_size,
            scale_factor_candidates: self
                .scale_factors
                .clone()
                .unwrap_or(defaults.scale_factor_candidates),
            downsize_candidates: self.sizes.clone().unwrap_or(defaults.downsize_candidates),
            rounding: self.rounding,
        }
    }

    /// The manifest identifier, falling back to the source file stem.
    pub fn resolved_identifier(&self) -> String {
        match self.identifier {
            Some(ref id) => id.clone(),
            None => default_identifier(&self.source),
        }
    }

    /// Concurrency actually used: `--jobs` capped at the available cores.
    pub fn effective_jobs(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.jobs.clamp(1, cores)
    }
}

/// Source file name up to its first `.`, or the whole path if it has none.
pub fn default_identifier(source: &Path) -> String {
    source
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').next().unwrap_or(n).to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| source.display().to_string())
}

// =============================================================================
// Tests
// =============================================================================
