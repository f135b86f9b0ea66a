//! # iiif-tiler
//!
//! Generates IIIF Image API Level-0 static tile pyramids.
//!
//! A single large raster image is cut into pre-rendered JPEG tiles at
//! several scale factors plus a set of reduced full-image derivatives,
//! laid out so a plain file server can answer IIIF image requests. An
//! `info.json` manifest describes what was rendered.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`plan`] - Scale factors, tile grids, edge-tile regularization and
//!   derivative widths (pure arithmetic)
//! - [`engine`] - Image engine trait with ImageMagick and native backends
//! - [`pyramid`] - Dimension probe, output layout and the pyramid builder
//! - [`manifest`] - IIIF `info.json` generation
//! - [`config`] - CLI and planning configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use iiif_tiler::{NativeEngine, PyramidBuilder, PyramidConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let builder = PyramidBuilder::new(NativeEngine::new(), PyramidConfig::default());
//!
//!     let manifest = builder
//!         .build(Path::new("scan.png"), Path::new("out/scan"), "https://example.com/iiif/scan")
//!         .await
//!         .expect("pyramid build failed");
//!
//!     println!("scale factors: {:?}", manifest.scale_factors());
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod plan;
pub mod pyramid;

// Re-export commonly used types
pub use config::{Config, EngineKind, PyramidConfig, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_SIZE};
pub use engine::{CroppedTile, ImageEngine, MagickEngine, NativeEngine};
pub use error::{EngineError, GenerationStage, PyramidError};
pub use manifest::{manifest, write_manifest, Manifest};
pub use plan::{
    downsize_levels, regularize, scale_factors, tile_grid, GridCell, PyramidPlan,
    RegularizedTile, RoundingPolicy, SourceImage, TileGeometry, TileGrid,
};
pub use pyramid::{probe, PyramidBuilder};
