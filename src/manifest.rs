//! IIIF Image API 2.x `info.json` generation.
//!
//! The manifest is derived purely from the source dimensions and the
//! planned scale factors and derivative widths; it never looks at the
//! tile files themselves.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "@context": "http://iiif.io/api/image/2/context.json",
//!   "@id": "https://example.com/iiif/ap",
//!   "profile": [
//!     "http://iiif.io/api/image/2/level0.json",
//!     { "formats": ["jpg"], "qualities": ["default"] }
//!   ],
//!   "protocol": "http://iiif.io/api/image",
//!   "sizes": [{ "width": 16, "height": "full" }],
//!   "tiles": [{ "scaleFactors": [1, 2], "width": 256 }],
//!   "width": 1000,
//!   "height": 800
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PyramidError;
use crate::plan::{PyramidPlan, SourceImage};
use crate::pyramid::layout::manifest_path;

/// JSON-LD context for Image API 2.
pub const IIIF_CONTEXT: &str = "http://iiif.io/api/image/2/context.json";

/// Image API protocol URI.
pub const IIIF_PROTOCOL: &str = "http://iiif.io/api/image";

/// Level-0 compliance profile.
pub const LEVEL0_PROFILE: &str = "http://iiif.io/api/image/2/level0.json";

// =============================================================================
// Manifest Types
// =============================================================================

/// An `info.json` document.
///
/// Field order matches the serialized order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "@context")]
    pub context: String,

    #[serde(rename = "@id")]
    pub id: String,

    pub profile: Vec<ProfileEntry>,

    pub protocol: String,

    pub sizes: Vec<SizeEntry>,

    pub tiles: Vec<TileEntry>,

    pub width: u32,

    pub height: u32,
}

/// One element of the `profile` array: a compliance URI or a feature block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileEntry {
    Compliance(String),
    Features(ProfileFeatures),
}

/// Formats and qualities served beyond the compliance level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFeatures {
    pub formats: Vec<String>,
    pub qualities: Vec<String>,
}

/// A pre-rendered full-image size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEntry {
    pub width: u32,
    pub height: FullHeight,
}

/// The `"full"` height sentinel: height follows from the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FullHeight {
    #[serde(rename = "full")]
    Full,
}

/// Tile description: edge length and the scale factors it is offered at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileEntry {
    #[serde(rename = "scaleFactors")]
    pub scale_factors: Vec<u32>,

    pub width: u32,
}

// =============================================================================
// Generation
// =============================================================================

/// Build the manifest for a planned pyramid.
pub fn manifest(
    id: &str,
    image: &SourceImage,
    scale_factors: &[u32],
    downsize_levels: &[u32],
    tile_size: u32,
) -> Manifest {
    Manifest {
        context: IIIF_CONTEXT.to_string(),
        id: id.to_string(),
        profile: vec![
            ProfileEntry::Compliance(LEVEL0_PROFILE.to_string()),
            ProfileEntry::Features(ProfileFeatures {
                formats: vec!["jpg".to_string()],
                qualities: vec!["default".to_string()],
            }),
        ],
        protocol: IIIF_PROTOCOL.to_string(),
        sizes: downsize_levels
            .iter()
            .map(|&width| SizeEntry {
                width,
                height: FullHeight::Full,
            })
            .collect(),
        tiles: vec![TileEntry {
            scale_factors: scale_factors.to_vec(),
            width: tile_size,
        }],
        width: image.width,
        height: image.height,
    }
}

impl Manifest {
    /// Build the manifest straight from a plan.
    pub fn from_plan(id: &str, plan: &PyramidPlan) -> Self {
        manifest(
            id,
            &plan.image,
            &plan.scale_factors,
            &plan.downsize_levels,
            plan.tile_size,
        )
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String, PyramidError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| PyramidError::Io(format!("failed to serialize manifest: {}", e)))?;
        json.push('\n');
        Ok(json)
    }

    /// Parse an existing `info.json`.
    pub fn from_json(json: &str) -> Result<Self, PyramidError> {
        serde_json::from_str(json)
            .map_err(|e| PyramidError::Io(format!("failed to parse manifest: {}", e)))
    }

    /// Scale factors of the single tile entry.
    pub fn scale_factors(&self) -> &[u32] {
        self.tiles
            .first()
            .map(|t| t.scale_factors.as_slice())
            .unwrap_or(&[])
    }
}

/// Write `info.json` into the output directory.
///
/// The document goes to a temporary sibling first and is renamed into
/// place, so a reader never sees a half-written manifest.
pub async fn write_manifest(
    output_dir: &Path,
    manifest: &Manifest,
) -> Result<PathBuf, PyramidError> {
    let json = manifest.to_json_pretty()?;
    let path = manifest_path(output_dir);
    let staging = path.with_extension("json.partial");

    tokio::fs::write(&staging, json.as_bytes()).await?;
    tokio::fs::rename(&staging, &path).await?;

    Ok(path)
}

// =============================================================================
// Tests
// =============================================================================
