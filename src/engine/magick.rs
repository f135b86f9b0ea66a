//! ImageMagick-backed engine.
//!
//! Drives the `identify` and `convert` command-line tools. A whole tile
//! grid is cut in a single `convert -crop` invocation per scale factor;
//! ImageMagick names each crop after its page offset and actual size, so
//! truncated edge tiles report their real dimensions.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::{clamp_quality, DEFAULT_JPEG_QUALITY};
use crate::error::EngineError;

use super::{collect_scratch_crops, CroppedTile, ImageEngine};

/// Default `convert` binary name.
pub const DEFAULT_CONVERT_BIN: &str = "convert";

/// Default `identify` binary name.
pub const DEFAULT_IDENTIFY_BIN: &str = "identify";

/// Crop naming pattern: page offset then actual crop size.
const CROP_NAME_FORMAT: &str = "%[fx:page.x],%[fx:page.y],%[fx:w],%[fx:h]";

/// Significant digits for fx output; enough for any `u32` offset.
const FX_PRECISION: &str = "16";

// =============================================================================
// MagickEngine
// =============================================================================

/// [`ImageEngine`] implemented with ImageMagick command-line tools.
///
/// # Example
///
/// ```ignore
/// use iiif_tiler::engine::MagickEngine;
///
/// let engine = MagickEngine::new().with_quality(90);
/// engine.check_available().await?;
/// let (width, height) = engine.probe_dimensions(Path::new("scan.tif")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MagickEngine {
    convert_bin: String,
    identify_bin: String,
    quality: u8,
}

impl Default for MagickEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MagickEngine {
    /// Create an engine using `convert` and `identify` from `$PATH`.
    pub fn new() -> Self {
        Self {
            convert_bin: DEFAULT_CONVERT_BIN.to_string(),
            identify_bin: DEFAULT_IDENTIFY_BIN.to_string(),
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Use specific binaries (e.g. `magick` wrappers or absolute paths).
    pub fn with_binaries(
        mut self,
        convert: impl Into<String>,
        identify: impl Into<String>,
    ) -> Self {
        self.convert_bin = convert.into();
        self.identify_bin = identify.into();
        self
    }

    /// Set the JPEG quality of written tiles.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = clamp_quality(quality);
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Run a tool to completion and return its stdout.
    async fn run(&self, program: &str, args: Vec<OsString>) -> Result<String, EngineError> {
        let command_line = describe(program, &args);
        debug!(command = %command_line, "Running image engine command");

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    EngineError::Unavailable(format!("{}: {}", program, e))
                }
                _ => EngineError::Io(format!("{}: {}", program, e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                output.status.to_string()
            } else {
                stderr
            };
            return Err(EngineError::CommandFailed {
                command: command_line,
                message,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ImageEngine for MagickEngine {
    async fn check_available(&self) -> Result<(), EngineError> {
        for program in [&self.convert_bin, &self.identify_bin] {
            self.run(program, vec![OsString::from("-version")])
                .await
                .map_err(|e| match e {
                    EngineError::Unavailable(_) => e,
                    other => EngineError::Unavailable(format!(
                        "ImageMagick does not appear to be usable: {}",
                        other
                    )),
                })?;
        }
        Ok(())
    }

    async fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32), EngineError> {
        let output = self.run(&self.identify_bin, probe_args(path)).await?;

        parse_dimensions(&output).ok_or(EngineError::UnparseableDimensions { output })
    }

    async fn crop_grid(
        &self,
        path: &Path,
        crop_size: u32,
        scratch_dir: &Path,
    ) -> Result<Vec<CroppedTile>, EngineError> {
        let args = crop_args(path, crop_size, scratch_dir);
        self.run(&self.convert_bin, args).await?;

        collect_scratch_crops(scratch_dir)
    }

    async fn resize(
        &self,
        input: &Path,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<(), EngineError> {
        let args = self.resize_args(input, width, height, output);
        self.run(&self.convert_bin, args).await.map(|_| ())
    }

    async fn resize_full_image(
        &self,
        path: &Path,
        width: u32,
        output: &Path,
    ) -> Result<(), EngineError> {
        let args = self.resize_full_args(path, width, output);
        self.run(&self.convert_bin, args).await.map(|_| ())
    }
}

// =============================================================================
// Command Lines
// =============================================================================

impl MagickEngine {
    /// `convert <crop> -resize WxH! -quality Q <out>`
    fn resize_args(&self, input: &Path, width: u32, height: u32, output: &Path) -> Vec<OsString> {
        vec![
            input.as_os_str().to_os_string(),
            OsString::from("-resize"),
            // `!` forces the exact size instead of fitting inside it
            OsString::from(format!("{}x{}!", width, height)),
            OsString::from("-quality"),
            OsString::from(self.quality.to_string()),
            output.as_os_str().to_os_string(),
        ]
    }

    /// `convert <src>[0] +repage -resize Wx -quality Q <out>`
    fn resize_full_args(&self, path: &Path, width: u32, output: &Path) -> Vec<OsString> {
        vec![
            first_frame(path),
            OsString::from("+repage"),
            OsString::from("-resize"),
            OsString::from(format!("{}x", width)),
            OsString::from("-quality"),
            OsString::from(self.quality.to_string()),
            output.as_os_str().to_os_string(),
        ]
    }
}

/// `identify -ping -format %wx%h <src>[0]`
fn probe_args(path: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-ping"),
        OsString::from("-format"),
        OsString::from("%wx%h"),
        first_frame(path),
    ]
}

/// One `convert -crop` call writing every crop of the grid into `scratch_dir`.
///
/// The leading `+repage` drops any virtual-canvas offset so crops are
/// anchored at `(0, 0)`. `-precision` keeps fx offsets of a million pixels
/// or more in plain digits rather than `1e+06`.
fn crop_args(path: &Path, crop_size: u32, scratch_dir: &Path) -> Vec<OsString> {
    let mut pattern = scratch_dir.as_os_str().to_os_string();
    pattern.push("/%[filename:tile].png");

    vec![
        first_frame(path),
        OsString::from("+repage"),
        OsString::from("-crop"),
        OsString::from(format!("{}x{}", crop_size, crop_size)),
        OsString::from("-precision"),
        OsString::from(FX_PRECISION),
        OsString::from("-set"),
        OsString::from("filename:tile"),
        OsString::from(CROP_NAME_FORMAT),
        OsString::from("+repage"),
        OsString::from("+adjoin"),
        pattern,
    ]
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Parse the first `<int>x<int>` token in engine output.
///
/// Accepts surrounding text, so both `-format %wx%h` output (`1000x800`)
/// and default `identify` lines (`scan.tif TIFF 1000x800 1000x800+0+0 ...`)
/// work.
pub fn parse_dimensions(text: &str) -> Option<(u32, u32)> {
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'x' && bytes[i + 1].is_ascii_digit() {
            let height_start = i + 1;
            let mut end = height_start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            let width = text[start..i].parse().ok()?;
            let height = text[height_start..end].parse().ok()?;
            return Some((width, height));
        }
    }

    None
}

/// Address only the first frame of multi-frame sources.
fn first_frame(path: &Path) -> OsString {
    let mut arg = path.as_os_str().to_os_string();
    arg.push("[0]");
    arg
}

fn describe(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&OsStr::to_string_lossy(arg));
    }
    line
}

// =============================================================================
// Tests
// =============================================================================
