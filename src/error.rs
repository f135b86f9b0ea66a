use std::fmt;

use thiserror::Error;

/// Errors raised by an image engine implementation.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Engine binary or library cannot be located or executed
    #[error("Image engine unavailable: {0}")]
    Unavailable(String),

    /// Dimension query returned something that is not `<int>x<int>`
    #[error("Could not parse dimensions from engine output {output:?}")]
    UnparseableDimensions { output: String },

    /// External command ran but exited unsuccessfully
    #[error("Command `{command}` failed: {message}")]
    CommandFailed { command: String, message: String },

    /// Engine produced output it should not have (e.g. an unnamed crop file)
    #[error("Unexpected engine output: {0}")]
    UnexpectedOutput(String),

    /// Source or intermediate image could not be decoded
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Output image could not be encoded
    #[error("Encode error: {message}")]
    Encode { message: String },

    /// Filesystem error while reading or writing engine files
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

/// The part of a build a generation failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    /// Tiling at one scale factor
    ScaleFactor(u32),

    /// Full-image derivative at one width
    DownsizeLevel(u32),
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStage::ScaleFactor(sf) => write!(f, "scale factor {}", sf),
            GenerationStage::DownsizeLevel(w) => write!(f, "downsize level {}", w),
        }
    }
}

/// Errors that abort a pyramid build.
///
/// None of these are retried: each one points at a configuration or
/// environment problem rather than a transient fault.
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    /// Engine is missing; reported before any work begins
    #[error("Image engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Source dimensions could not be determined
    #[error("Failed to probe dimensions of {path}: {message}")]
    ProbeFailed { path: String, message: String },

    /// Source has a zero-sized axis
    #[error("Source image is degenerate: {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    /// Engine crop disagrees with the planned grid
    #[error(
        "Crop at scale factor {scale_factor}, offset ({x},{y}) does not match the tile grid: {message}"
    )]
    GeometryMismatch {
        scale_factor: u32,
        x: u32,
        y: u32,
        message: String,
    },

    /// Regularization would produce a zero-pixel tile
    #[error(
        "Tile at scale factor {scale_factor}, offset ({x},{y}) regularizes to {width}x{height}"
    )]
    DegenerateTile {
        scale_factor: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    /// Any crop or resize invocation failed
    #[error("Tile generation failed at {stage}: {cause}")]
    TileGenerationFailed {
        stage: GenerationStage,
        cause: EngineError,
    },

    /// Tile size or candidate sets are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Output tree could not be written
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PyramidError {
    fn from(err: std::io::Error) -> Self {
        PyramidError::Io(err.to_string())
    }
}
