//! Source dimension probe.

use std::path::Path;

use tracing::debug;

use crate::engine::ImageEngine;
use crate::error::{EngineError, PyramidError};
use crate::plan::SourceImage;

/// Ask the engine for the source image's dimensions.
///
/// # Errors
///
/// - [`PyramidError::EngineUnavailable`] if the engine cannot run
/// - [`PyramidError::ProbeFailed`] for anything else, including output
///   that does not parse as `<int>x<int>`
pub async fn probe<E>(engine: &E, path: &Path) -> Result<SourceImage, PyramidError>
where
    E: ImageEngine + ?Sized,
{
    match engine.probe_dimensions(path).await {
        Ok((width, height)) => {
            debug!(path = %path.display(), width, height, "Probed source image");
            Ok(SourceImage::new(width, height))
        }
        Err(EngineError::Unavailable(message)) => Err(PyramidError::EngineUnavailable(message)),
        Err(e) => Err(PyramidError::ProbeFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
    }
}
