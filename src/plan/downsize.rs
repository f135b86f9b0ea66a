//! Full-image derivative widths.

use crate::config::PyramidConfig;

use super::scale::SourceImage;

/// Compute the widths of the reduced full-image derivatives.
///
/// Every candidate narrower than the source is kept, in ascending order.
/// Heights are left to the engine, which resizes aspect-preserving.
pub fn downsize_levels(image: &SourceImage, config: &PyramidConfig) -> Vec<u32> {
    config
        .downsize_candidates
        .iter()
        .copied()
        .filter(|&width| width < image.width)
        .collect()
}
