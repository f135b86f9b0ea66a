//! Pyramid generation.
//!
//! - [`probe`]: source dimensions from the engine
//! - [`PyramidBuilder`]: runs the engine over the plan and writes the tree
//! - [`layout`]: the IIIF region/size/rotation/quality path scheme

mod builder;
pub mod layout;
mod probe;

pub use builder::PyramidBuilder;
pub use probe::probe;
