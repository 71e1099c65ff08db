#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// color transformations module.
pub mod color;

/// image cropping module.
pub mod crop;

/// normalized cross-correlation module.
pub mod correlation;

/// error types for the fine-tuning operations.
pub mod error;

/// control point fine-tuning module.
pub mod finetune;

/// utilities for interpolation.
pub mod interpolation;

/// module containing parallelization utilities.
pub mod parallel;

/// image sources and raster patches.
pub mod patch;

/// sub-pixel peak refinement.
pub mod subpixel;

/// image geometric transformations module.
pub mod warp;

pub use error::FineTuneError;
