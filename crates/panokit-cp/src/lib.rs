#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// statistical and mask based control point rejection.
pub mod clean;

/// control point types.
pub mod control_point;

/// error types for the control point operations.
pub mod error;

/// fine-tuning of control points by template matching.
pub mod finetune;

/// mask polygons attached to images.
pub mod mask;

/// interface to the geometric optimizer and the automatic optimisation heuristic.
pub mod optimizer;

/// the panorama aggregate.
pub mod panorama;

/// progress reporting and cancellation.
pub mod progress;

/// error and radial statistics over control points.
pub mod statistics;

pub use control_point::{ControlPoint, CpIndexSet, CpMode};
pub use error::{CleanError, PanoramaError};
pub use panorama::{PanoImage, Panorama};
