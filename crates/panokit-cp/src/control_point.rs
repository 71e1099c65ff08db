use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Set of control point indices into a panorama's control point sequence.
///
/// Indices always refer to the sequence as it was before any removal.
pub type CpIndexSet = BTreeSet<usize>;

/// How the two endpoints of a control point are constrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpMode {
    /// Both coordinates of the endpoints should coincide.
    #[default]
    FreePoint,
    /// The endpoints lie on a vertical line.
    VerticalLineOnly,
    /// The endpoints lie on a horizontal line.
    HorizontalLineOnly,
}

impl CpMode {
    /// Whether this is an ordinary point correspondence rather than a line constraint.
    pub fn is_free(&self) -> bool {
        matches!(self, CpMode::FreePoint)
    }
}

/// A claimed correspondence between a point in one image and a point in another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// Index of the first image.
    pub image_a: usize,
    /// Index of the second image.
    pub image_b: usize,
    /// Pixel position in the first image.
    pub point_a: [f64; 2],
    /// Pixel position in the second image.
    pub point_b: [f64; 2],
    /// Constraint type.
    pub mode: CpMode,
    /// Residual of the last geometric solve, only meaningful after one has run.
    pub error: f64,
}

impl ControlPoint {
    /// A free control point with no residual yet.
    pub fn new(image_a: usize, point_a: [f64; 2], image_b: usize, point_b: [f64; 2]) -> Self {
        Self {
            image_a,
            image_b,
            point_a,
            point_b,
            mode: CpMode::FreePoint,
            error: 0.0,
        }
    }

    /// The same control point with another mode.
    pub fn with_mode(self, mode: CpMode) -> Self {
        Self { mode, ..self }
    }

    /// Whether either endpoint lies in `image`.
    pub fn touches(&self, image: usize) -> bool {
        self.image_a == image || self.image_b == image
    }

    /// Whether the control point connects exactly the two given images, in any order.
    pub fn connects(&self, first: usize, second: usize) -> bool {
        (self.image_a == first && self.image_b == second)
            || (self.image_a == second && self.image_b == first)
    }
}
