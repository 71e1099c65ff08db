use serde::{Deserialize, Serialize};

use panokit_imgproc::correlation::CorrelationResult;
use panokit_imgproc::finetune::{point_fine_tune, point_fine_tune_rot_search, RotationSearch};
use panokit_imgproc::patch::ImageSource;
use panokit_imgproc::FineTuneError;

use crate::control_point::ControlPoint;

/// Parameters of the control point fine-tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FineTuneOptions {
    /// Side of the square template in pixels, rounded up to an odd size.
    pub template_size: usize,
    /// Side of the square region of candidate positions in pixels.
    pub search_width: usize,
    /// Smallest correlation score accepted.
    pub corr_threshold: f64,
    /// Smallest peak sharpness accepted, compared with the negated curvature on both axes.
    pub curv_threshold: f64,
    /// Also search the template rotation when set.
    pub rotation: Option<RotationSearch>,
}

impl Default for FineTuneOptions {
    fn default() -> Self {
        Self {
            template_size: 21,
            search_width: 14,
            corr_threshold: 0.8,
            curv_threshold: 0.0,
            rotation: None,
        }
    }
}

impl FineTuneOptions {
    /// Whether a correlation result is good enough to move a control point.
    pub fn accepts(&self, result: &CorrelationResult) -> bool {
        result.is_valid()
            && result.score >= self.corr_threshold
            && -result.curvature[0] >= self.curv_threshold
            && -result.curvature[1] >= self.curv_threshold
    }
}

/// Result of fine-tuning one control point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FineTuneOutcome {
    /// The raw correlation result in the coordinates of the second image.
    pub result: CorrelationResult,
    /// Whether the result passed the thresholds.
    pub accepted: bool,
    /// The control point with the second endpoint moved if accepted, unchanged otherwise.
    pub point: ControlPoint,
}

/// Relocate the second endpoint of a control point by template matching.
///
/// The template is taken around `cp.point_a` in `cp.image_a` and searched around
/// `cp.point_b` in `cp.image_b`; image indices are used as ids into `source`.
///
/// # Errors
///
/// Fails on invalid options, unknown images, or an endpoint outside its image.
pub fn fine_tune_control_point<S: ImageSource + ?Sized>(
    source: &S,
    cp: &ControlPoint,
    options: &FineTuneOptions,
) -> Result<FineTuneOutcome, FineTuneError> {
    let result = match &options.rotation {
        Some(rotation) => point_fine_tune_rot_search(
            source,
            cp.image_a,
            cp.point_a,
            options.template_size,
            cp.image_b,
            cp.point_b,
            options.search_width,
            rotation,
        )?,
        None => point_fine_tune(
            source,
            cp.image_a,
            cp.point_a,
            options.template_size,
            cp.image_b,
            cp.point_b,
            options.search_width,
        )?,
    };

    let accepted = options.accepts(&result);
    let mut point = *cp;
    if accepted {
        point.point_b = result.position;
    }
    log::debug!(
        "fine-tuned {:?} -> {:?} score {:.3} ({})",
        cp.point_b,
        result.position,
        result.score,
        if accepted { "accepted" } else { "rejected" }
    );

    Ok(FineTuneOutcome {
        result,
        accepted,
        point,
    })
}
