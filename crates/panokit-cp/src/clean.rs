//! Detection of control points that should be removed.
//!
//! Every pass reads the panorama and returns a [`CpIndexSet`] of indices into the
//! panorama's control point sequence; none of them modifies the panorama. Sets
//! from several passes can be combined and applied at once with
//! [`Panorama::remove_control_points`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::control_point::{ControlPoint, CpIndexSet};
use crate::error::CleanError;
use crate::optimizer::{smart_optimize, OptimizeVector, Optimizer, Variable};
use crate::panorama::{Panorama, Projection};
use crate::progress::ProgressReporter;
use crate::statistics::error_statistics;

/// Parameters of the statistical cleaning passes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanOptions {
    /// Number of standard deviations above the mean error beyond which a point is an outlier.
    pub sigma_multiplier: f64,
    /// Use the residuals stored in the panorama instead of optimizing first.
    pub skip_optimisation: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            sigma_multiplier: 2.0,
            skip_optimisation: false,
        }
    }
}

/// The variables of a pairwise solve: the first image keeps its orientation.
fn pair_variables() -> OptimizeVector {
    vec![
        BTreeSet::from([Variable::Hfov]),
        BTreeSet::from([Variable::Roll, Variable::Pitch, Variable::Yaw, Variable::Hfov]),
    ]
}

/// Find outliers by optimizing every image pair on its own.
///
/// For each pair of images that is not yaw linked, the free control points between
/// them are solved in an equirectangular sub-panorama where the second image may
/// rotate and both may change their field of view. Control points with both ends
/// in the same image take no part. Points whose residual exceeds
/// `mean + sigma_multiplier * std_dev` of that pair are flagged. Pairs with fewer
/// than two free control points are skipped.
///
/// # Errors
///
/// Optimizer failures are passed through. Cancellation is checked before each pair.
pub fn cp_outside_limit_pair<O: Optimizer>(
    pano: &Panorama,
    options: &CleanOptions,
    optimizer: &mut O,
    progress: &mut dyn ProgressReporter,
) -> Result<CpIndexSet, CleanError<O::Error>> {
    let num_images = pano.num_images();
    let total = num_images * num_images.saturating_sub(1) / 2;
    let mut step = 0;
    let mut flagged = CpIndexSet::new();

    for first in 0..num_images {
        for second in first + 1..num_images {
            if progress.is_cancelled() {
                return Err(CleanError::Cancelled);
            }
            progress.report_progress(step, total);
            step += 1;

            if pano.images()[first].yaw_linked_with(&pano.images()[second]) {
                log::debug!("images {first} and {second} are linked, skipping");
                continue;
            }

            // only free points between the two images, not within one of them
            let shared = |cp: &ControlPoint| cp.connects(0, 1) && cp.mode.is_free();
            let (mut pair, mut origin) = pano.subset(&[first, second]);
            let mut index = 0;
            origin.retain(|_| {
                let keep = shared(&pair.control_points()[index]);
                index += 1;
                keep
            });
            pair.retain_control_points(shared);
            if pair.control_points().len() < 2 {
                log::debug!(
                    "images {first} and {second} share {} free control points, skipping",
                    pair.control_points().len()
                );
                continue;
            }

            let mut pair_options = *pair.options();
            pair_options.projection = Projection::Equirectangular;
            pair_options.optimize_reference_image = 0;
            pair.set_options(pair_options);
            optimizer
                .optimize(&mut pair, &pair_variables())
                .map_err(CleanError::Optimizer)?;

            let Some(stats) = error_statistics(pair.control_points(), None) else {
                continue;
            };
            let threshold = stats.threshold(options.sigma_multiplier);
            log::debug!(
                "images {first} and {second}: mean error {:.3}, threshold {:.3}",
                stats.mean,
                threshold
            );

            flagged.extend(
                pair.control_points()
                    .iter()
                    .zip(&origin)
                    .filter(|(cp, _)| cp.error > threshold)
                    .map(|(_, &index)| index),
            );
        }
    }

    log::info!("{} control points outside the pairwise limit", flagged.len());
    Ok(flagged)
}

/// Find outliers after optimizing the whole panorama.
///
/// Unless `options.skip_optimisation` is set, a copy of the panorama is optimized
/// with [`smart_optimize`]. Free control points whose residual exceeds
/// `mean + sigma_multiplier * std_dev` over all free control points are flagged;
/// line control points take no part.
///
/// # Errors
///
/// Optimizer failures are passed through. Cancellation is checked before the optimisation.
pub fn cp_outside_limit<O: Optimizer>(
    pano: &Panorama,
    options: &CleanOptions,
    optimizer: &mut O,
    progress: &mut dyn ProgressReporter,
) -> Result<CpIndexSet, CleanError<O::Error>> {
    let mut work = pano.clone();
    if !options.skip_optimisation {
        if progress.is_cancelled() {
            return Err(CleanError::Cancelled);
        }
        progress.report_progress(0, 1);
        smart_optimize(optimizer, &mut work)?;
    }

    let free = work.control_points().iter().filter(|cp| cp.mode.is_free());
    let Some(stats) = error_statistics(free, None) else {
        return Ok(CpIndexSet::new());
    };
    let threshold = stats.threshold(options.sigma_multiplier);
    log::debug!(
        "mean error {:.3}, variance {:.3}, threshold {:.3}",
        stats.mean,
        stats.variance,
        threshold
    );

    let flagged = work
        .control_points()
        .iter()
        .enumerate()
        .filter(|(_, cp)| cp.mode.is_free() && cp.error > threshold)
        .map(|(index, _)| index)
        .collect::<CpIndexSet>();

    log::info!("{} control points outside the limit", flagged.len());
    Ok(flagged)
}

/// Find free control points with an endpoint inside an exclusion mask of its image.
pub fn cp_in_masks(pano: &Panorama) -> CpIndexSet {
    let in_mask = |image: usize, point: [f64; 2]| {
        pano.images().get(image).is_some_and(|img| {
            img.masks
                .iter()
                .any(|mask| mask.kind.is_exclusion() && mask.is_inside(point))
        })
    };

    let flagged = pano
        .control_points()
        .iter()
        .enumerate()
        .filter(|(_, cp)| {
            cp.mode.is_free() && (in_mask(cp.image_a, cp.point_a) || in_mask(cp.image_b, cp.point_b))
        })
        .map(|(index, _)| index)
        .collect::<CpIndexSet>();

    log::info!("{} control points inside masks", flagged.len());
    flagged
}
