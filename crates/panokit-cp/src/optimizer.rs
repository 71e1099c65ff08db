//! Interface to the geometric optimizer and the automatic optimisation heuristic.
//!
//! The bundle adjustment itself lives outside this crate behind [`Optimizer`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CleanError;
use crate::panorama::{Panorama, PanoramaOptions};
use crate::statistics::radial_statistics;

/// Huber sigma used while running [`smart_optimize`].
const SMART_HUBER_SIGMA: f64 = 2.0;

/// Spread of the radial control point distribution above which `a` and `c` are optimized.
const DISTORTION_SPREAD: f64 = 1.0;

/// Field of view in degrees above which the lens centre shift is optimized.
const SHIFT_MIN_HFOV: f64 = 60.0;

/// An optimizable image variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Yaw.
    Yaw,
    /// Pitch.
    Pitch,
    /// Roll.
    Roll,
    /// Horizontal field of view.
    Hfov,
    /// Radial distortion `a`.
    A,
    /// Radial distortion `b`.
    B,
    /// Radial distortion `c`.
    C,
    /// Horizontal centre shift `d`.
    D,
    /// Vertical centre shift `e`.
    E,
}

/// The variables to optimize, one set per image of the panorama.
pub type OptimizeVector = Vec<BTreeSet<Variable>>;

/// A geometric solver adjusting image variables to minimize control point residuals.
pub trait Optimizer {
    /// Error reported by the solver.
    type Error: std::error::Error + 'static;

    /// Optimize the given variables of `pano` in place.
    ///
    /// On success every control point's `error` holds its residual after the solve.
    fn optimize(&mut self, pano: &mut Panorama, variables: &OptimizeVector)
        -> Result<(), Self::Error>;
}

/// Groups of variables selected for an optimisation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizeMode {
    /// Roll, pitch and yaw.
    pub position: bool,
    /// Horizontal field of view.
    pub hfov: bool,
    /// Radial distortion `b`.
    pub barrel: bool,
    /// Radial distortion `a` and `c`.
    pub distortion: bool,
    /// Lens centre shift `d` and `e`.
    pub shift: bool,
}

impl OptimizeMode {
    /// Positions only.
    pub const POSITION: OptimizeMode = OptimizeMode {
        position: true,
        hfov: false,
        barrel: false,
        distortion: false,
        shift: false,
    };
}

/// The per-image variable sets for `mode`.
///
/// Images sharing their orientation with the reference image keep their position;
/// the reference image itself still gets roll and pitch so the panorama can be
/// levelled. Lens variables are set on every image.
pub fn create_optimize_vector(pano: &Panorama, mode: OptimizeMode) -> OptimizeVector {
    let anchor = pano.options().optimize_reference_image;
    let anchor_image = pano.images().get(anchor);

    pano.images()
        .iter()
        .enumerate()
        .map(|(i, image)| {
            let mut vars = BTreeSet::new();
            if mode.position {
                let linked = i == anchor || anchor_image.is_some_and(|a| image.yaw_linked_with(a));
                if !linked {
                    vars.extend([Variable::Roll, Variable::Pitch, Variable::Yaw]);
                }
                if i == anchor {
                    vars.extend([Variable::Roll, Variable::Pitch]);
                }
            }
            if mode.hfov {
                vars.insert(Variable::Hfov);
            }
            if mode.barrel {
                vars.insert(Variable::B);
            }
            if mode.distortion {
                vars.extend([Variable::A, Variable::C]);
            }
            if mode.shift {
                vars.extend([Variable::D, Variable::E]);
            }
            vars
        })
        .collect()
}

fn run<O: Optimizer>(
    optimizer: &mut O,
    pano: &mut Panorama,
    mode: OptimizeMode,
) -> Result<(), CleanError<O::Error>> {
    log::debug!("optimizing {:?}", mode);
    let vars = create_optimize_vector(pano, mode);
    optimizer
        .optimize(pano, &vars)
        .map_err(CleanError::Optimizer)
}

/// Outcome of the plausibility check after a lens optimisation.
#[derive(Debug, Default)]
struct Implausible {
    small_hfov: bool,
    high_distortion: bool,
    high_barrel: bool,
    high_shift: bool,
}

fn check_plausibility(pano: &Panorama) -> Implausible {
    let mut check = Implausible::default();
    for vars in pano.variables() {
        check.small_hfov |= vars.hfov < 1.0;
        check.high_distortion |= vars.a.abs() > 0.2 || vars.c.abs() > 0.2;
        check.high_barrel |= vars.b.abs() > 0.2;
        check.high_shift |= vars.d.abs() > 1000.0 || vars.e.abs() > 1000.0;
    }
    check
}

/// Optimize a whole panorama with automatic variable selection.
///
/// 1. positions using only the free control points,
/// 2. positions using all control points,
/// 3. unless the lens is already calibrated (any of `a`..`e` of the first image set)
///    or all images form one stack: `b` always, `a` and `c` when the control points
///    spread far enough radially, `d` and `e` for wide lenses,
/// 4. if the lens result is implausible the variables are restored and the
///    optimisation is repeated without the offending groups.
///
/// The Huber sigma is set to 2 for the duration of the call.
///
/// # Errors
///
/// Optimizer failures are passed through; the panorama is left as the failed step left it.
pub fn smart_optimize<O: Optimizer>(
    optimizer: &mut O,
    pano: &mut Panorama,
) -> Result<(), CleanError<O::Error>> {
    let options = *pano.options();
    pano.set_options(PanoramaOptions {
        huber_sigma: SMART_HUBER_SIGMA,
        ..options
    });
    let result = smart_optimize_inner(optimizer, pano);
    pano.set_options(options);
    result
}

fn smart_optimize_inner<O: Optimizer>(
    optimizer: &mut O,
    pano: &mut Panorama,
) -> Result<(), CleanError<O::Error>> {
    let Some(first) = pano.images().first().map(|image| image.variables) else {
        return Ok(());
    };

    // line control points only disturb the initial alignment
    let all_points = pano.control_points().to_vec();
    pano.retain_control_points(|cp| cp.mode.is_free());
    run(optimizer, pano, OptimizeMode::POSITION)?;
    pano.set_control_points(all_points)?;
    run(optimizer, pano, OptimizeMode::POSITION)?;

    if first.has_lens_parameters() || pano.is_single_stack() {
        log::debug!("lens already calibrated or single stack, keeping lens variables");
        return Ok(());
    }

    let mut mode = OptimizeMode {
        barrel: true,
        ..OptimizeMode::POSITION
    };
    if let Some(radial) = radial_statistics(pano, None) {
        log::debug!("control point radial statistics {:?}", radial);
        mode.distortion = radial.percentile90 - radial.percentile10 > DISTORTION_SPREAD;
    }
    mode.shift = first.hfov > SHIFT_MIN_HFOV;

    let saved = pano.variables();
    run(optimizer, pano, mode)?;

    let check = check_plausibility(pano);
    if check.small_hfov || check.high_distortion || check.high_barrel || check.high_shift {
        log::debug!("implausible lens optimisation {:?}", check);
        mode.hfov &= !check.small_hfov;
        mode.distortion &= !(check.high_distortion || check.high_barrel);
        mode.shift &= !check.high_shift;
        pano.update_variables(&saved)?;
        run(optimizer, pano, mode)?;

        if check_plausibility(pano).high_barrel {
            mode.barrel = false;
            pano.update_variables(&saved)?;
            run(optimizer, pano, mode)?;
        }
    }

    Ok(())
}
