#![allow(dead_code)]

use std::convert::Infallible;

use panokit_cp::optimizer::{OptimizeVector, Optimizer, Variable};
use panokit_cp::{ControlPoint, CpMode, Panorama};

/// A stand-in solver where every image is a pure 2d translation by `(yaw, pitch)` pixels.
///
/// Images with a free yaw are moved to the least squares position over the free
/// control points; afterwards every residual is recomputed.
#[derive(Debug, Default)]
pub struct TranslationOptimizer {
    pub calls: usize,
}

fn offset(pano: &Panorama, image: usize) -> [f64; 2] {
    let vars = &pano.images()[image].variables;
    [vars.yaw, vars.pitch]
}

fn residual(pano: &Panorama, cp: &ControlPoint) -> f64 {
    let (ta, tb) = (offset(pano, cp.image_a), offset(pano, cp.image_b));
    let dx = cp.point_a[0] + ta[0] - cp.point_b[0] - tb[0];
    let dy = cp.point_a[1] + ta[1] - cp.point_b[1] - tb[1];
    match cp.mode {
        CpMode::FreePoint => dx.hypot(dy),
        CpMode::VerticalLineOnly => dx.abs(),
        CpMode::HorizontalLineOnly => dy.abs(),
    }
}

impl Optimizer for TranslationOptimizer {
    type Error = Infallible;

    fn optimize(&mut self, pano: &mut Panorama, variables: &OptimizeVector) -> Result<(), Infallible> {
        self.calls += 1;
        let free = variables
            .iter()
            .map(|vars| vars.contains(&Variable::Yaw))
            .collect::<Vec<_>>();

        for _ in 0..500 {
            for image in (0..pano.num_images()).filter(|&i| free[i]) {
                let (mut sum, mut count) = ([0.0, 0.0], 0.0);
                for cp in pano.control_points().iter().filter(|cp| cp.mode.is_free()) {
                    let target = if cp.image_a == image {
                        let tb = offset(pano, cp.image_b);
                        [
                            cp.point_b[0] + tb[0] - cp.point_a[0],
                            cp.point_b[1] + tb[1] - cp.point_a[1],
                        ]
                    } else if cp.image_b == image {
                        let ta = offset(pano, cp.image_a);
                        [
                            cp.point_a[0] + ta[0] - cp.point_b[0],
                            cp.point_a[1] + ta[1] - cp.point_b[1],
                        ]
                    } else {
                        continue;
                    };
                    sum = [sum[0] + target[0], sum[1] + target[1]];
                    count += 1.0;
                }
                if count > 0.0 {
                    let vars = &mut pano.images_mut()[image].variables;
                    vars.yaw = sum[0] / count;
                    vars.pitch = sum[1] / count;
                }
            }
        }

        let errors = pano
            .control_points()
            .iter()
            .map(|cp| residual(pano, cp))
            .collect::<Vec<_>>();
        for (cp, error) in pano.control_points_mut().iter_mut().zip(errors) {
            cp.error = error;
        }
        Ok(())
    }
}

/// Control points between two images displaced by `shift`, on a grid of `n` points.
pub fn grid_points(image_a: usize, image_b: usize, shift: [f64; 2], n: usize) -> Vec<ControlPoint> {
    (0..n)
        .map(|i| {
            let a = [40.0 + 30.0 * (i % 4) as f64, 50.0 + 25.0 * (i / 4) as f64];
            ControlPoint::new(image_a, a, image_b, [a[0] + shift[0], a[1] + shift[1]])
        })
        .collect()
}
