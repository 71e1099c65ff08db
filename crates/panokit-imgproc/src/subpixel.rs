//! Sub-pixel refinement of correlation peaks.
//!
//! The peak is refined separately along x and y by fitting a parabola to the peak
//! and its two neighbours on each axis.

use panokit_image::Image;

use crate::correlation::CorrelationResult;

/// Largest accepted distance of the refined peak from the integer peak, in pixels.
const MAX_SHIFT: f64 = 1.0;

/// Least squares fit of `y = a + b x + c x^2` through the given samples.
///
/// The 3x3 normal equations are solved with Cramer's rule, so three distinct
/// abscissae give the exact interpolating parabola.
///
/// # Returns
///
/// The coefficients `[a, b, c]`, or `None` if the system is singular.
///
/// # Example
///
/// ```
/// use panokit_imgproc::subpixel::fit_quadratic;
///
/// let [a, b, c] = fit_quadratic(&[-1.0, 0.0, 1.0], &[2.0, 1.0, 2.0]).unwrap();
/// assert_eq!((a, b, c), (1.0, 0.0, 1.0));
/// ```
pub fn fit_quadratic(xs: &[f64], ys: &[f64]) -> Option<[f64; 3]> {
    let (mut s0, mut s1, mut s2, mut s3, mut s4) = (0.0, 0.0, 0.0, 0.0, 0.0);
    let (mut t0, mut t1, mut t2) = (0.0, 0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        let x2 = x * x;
        s0 += 1.0;
        s1 += x;
        s2 += x2;
        s3 += x2 * x;
        s4 += x2 * x2;
        t0 += y;
        t1 += x * y;
        t2 += x2 * y;
    }

    let det3 = |m: [[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };

    let det = det3([[s0, s1, s2], [s1, s2, s3], [s2, s3, s4]]);
    if det == 0.0 || !det.is_finite() {
        return None;
    }

    let a = det3([[t0, s1, s2], [t1, s2, s3], [t2, s3, s4]]) / det;
    let b = det3([[s0, t0, s2], [s1, t1, s3], [s2, t2, s4]]) / det;
    let c = det3([[s0, s1, t0], [s1, s2, t1], [s2, s3, t2]]) / det;

    [a, b, c].iter().all(|v| v.is_finite()).then_some([a, b, c])
}

/// Vertex of the parabola `[a, b, c]` as `(offset, value)`; a flat fit stays at zero.
fn vertex([a, b, c]: [f64; 3]) -> (f64, f64) {
    let offset = if c == 0.0 { 0.0 } else { -b / (2.0 * c) };
    (offset, a + b * offset + c * offset * offset)
}

/// Refine an integer correlation peak to sub-pixel precision.
///
/// `peak.position` must hold the integer peak in surface coordinates. The refined
/// score is the mean of the two parabola vertex values and the curvature is `2c`
/// per axis.
///
/// The input peak is returned unchanged when it lies on the surface border, when a
/// fit fails, or when the vertex moves more than one pixel on either axis.
pub fn refine_peak(surface: &Image<f32, 1>, peak: &CorrelationResult) -> CorrelationResult {
    let [px, py] = peak.position;
    let (w, h) = (surface.width() as f64, surface.height() as f64);
    if px < 1.0 || py < 1.0 || px + 1.0 >= w || py + 1.0 >= h {
        log::debug!("peak ({px}, {py}) on the surface border, not refined");
        return *peak;
    }

    let (x, y) = (px as usize, py as usize);
    let width = surface.width();
    let data = surface.as_slice();
    let at = |x: usize, y: usize| data[y * width + x] as f64;

    let offsets = [-1.0, 0.0, 1.0];
    let zx = [at(x - 1, y), at(x, y), at(x + 1, y)];
    let zy = [at(x, y - 1), at(x, y), at(x, y + 1)];

    let (Some(fx), Some(fy)) = (fit_quadratic(&offsets, &zx), fit_quadratic(&offsets, &zy))
    else {
        log::debug!("bad polynomial fit at ({px}, {py})");
        return *peak;
    };

    let (dx, max_x) = vertex(fx);
    let (dy, max_y) = vertex(fy);

    if dx.abs() > MAX_SHIFT || dy.abs() > MAX_SHIFT {
        log::debug!("sub-pixel peak moved by ({dx}, {dy}), ignoring");
        return *peak;
    }

    CorrelationResult {
        score: 0.5 * (max_x + max_y),
        position: [px + dx, py + dy],
        curvature: [2.0 * fx[2], 2.0 * fy[2]],
        angle: peak.angle,
    }
}
