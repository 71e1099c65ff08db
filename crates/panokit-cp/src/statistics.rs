//! Error and radial statistics over control points.
//!
//! Means and variances are accumulated in a single pass with Welford's update.
//! The variance is the sample variance; a single sample has variance `0` and an
//! empty input has no statistics at all.

use serde::{Deserialize, Serialize};

use crate::control_point::ControlPoint;
use crate::panorama::Panorama;

/// Incremental mean and variance of a stream of values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStatistics {
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStatistics {
    /// An empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value.
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of values seen.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of the values, zero when empty.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance of the values, zero for fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2 / (self.count - 1) as f64
    }

    /// The summary of the values, `None` when empty.
    pub fn finish(&self) -> Option<ErrorStatistics> {
        (self.count > 0).then(|| ErrorStatistics {
            min: self.min,
            max: self.max,
            mean: self.mean,
            variance: self.variance(),
        })
    }
}

impl Extend<f64> for RunningStatistics {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        iter.into_iter().for_each(|v| self.push(v));
    }
}

/// Summary of control point residuals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Mean value.
    pub mean: f64,
    /// Sample variance.
    pub variance: f64,
}

impl ErrorStatistics {
    /// Standard deviation.
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    /// The outlier threshold `mean + n * std_dev`.
    pub fn threshold(&self, n: f64) -> f64 {
        self.mean + n * self.std_dev()
    }
}

/// Summary of the normalized distances of control points from their image centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialStatistics {
    /// Smallest radius.
    pub min: f64,
    /// Largest radius.
    pub max: f64,
    /// Mean radius.
    pub mean: f64,
    /// Sample variance of the radii.
    pub variance: f64,
    /// Radius at the 10th percentile rank.
    pub percentile10: f64,
    /// Radius at the 90th percentile rank.
    pub percentile90: f64,
}

/// Statistics of the residuals of `points`.
///
/// With `image` set only control points touching that image contribute.
///
/// # Example
///
/// ```
/// use panokit_cp::ControlPoint;
/// use panokit_cp::statistics::error_statistics;
///
/// let points = (1..=5)
///     .map(|e| ControlPoint {
///         error: e as f64,
///         ..ControlPoint::new(0, [0.0, 0.0], 1, [0.0, 0.0])
///     })
///     .collect::<Vec<_>>();
///
/// let stats = error_statistics(&points, None).unwrap();
/// assert_eq!(stats.mean, 3.0);
/// assert_eq!(stats.variance, 2.5);
/// ```
pub fn error_statistics<'a>(
    points: impl IntoIterator<Item = &'a ControlPoint>,
    image: Option<usize>,
) -> Option<ErrorStatistics> {
    let mut stats = RunningStatistics::new();
    stats.extend(
        points
            .into_iter()
            .filter(|cp| image.map_or(true, |img| cp.touches(img)))
            .map(|cp| cp.error),
    );
    stats.finish()
}

/// Distance of `point` from the centre of an image, in units of half the image height.
fn normalized_radius(point: [f64; 2], center: [f64; 2], half_height: f64) -> f64 {
    let dx = (point[0] - center[0]) / half_height;
    let dy = (point[1] - center[1]) / half_height;
    dx.hypot(dy)
}

/// Statistics of the radii of the control point endpoints of `pano`.
///
/// Every control point contributes the radius of both endpoints, measured from the
/// centre of the endpoint's image and normalized by half that image's height on
/// both axes. With `image` set only control points touching that image contribute.
///
/// Control points referencing an unknown or zero height image are ignored.
pub fn radial_statistics(pano: &Panorama, image: Option<usize>) -> Option<RadialStatistics> {
    let mut stats = RunningStatistics::new();
    let mut radii = Vec::new();

    let images = pano.images();
    let radius = |img: usize, point: [f64; 2]| {
        let image = images.get(img)?;
        let half_height = image.size.height as f64 / 2.0;
        (half_height > 0.0).then(|| normalized_radius(point, image.center(), half_height))
    };

    for cp in pano.control_points() {
        if image.is_some_and(|img| !cp.touches(img)) {
            continue;
        }
        let (Some(ra), Some(rb)) = (radius(cp.image_a, cp.point_a), radius(cp.image_b, cp.point_b))
        else {
            continue;
        };
        for r in [ra, rb] {
            stats.push(r);
            radii.push(r);
        }
    }

    let summary = stats.finish()?;
    radii.sort_by(f64::total_cmp);
    let n = radii.len() as f64;
    let rank = |q: f64| radii[((q * n).floor() as usize).min(radii.len() - 1)];

    Some(RadialStatistics {
        min: summary.min,
        max: summary.max,
        mean: summary.mean,
        variance: summary.variance,
        percentile10: rank(0.1),
        percentile90: rank(0.9),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panorama::PanoImage;

    fn with_error(image_a: usize, image_b: usize, error: f64) -> ControlPoint {
        ControlPoint {
            error,
            ..ControlPoint::new(image_a, [0.0, 0.0], image_b, [0.0, 0.0])
        }
    }

    #[test]
    fn error_statistics_one_to_five() {
        let points = (1..=5).map(|e| with_error(0, 1, e as f64)).collect::<Vec<_>>();
        let stats = error_statistics(&points, None);
        assert_eq!(
            stats,
            Some(ErrorStatistics {
                min: 1.0,
                max: 5.0,
                mean: 3.0,
                variance: 2.5,
            })
        );
    }

    #[test]
    fn error_statistics_image_filter() {
        let points = vec![
            with_error(0, 1, 1.0),
            with_error(1, 2, 3.0),
            with_error(2, 0, 5.0),
        ];
        let stats = error_statistics(&points, Some(2)).unwrap();
        assert_eq!((stats.min, stats.max, stats.mean), (3.0, 5.0, 4.0));
        approx::assert_relative_eq!(stats.variance, 2.0);
        assert_eq!(error_statistics(&points, Some(7)), None);
    }

    #[test]
    fn small_samples() {
        assert_eq!(error_statistics(&Vec::<ControlPoint>::new(), None), None);
        let one = error_statistics(&[with_error(0, 1, 4.0)], None).unwrap();
        assert_eq!(one.variance, 0.0);
        assert_eq!(one.threshold(2.0), 4.0);
    }

    #[test]
    fn threshold() {
        let stats = ErrorStatistics {
            min: 0.0,
            max: 10.0,
            mean: 3.0,
            variance: 4.0,
        };
        assert_eq!(stats.std_dev(), 2.0);
        assert_eq!(stats.threshold(2.0), 7.0);
    }

    #[test]
    fn running_statistics_matches_two_pass() {
        let values = [0.5, 2.25, -1.0, 8.0, 3.5, 3.5, 0.0];
        let mut running = RunningStatistics::new();
        running.extend(values);
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert_eq!(running.count(), 7);
        approx::assert_relative_eq!(running.mean(), mean, epsilon = 1e-12);
        approx::assert_relative_eq!(running.variance(), var, epsilon = 1e-12);
    }

    #[test]
    fn radial_statistics_normalizes_by_half_height() -> Result<(), crate::PanoramaError> {
        let mut pano = Panorama::default();
        pano.add_image(PanoImage::new([400, 200].into(), 50.0));
        pano.add_image(PanoImage::new([100, 100].into(), 50.0));
        // radii 0 and 1 for the first point, 1 and 0.6 for the second
        pano.add_control_point(ControlPoint::new(0, [200.0, 100.0], 1, [50.0, 0.0]))?;
        pano.add_control_point(ControlPoint::new(0, [300.0, 100.0], 1, [80.0, 50.0]))?;

        let stats = radial_statistics(&pano, None).unwrap();
        assert_eq!(stats.min, 0.0);
        approx::assert_relative_eq!(stats.max, 1.0);
        // sorted radii: 0, 0.6, 1, 1
        approx::assert_relative_eq!(stats.mean, 0.65, epsilon = 1e-12);
        assert_eq!(stats.percentile10, 0.0);
        approx::assert_relative_eq!(stats.percentile90, 1.0);
        assert_eq!(radial_statistics(&Panorama::default(), None), None);
        Ok(())
    }
}
