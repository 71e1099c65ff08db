//! Relocation of an approximate point match by template matching.
//!
//! A square template around the point in the template image is correlated over a
//! search window around the guessed point in the search image. The resulting
//! [`CorrelationResult::position`] is in absolute search image coordinates.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use panokit_image::{Image, ImageError, ImageSize};

use crate::correlation::{correlate, Correlation, CorrelationResult, NO_PEAK};
use crate::error::FineTuneError;
use crate::patch::{ImageSource, RasterPatch, Rect};
use crate::subpixel::refine_peak;
use crate::warp::{get_rotation_matrix2d, resample_affine};

/// Extra search margin so that a peak at the edge of the search width can still be refined.
const SEARCH_MARGIN: usize = 2;

/// Extra margin around the rotated template footprint for the cubic kernel.
const ROTATION_MARGIN: i64 = 3;

/// Range of template rotations tried by [`point_fine_tune_rot_search`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSearch {
    /// First angle in degrees.
    pub start_angle: f64,
    /// Last angle in degrees.
    pub stop_angle: f64,
    /// Number of evenly spaced angles, both ends included.
    pub steps: usize,
}

impl Default for RotationSearch {
    fn default() -> Self {
        Self {
            start_angle: -30.0,
            stop_angle: 30.0,
            steps: 12,
        }
    }
}

impl RotationSearch {
    /// The trial angles in degrees.
    ///
    /// A single step tries only `start_angle`.
    ///
    /// # Errors
    ///
    /// Zero steps is rejected.
    pub fn angles(&self) -> Result<Vec<f64>, FineTuneError> {
        match self.steps {
            0 => Err(FineTuneError::InvalidAngleSteps(0)),
            1 => Ok(vec![self.start_angle]),
            n => {
                let step = (self.stop_angle - self.start_angle) / (n - 1) as f64;
                Ok((0..n)
                    .map(|i| self.start_angle + i as f64 * step)
                    .collect())
            }
        }
    }
}

fn round_point(point: [f64; 2]) -> [i64; 2] {
    [point[0].round() as i64, point[1].round() as i64]
}

/// Cut the search window around `point`, moved inside the image first.
fn search_patch<S: ImageSource + ?Sized>(
    source: &S,
    image_id: usize,
    point: [f64; 2],
    half_width: usize,
) -> Result<RasterPatch, FineTuneError> {
    let size = source.image_size(image_id)?;
    let [x, y] = round_point(point);
    if size.is_empty() {
        return Err(FineTuneError::EmptyPatch {
            left: x,
            top: y,
            right: x + 1,
            bottom: y + 1,
        });
    }
    let center = [
        x.clamp(0, size.width as i64 - 1),
        y.clamp(0, size.height as i64 - 1),
    ];
    let rect = Rect::centered(center, half_width as i64);
    log::debug!("search window {:?} around {:?}", rect.clip(size), center);
    source.get_patch(image_id, &rect)
}

/// Refine the best correlation and move it to search image coordinates.
///
/// `anchor` is the position of the matched point inside the template.
fn locate(
    correlation: &Correlation,
    search: &RasterPatch,
    anchor: [f64; 2],
) -> CorrelationResult {
    let mut result = refine_peak(&correlation.surface, &correlation.peak);
    result.position = [
        search.origin[0] as f64 + result.position[0] + anchor[0],
        search.origin[1] as f64 + result.position[1] + anchor[1],
    ];
    result
}

/// Half-width of the template; the template side is always odd, `2 * half + 1`.
fn check_template_size(template_size: usize) -> Result<usize, FineTuneError> {
    if template_size == 0 {
        return Err(FineTuneError::InvalidTemplateSize(template_size));
    }
    Ok(template_size / 2)
}

/// Fine tune a point with normalized cross-correlation.
///
/// Takes a `template_size` square patch of the template image centred on
/// `template_point` and searches it in the search image within `search_width`
/// pixels around `search_point`. Both patches are clipped to their image.
///
/// The template is centred on a pixel, so its side is always odd: an even
/// `template_size` is rounded up to the next odd size (20 gives 21).
///
/// # Arguments
///
/// * `source` - The provider of the image patches.
/// * `template_image` - Id of the image holding the template.
/// * `template_point` - The point to look for.
/// * `template_size` - Side of the square template in pixels.
/// * `search_image` - Id of the image to search in.
/// * `search_point` - Initial guess of the matching point.
/// * `search_width` - Side of the square region of candidate positions.
///
/// # Returns
///
/// The refined match in search image coordinates. The score is [`NO_PEAK`] if
/// the template did not fit into the search window or only matched uniform content.
///
/// # Errors
///
/// Fails for a zero template size, unknown images, or a template point outside its image.
pub fn point_fine_tune<S: ImageSource + ?Sized>(
    source: &S,
    template_image: usize,
    template_point: [f64; 2],
    template_size: usize,
    search_image: usize,
    search_point: [f64; 2],
    search_width: usize,
) -> Result<CorrelationResult, FineTuneError> {
    let half = check_template_size(template_size)?;
    let tp = round_point(template_point);
    let template = source.get_patch(template_image, &Rect::centered(tp, half as i64))?;
    let anchor = [
        (tp[0] - template.origin[0] as i64) as f64,
        (tp[1] - template.origin[1] as i64) as f64,
    ];

    let search = search_patch(
        source,
        search_image,
        search_point,
        search_width / 2 + half + SEARCH_MARGIN,
    )?;

    let correlation = correlate(&template.image, &search.image, NO_PEAK)?;
    log::debug!(
        "correlation peak {:.4} at {:?}",
        correlation.peak.score,
        correlation.peak.position
    );
    if !correlation.valid_peak {
        return Ok(CorrelationResult::no_peak());
    }

    Ok(locate(&correlation, &search, anchor))
}

/// Resample a `2 * half + 1` square template rotated by `angle` degrees.
///
/// Template pixel `d` reads `patch` at `R(angle) (d - o) + center`, where `o` is the
/// template centre and `center` the template point inside `patch`. Pixels mapping
/// outside the patch take the patch mean.
fn rotate_template(
    patch: &RasterPatch,
    center: [f32; 2],
    half: usize,
    angle: f64,
) -> Result<Image<f32, 1>, ImageError> {
    let side = 2 * half + 1;
    let mut template = Image::from_size_val(
        ImageSize {
            width: side,
            height: side,
        },
        patch.mean() as f32,
    )?;

    let o = half as f32;
    let mut m = get_rotation_matrix2d((o, o), angle as f32, 1.0);
    m[2] += center[0] - o;
    m[5] += center[1] - o;

    resample_affine(&patch.image, &mut template, &m)?;
    Ok(template)
}

/// Fine tune a point with normalized cross-correlation, also searching the rotation.
///
/// Like [`point_fine_tune`], but the template is resampled at every angle of
/// `rotation` about the template point with cubic interpolation and each rotated
/// template is correlated over the whole search window. As there, an even
/// `template_size` is rounded up to the next odd size. The trials run in
/// parallel; the best score wins and ties go to the earliest angle.
///
/// # Returns
///
/// The refined match of the best trial, with [`CorrelationResult::angle`] set to
/// the winning angle in degrees. The score is [`NO_PEAK`] if no trial found a
/// valid peak.
///
/// # Errors
///
/// Fails for a zero template size, zero angle steps, unknown images, or a template
/// point outside its image.
#[allow(clippy::too_many_arguments)]
pub fn point_fine_tune_rot_search<S: ImageSource + ?Sized>(
    source: &S,
    template_image: usize,
    template_point: [f64; 2],
    template_size: usize,
    search_image: usize,
    search_point: [f64; 2],
    search_width: usize,
    rotation: &RotationSearch,
) -> Result<CorrelationResult, FineTuneError> {
    let half = check_template_size(template_size)?;
    let angles = rotation.angles()?;

    let tp = round_point(template_point);
    let tmpl_size = source.image_size(template_image)?;
    if !Rect::new(0, 0, tmpl_size.width as i64, tmpl_size.height as i64).contains(tp[0], tp[1])
    {
        return Err(FineTuneError::EmptyPatch {
            left: tp[0],
            top: tp[1],
            right: tp[0] + 1,
            bottom: tp[1] + 1,
        });
    }

    // the rotated footprint reaches half * sqrt(2) away from the template point
    let reach = (half as f64 * std::f64::consts::SQRT_2).ceil() as i64 + ROTATION_MARGIN;
    let source_patch = source.get_patch(template_image, &Rect::centered(tp, reach))?;
    let center = [
        (tp[0] - source_patch.origin[0] as i64) as f32,
        (tp[1] - source_patch.origin[1] as i64) as f32,
    ];

    let search = search_patch(
        source,
        search_image,
        search_point,
        search_width / 2 + half + SEARCH_MARGIN,
    )?;

    let trials = angles
        .par_iter()
        .map(|&angle| -> Result<Correlation, FineTuneError> {
            let template = rotate_template(&source_patch, center, half, angle)?;
            Ok(correlate(&template, &search.image, NO_PEAK)?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let best = trials
        .into_iter()
        .zip(angles)
        .filter(|(correlation, _)| correlation.valid_peak)
        .fold(None, |best: Option<(Correlation, f64)>, (correlation, angle)| match best {
            Some(b) if b.0.peak.score >= correlation.peak.score => Some(b),
            _ => Some((correlation, angle)),
        });

    let Some((correlation, angle)) = best else {
        log::debug!("no valid peak in {} rotation trials", rotation.steps);
        return Ok(CorrelationResult::no_peak());
    };
    log::debug!(
        "rotation search best {:.4} at {:?} under {angle} deg",
        correlation.peak.score,
        correlation.peak.position
    );

    let mut result = locate(&correlation, &search, [half as f64, half as f64]);
    result.angle = angle;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::ImageCache;

    #[test]
    fn rotation_angles() -> Result<(), FineTuneError> {
        let search = RotationSearch {
            start_angle: -30.0,
            stop_angle: 30.0,
            steps: 5,
        };
        assert_eq!(search.angles()?, vec![-30.0, -15.0, 0.0, 15.0, 30.0]);

        let single = RotationSearch {
            steps: 1,
            ..Default::default()
        };
        assert_eq!(single.angles()?, vec![-30.0]);

        let none = RotationSearch {
            steps: 0,
            ..Default::default()
        };
        assert_eq!(none.angles(), Err(FineTuneError::InvalidAngleSteps(0)));
        Ok(())
    }

    #[test]
    fn rotation_search_defaults() {
        let search = RotationSearch::default();
        assert_eq!(search.start_angle, -30.0);
        assert_eq!(search.stop_angle, 30.0);
        assert_eq!(search.steps, 12);
    }

    #[test]
    fn rotation_search_from_json() -> Result<(), serde_json::Error> {
        let search: RotationSearch = serde_json::from_str(r#"{ "steps": 7 }"#)?;
        assert_eq!(search.steps, 7);
        assert_eq!(search.start_angle, -30.0);
        Ok(())
    }

    #[test]
    fn rotate_template_zero_angle_is_crop() -> Result<(), ImageError> {
        let data = (0..81).map(|v| v as f32).collect();
        let patch = RasterPatch::new([10, 10], Image::new([9, 9].into(), data)?);
        let template = rotate_template(&patch, [4.0, 4.0], 2, 0.0)?;
        let expected = [
            20.0, 21.0, 22.0, 23.0, 24.0, //
            29.0, 30.0, 31.0, 32.0, 33.0, //
            38.0, 39.0, 40.0, 41.0, 42.0, //
            47.0, 48.0, 49.0, 50.0, 51.0, //
            56.0, 57.0, 58.0, 59.0, 60.0,
        ];
        for (a, b) in template.as_slice().iter().zip(expected.iter()) {
            approx::assert_relative_eq!(a, b, epsilon = 1e-3);
        }
        Ok(())
    }

    #[test]
    fn invalid_arguments() -> Result<(), FineTuneError> {
        let mut cache = ImageCache::new();
        cache.insert(&Image::<f32, 1>::from_size_val([32, 32].into(), 1.0)?)?;

        assert_eq!(
            point_fine_tune(&cache, 0, [5.0, 5.0], 0, 0, [5.0, 5.0], 10),
            Err(FineTuneError::InvalidTemplateSize(0))
        );
        assert!(matches!(
            point_fine_tune(&cache, 0, [50.0, 5.0], 5, 0, [5.0, 5.0], 10),
            Err(FineTuneError::EmptyPatch { .. })
        ));
        assert!(matches!(
            point_fine_tune_rot_search(
                &cache,
                0,
                [-4.0, 5.0],
                5,
                0,
                [5.0, 5.0],
                10,
                &RotationSearch::default()
            ),
            Err(FineTuneError::EmptyPatch { .. })
        ));
        assert_eq!(
            point_fine_tune(&cache, 0, [5.0, 5.0], 5, 3, [5.0, 5.0], 10),
            Err(FineTuneError::Image(ImageError::UnknownImage(3, 1)))
        );
        Ok(())
    }

    #[test]
    fn even_template_size_rounds_up() -> Result<(), FineTuneError> {
        let data = (0..48 * 48)
            .map(|i| {
                let (x, y) = ((i % 48) as f32, (i / 48) as f32);
                100.0 + 40.0 * (x / 3.0).sin() * (y / 5.0).cos() + 0.5 * x
            })
            .collect();
        let mut cache = ImageCache::new();
        cache.insert(&Image::<f32, 1>::new([48, 48].into(), data)?)?;

        assert_eq!(check_template_size(20)?, 10);
        assert_eq!(check_template_size(21)?, 10);
        assert_eq!(check_template_size(1)?, 0);

        let even = point_fine_tune(&cache, 0, [24.0, 24.0], 20, 0, [25.0, 23.0], 8)?;
        let odd = point_fine_tune(&cache, 0, [24.0, 24.0], 21, 0, [25.0, 23.0], 8)?;
        assert_eq!(even, odd);
        Ok(())
    }

    #[test]
    fn uniform_images_have_no_peak() -> Result<(), FineTuneError> {
        let mut cache = ImageCache::new();
        cache.insert(&Image::<u8, 1>::from_size_val([40, 40].into(), 128)?)?;
        let result = point_fine_tune(&cache, 0, [20.0, 20.0], 9, 0, [20.0, 20.0], 8)?;
        assert_eq!(result.score, NO_PEAK);
        assert!(!result.is_valid());
        Ok(())
    }
}
