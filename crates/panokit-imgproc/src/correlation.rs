//! Zero-mean normalized cross-correlation between a template and a search window.
//!
//! The correlation surface holds one score per offset at which the template fits
//! entirely inside the search window. Surface pixel `(u, v)` is the score of the
//! template placed with its top-left corner on search pixel `(u, v)`.

use panokit_image::{Image, ImageError, ImageSize};
use serde::{Deserialize, Serialize};

/// Score of a correlation that found no valid peak.
pub const NO_PEAK: f64 = -1.0;

/// Sum of squared deviations per pixel below which a patch counts as uniform.
const UNIFORM_EPS: f64 = 1e-12;

/// Outcome of a correlation based match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Correlation score in `[-1, 1]`, or [`NO_PEAK`] when no valid peak was found.
    pub score: f64,
    /// Position of the peak.
    pub position: [f64; 2],
    /// Curvature of the score surface at the peak, per axis. Zero when not refined.
    pub curvature: [f64; 2],
    /// Rotation of the template in degrees, zero unless a rotation search ran.
    pub angle: f64,
}

impl Default for CorrelationResult {
    fn default() -> Self {
        Self::no_peak()
    }
}

impl CorrelationResult {
    /// The sentinel result for a failed match.
    pub fn no_peak() -> Self {
        Self {
            score: NO_PEAK,
            position: [0.0, 0.0],
            curvature: [0.0, 0.0],
            angle: 0.0,
        }
    }

    /// Whether the result carries a peak rather than the sentinel.
    pub fn is_valid(&self) -> bool {
        self.score > NO_PEAK
    }
}

/// A correlation surface together with its integer peak.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    /// Score per template offset, see the module documentation for the layout.
    pub surface: Image<f32, 1>,
    /// Maximum of the surface, `position` in surface coordinates.
    pub peak: CorrelationResult,
    /// Whether the peak offset had texture in both the template and the window.
    pub valid_peak: bool,
}

/// Size of the correlation surface of `template` over `search`.
///
/// Empty when the template is empty or larger than the search window in either axis.
pub fn surface_size(template: ImageSize, search: ImageSize) -> ImageSize {
    if template.is_empty() || template.width > search.width || template.height > search.height
    {
        return ImageSize::default();
    }
    ImageSize {
        width: search.width - template.width + 1,
        height: search.height - template.height + 1,
    }
}

/// Correlate `template` over every offset of `search`.
///
/// The surface is seeded with [`NO_PEAK`] before the pass, so any `score_floor`
/// at or below [`NO_PEAK`] evaluates every offset.
///
/// # Example
///
/// ```
/// use panokit_image::{Image, ImageSize};
/// use panokit_imgproc::correlation::{correlate, NO_PEAK};
///
/// let search = Image::<f32, 1>::new(
///     ImageSize { width: 4, height: 1 },
///     vec![0.0, 1.0, 5.0, 2.0],
/// ).unwrap();
/// let template = Image::<f32, 1>::new(
///     ImageSize { width: 3, height: 1 },
///     vec![1.0, 5.0, 2.0],
/// ).unwrap();
///
/// let correlation = correlate(&template, &search, NO_PEAK).unwrap();
/// assert_eq!(correlation.peak.position, [1.0, 0.0]);
/// assert!((correlation.peak.score - 1.0).abs() < 1e-6);
/// ```
pub fn correlate(
    template: &Image<f32, 1>,
    search: &Image<f32, 1>,
    score_floor: f64,
) -> Result<Correlation, ImageError> {
    let mut surface = Image::from_size_val(
        surface_size(template.size(), search.size()),
        NO_PEAK as f32,
    )?;
    let (peak, valid_peak) = correlate_into(template, search, &mut surface, score_floor)?;
    Ok(Correlation {
        surface,
        peak,
        valid_peak,
    })
}

/// Correlate `template` over `search`, writing into a pre-seeded surface.
///
/// Offsets whose current surface value is below `score_floor` are skipped and keep
/// their value; this lets a coarse pass prune the offsets of a finer one. An offset
/// where the template or the search window is uniform scores `0`.
///
/// Returns the maximum over the evaluated offsets, first in raster order on ties,
/// and whether that offset was non-degenerate. Without any evaluated offset the
/// peak is [`CorrelationResult::no_peak`].
///
/// # Errors
///
/// The surface must have the size given by [`surface_size`].
pub fn correlate_into(
    template: &Image<f32, 1>,
    search: &Image<f32, 1>,
    surface: &mut Image<f32, 1>,
    score_floor: f64,
) -> Result<(CorrelationResult, bool), ImageError> {
    let expected = surface_size(template.size(), search.size());
    if surface.size() != expected {
        return Err(ImageError::InvalidImageSize(
            surface.cols(),
            surface.rows(),
            expected.width,
            expected.height,
        ));
    }
    if expected.is_empty() {
        return Ok((CorrelationResult::no_peak(), false));
    }

    let (tw, th) = (template.width(), template.height());
    let n = (tw * th) as f64;

    // template deviations are fixed for the whole pass
    let tmpl = template.as_slice();
    let tmpl_mean = tmpl.iter().map(|&v| v as f64).sum::<f64>() / n;
    let tmpl_dev = tmpl
        .iter()
        .map(|&v| v as f64 - tmpl_mean)
        .collect::<Vec<_>>();
    let tmpl_ss = tmpl_dev.iter().map(|d| d * d).sum::<f64>();
    let tmpl_uniform = tmpl_ss <= UNIFORM_EPS * n;

    let sw = search.width();
    let src = search.as_slice();
    let surface_width = surface.width();

    let mut peak = CorrelationResult::no_peak();
    let mut best: Option<(f64, bool)> = None;
    let mut uniform_offsets = 0usize;

    for (idx, value) in surface.as_slice_mut().iter_mut().enumerate() {
        if (*value as f64) < score_floor {
            continue;
        }
        let (u, v) = (idx % surface_width, idx / surface_width);

        // local mean of the search window under the template
        let mut sum = 0.0;
        for row in src[v * sw..].chunks(sw).take(th) {
            sum += row[u..u + tw].iter().map(|&p| p as f64).sum::<f64>();
        }
        let mean = sum / n;

        let mut numerator = 0.0;
        let mut search_ss = 0.0;
        for (row, tmpl_row) in src[v * sw..].chunks(sw).take(th).zip(tmpl_dev.chunks(tw)) {
            for (&p, &t) in row[u..u + tw].iter().zip(tmpl_row) {
                let s = p as f64 - mean;
                numerator += t * s;
                search_ss += s * s;
            }
        }

        let uniform = tmpl_uniform || search_ss <= UNIFORM_EPS * n;
        let score = if uniform {
            uniform_offsets += 1;
            0.0
        } else {
            (numerator / (tmpl_ss * search_ss).sqrt()).clamp(-1.0, 1.0)
        };
        *value = score as f32;

        if best.map_or(true, |(best_score, _)| score > best_score) {
            best = Some((score, !uniform));
            peak.score = score;
            peak.position = [u as f64, v as f64];
        }
    }

    if uniform_offsets > 0 {
        log::debug!(
            "uniform patch at {} of {} offsets, scored as uncorrelated",
            uniform_offsets,
            expected.area()
        );
    }

    Ok((peak, best.is_some_and(|(_, valid)| valid)))
}
