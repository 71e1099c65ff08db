use std::f64::consts::PI;

use panokit_image::{Image, ImageError, ImageSize};
use panokit_imgproc::correlation::NO_PEAK;
use panokit_imgproc::finetune::{point_fine_tune, point_fine_tune_rot_search, RotationSearch};
use panokit_imgproc::patch::ImageCache;
use panokit_imgproc::warp::resample_affine;
use panokit_imgproc::FineTuneError;

const SIZE: usize = 96;
const CENTER: f64 = 48.0;

/// Smooth blob plus a checker of cosines, mirror symmetric about the centre.
fn pattern(x: f64, y: f64) -> f64 {
    let (dx, dy) = (x - CENTER, y - CENTER);
    let blob = 100.0 * (-(dx * dx + dy * dy) / (2.0 * 5.0 * 5.0)).exp();
    let waves = 30.0 * (2.0 * PI * dx / 23.0).cos() * (2.0 * PI * dy / 19.0).cos();
    60.0 + blob + waves
}

fn render(f: impl Fn(f64, f64) -> f64) -> Result<Image<f32, 1>, ImageError> {
    let size = ImageSize {
        width: SIZE,
        height: SIZE,
    };
    let data = (0..size.area())
        .map(|i| f((i % SIZE) as f64, (i / SIZE) as f64) as f32)
        .collect();
    Image::new(size, data)
}

fn cache_with(search: impl Fn(f64, f64) -> f64) -> Result<ImageCache, ImageError> {
    let mut cache = ImageCache::new();
    cache.insert(&render(pattern)?)?;
    cache.insert(&render(search)?)?;
    Ok(cache)
}

#[test]
fn self_match_is_identity() -> Result<(), FineTuneError> {
    let cache = cache_with(pattern)?;
    let result = point_fine_tune(&cache, 0, [48.0, 48.0], 21, 1, [48.0, 48.0], 14)?;
    approx::assert_relative_eq!(result.score, 1.0, epsilon = 1e-4);
    approx::assert_relative_eq!(result.position[0], 48.0, epsilon = 0.05);
    approx::assert_relative_eq!(result.position[1], 48.0, epsilon = 0.05);
    assert!(result.curvature[0] < 0.0 && result.curvature[1] < 0.0);
    assert_eq!(result.angle, 0.0);
    Ok(())
}

#[test]
fn recovers_subpixel_shift() -> Result<(), FineTuneError> {
    let cache = cache_with(|x, y| pattern(x - 2.3, y - 0.9))?;
    let result = point_fine_tune(&cache, 0, [48.0, 48.0], 21, 1, [50.0, 49.0], 14)?;
    assert!(result.score > 0.99 && result.score < 1.01);
    approx::assert_relative_eq!(result.position[0], 50.3, epsilon = 0.05);
    approx::assert_relative_eq!(result.position[1], 48.9, epsilon = 0.05);
    Ok(())
}

#[test]
fn recovers_shift_of_resampled_copy() -> Result<(), FineTuneError> {
    let base = render(pattern)?;
    // destination (x, y) reads the base image at (x - 2.3, y - 0.9)
    let mut shifted = Image::<f32, 1>::from_size_val(base.size(), 60.0)?;
    resample_affine(&base, &mut shifted, &[1.0, 0.0, -2.3, 0.0, 1.0, -0.9])?;

    let mut cache = ImageCache::new();
    cache.insert(&base)?;
    cache.insert(&shifted)?;

    let result = point_fine_tune(&cache, 0, [48.0, 48.0], 21, 1, [50.0, 49.0], 14)?;
    assert!(result.score > 0.99 && result.score < 1.01);
    approx::assert_relative_eq!(result.position[0], 50.3, epsilon = 0.05);
    approx::assert_relative_eq!(result.position[1], 48.9, epsilon = 0.05);
    Ok(())
}

#[test]
fn recovers_shift_from_coarse_guess() -> Result<(), FineTuneError> {
    let cache = cache_with(|x, y| pattern(x - 2.3, y - 0.9))?;
    // the guess is off by several pixels but still inside the search width
    let result = point_fine_tune(&cache, 0, [48.0, 48.0], 21, 1, [46.0, 52.0], 14)?;
    approx::assert_relative_eq!(result.position[0], 50.3, epsilon = 0.05);
    approx::assert_relative_eq!(result.position[1], 48.9, epsilon = 0.05);
    Ok(())
}

#[test]
fn clipped_template_near_border() -> Result<(), FineTuneError> {
    let cache = cache_with(pattern)?;
    let result = point_fine_tune(&cache, 0, [3.0, 40.0], 21, 1, [3.0, 40.0], 14)?;
    approx::assert_relative_eq!(result.score, 1.0, epsilon = 1e-4);
    approx::assert_relative_eq!(result.position[0], 3.0, epsilon = 0.05);
    approx::assert_relative_eq!(result.position[1], 40.0, epsilon = 0.05);
    Ok(())
}

#[test]
fn recovers_rotation() -> Result<(), FineTuneError> {
    let theta = 20f64.to_radians();
    let (s, c) = theta.sin_cos();
    // search(q) = base(c + R(theta) (q - c)) with R = [[cos, sin], [-sin, cos]]
    let cache = cache_with(|x, y| {
        let (dx, dy) = (x - CENTER, y - CENTER);
        pattern(CENTER + c * dx + s * dy, CENTER - s * dx + c * dy)
    })?;

    let rotation = RotationSearch {
        start_angle: -30.0,
        stop_angle: 30.0,
        steps: 13,
    };
    let result = point_fine_tune_rot_search(
        &cache,
        0,
        [48.0, 48.0],
        21,
        1,
        [48.0, 48.0],
        14,
        &rotation,
    )?;

    assert!(result.score > 0.95);
    assert!((result.angle - 20.0).abs() <= 5.0);
    approx::assert_relative_eq!(result.position[0], 48.0, epsilon = 0.5);
    approx::assert_relative_eq!(result.position[1], 48.0, epsilon = 0.5);
    Ok(())
}

#[test]
fn rotation_search_without_rotation() -> Result<(), FineTuneError> {
    let cache = cache_with(pattern)?;
    let rotation = RotationSearch {
        start_angle: -10.0,
        stop_angle: 10.0,
        steps: 5,
    };
    let result = point_fine_tune_rot_search(
        &cache,
        0,
        [48.0, 48.0],
        21,
        1,
        [48.0, 48.0],
        14,
        &rotation,
    )?;
    assert_eq!(result.angle, 0.0);
    assert!(result.score > 0.99);
    approx::assert_relative_eq!(result.position[0], 48.0, epsilon = 0.05);
    approx::assert_relative_eq!(result.position[1], 48.0, epsilon = 0.05);
    Ok(())
}

#[test]
fn rotation_search_on_uniform_images() -> Result<(), FineTuneError> {
    let mut cache = ImageCache::new();
    cache.insert(&Image::<f32, 1>::from_size_val([40, 40].into(), 9.0)?)?;
    cache.insert(&Image::<f32, 1>::from_size_val([40, 40].into(), 3.0)?)?;
    let result = point_fine_tune_rot_search(
        &cache,
        0,
        [20.0, 20.0],
        9,
        1,
        [20.0, 20.0],
        8,
        &RotationSearch::default(),
    )?;
    assert_eq!(result.score, NO_PEAK);
    Ok(())
}
