use super::bicubic::bicubic_interpolation;
use panokit_image::Image;

/// Kernel for interpolating a pixel value
///
/// Coordinates outside the image are clamped to the nearest border pixel.
///
/// # Arguments
///
/// * `image` - The input image container with shape (height, width, C).
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `c` - The channel of the pixel to interpolate.
///
/// # Returns
///
/// The interpolated pixel value, or zero for an empty image.
pub fn interpolate_pixel<const C: usize>(image: &Image<f32, C>, u: f32, v: f32, c: usize) -> f32 {
    if image.size().is_empty() || c >= C {
        return 0.0;
    }
    bicubic_interpolation(image, u, v, c)
}
