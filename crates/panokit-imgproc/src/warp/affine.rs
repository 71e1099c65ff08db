use std::f32::consts::PI;

use panokit_image::{Image, ImageError};

use crate::interpolation::interpolate_pixel;
use crate::parallel;

/// Returns a 2x3 rotation matrix for a 2D rotation around a center point.
///
/// The rotation matrix is defined as:
///
/// | alpha  beta  tx |
/// | -beta  alpha ty |
///
/// where:
///
/// alpha = scale * cos(angle)
/// beta = scale * sin(angle)
/// tx = (1 - alpha) * center.x - beta * center.y
/// ty = beta * center.x + (1 - alpha) * center.y
///
/// # Arguments
///
/// * `center` - The center point of the rotation.
/// * `angle` - The angle of rotation in degrees.
/// * `scale` - The scale factor.
///
/// # Example
///
/// ```
/// use panokit_imgproc::warp::get_rotation_matrix2d;
///
/// let rotation_matrix = get_rotation_matrix2d((0.0, 0.0), 90.0, 1.0);
/// assert!((rotation_matrix[1] - 1.0).abs() < 1e-6);
/// ```
pub fn get_rotation_matrix2d(center: (f32, f32), angle: f32, scale: f32) -> [f32; 6] {
    let angle = angle * PI / 180.0f32;
    let alpha = scale * angle.cos();
    let beta = scale * angle.sin();

    let tx = (1.0 - alpha) * center.0 - beta * center.1;
    let ty = beta * center.0 + (1.0 - alpha) * center.1;

    [alpha, beta, tx, -beta, alpha, ty]
}

/// Applies an affine transformation to a point.
pub fn transform_point(x: f32, y: f32, m: &[f32; 6]) -> (f32, f32) {
    let u = m[0] * x + m[1] * y + m[2];
    let v = m[3] * x + m[4] * y + m[5];
    (u, v)
}

/// Fills `dst` by sampling `src` through a destination-to-source affine map.
///
/// Every destination pixel `(x, y)` reads `src` at `m_inv * (x, y, 1)` with bicubic
/// interpolation. Pixels whose
/// source position falls outside `src` keep their previous value, so callers can
/// pre-fill `dst` with a background.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output image, already allocated.
/// * `m_inv` - The 2x3 sampling matrix mapping destination to source coordinates.
///
/// # Example
///
/// ```
/// use panokit_image::{Image, ImageSize};
/// use panokit_imgproc::warp::resample_affine;
///
/// let src = Image::<_, 3>::from_size_val(
///     ImageSize {
///         width: 4,
///         height: 5,
///     },
///     1f32,
/// ).unwrap();
///
/// let m = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
///
/// let mut dst = Image::<_, 3>::from_size_val(src.size(), 0.0).unwrap();
///
/// resample_affine(&src, &mut dst, &m).unwrap();
///
/// assert_eq!(dst.as_slice(), src.as_slice());
/// ```
pub fn resample_affine<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    m_inv: &[f32; 6],
) -> Result<(), ImageError> {
    if src.size().is_empty() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let (max_x, max_y) = ((src.cols() - 1) as f32, (src.rows() - 1) as f32);

    parallel::par_iter_rows_indexed(dst, |x, y, dst_pixel| {
        let (u, v) = transform_point(x as f32, y as f32, m_inv);
        // check if the position is within the bounds of the src image
        if (0.0..=max_x).contains(&u) && (0.0..=max_y).contains(&v) {
            dst_pixel
                .iter_mut()
                .enumerate()
                .for_each(|(k, pixel)| *pixel = interpolate_pixel(src, u, v, k));
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use panokit_image::{Image, ImageError, ImageSize};

    #[test]
    fn resample_smoke_ch3() -> Result<(), ImageError> {
        let image = Image::<_, 3>::new(
            ImageSize {
                width: 4,
                height: 5,
            },
            vec![0f32; 4 * 5 * 3],
        )?;

        let new_size = ImageSize {
            width: 2,
            height: 3,
        };

        let mut image_transformed = Image::<_, 3>::from_size_val(new_size, 1.0)?;

        super::resample_affine(
            &image,
            &mut image_transformed,
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        )?;

        assert_eq!(image_transformed.size(), new_size);
        assert!(image_transformed.as_slice().iter().all(|&v| v == 0.0));

        Ok(())
    }

    #[test]
    fn resample_rotate_90() -> Result<(), ImageError> {
        #[rustfmt::skip]
        let image = Image::<_, 1>::new(
            ImageSize { width: 3, height: 3 },
            vec![
                0.0f32, 1.0, 2.0,
                3.0, 4.0, 5.0,
                6.0, 7.0, 8.0,
            ],
        )?;

        // destination (x, y) reads source (y, 2 - x)
        let m_inv = [0.0, 1.0, 0.0, -1.0, 0.0, 2.0];
        let mut rotated = Image::<_, 1>::from_size_val(image.size(), -1.0)?;
        super::resample_affine(&image, &mut rotated, &m_inv)?;

        #[rustfmt::skip]
        let expected = [
            6.0f32, 3.0, 0.0,
            7.0, 4.0, 1.0,
            8.0, 5.0, 2.0,
        ];
        assert_eq!(rotated.as_slice(), &expected);
        Ok(())
    }

    #[test]
    fn resample_keeps_background_outside() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::from_size_val([2, 2].into(), 5.0)?;
        let mut dst = Image::<f32, 1>::from_size_val([4, 1].into(), -1.0)?;
        // sample one pixel to the right
        super::resample_affine(&image, &mut dst, &[1.0, 0.0, 1.0, 0.0, 1.0, 0.0])?;
        assert_eq!(dst.as_slice(), &[5.0, -1.0, -1.0, -1.0]);
        Ok(())
    }

    #[test]
    fn resample_empty_source() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::new(ImageSize::default(), vec![])?;
        let mut dst = Image::<f32, 1>::from_size_val([2, 2].into(), 0.0)?;
        assert_eq!(
            super::resample_affine(&image, &mut dst, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            Err(ImageError::InvalidImageSize(0, 0, 2, 2))
        );
        Ok(())
    }

    #[test]
    fn rotation_matrix_quarter_turn() {
        let m = super::get_rotation_matrix2d((1.0, 1.0), 90.0, 1.0);
        let (u, v) = super::transform_point(2.0, 1.0, &m);
        approx::assert_relative_eq!(u, 1.0, epsilon = 1e-5);
        approx::assert_relative_eq!(v, 0.0, epsilon = 1e-5);
    }
}
