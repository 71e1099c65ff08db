use crate::parallel;
use panokit_image::{Image, ImageDtype, ImageError};

/// Define the RGB weights for the grayscale conversion.
const RW: f32 = 0.299;
const GW: f32 = 0.587;
const BW: f32 = 0.114;

/// Luminance of a single pixel with an arbitrary number of channels.
///
/// One channel is taken as is, three or four channels (RGB, RGBA) use the
/// Rec. 601 weights on the colour channels and any other layout is averaged.
pub fn luminance_of<T: ImageDtype>(pixel: &[T]) -> f32 {
    match pixel.len() {
        0 => 0.0,
        1 => pixel[0].into(),
        3 | 4 => RW * pixel[0].into() + GW * pixel[1].into() + BW * pixel[2].into(),
        n => pixel.iter().map(|&v| v.into()).sum::<f32>() / n as f32,
    }
}

/// Reduce an image with any channel count to a single `f32` luminance channel.
///
/// See [`luminance_of`] for the per-pixel rule. For RGB this is
///
/// Y = 0.299 * R + 0.587 * G + 0.114 * B
///
/// # Arguments
///
/// * `src` - The input image.
/// * `dst` - The output luminance image, with the same size as `src`.
///
/// # Example
///
/// ```
/// use panokit_image::{Image, ImageSize};
/// use panokit_imgproc::color::luminance;
///
/// let image = Image::<f32, 3>::new(
///     ImageSize {
///         width: 1,
///         height: 1,
///     },
///     vec![100.0, 100.0, 100.0],
/// )
/// .unwrap();
///
/// let mut gray = Image::<f32, 1>::from_size_val(image.size(), 0.0).unwrap();
///
/// luminance(&image, &mut gray).unwrap();
/// assert!((gray.as_slice()[0] - 100.0).abs() < 1e-4);
/// ```
pub fn luminance<T: ImageDtype, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<f32, 1>,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    // parallelize the conversion by rows
    parallel::par_iter_rows(src, dst, |src_pixel, dst_pixel| {
        dst_pixel[0] = luminance_of(src_pixel);
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use panokit_image::ImageSize;

    #[test]
    fn luminance_rgb_weights() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::new(
            ImageSize {
                width: 2,
                height: 1,
            },
            vec![255, 0, 0, 0, 0, 255],
        )?;
        let mut gray = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        luminance(&image, &mut gray)?;
        approx::assert_relative_eq!(gray.as_slice()[0], 0.299 * 255.0, epsilon = 1e-3);
        approx::assert_relative_eq!(gray.as_slice()[1], 0.114 * 255.0, epsilon = 1e-3);
        Ok(())
    }

    #[test]
    fn luminance_size_mismatch() -> Result<(), ImageError> {
        let image = Image::<f32, 1>::from_size_val([2, 2].into(), 1.0)?;
        let mut gray = Image::<f32, 1>::from_size_val([3, 2].into(), 0.0)?;
        assert_eq!(
            luminance(&image, &mut gray),
            Err(ImageError::InvalidImageSize(2, 2, 3, 2))
        );
        Ok(())
    }

    #[test]
    fn luminance_of_layouts() {
        assert_eq!(luminance_of(&[42.0f32]), 42.0);
        assert_eq!(luminance_of(&[1.0f32, 3.0]), 2.0);
        approx::assert_relative_eq!(luminance_of(&[10u8, 10, 10, 0]), 10.0, epsilon = 1e-4);
    }
}
