use panokit_image::Image;

/// Free parameter of the Keys cubic convolution kernel.
const KEYS_A: f32 = -0.5;

/// Keys cubic convolution weight for a tap at distance `x`.
fn cubic_weight(x: f32) -> f32 {
    let x = x.abs();
    if x <= 1.0 {
        ((KEYS_A + 2.0) * x - (KEYS_A + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        ((KEYS_A * x - 5.0 * KEYS_A) * x + 8.0 * KEYS_A) * x - 4.0 * KEYS_A
    } else {
        0.0
    }
}

/// Kernel for bicubic interpolation
///
/// Taps falling outside the image replicate the border pixels.
///
/// # Arguments
///
/// * `image` - The input image container.
/// * `u` - The x coordinate of the pixel to interpolate.
/// * `v` - The y coordinate of the pixel to interpolate.
/// * `c` - The channel of the pixel to interpolate.
///
/// # Returns
///
/// The interpolated pixel value.
pub(crate) fn bicubic_interpolation<const C: usize>(
    image: &Image<f32, C>,
    u: f32,
    v: f32,
    c: usize,
) -> f32 {
    let (rows, cols) = (image.rows() as i64, image.cols() as i64);
    let data = image.as_slice();

    let u0 = u.floor();
    let v0 = v.floor();
    let fu = u - u0;
    let fv = v - v0;
    let (iu, iv) = (u0 as i64, v0 as i64);

    let wu = [
        cubic_weight(1.0 + fu),
        cubic_weight(fu),
        cubic_weight(1.0 - fu),
        cubic_weight(2.0 - fu),
    ];
    let wv = [
        cubic_weight(1.0 + fv),
        cubic_weight(fv),
        cubic_weight(1.0 - fv),
        cubic_weight(2.0 - fv),
    ];

    let mut acc = 0.0;
    for (j, wy) in wv.iter().enumerate() {
        let y = (iv + j as i64 - 1).clamp(0, rows - 1) as usize;
        let mut row = 0.0;
        for (i, wx) in wu.iter().enumerate() {
            let x = (iu + i as i64 - 1).clamp(0, cols - 1) as usize;
            row += wx * data[(y * cols as usize + x) * C + c];
        }
        acc += wy * row;
    }

    acc
}
