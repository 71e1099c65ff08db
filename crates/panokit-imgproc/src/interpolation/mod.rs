//! Pixel interpolation for image transformations.
//!
//! Resampling uses Keys cubic convolution over a 4x4 neighbourhood, as needed
//! by the rotated template extraction in [`crate::finetune`].

mod bicubic;
pub(crate) mod interpolate;

pub use interpolate::interpolate_pixel;
