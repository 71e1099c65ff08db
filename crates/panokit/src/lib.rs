#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use panokit_image as image;

#[doc(inline)]
pub use panokit_imgproc as imgproc;

#[doc(inline)]
pub use panokit_cp as cp;
