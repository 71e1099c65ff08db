//! Image sources and the raster patches cut out of them.
//!
//! The fine-tuners never touch whole images: they ask an [`ImageSource`] for a
//! clipped rectangular [`RasterPatch`] around each point. [`ImageCache`] is the
//! in-memory source owned by the caller.

use panokit_image::{Image, ImageDtype, ImageError, ImageSize};

use crate::color;
use crate::crop::crop_image;
use crate::error::FineTuneError;

/// An axis-aligned rectangle in pixel coordinates, half-open on the right and bottom.
///
/// Coordinates are signed so that a rectangle centred near a border can extend past
/// the image before being clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge, inclusive.
    pub left: i64,
    /// Top edge, inclusive.
    pub top: i64,
    /// Right edge, exclusive.
    pub right: i64,
    /// Bottom edge, exclusive.
    pub bottom: i64,
}

impl Rect {
    /// Create a rectangle from its corners.
    pub fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// The square `[cx - half, cx + half] x [cy - half, cy + half]`, i.e. side `2 * half + 1`.
    pub fn centered(center: [i64; 2], half: i64) -> Self {
        Self::new(
            center[0] - half,
            center[1] - half,
            center[0] + half + 1,
            center[1] + half + 1,
        )
    }

    /// Width of the rectangle, zero if it is inverted.
    pub fn width(&self) -> usize {
        (self.right - self.left).max(0) as usize
    }

    /// Height of the rectangle, zero if it is inverted.
    pub fn height(&self) -> usize {
        (self.bottom - self.top).max(0) as usize
    }

    /// Whether the rectangle covers no pixel.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Whether the pixel `(x, y)` lies inside the rectangle.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// The intersection of two rectangles.
    pub fn intersect(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    /// The rectangle clipped to the bounds of an image of the given size.
    pub fn clip(&self, size: ImageSize) -> Rect {
        self.intersect(&Rect::new(0, 0, size.width as i64, size.height as i64))
    }
}

/// A read-only single channel view onto a sub-region of a larger image.
///
/// `origin` is the position of the patch's top-left pixel in the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPatch {
    /// Top-left corner of the patch in source image coordinates.
    pub origin: [usize; 2],
    /// Luminance pixels of the patch.
    pub image: Image<f32, 1>,
}

impl RasterPatch {
    /// Wrap an image as a patch located at `origin`.
    pub fn new(origin: [usize; 2], image: Image<f32, 1>) -> Self {
        Self { origin, image }
    }

    /// Width of the patch in pixels.
    pub fn width(&self) -> usize {
        self.image.width()
    }

    /// Height of the patch in pixels.
    pub fn height(&self) -> usize {
        self.image.height()
    }

    /// The region of the source image covered by the patch.
    pub fn rect(&self) -> Rect {
        let (x, y) = (self.origin[0] as i64, self.origin[1] as i64);
        Rect::new(x, y, x + self.width() as i64, y + self.height() as i64)
    }

    /// Mean pixel value, zero for an empty patch.
    pub fn mean(&self) -> f64 {
        let data = self.image.as_slice();
        if data.is_empty() {
            return 0.0;
        }
        data.iter().map(|&v| v as f64).sum::<f64>() / data.len() as f64
    }
}

/// Provider of image patches, typically backed by a cache of decoded images.
pub trait ImageSource {
    /// Size of the image with the given id.
    fn image_size(&self, image_id: usize) -> Result<ImageSize, ImageError>;

    /// Luminance patch of `image_id` covering `rect` clipped to the image bounds.
    ///
    /// # Errors
    ///
    /// Fails for an unknown image or when the clipped region is empty.
    fn get_patch(&self, image_id: usize, rect: &Rect) -> Result<RasterPatch, FineTuneError>;
}

/// An in-memory image source holding the luminance of each inserted image.
///
/// The cache is owned by the caller and passed by reference to the fine-tuners.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    images: Vec<Image<f32, 1>>,
}

impl ImageCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an image and return its id.
    ///
    /// Colour images are reduced to a single luminance channel on insertion.
    pub fn insert<T: ImageDtype, const C: usize>(
        &mut self,
        image: &Image<T, C>,
    ) -> Result<usize, ImageError> {
        let mut gray = Image::<f32, 1>::from_size_val(image.size(), 0.0)?;
        color::luminance(image, &mut gray)?;
        self.images.push(gray);
        Ok(self.images.len() - 1)
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the cache holds no image.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// The cached luminance image with the given id.
    pub fn get(&self, image_id: usize) -> Result<&Image<f32, 1>, ImageError> {
        self.images
            .get(image_id)
            .ok_or(ImageError::UnknownImage(image_id, self.images.len()))
    }
}

impl ImageSource for ImageCache {
    fn image_size(&self, image_id: usize) -> Result<ImageSize, ImageError> {
        Ok(self.get(image_id)?.size())
    }

    fn get_patch(&self, image_id: usize, rect: &Rect) -> Result<RasterPatch, FineTuneError> {
        let image = self.get(image_id)?;
        let clipped = rect.clip(image.size());
        if clipped.is_empty() {
            return Err(FineTuneError::EmptyPatch {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
            });
        }

        let mut patch = Image::<f32, 1>::from_size_val(
            ImageSize {
                width: clipped.width(),
                height: clipped.height(),
            },
            0.0,
        )?;
        crop_image(
            image,
            &mut patch,
            clipped.left as usize,
            clipped.top as usize,
        )?;

        Ok(RasterPatch::new(
            [clipped.left as usize, clipped.top as usize],
            patch,
        ))
    }
}
