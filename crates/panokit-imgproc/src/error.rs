use panokit_image::ImageError;

/// Error types for the point fine-tuning operations.
///
/// Degenerate image content is not an error: it is reported through the score of
/// the returned [`crate::correlation::CorrelationResult`].
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FineTuneError {
    /// Error raised by the underlying image operations.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The template size must be at least one pixel.
    #[error("Invalid template size {0}")]
    InvalidTemplateSize(usize),

    /// The rotation search needs at least one angle.
    #[error("Invalid number of angle steps {0}")]
    InvalidAngleSteps(usize),

    /// A patch was requested for a region that has no pixels.
    #[error("Empty patch region [{left}, {right}) x [{top}, {bottom})")]
    EmptyPatch {
        /// Left edge of the requested region.
        left: i64,
        /// Top edge of the requested region.
        top: i64,
        /// Right edge (exclusive) of the requested region.
        right: i64,
        /// Bottom edge (exclusive) of the requested region.
        bottom: i64,
    },
}
