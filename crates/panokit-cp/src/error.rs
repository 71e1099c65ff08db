/// Error types for editing a panorama.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PanoramaError {
    /// A control point references an image the panorama does not have.
    #[error("Image index {index} is out of bounds ({count} images)")]
    InvalidImageIndex {
        /// The offending image index.
        index: usize,
        /// Number of images in the panorama.
        count: usize,
    },

    /// A variable vector does not have one entry per image.
    #[error("Expected variables for {expected} images, got {actual}")]
    VariableCountMismatch {
        /// Number of images in the panorama.
        expected: usize,
        /// Number of variable sets provided.
        actual: usize,
    },
}

/// Error types for the control point cleaning passes.
///
/// `E` is the error type of the geometric optimizer, passed through unmodified.
#[derive(thiserror::Error, Debug)]
pub enum CleanError<E: std::error::Error + 'static> {
    /// The optimizer failed.
    #[error(transparent)]
    Optimizer(E),

    /// The progress context asked to stop.
    #[error("Control point cleaning was cancelled")]
    Cancelled,

    /// The panorama could not be edited.
    #[error(transparent)]
    Panorama(#[from] PanoramaError),
}
