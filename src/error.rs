//! Error types for the backdrop-matte crate.

/// Errors that can occur while matting an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input bytes are not a readable raster image.
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    /// The image has zero width or height.
    #[error("image has degenerate dimensions ({width}x{height})")]
    Dimension {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },

    /// A raw RGBA buffer does not hold exactly `width * height` pixels.
    #[error("RGBA buffer for {width}x{height} image must be {expected} bytes, got {actual}")]
    BufferSize {
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Required buffer length in bytes.
        expected: usize,
        /// Length of the buffer that was supplied.
        actual: usize,
    },

    /// Encoding the matted image failed.
    #[error("failed to encode image: {0}")]
    Codec(image::ImageError),

    /// A tolerance profile would not be non-increasing from edge to center.
    #[error("invalid tolerance profile: {0}")]
    InvalidTolerance(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested output format cannot carry the alpha channel.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
