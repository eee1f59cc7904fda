//! Error types for the LWIR compression library

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the LWIR compressor
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Per-frame decode failure
    #[error("Failed to decode frame {frame_index}: {reason}")]
    Decode {
        /// Index of the frame that failed
        frame_index: u32,
        /// Cause of the failure
        reason: String,
    },

    /// Internal symbol codec failure
    #[error("Symbol codec failure: {0}")]
    Codec(String),

    /// Embedded codestream header disagrees with caller expectations
    #[error(
        "Codestream header mismatch: expected {expected_width}x{expected_height}, \
         found {actual_width}x{actual_height} at {bits_per_sample} bits per sample"
    )]
    HeaderMismatch {
        /// Width the caller expected
        expected_width: u32,
        /// Height the caller expected
        expected_height: u32,
        /// Width embedded in the codestream
        actual_width: u32,
        /// Height embedded in the codestream
        actual_height: u32,
        /// Bit depth embedded in the codestream
        bits_per_sample: u8,
    },

    /// Residual operation attempted without a reference frame
    #[error("No reference frame available for residual coding")]
    NoReference,

    /// Frame dimensions do not match the reference frame
    #[error(
        "Frame dimensions {actual_width}x{actual_height} do not match \
         reference {expected_width}x{expected_height}"
    )]
    DimensionMismatch {
        /// Width of the offending frame
        actual_width: u32,
        /// Height of the offending frame
        actual_height: u32,
        /// Reference width
        expected_width: u32,
        /// Reference height
        expected_height: u32,
    },

    /// Fixed-point arithmetic overflow
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Operation interrupted by the user
    #[error("Interrupted")]
    Interrupted,
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a symbol codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec(msg.into())
    }

    /// Create a per-frame decode error
    pub fn decode<S: Into<String>>(frame_index: u32, reason: S) -> Self {
        Error::Decode {
            frame_index,
            reason: reason.into(),
        }
    }

    /// Create an overflow error
    pub fn overflow<S: Into<String>>(msg: S) -> Self {
        Error::Overflow(msg.into())
    }
}
