//! Error types for teleview

use thiserror::Error;

/// Main error type for teleview operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("point_step {point_step} is smaller than the {required} bytes a point record needs")]
    PointStepTooSmall { point_step: usize, required: usize },

    #[error("payload of {len} bytes is not a multiple of point_step {point_step}")]
    PayloadNotAligned { len: usize, point_step: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{requested} points exceed the buffer capacity of {capacity}")]
    CapacityExceeded { requested: usize, capacity: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for errors that only drop the current frame.
    pub fn is_malformed_frame(&self) -> bool {
        matches!(
            self,
            Error::PointStepTooSmall { .. } | Error::PayloadNotAligned { .. } | Error::Codec(_)
        )
    }
}

/// Result type alias for teleview operations
pub type Result<T> = std::result::Result<T, Error>;
