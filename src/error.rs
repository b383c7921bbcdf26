//! Error types for the head kinematics library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Source video cannot be opened
    #[error("failed to open video: {0}")]
    VideoOpen(String),

    /// Too few checkerboard detections before the calibration video ended
    #[error("calibration failed: {0}")]
    Calibration(String),

    /// A consumer received fewer samples than it needs to produce output
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Signal shorter than the zero-phase filter's settle length
    #[error("signal of {actual} samples is too short for zero-phase filtering, need at least {required}")]
    FilterLength {
        /// Minimum accepted signal length
        required: usize,
        /// Length of the signal that was supplied
        actual: usize,
    },

    /// Invalid input parameters provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failure inside an external landmark or calibration collaborator,
    /// passed through unmodified
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a collaborator failure without altering it
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
