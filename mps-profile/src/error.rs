//! Error types for mps-profile

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ProfileError>;

/// Errors raised by the matrix profile engine
///
/// Every variant describes inputs the engine cannot work with. None of them
/// are transient, so retrying the same call yields the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// Window shorter than the smallest meaningful subsequence
    #[error("Window length {window} must be at least {min}")]
    WindowTooShort { window: usize, min: usize },

    /// Window too long to leave room for non-trivial matches
    #[error("Window length {window} must be less than half the series length {len}")]
    WindowTooLong { window: usize, len: usize },

    /// NaN or infinite sample in the input series
    #[error("Series contains a non-finite value at position {0}")]
    NonFinite(usize),

    /// Artifact parts or annotation vector do not line up with the profile
    #[error("Length {actual} does not match matrix profile length {expected}")]
    LengthMismatch { actual: usize, expected: usize },

    /// Subsequence cannot be z-normalized
    #[error("Standard deviation is zero")]
    ZeroVariance,

    /// Fewer motif groups exist than were requested
    #[error("Requested {requested} motifs but only found {found}")]
    NotEnoughMotifs { requested: usize, found: usize },

    /// Fewer discords exist than were requested
    #[error("Requested {requested} discords but only found {found}")]
    NotEnoughDiscords { requested: usize, found: usize },

    /// Annotation vector name outside the supported set
    #[error("Invalid annotation vector name {0}")]
    UnknownAnnotation(String),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}
