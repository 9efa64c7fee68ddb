//! fastops error types

/// fastops result type
pub type Result<T> = std::result::Result<T, Error>;

/// fastops errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure surfaced by the numr engine (allocation, unsupported dtype, ...)
    #[error("numr error: {0}")]
    Numr(#[from] numr::error::Error),

    /// Axis-length or broadcast incompatibility between arguments
    #[error("shape mismatch for '{arg}': {reason}")]
    ShapeMismatch {
        /// Argument name
        arg: &'static str,
        /// What did not line up
        reason: String,
    },

    /// Invalid argument to an operation
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: &'static str,
        /// Why it's invalid
        reason: String,
    },

    /// Configuration parse or validation error
    #[error("config error: {reason}")]
    Config {
        /// Description of what went wrong
        reason: String,
    },
}
