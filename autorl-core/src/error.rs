//! Errors of this crate.
use thiserror::Error;

/// Errors raised by the core abstractions.
#[derive(Debug, Error)]
pub enum AutorlError {
    /// The algorithm cannot act on the action space of the given environment.
    ///
    /// Raised once, at algorithm construction.
    #[error("unsupported action space: {0}")]
    UnsupportedActionSpace(String),

    /// A named hyperparameter is missing or has an unexpected type.
    #[error("hyperparameter `{0}` is missing or has a wrong type")]
    BadHyperparameter(String),
}
