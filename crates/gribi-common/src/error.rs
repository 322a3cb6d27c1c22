//! Protocol validation errors.

use thiserror::Error;

/// Errors raised while validating protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("invalid session parameters: {0}")]
    InvalidParameters(String),

    #[error("invalid election id: {0}")]
    InvalidElectionId(String),

    #[error("unsupported session parameters: {0}")]
    UnsupportedParameters(String),
}

/// Result type for protocol validation.
pub type Result<T> = std::result::Result<T, ProtocolError>;
