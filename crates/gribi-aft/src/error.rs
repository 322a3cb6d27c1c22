//! Error types for the gRIBI responder.

use gribi_common::ProtocolError;
use thiserror::Error;

/// Errors that end a session or reject a unary request.
///
/// Per-operation failures are not errors at this level: they are reported as
/// `FAILED` acknowledgments on the stream.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Unsupported session parameters: {0}")]
    UnsupportedParameters(String),

    #[error("Session parameters must be sent in the first request")]
    ParamsAfterFirstRequest,

    #[error("Election rejected: {0}")]
    Election(String),

    #[error("Unknown network instance: {0}")]
    UnknownNetworkInstance(String),

    #[error("Flush rejected: {0}")]
    FlushRejected(String),

    #[error("Session closed")]
    SessionClosed,
}

/// Result type for responder operations.
pub type Result<T> = std::result::Result<T, ServerError>;
