//! Client error types.

use gribi_aft::ServerError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by the fluent client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("No stub configured for the connection")]
    NoStub,

    #[error("Client not started")]
    NotStarted,

    #[error("Invalid connection options: {0}")]
    InvalidConnection(String),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Timed out after {timeout:?} with {pending} acknowledgments outstanding")]
    AwaitTimeout { timeout: Duration, pending: usize },

    #[error("Session parameters rejected: {0}")]
    ParamsRejected(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Session closed by the server")]
    SessionClosed,

    #[error("RPC failed: {0}")]
    Rpc(#[from] ServerError),
}

impl ClientError {
    /// True for the bounded-wait expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::AwaitTimeout { .. })
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
