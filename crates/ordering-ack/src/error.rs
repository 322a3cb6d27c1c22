//! Error types for the ordering/ACK suite

use feature_profile::ProfileError;
use gribi_fluent::ClientError;
use thiserror::Error;

/// Errors that stop a case or the whole suite.
///
/// Assertion failures inside a case are not errors; they are recorded in the
/// case report and the case continues.
#[derive(Error, Debug)]
pub enum SuiteError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Testbed setup error
    #[error("Testbed error: {0}")]
    Testbed(String),

    /// Traffic generator error
    #[error("Traffic error: {0}")]
    Traffic(String),

    /// gRIBI client error
    #[error("gRIBI client error: {0}")]
    Client(#[from] ClientError),

    /// Feature profile error
    #[error("Feature profile error: {0}")]
    Profile(#[from] ProfileError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for suite operations
pub type Result<T> = std::result::Result<T, SuiteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SuiteError::Testbed("unknown port port9".to_string());
        assert_eq!(err.to_string(), "Testbed error: unknown port port9");

        let err = SuiteError::from(ClientError::NotStarted);
        assert_eq!(err.to_string(), "gRIBI client error: Client not started");
    }
}
