//! Acknowledgment types and programming failure reasons.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::entry::EntryKey;
use crate::operation::OperationType;
use crate::session::ElectionId;

/// Outcome reported for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgrammingResult {
    Failed,
    /// Accepted into the RIB; no hardware confirmation requested.
    InstalledInRib,
    /// Accepted into the RIB and programmed into the forwarding table.
    InstalledInFib,
}

impl ProgrammingResult {
    pub fn is_installed(&self) -> bool {
        !matches!(self, ProgrammingResult::Failed)
    }
}

impl fmt::Display for ProgrammingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgrammingResult::Failed => write!(f, "FAILED"),
            ProgrammingResult::InstalledInRib => write!(f, "RIB_PROGRAMMED"),
            ProgrammingResult::InstalledInFib => write!(f, "FIB_PROGRAMMED"),
        }
    }
}

/// Why an operation was not programmed.
///
/// Every variant is reported to the client as [`ProgrammingResult::Failed`];
/// the reason travels in [`AftResult::error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgrammingError {
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("{dependent} references {missing} which is not defined")]
    ForwardReference { dependent: EntryKey, missing: EntryKey },

    #[error("{key} is still referenced by {count} entries")]
    StillReferenced { key: EntryKey, count: u32 },

    #[error("{0} does not exist")]
    NotFound(EntryKey),

    #[error("operation id {id} is not greater than last id {last}")]
    InvalidOperationId { id: u64, last: u64 },

    #[error("client is not the elected primary: {0}")]
    NotPrimary(String),

    #[error("table full: {0}")]
    ResourceExhausted(String),

    #[error("forwarding plane rejected {key}: {message}")]
    ForwardingPlane { key: EntryKey, message: String },
}

impl ProgrammingError {
    pub fn invalid_entry(message: impl Into<String>) -> Self {
        ProgrammingError::InvalidEntry(message.into())
    }

    pub fn not_primary(message: impl Into<String>) -> Self {
        ProgrammingError::NotPrimary(message.into())
    }
}

/// Nanoseconds since the Unix epoch.
pub fn now_ns() -> i64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// The acknowledgment of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AftResult {
    pub id: u64,
    pub op: OperationType,
    pub key: EntryKey,
    pub result: ProgrammingResult,
    pub timestamp_ns: i64,
    pub error: Option<String>,
}

impl AftResult {
    pub fn installed(id: u64, op: OperationType, key: EntryKey, result: ProgrammingResult) -> Self {
        Self {
            id,
            op,
            key,
            result,
            timestamp_ns: now_ns(),
            error: None,
        }
    }

    pub fn failed(id: u64, op: OperationType, key: EntryKey, error: &ProgrammingError) -> Self {
        Self {
            id,
            op,
            key,
            result: ProgrammingResult::Failed,
            timestamp_ns: now_ns(),
            error: Some(error.to_string()),
        }
    }
}

impl fmt::Display for AftResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {} -> {}", self.id, self.op, self.key, self.result)?;
        if let Some(ref e) = self.error {
            write!(f, " ({})", e)?;
        }
        Ok(())
    }
}

/// Answer to the session parameters carried by the first request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionParamsResult {
    Ok,
    Error(String),
}

/// One message on the `Modify` stream from responder to client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyResponse {
    pub results: Vec<AftResult>,
    /// Highest election id known to the responder.
    pub election_id: Option<ElectionId>,
    pub session_params_result: Option<SessionParamsResult>,
    /// Stream-level error; the responder closes the stream after sending it.
    pub error: Option<String>,
}

impl ModifyResponse {
    pub fn with_results(results: Vec<AftResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn with_election_id(election_id: ElectionId) -> Self {
        Self {
            election_id: Some(election_id),
            ..Default::default()
        }
    }

    pub fn with_params_result(result: SessionParamsResult) -> Self {
        Self {
            session_params_result: Some(result),
            ..Default::default()
        }
    }

    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Which network instances a flush applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlushTarget {
    All,
    NetworkInstance(String),
}

/// Request to remove all programmed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushRequest {
    pub target: FlushTarget,
    /// Bypass the election check.
    pub election_override: bool,
    pub election_id: Option<ElectionId>,
}

/// Outcome of a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlushResult {
    Ok,
    /// Some entries could not be removed because something still used them.
    NonZeroReferenceRemain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushResponse {
    pub timestamp_ns: i64,
    pub result: FlushResult,
}
