//! AFT operations, modify batches, and the responder's pending queue.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::entry::{AftEntry, EntryKey};
use crate::session::{ElectionId, SessionParameters};

/// Operation type carried by an [`AftOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    /// Add the entry, implicitly replacing an existing one with the same key.
    Add,
    /// Replace an entry that must already exist.
    Replace,
    /// Delete an entry that must exist and be unreferenced.
    Delete,
}

impl OperationType {
    pub fn is_delete(&self) -> bool {
        matches!(self, OperationType::Delete)
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationType::Add => write!(f, "ADD"),
            OperationType::Replace => write!(f, "REPLACE"),
            OperationType::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single route-programming operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AftOperation {
    /// Client-assigned id, unique and increasing within a session.
    pub id: u64,
    pub network_instance: String,
    pub op: OperationType,
    pub entry: AftEntry,
    pub election_id: Option<ElectionId>,
}

impl AftOperation {
    pub fn new(
        id: u64,
        network_instance: impl Into<String>,
        op: OperationType,
        entry: impl Into<AftEntry>,
    ) -> Self {
        Self {
            id,
            network_instance: network_instance.into(),
            op,
            entry: entry.into(),
            election_id: None,
        }
    }

    pub fn with_election_id(mut self, election_id: ElectionId) -> Self {
        self.election_id = Some(election_id);
        self
    }

    pub fn key(&self) -> EntryKey {
        self.entry.key()
    }
}

impl fmt::Display for AftOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} in {}",
            self.id,
            self.op,
            self.key(),
            self.network_instance
        )
    }
}

/// One message on the `Modify` stream from client to responder.
///
/// The operations of one request form a batch that is submitted atomically:
/// the responder enqueues all of them before processing any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub params: Option<SessionParameters>,
    pub election_id: Option<ElectionId>,
    pub operations: Vec<AftOperation>,
}

impl ModifyRequest {
    pub fn with_params(mut self, params: SessionParameters) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_election_id(mut self, election_id: ElectionId) -> Self {
        self.election_id = Some(election_id);
        self
    }

    pub fn with_operations(mut self, operations: Vec<AftOperation>) -> Self {
        self.operations = operations;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_none() && self.election_id.is_none() && self.operations.is_empty()
    }
}

/// Pending operations awaiting processing, in submission order.
///
/// Unlike a table consumer that collapses repeated writes to one key, this
/// queue keeps every operation: an add, delete and add of the same prefix are
/// three operations that each need their own acknowledgment.
#[derive(Debug, Default)]
pub struct OperationQueue {
    pending: VecDeque<AftOperation>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Appends a whole batch.
    pub fn push_batch(&mut self, operations: impl IntoIterator<Item = AftOperation>) {
        self.pending.extend(operations);
    }

    /// Takes every pending operation, oldest first.
    pub fn drain(&mut self) -> Vec<AftOperation> {
        self.pending.drain(..).collect()
    }

    pub fn peek(&self) -> impl Iterator<Item = &AftOperation> {
        self.pending.iter()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Dumps pending operations for debugging.
    pub fn dump(&self) -> Vec<String> {
        self.pending.iter().map(|op| op.to_string()).collect()
    }
}
