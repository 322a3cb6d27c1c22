//! Session parameters negotiated at the start of a `Modify` stream.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ProtocolError, Result};

/// How the responder arbitrates between multiple clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedundancyMode {
    /// Every client may program; no election.
    #[default]
    AllPrimary,
    /// Only the client with the highest election id may program.
    SingleElectedPrimary,
}

/// What happens to a client's entries when its session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Persistence {
    /// Entries owned by the client are removed on disconnect.
    #[default]
    Delete,
    /// Entries survive the disconnect.
    Preserve,
}

impl fmt::Display for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Persistence::Delete => write!(f, "DELETE"),
            Persistence::Preserve => write!(f, "PRESERVE"),
        }
    }
}

/// Which acknowledgments the client wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckType {
    /// Acknowledge once the entry is in the RIB.
    #[default]
    Rib,
    /// Acknowledge once the entry is in the hardware forwarding table.
    RibAndFib,
}

/// Parameters of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SessionParameters {
    pub redundancy: RedundancyMode,
    pub persistence: Persistence,
    pub ack_type: AckType,
}

impl SessionParameters {
    /// Checks the combination is allowed.
    ///
    /// Preserving state across disconnects only makes sense when a single
    /// elected client owns the state.
    pub fn validate(&self) -> Result<()> {
        if self.persistence == Persistence::Preserve
            && self.redundancy != RedundancyMode::SingleElectedPrimary
        {
            return Err(ProtocolError::InvalidParameters(
                "PRESERVE persistence requires SINGLE_ELECTED_PRIMARY redundancy".to_string(),
            ));
        }
        Ok(())
    }
}

/// A 128-bit election id, compared as `(high, low)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ElectionId {
    pub high: u64,
    pub low: u64,
}

impl ElectionId {
    /// Note the argument order: low word first, as clients usually write it.
    pub const fn new(low: u64, high: u64) -> Self {
        Self { high, low }
    }

    pub fn as_u128(&self) -> u128 {
        (u128::from(self.high) << 64) | u128::from(self.low)
    }

    pub fn is_zero(&self) -> bool {
        self.high == 0 && self.low == 0
    }

    /// Election ids must be non-zero when presented.
    pub fn validate(&self) -> Result<()> {
        if self.is_zero() {
            return Err(ProtocolError::InvalidElectionId(
                "election id must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The next id above this one.
    pub fn increment(&self) -> Self {
        let v = self.as_u128().wrapping_add(1);
        Self {
            high: (v >> 64) as u64,
            low: v as u64,
        }
    }
}

impl PartialOrd for ElectionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElectionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_u128().cmp(&other.as_u128())
    }
}

impl fmt::Display for ElectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.high, self.low)
    }
}
