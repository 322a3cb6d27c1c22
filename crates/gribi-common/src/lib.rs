//! gRIBI protocol data model shared by the responder and the client.
//!
//! This crate provides the types exchanged on a gRIBI `Modify` session and the
//! building blocks the responder uses to keep its tables consistent:
//!
//! - [`AftEntry`]: next-hop, next-hop-group and IPv4 entries, keyed by [`EntryKey`]
//! - [`AftOperation`] / [`ModifyRequest`]: ordered add/replace/delete batches
//! - [`OperationQueue`]: order-preserving pending queue (never merges operations)
//! - [`AftResult`] / [`ModifyResponse`]: per-operation acknowledgments
//! - [`SessionParameters`] / [`ElectionId`]: redundancy, persistence and ack mode
//! - [`RefTable`]: entries with holder counts; held keys cannot be removed
//!
//! # Ordering contract
//!
//! Operation ids are assigned by the client, starting at 1 and increasing
//! monotonically within a session. The responder processes a batch in
//! submission order and acknowledges each operation exactly once. An entry
//! may only reference entries defined by an earlier operation.

mod entry;
mod error;
mod operation;
mod ref_table;
mod result;
mod session;

pub use entry::{AftEntry, EntryKey, EntryKind, Ipv4Entry, NextHopEntry, NextHopGroupEntry};
pub use error::{ProtocolError, Result};
pub use operation::{AftOperation, ModifyRequest, OperationQueue, OperationType};
pub use ref_table::{RefTable, RefTableError, Referenced};
pub use result::{
    now_ns, AftResult, FlushRequest, FlushResponse, FlushResult, FlushTarget, ModifyResponse,
    ProgrammingError, ProgrammingResult, SessionParamsResult,
};
pub use session::{AckType, ElectionId, Persistence, RedundancyMode, SessionParameters};

/// Name of the default network instance when none is configured.
pub const DEFAULT_NETWORK_INSTANCE: &str = "DEFAULT";
