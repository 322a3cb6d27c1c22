//! Fluent gRIBI client.
//!
//! Builds AFT entries, submits them as ordered batches on a `Modify` stream,
//! and collects one acknowledgment per operation:
//!
//! ```ignore
//! let mut c = GribiClient::new();
//! c.connection()
//!     .with_stub(server)
//!     .with_redundancy_mode(RedundancyMode::SingleElectedPrimary)
//!     .with_initial_election_id(1, 0)
//!     .with_fib_ack();
//! c.start()?;
//! c.start_sending().await?;
//! c.await_timeout(Duration::from_secs(120)).await?;
//!
//! c.modify()
//!     .add_entry(next_hop_entry().with_index(42).with_ip_address("192.0.2.6"))
//!     .add_entry(next_hop_group_entry().with_id(10).add_next_hop(42, 1))
//!     .send()
//!     .await?;
//! c.await_timeout(Duration::from_secs(120)).await?;
//! chk::has_result(c.results(), &operation_result().with_operation_id(1).as_result())?;
//! ```

pub mod chk;
mod client;
mod entry;
mod error;
mod result;

pub use client::{Connection, Flush, GribiClient, Modify};
pub use entry::{
    ipv4_entry, next_hop_entry, next_hop_group_entry, EntryBuilder, Ipv4EntryBuilder,
    NextHopEntryBuilder, NextHopGroupEntryBuilder,
};
pub use error::{ClientError, Result};
pub use result::{operation_result, OpResult, OperationResultBuilder};
