//! In-process gRIBI responder.
//!
//! This crate plays the device side of a gRIBI session:
//!
//! - [`AftOrch`]: applies operations to per-network-instance AFT tables in
//!   submission order, rejecting forward references and deletes of entries
//!   that are still in use
//! - [`GribiServer`]: session negotiation, election, persistence, `Flush`,
//!   `Get` and AFT state snapshots
//! - [`SimulatedFib`]: a [`ForwardingPlane`] that records programmed state and
//!   answers forwarding lookups
//!
//! Clients reach the server through the [`GribiStub`] trait; a `Modify` stream
//! is a pair of tokio channels served by a task per session.

mod aft;
mod config;
mod error;
mod fib;
mod server;
mod session;
mod state;

pub use aft::{
    AftOrch, AftOrchConfig, AftOrchStats, ClientId, ForwardingError, ForwardingPlane,
    InstalledEntry, NetworkInstanceAft, ProgramContext, Programmed, RemovalSummary,
};
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use fib::{ConnectedInterface, ForwardingDecision, SimulatedFib};
pub use server::{GribiServer, GribiStub, ServerStream};
pub use state::{AftState, GetEntry, GetResponse, Ipv4EntryState, NextHopGroupState, NextHopState, NextHopWeight};
