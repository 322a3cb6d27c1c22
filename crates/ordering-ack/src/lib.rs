//! gRIBI ordering and acknowledgment conformance suite.
//!
//! Drives a simulated device (gRIBI responder over a simulated forwarding
//! plane) and traffic generator through four cases:
//!
//! - **Modify NHG**: a next-hop and a next-hop-group in one batch are both
//!   acknowledged as installed and the group's weights appear in telemetry.
//! - **Modify IPv4 and NHG**: an IPv4 entry referencing a group defined later
//!   in the same batch fails; the other operations succeed.
//! - **Modify NHG and IPv4**: the same entries in dependency order all
//!   install, and traffic to 203.0.113.0/24 is forwarded without loss.
//! - **Modify IPv4 Add Del Add**: add, delete and add of one prefix in a batch
//!   yields three acknowledgments and leaves the prefix installed.
//!
//! Each case runs with its own client under both persistence modes.

pub mod ate;
pub mod attrs;
pub mod cases;
pub mod config;
pub mod dut;
mod error;
pub mod report;
pub mod suite;
pub mod testbed;

pub use cases::Case;
pub use config::SuiteConfig;
pub use error::{Result, SuiteError};
pub use report::{CaseOutcome, CaseReport, SuiteReport};
pub use suite::{Suite, ALL_PERSISTENCE};
pub use testbed::Testbed;
