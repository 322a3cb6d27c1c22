//! AFT tables and the orchestrator that programs them.

mod orch;
mod types;

pub use orch::{
    AftOrch, AftOrchConfig, AftOrchStats, ForwardingError, ForwardingPlane, ProgramContext,
    RemovalSummary,
};
pub use types::{ClientId, InstalledEntry, NetworkInstanceAft, Programmed};
