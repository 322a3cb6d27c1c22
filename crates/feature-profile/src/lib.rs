//! Feature profiles.
//!
//! A feature profile lists the configuration and telemetry paths a feature
//! needs from a device, and the other profiles it builds on. Profiles live in
//! `<feature>/feature.textproto` files:
//!
//! ```text
//! id { name: "bgp" version: 1 }
//! config_path { path: "/network-instances/network-instance/protocols/protocol/bgp/global/config/as" }
//! telemetry_path { path: "/network-instances/network-instance/protocols/protocol/bgp/global/state/as" }
//! feature_profile_dependency { name: "interfaces" version: 1 }
//! ```

pub mod bundled;
mod error;
pub mod path;
mod profile;
mod registry;
pub mod textproto;

pub use error::{ProfileError, Result};
pub use profile::{FeatureId, FeatureProfile, SupportReport};
pub use registry::{ProfileRegistry, PROFILE_FILE_NAME};
