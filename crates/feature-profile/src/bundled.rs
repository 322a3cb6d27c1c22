//! Profiles shipped with this crate.

use crate::error::Result;
use crate::profile::FeatureProfile;
use crate::registry::ProfileRegistry;

pub const BGP: &str = include_str!("../profiles/bgp/feature.textproto");
pub const INTERFACES: &str = include_str!("../profiles/interfaces/feature.textproto");

/// Registry holding every bundled profile.
pub fn registry() -> Result<ProfileRegistry> {
    let mut registry = ProfileRegistry::new();
    for text in [INTERFACES, BGP] {
        registry.insert(FeatureProfile::from_textproto(text)?)?;
    }
    Ok(registry)
}
