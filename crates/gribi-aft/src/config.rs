//! Responder configuration.

use gribi_common::DEFAULT_NETWORK_INSTANCE;
use std::collections::BTreeSet;

/// Configuration for a [`GribiServer`](crate::GribiServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Whether the device can confirm hardware programming. When false,
    /// sessions requesting RIB_AND_FIB acknowledgments are rejected.
    pub fib_ack_supported: bool,
    /// Name of the default network instance.
    pub default_network_instance: String,
    /// Additional (non-default) network instances.
    pub network_instances: Vec<String>,
    /// Maximum number of entries of one kind per network instance.
    pub max_entries_per_table: usize,
    /// Depth of the per-session request channel.
    pub channel_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fib_ack_supported: true,
            default_network_instance: DEFAULT_NETWORK_INSTANCE.to_string(),
            network_instances: Vec::new(),
            max_entries_per_table: 16 * 1024,
            channel_depth: 64,
        }
    }
}

impl ServerConfig {
    pub fn with_default_network_instance(mut self, name: impl Into<String>) -> Self {
        self.default_network_instance = name.into();
        self
    }

    pub fn with_fib_ack_supported(mut self, supported: bool) -> Self {
        self.fib_ack_supported = supported;
        self
    }

    pub fn with_network_instance(mut self, name: impl Into<String>) -> Self {
        self.network_instances.push(name.into());
        self
    }

    /// All network instances known to the device, default included.
    pub fn all_network_instances(&self) -> BTreeSet<String> {
        let mut all: BTreeSet<String> = self.network_instances.iter().cloned().collect();
        all.insert(self.default_network_instance.clone());
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_instance_always_known() {
        let config = ServerConfig::default()
            .with_default_network_instance("default")
            .with_network_instance("VRF-A");
        let all: Vec<_> = config.all_network_instances().into_iter().collect();
        assert_eq!(all, vec!["VRF-A".to_string(), "default".to_string()]);
    }
}
