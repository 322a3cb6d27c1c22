//! The device under test.
//!
//! A gRIBI responder over a simulated forwarding plane, plus the interface
//! configuration that gives the forwarding plane its connected subnets.

use gribi_aft::{AftState, ForwardingPlane, GribiServer, ServerConfig, SimulatedFib};
use gribi_types::Ipv4Address;
use log::info;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::attrs::Attributes;
use crate::config::Deviations;
use crate::error::{Result, SuiteError};

/// Test ports of the device and the interfaces behind them.
pub const DUT_PORTS: [(&str, &str); 2] = [("port1", "Ethernet0"), ("port2", "Ethernet4")];

/// Schema paths the simulated device implements.
const SUPPORTED_PATHS: &[&str] = &[
    "/interfaces/interface/config/name",
    "/interfaces/interface/config/description",
    "/interfaces/interface/config/type",
    "/interfaces/interface/config/enabled",
    "/interfaces/interface/subinterfaces/subinterface/ipv4/config/enabled",
    "/interfaces/interface/subinterfaces/subinterface/ipv4/addresses/address/config",
    "/network-instances/network-instance/afts",
];

pub const ETHERNET_CSMACD: &str = "ethernetCsmacd";

/// Configuration of one interface with an IPv4 address on subinterface 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub description: String,
    pub interface_type: String,
    /// Unset leaves the device default (enabled).
    pub enabled: Option<bool>,
    pub ipv4_enabled: Option<bool>,
    pub ipv4_address: Ipv4Address,
    pub ipv4_prefix_len: u8,
}

impl InterfaceConfig {
    /// Builds the config of `name` from endpoint attributes.
    ///
    /// With `explicit_enable`, the interface and its IPv4 subinterface are
    /// enabled explicitly instead of relying on the device default.
    pub fn from_attrs(name: &str, attrs: &Attributes, explicit_enable: bool) -> Result<Self> {
        let enabled = explicit_enable.then_some(true);
        Ok(Self {
            name: name.to_string(),
            description: attrs.desc.to_string(),
            interface_type: ETHERNET_CSMACD.to_string(),
            enabled,
            ipv4_enabled: enabled,
            ipv4_address: attrs.ipv4_addr()?,
            ipv4_prefix_len: attrs.ipv4_len,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true) && self.ipv4_enabled.unwrap_or(true)
    }
}

pub struct Dut {
    server: GribiServer,
    fib: Arc<SimulatedFib>,
    ports: BTreeMap<String, String>,
    interfaces: BTreeMap<String, InterfaceConfig>,
}

impl Dut {
    pub fn new(deviations: &Deviations) -> Self {
        let config = ServerConfig::default()
            .with_default_network_instance(deviations.default_network_instance.clone())
            .with_fib_ack_supported(!deviations.gribi_rib_ack_only);
        let fib = Arc::new(SimulatedFib::new());
        let forwarding: Arc<dyn ForwardingPlane> = fib.clone();
        Self {
            server: GribiServer::new(config, forwarding),
            fib,
            ports: DUT_PORTS
                .iter()
                .map(|(port, intf)| (port.to_string(), intf.to_string()))
                .collect(),
            interfaces: BTreeMap::new(),
        }
    }

    /// The gRIBI responder; clones share its state.
    pub fn server(&self) -> &GribiServer {
        &self.server
    }

    pub fn fib(&self) -> &SimulatedFib {
        &self.fib
    }

    /// Interface name behind a test port.
    pub fn port(&self, id: &str) -> Result<&str> {
        self.ports
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| SuiteError::Testbed(format!("DUT has no port {}", id)))
    }

    /// Test port an interface belongs to.
    pub fn port_of(&self, interface: &str) -> Option<&str> {
        self.ports
            .iter()
            .find(|(_, name)| *name == interface)
            .map(|(port, _)| port.as_str())
    }

    /// Replaces the whole configuration of an interface.
    pub fn replace_interface(&mut self, config: InterfaceConfig) -> Result<()> {
        if self.port_of(&config.name).is_none() {
            return Err(SuiteError::Testbed(format!(
                "DUT has no interface {}",
                config.name
            )));
        }
        self.fib
            .configure_interface(
                &config.name,
                config.ipv4_address,
                config.ipv4_prefix_len,
                config.is_enabled(),
            )
            .map_err(|e| SuiteError::Testbed(e.to_string()))?;
        info!(
            "Dut: interface {} replaced ({}/{}, {:?})",
            config.name, config.ipv4_address, config.ipv4_prefix_len, config.description
        );
        self.interfaces.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceConfig> {
        self.interfaces.get(name)
    }

    /// AFT telemetry of a network instance.
    pub async fn aft_state(&self, network_instance: &str) -> AftState {
        self.server.aft_state(network_instance).await
    }

    pub fn supported_paths(&self) -> BTreeSet<String> {
        SUPPORTED_PATHS.iter().map(|p| p.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::{DUT_DST, DUT_SRC};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_interface_config_from_attrs() {
        let config = InterfaceConfig::from_attrs("Ethernet0", &DUT_SRC, false).unwrap();
        assert_eq!(config.description, "DUT to ATE source");
        assert_eq!(config.interface_type, ETHERNET_CSMACD);
        assert_eq!(config.enabled, None);
        assert!(config.is_enabled());

        let config = InterfaceConfig::from_attrs("Ethernet0", &DUT_SRC, true).unwrap();
        assert_eq!(config.enabled, Some(true));
        assert_eq!(config.ipv4_enabled, Some(true));
    }

    #[test]
    fn test_replace_interface_configures_fib() {
        let mut dut = Dut::new(&Deviations::default());
        let name = dut.port("port2").unwrap().to_string();
        dut.replace_interface(InterfaceConfig::from_attrs(&name, &DUT_DST, false).unwrap())
            .unwrap();

        let interfaces = dut.fib().interfaces();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0].name, "Ethernet4");
        assert_eq!(interfaces[0].prefix.to_string(), "192.0.2.5/30");
        assert_eq!(dut.port_of("Ethernet4"), Some("port2"));
        assert!(dut.interface("Ethernet4").is_some());
    }

    #[test]
    fn test_unknown_port_and_interface() {
        let mut dut = Dut::new(&Deviations::default());
        assert!(dut.port("port9").is_err());
        let config = InterfaceConfig::from_attrs("Ethernet99", &DUT_SRC, false).unwrap();
        assert!(matches!(
            dut.replace_interface(config),
            Err(SuiteError::Testbed(_))
        ));
    }

    #[test]
    fn test_rib_ack_only_device() {
        let deviations = Deviations {
            gribi_rib_ack_only: true,
            ..Deviations::default()
        };
        let dut = Dut::new(&deviations);
        assert!(!dut.server().config().fib_ack_supported);
    }
}
