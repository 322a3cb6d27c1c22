//! The traffic generator.
//!
//! Interfaces sit on ATE ports linked to DUT ports; networks sit behind
//! interfaces. A flow sends frames from a source interface to every address
//! of a destination network, cycling through them. Each frame is handed to
//! the interface's gateway on the DUT and forwarded by the DUT's FIB.

use gribi_types::{IpAddress, IpPrefix, Ipv4Address};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Instant;

use crate::attrs::Attributes;
use crate::dut::Dut;
use crate::error::{Result, SuiteError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AteInterface {
    pub name: String,
    pub port: String,
    pub ipv4_address: Ipv4Address,
    pub ipv4_prefix_len: u8,
    pub gateway: Ipv4Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AteNetwork {
    pub name: String,
    /// Interface the network is reachable through.
    pub interface: String,
    pub prefix: IpPrefix,
}

/// Interfaces and networks emulated by the ATE.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    interfaces: BTreeMap<String, AteInterface>,
    networks: BTreeMap<String, AteNetwork>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an interface on `port` addressed by `attrs`, with the address of
    /// `gateway` as its default gateway.
    pub fn add_interface(
        &mut self,
        attrs: &Attributes,
        port: &str,
        gateway: &Attributes,
    ) -> Result<()> {
        let intf = AteInterface {
            name: attrs.name.to_string(),
            port: port.to_string(),
            ipv4_address: attrs.ipv4_addr()?,
            ipv4_prefix_len: attrs.ipv4_len,
            gateway: gateway.ipv4_addr()?,
        };
        self.interfaces.insert(intf.name.clone(), intf);
        Ok(())
    }

    /// Adds a network behind an existing interface.
    pub fn add_network(&mut self, interface: &str, name: &str, cidr: &str) -> Result<()> {
        if !self.interfaces.contains_key(interface) {
            return Err(SuiteError::Testbed(format!(
                "network {} references unknown interface {}",
                name, interface
            )));
        }
        let prefix: IpPrefix = cidr
            .parse()
            .map_err(|e| SuiteError::Testbed(format!("network {}: {}", name, e)))?;
        if !prefix.is_ipv4() {
            return Err(SuiteError::Testbed(format!(
                "network {}: only IPv4 networks are supported",
                name
            )));
        }
        let network = AteNetwork {
            name: name.to_string(),
            interface: interface.to_string(),
            prefix: prefix.network(),
        };
        self.networks.insert(network.name.clone(), network);
        Ok(())
    }

    pub fn interface(&self, name: &str) -> Option<&AteInterface> {
        self.interfaces.get(name)
    }

    pub fn interface_on_port(&self, port: &str) -> Option<&AteInterface> {
        self.interfaces.values().find(|i| i.port == port)
    }

    pub fn network(&self, name: &str) -> Option<&AteNetwork> {
        self.networks.get(name)
    }

    /// True when `dst` is the address of `intf` or lies in a network behind it.
    fn owns(&self, intf: &AteInterface, dst: Ipv4Address) -> bool {
        dst == intf.ipv4_address
            || self
                .networks
                .values()
                .filter(|n| n.interface == intf.name)
                .any(|n| n.prefix.contains(&IpAddress::V4(dst)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Flow {
    name: String,
    src_interface: String,
    dst_network: String,
}

/// Counters of one flow, as of the last stop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowStats {
    pub name: String,
    pub tx_frames: u64,
    pub rx_frames: u64,
}

impl FlowStats {
    /// Share of transmitted frames not received, 0-100. A flow that sent
    /// nothing counts as fully lost.
    pub fn loss_pct(&self) -> f64 {
        if self.tx_frames == 0 {
            return 100.0;
        }
        let lost = self.tx_frames.saturating_sub(self.rx_frames);
        lost as f64 * 100.0 / self.tx_frames as f64
    }
}

pub struct Ate {
    /// ATE port to DUT port.
    links: BTreeMap<String, String>,
    topology: Topology,
    flows: BTreeMap<String, Flow>,
    stats: BTreeMap<String, FlowStats>,
    rate_pps: u64,
    started: Option<Instant>,
}

impl Ate {
    pub fn new<'a>(links: impl IntoIterator<Item = (&'a str, &'a str)>, rate_pps: u64) -> Self {
        Self {
            links: links
                .into_iter()
                .map(|(ate, dut)| (ate.to_string(), dut.to_string()))
                .collect(),
            topology: Topology::new(),
            flows: BTreeMap::new(),
            stats: BTreeMap::new(),
            rate_pps,
            started: None,
        }
    }

    /// Installs a topology; every interface must sit on a linked port.
    pub fn push_topology(&mut self, topology: Topology) -> Result<()> {
        if let Some(intf) = topology
            .interfaces
            .values()
            .find(|i| !self.links.contains_key(&i.port))
        {
            return Err(SuiteError::Testbed(format!(
                "interface {} is on unlinked ATE port {}",
                intf.name, intf.port
            )));
        }
        info!(
            "Ate: topology pushed ({} interfaces, {} networks)",
            topology.interfaces.len(),
            topology.networks.len()
        );
        self.topology = topology;
        Ok(())
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Defines a flow from an interface to a network. Redefining a flow
    /// replaces it.
    pub fn new_flow(&mut self, name: &str, src_interface: &str, dst_network: &str) -> Result<()> {
        if self.topology.interface(src_interface).is_none() {
            return Err(SuiteError::Traffic(format!(
                "flow {}: unknown source interface {}",
                name, src_interface
            )));
        }
        if self.topology.network(dst_network).is_none() {
            return Err(SuiteError::Traffic(format!(
                "flow {}: unknown destination network {}",
                name, dst_network
            )));
        }
        self.flows.insert(
            name.to_string(),
            Flow {
                name: name.to_string(),
                src_interface: src_interface.to_string(),
                dst_network: dst_network.to_string(),
            },
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn start_traffic(&mut self) -> Result<()> {
        if self.started.is_some() {
            return Err(SuiteError::Traffic("traffic already running".to_string()));
        }
        if self.flows.is_empty() {
            return Err(SuiteError::Traffic("no flows defined".to_string()));
        }
        info!("Ate: starting {} flows", self.flows.len());
        self.started = Some(Instant::now());
        Ok(())
    }

    /// Stops traffic and forwards every frame sent since the start through
    /// `dut`, updating flow counters.
    pub fn stop_traffic(&mut self, dut: &Dut) -> Result<()> {
        let started = self
            .started
            .take()
            .ok_or_else(|| SuiteError::Traffic("traffic not running".to_string()))?;
        let elapsed = started.elapsed().as_secs_f64();
        let frames = ((self.rate_pps as f64 * elapsed).ceil() as u64).max(1);

        let flows: Vec<Flow> = self.flows.values().cloned().collect();
        for flow in flows {
            let stats = self.run_flow(dut, &flow, frames)?;
            info!(
                "Ate: flow {} tx={} rx={} loss={}%",
                stats.name,
                stats.tx_frames,
                stats.rx_frames,
                stats.loss_pct()
            );
            self.stats.insert(flow.name.clone(), stats);
        }
        Ok(())
    }

    pub fn flow_stats(&self, name: &str) -> Option<&FlowStats> {
        self.stats.get(name)
    }

    pub fn flow_loss_pct(&self, name: &str) -> Option<f64> {
        self.stats.get(name).map(FlowStats::loss_pct)
    }

    fn run_flow(&self, dut: &Dut, flow: &Flow, frames: u64) -> Result<FlowStats> {
        let src = self.topology.interface(&flow.src_interface).ok_or_else(|| {
            SuiteError::Traffic(format!("flow {}: source interface vanished", flow.name))
        })?;
        let network = self.topology.network(&flow.dst_network).ok_or_else(|| {
            SuiteError::Traffic(format!("flow {}: destination network vanished", flow.name))
        })?;

        let rx_frames = network
            .prefix
            .hosts_v4()
            .cycle()
            .take(frames as usize)
            .filter(|dst| self.deliver(dut, src, *dst))
            .count() as u64;

        Ok(FlowStats {
            name: flow.name.clone(),
            tx_frames: frames,
            rx_frames,
        })
    }

    /// Sends one frame from `src` towards `dst`; true if an ATE interface
    /// that owns `dst` receives it.
    fn deliver(&self, dut: &Dut, src: &AteInterface, dst: Ipv4Address) -> bool {
        let Some(ingress) = self
            .links
            .get(&src.port)
            .and_then(|port| dut.port(port).ok())
            .and_then(|name| dut.interface(name))
        else {
            return false;
        };
        if !ingress.is_enabled() || ingress.ipv4_address != src.gateway {
            return false;
        }

        let ni = &dut.server().config().default_network_instance;
        let Some(decision) = dut.fib().lookup(ni, dst) else {
            debug!("Ate: no route to {}", dst);
            return false;
        };
        let Some(egress) = dut
            .port_of(&decision.interface)
            .and_then(|dut_port| {
                self.links
                    .iter()
                    .find(|(_, linked)| linked.as_str() == dut_port)
            })
            .and_then(|(ate_port, _)| self.topology.interface_on_port(ate_port))
        else {
            return false;
        };

        let handed_over = decision.next_hop == IpAddress::V4(egress.ipv4_address)
            || decision.next_hop == IpAddress::V4(dst);
        handed_over && self.topology.owns(egress, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::{ATE_DST, ATE_DST_NET_CIDR, ATE_DST_NET_NAME, ATE_SRC, DUT_DST, DUT_SRC};
    use pretty_assertions::assert_eq;

    fn topology() -> Topology {
        let mut top = Topology::new();
        top.add_interface(&ATE_SRC, "port1", &DUT_SRC).unwrap();
        top.add_interface(&ATE_DST, "port2", &DUT_DST).unwrap();
        top.add_network(ATE_DST.name, ATE_DST_NET_NAME, ATE_DST_NET_CIDR)
            .unwrap();
        top
    }

    #[test]
    fn test_topology_lookup() {
        let top = topology();
        assert_eq!(top.interface("ateSrc").unwrap().gateway, DUT_SRC.ipv4_addr().unwrap());
        assert_eq!(top.interface_on_port("port2").unwrap().name, "dst");
        let net = top.network("dstnet").unwrap();
        assert_eq!(net.interface, "dst");
        assert!(top.owns(top.interface("dst").unwrap(), "203.0.113.9".parse().unwrap()));
        assert!(!top.owns(top.interface("ateSrc").unwrap(), "203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_network_needs_interface() {
        let mut top = Topology::new();
        assert!(top.add_network("dst", "dstnet", ATE_DST_NET_CIDR).is_err());
        top.add_interface(&ATE_DST, "port2", &DUT_DST).unwrap();
        assert!(top.add_network("dst", "v6", "2001:db8::/32").is_err());
    }

    #[test]
    fn test_push_topology_needs_links() {
        let mut ate = Ate::new([("port1", "port1")], 100);
        assert!(matches!(
            ate.push_topology(topology()),
            Err(SuiteError::Testbed(_))
        ));
    }

    #[test]
    fn test_flow_validation_and_start_stop_state() {
        let mut ate = Ate::new([("port1", "port1"), ("port2", "port2")], 100);
        ate.push_topology(topology()).unwrap();
        assert!(ate.start_traffic().is_err());
        assert!(ate.new_flow("Flow", "nowhere", "dstnet").is_err());
        assert!(ate.new_flow("Flow", "ateSrc", "nowhere").is_err());
        ate.new_flow("Flow", "ateSrc", "dstnet").unwrap();
        ate.start_traffic().unwrap();
        assert!(ate.is_running());
        assert!(ate.start_traffic().is_err());
    }

    #[test]
    fn test_loss_pct() {
        let stats = FlowStats {
            name: "Flow".to_string(),
            tx_frames: 200,
            rx_frames: 150,
        };
        assert_eq!(stats.loss_pct(), 25.0);
        assert_eq!(FlowStats::default().loss_pct(), 100.0);
    }
}
