//! Simulated forwarding plane.
//!
//! Holds what the responder pushed to hardware plus the device's connected
//! interfaces, and answers forwarding lookups for traffic verification.

use async_trait::async_trait;
use gribi_common::{Ipv4Entry, NextHopEntry, NextHopGroupEntry};
use gribi_types::{IpAddress, IpPrefix, Ipv4Address};
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aft::{ForwardingError, ForwardingPlane};

/// A layer-3 interface with a connected subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedInterface {
    pub name: String,
    pub address: Ipv4Address,
    /// The interface address with its prefix length.
    pub prefix: IpPrefix,
    pub enabled: bool,
}

/// Where the forwarding plane sends a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingDecision {
    /// Egress interface name.
    pub interface: String,
    /// Address the packet is handed to on the egress link.
    pub next_hop: IpAddress,
    /// The route that matched.
    pub matched: IpPrefix,
    /// False when the destination was reached through a connected subnet.
    pub programmed: bool,
}

#[derive(Debug, Default)]
struct FibTables {
    next_hops: BTreeMap<u64, NextHopEntry>,
    next_hop_groups: BTreeMap<u64, NextHopGroupEntry>,
    ipv4: BTreeMap<IpPrefix, u64>,
}

#[derive(Debug, Default)]
struct FibState {
    interfaces: BTreeMap<String, ConnectedInterface>,
    instances: BTreeMap<String, FibTables>,
    fail_next: u32,
}

impl FibState {
    fn take_injected_failure(&mut self) -> Result<(), ForwardingError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ForwardingError::Programming("injected failure".to_string()));
        }
        Ok(())
    }

    fn tables(&mut self, ni: &str) -> &mut FibTables {
        self.instances.entry(ni.to_string()).or_default()
    }

    fn connected_route(&self, dst: &IpAddress) -> Option<&ConnectedInterface> {
        self.interfaces
            .values()
            .filter(|i| i.enabled && i.prefix.contains(dst))
            .max_by_key(|i| i.prefix.prefix_len())
    }

    /// Resolves a next-hop to its egress interface.
    fn resolve(&self, nh: &NextHopEntry, dst: IpAddress) -> Option<(String, IpAddress)> {
        match (&nh.interface, nh.ip_address) {
            (Some(name), ip) => {
                let intf = self.interfaces.get(name).filter(|i| i.enabled)?;
                Some((intf.name.clone(), ip.unwrap_or(dst)))
            }
            (None, Some(ip)) => {
                let intf = self.connected_route(&ip)?;
                Some((intf.name.clone(), ip))
            }
            (None, None) => None,
        }
    }
}

/// An in-memory [`ForwardingPlane`].
#[derive(Debug, Default)]
pub struct SimulatedFib {
    state: Mutex<FibState>,
}

impl SimulatedFib {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a connected interface.
    pub fn configure_interface(
        &self,
        name: &str,
        address: Ipv4Address,
        prefix_len: u8,
        enabled: bool,
    ) -> Result<(), ForwardingError> {
        let prefix = IpPrefix::new(IpAddress::V4(address), prefix_len)
            .map_err(|e| ForwardingError::InvalidInterface(format!("{}: {}", name, e)))?;
        let intf = ConnectedInterface {
            name: name.to_string(),
            address,
            prefix,
            enabled,
        };
        debug!("SimulatedFib: interface {} {} enabled={}", name, prefix, enabled);
        self.state.lock().interfaces.insert(name.to_string(), intf);
        Ok(())
    }

    pub fn remove_interface(&self, name: &str) -> Option<ConnectedInterface> {
        self.state.lock().interfaces.remove(name)
    }

    pub fn interfaces(&self) -> Vec<ConnectedInterface> {
        self.state.lock().interfaces.values().cloned().collect()
    }

    /// Makes the next `count` programming calls fail.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Number of IPv4 routes programmed in a network instance.
    pub fn route_count(&self, ni: &str) -> usize {
        self.state
            .lock()
            .instances
            .get(ni)
            .map_or(0, |t| t.ipv4.len())
    }

    /// Forwards a packet to `dst` in network instance `ni`.
    ///
    /// The longest matching prefix wins between programmed routes and
    /// connected subnets. Among the members of a next-hop-group, a hash of the
    /// destination picks one in proportion to its weight.
    pub fn lookup(&self, ni: &str, dst: Ipv4Address) -> Option<ForwardingDecision> {
        let state = self.state.lock();
        let dst_ip = IpAddress::V4(dst);

        let programmed = state.instances.get(ni).and_then(|t| {
            t.ipv4
                .iter()
                .filter(|(p, _)| p.contains(&dst_ip))
                .max_by_key(|(p, _)| p.prefix_len())
                .map(|(p, nhg)| (*p, *nhg, t))
        });
        let connected = state.connected_route(&dst_ip);

        match (programmed, connected) {
            (Some((prefix, nhg_id, tables)), c)
                if c.map_or(true, |c| c.prefix.prefix_len() < prefix.prefix_len()) =>
            {
                let group = tables.next_hop_groups.get(&nhg_id)?;
                let index = pick_member(group, dst)?;
                let nh = tables.next_hops.get(&index)?;
                let (interface, next_hop) = state.resolve(nh, dst_ip)?;
                Some(ForwardingDecision {
                    interface,
                    next_hop,
                    matched: prefix,
                    programmed: true,
                })
            }
            (_, Some(c)) => Some(ForwardingDecision {
                interface: c.name.clone(),
                next_hop: dst_ip,
                matched: c.prefix.network(),
                programmed: false,
            }),
            (_, None) => None,
        }
    }
}

fn pick_member(group: &NextHopGroupEntry, dst: Ipv4Address) -> Option<u64> {
    let total = group.total_weight();
    if total == 0 {
        return None;
    }
    let hash = u64::from(dst.to_bits()).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32;
    let mut point = u128::from(hash) % total;
    for (index, weight) in &group.next_hops {
        let weight = u128::from(*weight);
        if point < weight {
            return Some(*index);
        }
        point -= weight;
    }
    None
}

#[async_trait]
impl ForwardingPlane for SimulatedFib {
    async fn program_next_hop(&self, ni: &str, next_hop: &NextHopEntry) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.take_injected_failure()?;
        state
            .tables(ni)
            .next_hops
            .insert(next_hop.index, next_hop.clone());
        Ok(())
    }

    async fn remove_next_hop(&self, ni: &str, index: u64) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.take_injected_failure()?;
        state.tables(ni).next_hops.remove(&index);
        Ok(())
    }

    async fn program_next_hop_group(
        &self,
        ni: &str,
        group: &NextHopGroupEntry,
    ) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.take_injected_failure()?;
        let tables = state.tables(ni);
        if let Some(missing) = group
            .next_hops
            .keys()
            .find(|index| !tables.next_hops.contains_key(index))
        {
            return Err(ForwardingError::MissingDependency(format!(
                "next-hop {}",
                missing
            )));
        }
        tables.next_hop_groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn remove_next_hop_group(&self, ni: &str, id: u64) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.take_injected_failure()?;
        state.tables(ni).next_hop_groups.remove(&id);
        Ok(())
    }

    async fn program_ipv4(&self, ni: &str, entry: &Ipv4Entry) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.take_injected_failure()?;
        let tables = state.tables(ni);
        if !tables.next_hop_groups.contains_key(&entry.next_hop_group) {
            return Err(ForwardingError::MissingDependency(format!(
                "next-hop-group {}",
                entry.next_hop_group
            )));
        }
        tables.ipv4.insert(entry.prefix, entry.next_hop_group);
        Ok(())
    }

    async fn remove_ipv4(&self, ni: &str, prefix: &IpPrefix) -> Result<(), ForwardingError> {
        let mut state = self.state.lock();
        state.take_injected_failure()?;
        state.tables(ni).ipv4.remove(prefix);
        Ok(())
    }
}
