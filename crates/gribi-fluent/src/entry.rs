//! Fluent builders for AFT entries.
//!
//! ```ignore
//! let nh = fluent::next_hop_entry()
//!     .with_network_instance("DEFAULT")
//!     .with_index(42)
//!     .with_ip_address("192.0.2.6");
//! ```
//!
//! Builders only check their inputs when the batch is sent, so a typo in an
//! address surfaces as a [`ClientError::InvalidEntry`] from `send()`.

use gribi_common::{
    AftEntry, Ipv4Entry, NextHopEntry, NextHopGroupEntry, DEFAULT_NETWORK_INSTANCE,
};
use gribi_types::{IpAddress, IpPrefix};
use std::collections::BTreeMap;

use crate::error::{ClientError, Result};

/// Something that can be turned into an AFT entry of a network instance.
pub trait EntryBuilder {
    fn build(&self) -> Result<(String, AftEntry)>;
}

fn network_instance(ni: &Option<String>) -> String {
    ni.clone()
        .unwrap_or_else(|| DEFAULT_NETWORK_INSTANCE.to_string())
}

pub fn next_hop_entry() -> NextHopEntryBuilder {
    NextHopEntryBuilder::default()
}

pub fn next_hop_group_entry() -> NextHopGroupEntryBuilder {
    NextHopGroupEntryBuilder::default()
}

pub fn ipv4_entry() -> Ipv4EntryBuilder {
    Ipv4EntryBuilder::default()
}

#[derive(Debug, Clone, Default)]
pub struct NextHopEntryBuilder {
    network_instance: Option<String>,
    index: Option<u64>,
    ip_address: Option<String>,
    interface: Option<String>,
}

impl NextHopEntryBuilder {
    pub fn with_network_instance(mut self, name: impl Into<String>) -> Self {
        self.network_instance = Some(name.into());
        self
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_ip_address(mut self, addr: impl Into<String>) -> Self {
        self.ip_address = Some(addr.into());
        self
    }

    pub fn with_interface_ref(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

impl EntryBuilder for NextHopEntryBuilder {
    fn build(&self) -> Result<(String, AftEntry)> {
        let index = self
            .index
            .ok_or_else(|| ClientError::InvalidEntry("next-hop index not set".to_string()))?;
        let mut nh = NextHopEntry::new(index);
        if let Some(ref addr) = self.ip_address {
            let ip: IpAddress = addr.parse().map_err(|e| {
                ClientError::InvalidEntry(format!("next-hop {}: {}", index, e))
            })?;
            nh = nh.with_ip_address(ip);
        }
        if let Some(ref interface) = self.interface {
            nh = nh.with_interface(interface.clone());
        }
        Ok((network_instance(&self.network_instance), nh.into()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NextHopGroupEntryBuilder {
    network_instance: Option<String>,
    id: Option<u64>,
    next_hops: BTreeMap<u64, u64>,
}

impl NextHopGroupEntryBuilder {
    pub fn with_network_instance(mut self, name: impl Into<String>) -> Self {
        self.network_instance = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn add_next_hop(mut self, index: u64, weight: u64) -> Self {
        self.next_hops.insert(index, weight);
        self
    }
}

impl EntryBuilder for NextHopGroupEntryBuilder {
    fn build(&self) -> Result<(String, AftEntry)> {
        let id = self.id.ok_or_else(|| {
            ClientError::InvalidEntry("next-hop-group id not set".to_string())
        })?;
        let group = self
            .next_hops
            .iter()
            .fold(NextHopGroupEntry::new(id), |g, (index, weight)| {
                g.add_next_hop(*index, *weight)
            });
        Ok((network_instance(&self.network_instance), group.into()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ipv4EntryBuilder {
    network_instance: Option<String>,
    prefix: Option<String>,
    next_hop_group: Option<u64>,
}

impl Ipv4EntryBuilder {
    pub fn with_network_instance(mut self, name: impl Into<String>) -> Self {
        self.network_instance = Some(name.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_next_hop_group(mut self, id: u64) -> Self {
        self.next_hop_group = Some(id);
        self
    }
}

impl EntryBuilder for Ipv4EntryBuilder {
    fn build(&self) -> Result<(String, AftEntry)> {
        let raw = self
            .prefix
            .as_deref()
            .ok_or_else(|| ClientError::InvalidEntry("ipv4-entry prefix not set".to_string()))?;
        let prefix: IpPrefix = raw
            .parse()
            .map_err(|e| ClientError::InvalidEntry(format!("ipv4-entry {}: {}", raw, e)))?;
        // Deletes name only the prefix; 0 is never a valid group id.
        let nhg = self.next_hop_group.unwrap_or(0);
        Ok((
            network_instance(&self.network_instance),
            Ipv4Entry::new(prefix, nhg).into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gribi_common::EntryKey;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_next_hop_builder() {
        let (ni, entry) = next_hop_entry()
            .with_network_instance("default")
            .with_index(42)
            .with_ip_address("192.0.2.6")
            .build()
            .unwrap();
        assert_eq!(ni, "default");
        assert_eq!(entry.key(), EntryKey::NextHop(42));
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn test_group_builder_defaults_network_instance() {
        let (ni, entry) = next_hop_group_entry()
            .with_id(10)
            .add_next_hop(42, 1)
            .build()
            .unwrap();
        assert_eq!(ni, DEFAULT_NETWORK_INSTANCE);
        match entry {
            AftEntry::NextHopGroup(g) => assert_eq!(g.total_weight(), 1),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(next_hop_entry().build().is_err());
        assert!(next_hop_entry()
            .with_index(1)
            .with_ip_address("192.0.2")
            .build()
            .is_err());
        assert!(ipv4_entry().with_prefix("203.0.113.0/33").build().is_err());
        assert!(next_hop_group_entry().add_next_hop(1, 1).build().is_err());
    }
}
