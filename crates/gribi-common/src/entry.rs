//! AFT entry types.
//!
//! Three entry kinds can be programmed through gRIBI. Each is identified by an
//! [`EntryKey`] within its network instance, and may reference entries of the
//! kind below it:
//!
//! ```text
//! Ipv4Entry ──next_hop_group──> NextHopGroupEntry ──next_hops──> NextHopEntry
//! ```

use gribi_types::{IpAddress, IpPrefix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ProtocolError, Result};

/// The kind of an AFT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    NextHop,
    NextHopGroup,
    Ipv4,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::NextHop => write!(f, "next-hop"),
            EntryKind::NextHopGroup => write!(f, "next-hop-group"),
            EntryKind::Ipv4 => write!(f, "ipv4-entry"),
        }
    }
}

/// Identity of the entity an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKey {
    NextHop(u64),
    NextHopGroup(u64),
    Ipv4(IpPrefix),
}

impl EntryKey {
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryKey::NextHop(_) => EntryKind::NextHop,
            EntryKey::NextHopGroup(_) => EntryKind::NextHopGroup,
            EntryKey::Ipv4(_) => EntryKind::Ipv4,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::NextHop(index) => write!(f, "next-hop {}", index),
            EntryKey::NextHopGroup(id) => write!(f, "next-hop-group {}", id),
            EntryKey::Ipv4(prefix) => write!(f, "ipv4-entry {}", prefix),
        }
    }
}

/// A next-hop: a forwarding target reachable via an address or interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopEntry {
    pub index: u64,
    pub ip_address: Option<IpAddress>,
    pub interface: Option<String>,
}

impl NextHopEntry {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            ip_address: None,
            interface: None,
        }
    }

    pub fn with_ip_address(mut self, ip: IpAddress) -> Self {
        self.ip_address = Some(ip);
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }
}

/// A weighted set of next-hops, keyed by next-hop index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopGroupEntry {
    pub id: u64,
    pub next_hops: BTreeMap<u64, u64>,
}

impl NextHopGroupEntry {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            next_hops: BTreeMap::new(),
        }
    }

    /// Adds (or re-weights) a member next-hop.
    pub fn add_next_hop(mut self, index: u64, weight: u64) -> Self {
        self.next_hops.insert(index, weight);
        self
    }

    /// Sum of member weights. Widened so any set of `u64` weights fits.
    pub fn total_weight(&self) -> u128 {
        self.next_hops.values().map(|w| u128::from(*w)).sum()
    }
}

/// A prefix bound to a next-hop-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Entry {
    pub prefix: IpPrefix,
    pub next_hop_group: u64,
}

impl Ipv4Entry {
    pub fn new(prefix: IpPrefix, next_hop_group: u64) -> Self {
        Self {
            prefix,
            next_hop_group,
        }
    }
}

/// Any programmable AFT entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AftEntry {
    NextHop(NextHopEntry),
    NextHopGroup(NextHopGroupEntry),
    Ipv4(Ipv4Entry),
}

impl AftEntry {
    pub fn key(&self) -> EntryKey {
        match self {
            AftEntry::NextHop(nh) => EntryKey::NextHop(nh.index),
            AftEntry::NextHopGroup(nhg) => EntryKey::NextHopGroup(nhg.id),
            AftEntry::Ipv4(e) => EntryKey::Ipv4(e.prefix),
        }
    }

    pub fn kind(&self) -> EntryKind {
        self.key().kind()
    }

    /// Keys of the entries this entry depends on.
    pub fn references(&self) -> Vec<EntryKey> {
        match self {
            AftEntry::NextHop(_) => Vec::new(),
            AftEntry::NextHopGroup(nhg) => nhg
                .next_hops
                .keys()
                .map(|index| EntryKey::NextHop(*index))
                .collect(),
            AftEntry::Ipv4(e) => vec![EntryKey::NextHopGroup(e.next_hop_group)],
        }
    }

    /// Checks the entry is well formed on its own, without looking at any
    /// other entry.
    pub fn validate(&self) -> Result<()> {
        match self {
            AftEntry::NextHop(nh) => {
                if nh.index == 0 {
                    return Err(ProtocolError::InvalidEntry(
                        "next-hop index must be non-zero".to_string(),
                    ));
                }
                if nh.ip_address.is_none() && nh.interface.is_none() {
                    return Err(ProtocolError::InvalidEntry(format!(
                        "next-hop {} has neither an IP address nor an interface",
                        nh.index
                    )));
                }
            }
            AftEntry::NextHopGroup(nhg) => {
                if nhg.id == 0 {
                    return Err(ProtocolError::InvalidEntry(
                        "next-hop-group id must be non-zero".to_string(),
                    ));
                }
                if nhg.next_hops.is_empty() {
                    return Err(ProtocolError::InvalidEntry(format!(
                        "next-hop-group {} has no next-hops",
                        nhg.id
                    )));
                }
                if let Some((index, _)) = nhg.next_hops.iter().find(|(_, w)| **w == 0) {
                    return Err(ProtocolError::InvalidEntry(format!(
                        "next-hop-group {} member {} has zero weight",
                        nhg.id, index
                    )));
                }
            }
            AftEntry::Ipv4(e) => {
                if !e.prefix.is_ipv4() {
                    return Err(ProtocolError::InvalidEntry(format!(
                        "ipv4-entry prefix {} is not IPv4",
                        e.prefix
                    )));
                }
                if e.prefix != e.prefix.network() {
                    return Err(ProtocolError::InvalidEntry(format!(
                        "ipv4-entry prefix {} has host bits set, expected {}",
                        e.prefix,
                        e.prefix.network()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl From<NextHopEntry> for AftEntry {
    fn from(e: NextHopEntry) -> Self {
        AftEntry::NextHop(e)
    }
}

impl From<NextHopGroupEntry> for AftEntry {
    fn from(e: NextHopGroupEntry) -> Self {
        AftEntry::NextHopGroup(e)
    }
}

impl From<Ipv4Entry> for AftEntry {
    fn from(e: Ipv4Entry) -> Self {
        AftEntry::Ipv4(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_entry_keys() {
        let nh: AftEntry = NextHopEntry::new(42)
            .with_ip_address("192.0.2.6".parse().unwrap())
            .into();
        assert_eq!(nh.key(), EntryKey::NextHop(42));
        assert_eq!(nh.kind(), EntryKind::NextHop);

        let ipv4: AftEntry = Ipv4Entry::new(prefix("203.0.113.0/24"), 10).into();
        assert_eq!(ipv4.key(), EntryKey::Ipv4(prefix("203.0.113.0/24")));
        assert_eq!(ipv4.key().to_string(), "ipv4-entry 203.0.113.0/24");
    }

    #[test]
    fn test_references() {
        let nhg: AftEntry = NextHopGroupEntry::new(10)
            .add_next_hop(42, 1)
            .add_next_hop(43, 3)
            .into();
        assert_eq!(
            nhg.references(),
            vec![EntryKey::NextHop(42), EntryKey::NextHop(43)]
        );

        let ipv4: AftEntry = Ipv4Entry::new(prefix("203.0.113.0/24"), 10).into();
        assert_eq!(ipv4.references(), vec![EntryKey::NextHopGroup(10)]);

        let nh: AftEntry = NextHopEntry::new(1).with_interface("port2").into();
        assert!(nh.references().is_empty());
    }

    #[test]
    fn test_validate_next_hop() {
        let bare: AftEntry = NextHopEntry::new(42).into();
        assert!(bare.validate().is_err());

        let zero: AftEntry = NextHopEntry::new(0).with_interface("port2").into();
        assert!(zero.validate().is_err());

        let ok: AftEntry = NextHopEntry::new(42).with_interface("port2").into();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_next_hop_group() {
        let empty: AftEntry = NextHopGroupEntry::new(10).into();
        assert!(empty.validate().is_err());

        let zero_weight: AftEntry = NextHopGroupEntry::new(10).add_next_hop(42, 0).into();
        assert!(zero_weight.validate().is_err());

        let ok = NextHopGroupEntry::new(10).add_next_hop(42, 1).add_next_hop(43, 2);
        assert_eq!(ok.total_weight(), 3);
        assert!(AftEntry::from(ok).validate().is_ok());

        let heavy = NextHopGroupEntry::new(10)
            .add_next_hop(1, u64::MAX)
            .add_next_hop(2, 1);
        assert_eq!(heavy.total_weight(), u128::from(u64::MAX) + 1);
        assert!(AftEntry::from(heavy).validate().is_ok());
    }

    #[test]
    fn test_validate_ipv4_family() {
        let v6: AftEntry = Ipv4Entry::new(prefix("2001:db8::/32"), 10).into();
        assert!(v6.validate().is_err());
    }

    #[test]
    fn test_validate_ipv4_host_bits() {
        let loose: AftEntry = Ipv4Entry::new(prefix("203.0.113.7/24"), 10).into();
        let err = loose.validate().unwrap_err();
        assert!(err.to_string().contains("203.0.113.0/24"));

        let canonical: AftEntry = Ipv4Entry::new(prefix("203.0.113.0/24"), 10).into();
        assert!(canonical.validate().is_ok());
        let host: AftEntry = Ipv4Entry::new(prefix("203.0.113.7/32"), 10).into();
        assert!(host.validate().is_ok());
    }
}
