//! CIDR prefixes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::addr::{IpAddress, Ipv4Address, Ipv6Address};
use crate::ParseError;

/// An address with a prefix length.
///
/// Host bits are kept as given, so an interface address such as
/// `192.0.2.2/30` round-trips; use [`IpPrefix::network`] for the masked form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    address: IpAddress,
    len: u8,
}

impl IpPrefix {
    pub fn new(address: IpAddress, len: u8) -> Result<Self, ParseError> {
        if len > address.width() {
            return Err(ParseError::InvalidPrefixLength {
                len,
                max: address.width(),
            });
        }
        Ok(Self { address, len })
    }

    pub fn address(&self) -> IpAddress {
        self.address
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    pub fn is_default(&self) -> bool {
        self.len == 0
    }

    pub fn is_host_route(&self) -> bool {
        self.len == self.address.width()
    }

    /// The prefix with host bits cleared.
    pub fn network(&self) -> Self {
        Self {
            address: self.masked(),
            len: self.len,
        }
    }

    /// True when `addr` is the same family and matches on the first
    /// `prefix_len` bits.
    pub fn contains(&self, addr: &IpAddress) -> bool {
        let candidate = Self {
            address: *addr,
            len: self.len,
        };
        addr.is_ipv4() == self.is_ipv4() && candidate.masked() == self.masked()
    }

    /// Every IPv4 address in the prefix, network and broadcast included.
    /// Empty for IPv6 prefixes.
    pub fn hosts_v4(&self) -> Ipv4Hosts {
        match self.masked() {
            IpAddress::V4(base) => {
                let size = 1u64 << (32 - u32::from(self.len));
                Ipv4Hosts {
                    next: u64::from(base.to_bits()),
                    end: u64::from(base.to_bits()) + size,
                }
            }
            IpAddress::V6(_) => Ipv4Hosts { next: 0, end: 0 },
        }
    }

    fn masked(&self) -> IpAddress {
        match self.address {
            IpAddress::V4(a) => {
                let mask = u32::MAX.checked_shl(32 - u32::from(self.len)).unwrap_or(0);
                IpAddress::V4(Ipv4Address::from_bits(a.to_bits() & mask))
            }
            IpAddress::V6(a) => {
                let mask = u128::MAX.checked_shl(128 - u32::from(self.len)).unwrap_or(0);
                IpAddress::V6(Ipv6Address::from_bits(a.to_bits() & mask))
            }
        }
    }
}

/// Iterator returned by [`IpPrefix::hosts_v4`].
#[derive(Debug, Clone)]
pub struct Ipv4Hosts {
    next: u64,
    end: u64,
}

impl Iterator for Ipv4Hosts {
    type Item = Ipv4Address;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let bits = self.next as u32;
        self.next += 1;
        Some(Ipv4Address::from_bits(bits))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.end - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Ipv4Hosts {}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidIpPrefix(s.to_string());
        let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
        let address: IpAddress = addr.parse().map_err(|_| invalid())?;
        let len: u8 = len.parse().map_err(|_| invalid())?;
        Self::new(address, len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(p: IpPrefix) -> Self {
        p.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v4(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_keeps_host_bits() {
        let p: IpPrefix = "192.0.2.2/30".parse().unwrap();
        assert_eq!(p.to_string(), "192.0.2.2/30");
        assert_eq!(p.network().to_string(), "192.0.2.0/30");
        assert_eq!(p.address(), v4("192.0.2.2"));
        assert!(p.is_ipv4());
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(
            "192.0.2.0/33".parse::<IpPrefix>(),
            Err(ParseError::InvalidPrefixLength { len: 33, max: 32 })
        );
        assert!("192.0.2.0".parse::<IpPrefix>().is_err());
        assert!("192.0.2.0/x".parse::<IpPrefix>().is_err());
        assert!("nope/24".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/128".parse::<IpPrefix>().is_ok());
    }

    #[test]
    fn test_contains() {
        let p: IpPrefix = "203.0.113.0/24".parse().unwrap();
        assert!(p.contains(&v4("203.0.113.0")));
        assert!(p.contains(&v4("203.0.113.255")));
        assert!(!p.contains(&v4("203.0.114.1")));
        assert!(!p.contains(&v4("2001:db8::1")));

        let default: IpPrefix = "0.0.0.0/0".parse().unwrap();
        assert!(default.is_default());
        assert!(default.contains(&v4("198.51.100.7")));

        let host: IpPrefix = "192.0.2.6/32".parse().unwrap();
        assert!(host.is_host_route());
        assert!(host.contains(&v4("192.0.2.6")));
        assert!(!host.contains(&v4("192.0.2.5")));
    }

    #[test]
    fn test_hosts_v4() {
        let p: IpPrefix = "192.0.2.5/30".parse().unwrap();
        let hosts: Vec<String> = p.hosts_v4().map(|a| a.to_string()).collect();
        assert_eq!(hosts, vec!["192.0.2.4", "192.0.2.5", "192.0.2.6", "192.0.2.7"]);

        assert_eq!("203.0.113.0/24".parse::<IpPrefix>().unwrap().hosts_v4().len(), 256);
        assert_eq!("2001:db8::/64".parse::<IpPrefix>().unwrap().hosts_v4().count(), 0);
    }

    #[test]
    fn test_serde_as_string() {
        let p: IpPrefix = "203.0.113.0/24".parse().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"203.0.113.0/24\"");
        assert_eq!(serde_json::from_str::<IpPrefix>(&json).unwrap(), p);
        assert!(serde_json::from_str::<IpPrefix>("\"203.0.113.0/40\"").is_err());
    }
}
