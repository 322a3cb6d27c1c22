//! IPv4 and IPv6 addresses.
//!
//! Addresses are stored as host-order integers so prefix arithmetic is plain
//! masking. Text form and serde form are the usual dotted/colon notation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Address(u32);

impl Ipv4Address {
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self(u32::from_be_bytes([a, b, c, d]))
    }

    pub const fn to_bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv6Address(u128);

impl Ipv6Address {
    pub const fn to_bits(self) -> u128 {
        self.0
    }

    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }
}

/// An address of either family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpAddress {
    V4(Ipv4Address),
    V6(Ipv6Address),
}

impl IpAddress {
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Number of bits in an address of this family.
    pub const fn width(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv4Addr::from(self.0).fmt(f)
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ipv6Addr::from(self.0).fmt(f)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(a) => a.fmt(f),
            IpAddress::V6(a) => a.fmt(f),
        }
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4Addr::from_str(s)
            .map(|a| Self(u32::from(a)))
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl FromStr for Ipv6Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv6Addr::from_str(s)
            .map(|a| Self(u128::from(a)))
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.contains(':') {
            true => s.parse().map(IpAddress::V6),
            false => s.parse().map(IpAddress::V4),
        }
    }
}

impl From<Ipv4Address> for IpAddress {
    fn from(a: Ipv4Address) -> Self {
        IpAddress::V4(a)
    }
}

impl From<Ipv6Address> for IpAddress {
    fn from(a: Ipv6Address) -> Self {
        IpAddress::V6(a)
    }
}

macro_rules! string_serde {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = ParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$ty> for String {
            fn from(v: $ty) -> Self {
                v.to_string()
            }
        }
    )*};
}

string_serde!(Ipv4Address, Ipv6Address, IpAddress);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_and_display() {
        let v4: IpAddress = "192.0.2.6".parse().unwrap();
        assert_eq!(v4, IpAddress::V4(Ipv4Address::new(192, 0, 2, 6)));
        assert_eq!(v4.to_string(), "192.0.2.6");
        assert_eq!(v4.width(), 32);

        let v6: IpAddress = "2001:db8::1".parse().unwrap();
        assert!(v6.is_ipv6());
        assert_eq!(v6.to_string(), "2001:db8::1");

        assert!("192.0.2.256".parse::<IpAddress>().is_err());
        assert!("".parse::<Ipv4Address>().is_err());
    }

    #[test]
    fn test_bits_are_host_order() {
        let a = Ipv4Address::new(10, 0, 0, 1);
        assert_eq!(a.to_bits(), 0x0A00_0001);
        assert_eq!(Ipv4Address::from_bits(a.to_bits() + 1).to_string(), "10.0.0.2");
        assert!(Ipv4Address::new(10, 0, 0, 1) < Ipv4Address::new(10, 0, 1, 0));
    }

    #[test]
    fn test_serde_as_string() {
        let a: IpAddress = "192.0.2.1".parse().unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"192.0.2.1\"");
        let back: Ipv4Address = serde_json::from_str("\"192.0.2.1\"").unwrap();
        assert_eq!(IpAddress::V4(back), a);
    }
}
