//! Address types shared by the gRIBI client, responder and testbed.
//!
//! [`IpPrefix`] keys IPv4 AFT entries and drives destination selection in
//! traffic generation. All types serialize as their text form.

mod addr;
mod prefix;

pub use addr::{IpAddress, Ipv4Address, Ipv6Address};
pub use prefix::{IpPrefix, Ipv4Hosts};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix: {0}")]
    InvalidIpPrefix(String),

    #[error("prefix length {len} exceeds {max}")]
    InvalidPrefixLength { len: u8, max: u8 },
}
