//! Endpoint attributes and the fixed testbed addressing.
//!
//! The testbed is `ate:port1 -> dut:port1` (source pair, 192.0.2.0/30) and
//! `dut:port2 -> ate:port2` (destination pair, 192.0.2.4/30). The destination
//! network 203.0.113.0/24 lives behind `ate:port2`.

use gribi_types::Ipv4Address;
use std::time::Duration;

use crate::error::{Result, SuiteError};

/// Addressing of one end of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub name: &'static str,
    pub desc: &'static str,
    pub ipv4: &'static str,
    pub ipv4_len: u8,
}

impl Attributes {
    /// The address with its prefix length, e.g. `192.0.2.1/30`.
    pub fn ipv4_cidr(&self) -> String {
        format!("{}/{}", self.ipv4, self.ipv4_len)
    }

    pub fn ipv4_addr(&self) -> Result<Ipv4Address> {
        self.ipv4
            .parse()
            .map_err(|e| SuiteError::Testbed(format!("{}: {}", self.ipv4, e)))
    }
}

pub const PLEN4: u8 = 30;

pub const ATE_SRC: Attributes = Attributes {
    name: "ateSrc",
    desc: "",
    ipv4: "192.0.2.1",
    ipv4_len: PLEN4,
};

pub const DUT_SRC: Attributes = Attributes {
    name: "",
    desc: "DUT to ATE source",
    ipv4: "192.0.2.2",
    ipv4_len: PLEN4,
};

pub const DUT_DST: Attributes = Attributes {
    name: "",
    desc: "DUT to ATE destination",
    ipv4: "192.0.2.5",
    ipv4_len: PLEN4,
};

pub const ATE_DST: Attributes = Attributes {
    name: "dst",
    desc: "",
    ipv4: "192.0.2.6",
    ipv4_len: PLEN4,
};

pub const ATE_DST_NET_NAME: &str = "dstnet";
pub const ATE_DST_NET_CIDR: &str = "203.0.113.0/24";

pub const NH_INDEX: u64 = 42;
pub const NH_WEIGHT: u64 = 1;
pub const NHG_INDEX: u64 = 10;

/// Bound on every wait for acknowledgments.
pub const AWAIT_DURATION: Duration = Duration::from_secs(120);
