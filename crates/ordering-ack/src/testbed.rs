//! The DUT and ATE wired together and configured for the suite.

use log::info;

use crate::ate::{Ate, Topology};
use crate::attrs::{
    ATE_DST, ATE_DST_NET_CIDR, ATE_DST_NET_NAME, ATE_SRC, DUT_DST, DUT_SRC,
};
use crate::config::{Deviations, SuiteConfig};
use crate::dut::{Dut, InterfaceConfig};
use crate::error::Result;

/// ATE port to DUT port cabling.
pub const LINKS: [(&str, &str); 2] = [("port1", "port1"), ("port2", "port2")];

pub struct Testbed {
    pub dut: Dut,
    pub ate: Ate,
}

impl Testbed {
    /// Builds and configures both devices.
    pub fn new(config: &SuiteConfig) -> Result<Self> {
        let mut dut = Dut::new(&config.deviations);
        configure_dut(&mut dut, &config.deviations)?;

        let mut ate = Ate::new(LINKS, config.traffic.rate_pps);
        ate.push_topology(configure_ate()?)?;

        info!("Testbed: ready");
        Ok(Self { dut, ate })
    }

    /// Network instance the cases program.
    pub fn network_instance(&self) -> &str {
        &self.dut.server().config().default_network_instance
    }
}

/// Addresses port1 and port2 of the DUT.
pub fn configure_dut(dut: &mut Dut, deviations: &Deviations) -> Result<()> {
    for (port, attrs) in [("port1", &DUT_SRC), ("port2", &DUT_DST)] {
        let name = dut.port(port)?.to_string();
        let config = InterfaceConfig::from_attrs(&name, attrs, deviations.interface_enabled)?;
        dut.replace_interface(config)?;
    }
    Ok(())
}

/// Source interface on port1, destination interface on port2 with the
/// destination network behind it.
pub fn configure_ate() -> Result<Topology> {
    let mut top = Topology::new();
    top.add_interface(&ATE_SRC, "port1", &DUT_SRC)?;
    top.add_interface(&ATE_DST, "port2", &DUT_DST)?;
    top.add_network(ATE_DST.name, ATE_DST_NET_NAME, ATE_DST_NET_CIDR)?;
    Ok(top)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_testbed_connected_routes() {
        let testbed = Testbed::new(&SuiteConfig::default()).unwrap();
        assert_eq!(testbed.network_instance(), "DEFAULT");
        assert_eq!(testbed.dut.fib().interfaces().len(), 2);

        // Without gRIBI routes only the connected subnets forward.
        let ni = testbed.network_instance();
        assert!(testbed
            .dut
            .fib()
            .lookup(ni, "192.0.2.6".parse().unwrap())
            .is_some());
        assert!(testbed
            .dut
            .fib()
            .lookup(ni, "203.0.113.1".parse().unwrap())
            .is_none());
    }
}
