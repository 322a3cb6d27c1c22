//! Operational state of the AFT, shaped after the OpenConfig `afts` tree.
//!
//! Identifiers chosen by the client appear as `programmed_*`; `id`/`index`
//! fields carry the device-assigned identifiers, the way a device reports
//! gRIBI-installed entries in telemetry.

use gribi_common::{AftEntry, ProgrammingResult};
use gribi_types::{IpAddress, IpPrefix};
use serde::{Deserialize, Serialize};

use crate::aft::{ClientId, NetworkInstanceAft};

/// `afts/next-hops/next-hop/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopState {
    pub index: u64,
    pub programmed_index: u64,
    pub ip_address: Option<IpAddress>,
    pub interface: Option<String>,
}

/// A member of a next-hop-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopWeight {
    /// Device index of the member next-hop.
    pub index: u64,
    pub weight: u64,
}

/// `afts/next-hop-groups/next-hop-group/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextHopGroupState {
    pub id: u64,
    pub programmed_id: u64,
    pub next_hops: Vec<NextHopWeight>,
}

impl NextHopGroupState {
    /// Member weights in member order.
    pub fn weights(&self) -> Vec<u64> {
        self.next_hops.iter().map(|nh| nh.weight).collect()
    }
}

/// `afts/ipv4-unicast/ipv4-entry/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4EntryState {
    pub prefix: IpPrefix,
    /// Device id of the next-hop-group.
    pub next_hop_group: u64,
}

/// Snapshot of one network instance's AFT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AftState {
    pub network_instance: String,
    pub next_hops: Vec<NextHopState>,
    pub next_hop_groups: Vec<NextHopGroupState>,
    pub ipv4_entries: Vec<Ipv4EntryState>,
}

impl AftState {
    pub fn empty(network_instance: impl Into<String>) -> Self {
        Self {
            network_instance: network_instance.into(),
            ..Default::default()
        }
    }

    pub(crate) fn from_aft(network_instance: &str, aft: &NetworkInstanceAft) -> Self {
        let nh_device_id = |index: &u64| aft.next_hops.get(index).map_or(0, |p| p.device_id);
        let nhg_device_id = |id: &u64| aft.next_hop_groups.get(id).map_or(0, |p| p.device_id);

        Self {
            network_instance: network_instance.to_string(),
            next_hops: aft
                .next_hops
                .values()
                .map(|p| NextHopState {
                    index: p.device_id,
                    programmed_index: p.entry.index,
                    ip_address: p.entry.ip_address,
                    interface: p.entry.interface.clone(),
                })
                .collect(),
            next_hop_groups: aft
                .next_hop_groups
                .values()
                .map(|p| NextHopGroupState {
                    id: p.device_id,
                    programmed_id: p.entry.id,
                    next_hops: p
                        .entry
                        .next_hops
                        .iter()
                        .map(|(index, weight)| NextHopWeight {
                            index: nh_device_id(index),
                            weight: *weight,
                        })
                        .collect(),
                })
                .collect(),
            ipv4_entries: aft
                .ipv4
                .values()
                .map(|p| Ipv4EntryState {
                    prefix: p.entry.prefix,
                    next_hop_group: nhg_device_id(&p.entry.next_hop_group),
                })
                .collect(),
        }
    }

    /// Looks up a next-hop-group by the id the client programmed.
    pub fn next_hop_group(&self, programmed_id: u64) -> Option<&NextHopGroupState> {
        self.next_hop_groups
            .iter()
            .find(|g| g.programmed_id == programmed_id)
    }

    pub fn ipv4_entry(&self, prefix: &IpPrefix) -> Option<&Ipv4EntryState> {
        self.ipv4_entries.iter().find(|e| e.prefix == *prefix)
    }
}

/// One entry returned by `Get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetEntry {
    pub network_instance: String,
    pub entry: AftEntry,
    pub owner: ClientId,
    pub result: ProgrammingResult,
}

/// Response to `Get`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResponse {
    pub entries: Vec<GetEntry>,
}
