//! Per-network-instance AFT tables.

use gribi_common::{
    AftEntry, EntryKey, EntryKind, Ipv4Entry, NextHopEntry, NextHopGroupEntry, ProgrammingResult,
    RefTable, RefTableError, Referenced,
};
use gribi_types::IpPrefix;

/// Identifies one `Modify` session on the responder.
pub type ClientId = u64;

/// An installed entry together with its bookkeeping.
#[derive(Debug, Clone)]
pub struct Programmed<E> {
    pub entry: E,
    /// Client whose operation last wrote the entry.
    pub owner: ClientId,
    /// Device-assigned identifier, stable across replaces.
    pub device_id: u64,
    /// Result reported when the entry was last written.
    pub result: ProgrammingResult,
    refs: u32,
}

impl<E> Programmed<E> {
    pub fn new(entry: E, owner: ClientId, device_id: u64, result: ProgrammingResult) -> Self {
        Self {
            entry,
            owner,
            device_id,
            result,
            refs: 0,
        }
    }
}

impl<E> Referenced for Programmed<E> {
    fn holders(&self) -> u32 {
        self.refs
    }

    fn holders_mut(&mut self) -> &mut u32 {
        &mut self.refs
    }
}

/// A read-only view of one installed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledEntry {
    pub entry: AftEntry,
    pub owner: ClientId,
    pub device_id: u64,
    pub result: ProgrammingResult,
    pub ref_count: u32,
}

/// The three AFT tables of one network instance.
///
/// Next-hops are referenced by next-hop-groups, next-hop-groups by IPv4
/// entries. Nothing references an IPv4 entry.
#[derive(Debug, Default)]
pub struct NetworkInstanceAft {
    pub(crate) next_hops: RefTable<u64, Programmed<NextHopEntry>>,
    pub(crate) next_hop_groups: RefTable<u64, Programmed<NextHopGroupEntry>>,
    pub(crate) ipv4: RefTable<IpPrefix, Programmed<Ipv4Entry>>,
    last_device_id: u64,
}

impl NetworkInstanceAft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        match key {
            EntryKey::NextHop(index) => self.next_hops.contains_key(index),
            EntryKey::NextHopGroup(id) => self.next_hop_groups.contains_key(id),
            EntryKey::Ipv4(prefix) => self.ipv4.contains_key(prefix),
        }
    }

    pub fn ref_count(&self, key: &EntryKey) -> Option<u32> {
        match key {
            EntryKey::NextHop(index) => self.next_hops.ref_count(index),
            EntryKey::NextHopGroup(id) => self.next_hop_groups.ref_count(id),
            EntryKey::Ipv4(prefix) => self.ipv4.ref_count(prefix),
        }
    }

    pub fn table_len(&self, kind: EntryKind) -> usize {
        match kind {
            EntryKind::NextHop => self.next_hops.len(),
            EntryKind::NextHopGroup => self.next_hop_groups.len(),
            EntryKind::Ipv4 => self.ipv4.len(),
        }
    }

    pub fn entry_count(&self) -> usize {
        self.next_hops.len() + self.next_hop_groups.len() + self.ipv4.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    pub fn get(&self, key: &EntryKey) -> Option<InstalledEntry> {
        match key {
            EntryKey::NextHop(index) => self.next_hops.get(index).map(view),
            EntryKey::NextHopGroup(id) => self.next_hop_groups.get(id).map(view),
            EntryKey::Ipv4(prefix) => self.ipv4.get(prefix).map(view),
        }
    }

    /// Every installed entry, referenced kinds first.
    pub fn entries(&self) -> Vec<InstalledEntry> {
        self.next_hops
            .values()
            .map(view)
            .chain(self.next_hop_groups.values().map(view))
            .chain(self.ipv4.values().map(view))
            .collect()
    }

    /// Keys of one kind, optionally restricted to a single owner.
    pub fn keys_of(&self, kind: EntryKind, owner: Option<ClientId>) -> Vec<EntryKey> {
        let owned = |o: ClientId| owner.map_or(true, |want| want == o);
        match kind {
            EntryKind::NextHop => self
                .next_hops
                .iter()
                .filter(|(_, p)| owned(p.owner))
                .map(|(k, _)| EntryKey::NextHop(*k))
                .collect(),
            EntryKind::NextHopGroup => self
                .next_hop_groups
                .iter()
                .filter(|(_, p)| owned(p.owner))
                .map(|(k, _)| EntryKey::NextHopGroup(*k))
                .collect(),
            EntryKind::Ipv4 => self
                .ipv4
                .iter()
                .filter(|(_, p)| owned(p.owner))
                .map(|(k, _)| EntryKey::Ipv4(*k))
                .collect(),
        }
    }

    /// Writes an entry, replacing any entry with the same key.
    ///
    /// References held by the new entry are taken before the ones held by the
    /// replaced entry are released, so a replace that keeps a member never
    /// drops its count to zero. Every reference must already exist.
    pub fn install(
        &mut self,
        entry: AftEntry,
        owner: ClientId,
        result: ProgrammingResult,
    ) -> Result<(), RefTableError> {
        for r in entry.references() {
            self.increment_ref(&r)?;
        }

        let replaced: Option<AftEntry> = match entry {
            AftEntry::NextHop(nh) => {
                let key = nh.index;
                self.upsert_next_hop(key, nh, owner, result).map(Into::into)
            }
            AftEntry::NextHopGroup(nhg) => {
                let key = nhg.id;
                self.upsert_next_hop_group(key, nhg, owner, result)
                    .map(Into::into)
            }
            AftEntry::Ipv4(e) => {
                let key = e.prefix;
                self.upsert_ipv4(key, e, owner, result).map(Into::into)
            }
        };

        if let Some(old) = replaced {
            for r in old.references() {
                self.decrement_ref(&r)?;
            }
        }
        Ok(())
    }

    /// Removes an unreferenced entry and releases the references it held.
    pub fn remove(&mut self, key: &EntryKey) -> Result<AftEntry, RefTableError> {
        let removed: AftEntry = match key {
            EntryKey::NextHop(index) => self.next_hops.remove_unreferenced(index)?.entry.into(),
            EntryKey::NextHopGroup(id) => {
                self.next_hop_groups.remove_unreferenced(id)?.entry.into()
            }
            EntryKey::Ipv4(prefix) => self.ipv4.remove_unreferenced(prefix)?.entry.into(),
        };
        for r in removed.references() {
            self.decrement_ref(&r)?;
        }
        Ok(removed)
    }

    fn increment_ref(&mut self, key: &EntryKey) -> Result<u32, RefTableError> {
        match key {
            EntryKey::NextHop(index) => self.next_hops.increment_ref(index),
            EntryKey::NextHopGroup(id) => self.next_hop_groups.increment_ref(id),
            EntryKey::Ipv4(prefix) => self.ipv4.increment_ref(prefix),
        }
    }

    fn decrement_ref(&mut self, key: &EntryKey) -> Result<u32, RefTableError> {
        match key {
            EntryKey::NextHop(index) => self.next_hops.decrement_ref(index),
            EntryKey::NextHopGroup(id) => self.next_hop_groups.decrement_ref(id),
            EntryKey::Ipv4(prefix) => self.ipv4.decrement_ref(prefix),
        }
    }

    fn next_device_id(&mut self) -> u64 {
        self.last_device_id += 1;
        self.last_device_id
    }

    fn upsert_next_hop(
        &mut self,
        key: u64,
        entry: NextHopEntry,
        owner: ClientId,
        result: ProgrammingResult,
    ) -> Option<NextHopEntry> {
        if let Some(existing) = self.next_hops.get_mut(&key) {
            return Some(overwrite(existing, entry, owner, result));
        }
        let device_id = self.next_device_id();
        self.next_hops
            .insert(key, Programmed::new(entry, owner, device_id, result));
        None
    }

    fn upsert_next_hop_group(
        &mut self,
        key: u64,
        entry: NextHopGroupEntry,
        owner: ClientId,
        result: ProgrammingResult,
    ) -> Option<NextHopGroupEntry> {
        if let Some(existing) = self.next_hop_groups.get_mut(&key) {
            return Some(overwrite(existing, entry, owner, result));
        }
        let device_id = self.next_device_id();
        self.next_hop_groups
            .insert(key, Programmed::new(entry, owner, device_id, result));
        None
    }

    fn upsert_ipv4(
        &mut self,
        key: IpPrefix,
        entry: Ipv4Entry,
        owner: ClientId,
        result: ProgrammingResult,
    ) -> Option<Ipv4Entry> {
        if let Some(existing) = self.ipv4.get_mut(&key) {
            return Some(overwrite(existing, entry, owner, result));
        }
        let device_id = self.next_device_id();
        self.ipv4
            .insert(key, Programmed::new(entry, owner, device_id, result));
        None
    }
}

fn overwrite<E>(
    existing: &mut Programmed<E>,
    entry: E,
    owner: ClientId,
    result: ProgrammingResult,
) -> E {
    existing.owner = owner;
    existing.result = result;
    std::mem::replace(&mut existing.entry, entry)
}

fn view<E: Clone + Into<AftEntry>>(p: &Programmed<E>) -> InstalledEntry {
    InstalledEntry {
        entry: p.entry.clone().into(),
        owner: p.owner,
        device_id: p.device_id,
        result: p.result,
        ref_count: p.holders(),
    }
}
