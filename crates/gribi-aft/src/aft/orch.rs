//! AftOrch implementation.
//!
//! Applies gRIBI operations to the per-network-instance AFT tables in
//! submission order, with reference checks against earlier operations.

use async_trait::async_trait;
use gribi_common::{
    AckType, AftEntry, AftOperation, AftResult, ElectionId, EntryKey, EntryKind, Ipv4Entry,
    NextHopEntry, NextHopGroupEntry, OperationQueue, OperationType, ProgrammingError,
    ProgrammingResult, RedundancyMode,
};
use gribi_types::IpPrefix;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

use super::types::{ClientId, InstalledEntry, NetworkInstanceAft};

/// Error returned by a [`ForwardingPlane`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardingError {
    #[error("Hardware programming failed: {0}")]
    Programming(String),

    #[error("Dependency not programmed: {0}")]
    MissingDependency(String),

    #[error("Invalid interface: {0}")]
    InvalidInterface(String),
}

/// Callback trait for AftOrch to push RIB changes to hardware.
#[async_trait]
pub trait ForwardingPlane: Send + Sync {
    async fn program_next_hop(
        &self,
        network_instance: &str,
        next_hop: &NextHopEntry,
    ) -> Result<(), ForwardingError>;

    async fn remove_next_hop(&self, network_instance: &str, index: u64)
        -> Result<(), ForwardingError>;

    async fn program_next_hop_group(
        &self,
        network_instance: &str,
        group: &NextHopGroupEntry,
    ) -> Result<(), ForwardingError>;

    async fn remove_next_hop_group(
        &self,
        network_instance: &str,
        id: u64,
    ) -> Result<(), ForwardingError>;

    async fn program_ipv4(
        &self,
        network_instance: &str,
        entry: &Ipv4Entry,
    ) -> Result<(), ForwardingError>;

    async fn remove_ipv4(
        &self,
        network_instance: &str,
        prefix: &IpPrefix,
    ) -> Result<(), ForwardingError>;
}

/// Configuration for AftOrch.
#[derive(Debug, Clone)]
pub struct AftOrchConfig {
    /// Network instances operations may target.
    pub network_instances: BTreeSet<String>,
    /// Maximum number of entries of one kind per network instance.
    pub max_entries_per_table: usize,
}

/// Session state an operation is checked against.
#[derive(Debug, Clone)]
pub struct ProgramContext {
    pub client_id: ClientId,
    pub redundancy: RedundancyMode,
    pub ack_type: AckType,
    /// Election id last presented by this client.
    pub client_election_id: Option<ElectionId>,
    /// Highest election id seen by the responder.
    pub primary_election_id: Option<ElectionId>,
    /// Highest operation id accepted so far in this session.
    pub last_operation_id: u64,
}

impl ProgramContext {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            redundancy: RedundancyMode::default(),
            ack_type: AckType::default(),
            client_election_id: None,
            primary_election_id: None,
            last_operation_id: 0,
        }
    }

    fn installed_result(&self) -> ProgrammingResult {
        match self.ack_type {
            AckType::Rib => ProgrammingResult::InstalledInRib,
            AckType::RibAndFib => ProgrammingResult::InstalledInFib,
        }
    }
}

/// Outcome of a bulk removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemovalSummary {
    pub removed: usize,
    /// Entries left in place because something still references them.
    pub remaining: usize,
}

impl std::ops::AddAssign for RemovalSummary {
    fn add_assign(&mut self, other: Self) {
        self.removed += other.removed;
        self.remaining += other.remaining;
    }
}

/// Statistics for AftOrch.
#[derive(Debug, Clone, Default)]
pub struct AftOrchStats {
    pub operations: u64,
    pub installed: u64,
    pub failed: u64,
    pub forwarding_failures: u64,
}

/// AftOrch - owns the AFT tables of every network instance.
pub struct AftOrch {
    config: AftOrchConfig,
    instances: BTreeMap<String, NetworkInstanceAft>,
    queue: OperationQueue,
    forwarding: Arc<dyn ForwardingPlane>,
    stats: AftOrchStats,
}

impl AftOrch {
    pub fn new(config: AftOrchConfig, forwarding: Arc<dyn ForwardingPlane>) -> Self {
        let instances = config
            .network_instances
            .iter()
            .map(|name| (name.clone(), NetworkInstanceAft::new()))
            .collect();
        Self {
            config,
            instances,
            queue: OperationQueue::new(),
            forwarding,
            stats: AftOrchStats::default(),
        }
    }

    pub fn stats(&self) -> &AftOrchStats {
        &self.stats
    }

    pub fn has_network_instance(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn network_instances(&self) -> Vec<String> {
        self.instances.keys().cloned().collect()
    }

    pub fn network_instance(&self, name: &str) -> Option<&NetworkInstanceAft> {
        self.instances.get(name)
    }

    /// Installed entries of a network instance; empty when it is unknown.
    pub fn entries(&self, name: &str) -> Vec<InstalledEntry> {
        self.instances
            .get(name)
            .map(NetworkInstanceAft::entries)
            .unwrap_or_default()
    }

    /// Applies a batch in submission order and acknowledges every operation.
    ///
    /// The whole batch is queued before the first operation is processed; an
    /// operation that fails leaves the tables untouched and does not affect
    /// its siblings.
    pub async fn apply_batch(
        &mut self,
        ctx: &mut ProgramContext,
        operations: Vec<AftOperation>,
    ) -> Vec<AftResult> {
        self.queue.push_batch(operations);
        debug!(
            "AftOrch: client {} queued {} operations",
            ctx.client_id,
            self.queue.pending_count()
        );

        let pending = self.queue.drain();
        let mut results = Vec::with_capacity(pending.len());
        for op in pending {
            self.stats.operations += 1;
            let res = match self.apply(ctx, &op).await {
                Ok(result) => {
                    self.stats.installed += 1;
                    debug!("AftOrch: {} -> {}", op, result);
                    AftResult::installed(op.id, op.op, op.key(), result)
                }
                Err(e) => {
                    self.stats.failed += 1;
                    warn!("AftOrch: {} failed: {}", op, e);
                    AftResult::failed(op.id, op.op, op.key(), &e)
                }
            };
            results.push(res);
        }
        results
    }

    async fn apply(
        &mut self,
        ctx: &mut ProgramContext,
        op: &AftOperation,
    ) -> Result<ProgrammingResult, ProgrammingError> {
        check_operation_id(ctx, op)?;
        check_election(ctx, op)?;

        if !self.instances.contains_key(&op.network_instance) {
            return Err(ProgrammingError::invalid_entry(format!(
                "unknown network instance {}",
                op.network_instance
            )));
        }

        let result = ctx.installed_result();
        match op.op {
            OperationType::Add => self.upsert(ctx, op, false, result).await?,
            OperationType::Replace => self.upsert(ctx, op, true, result).await?,
            OperationType::Delete => self.delete(&op.network_instance, &op.key()).await?,
        }
        Ok(result)
    }

    async fn upsert(
        &mut self,
        ctx: &ProgramContext,
        op: &AftOperation,
        must_exist: bool,
        result: ProgrammingResult,
    ) -> Result<(), ProgrammingError> {
        op.entry
            .validate()
            .map_err(|e| ProgrammingError::invalid_entry(e.to_string()))?;

        let key = op.key();
        let ni = op.network_instance.as_str();
        {
            let aft = self.instance(ni)?;
            let exists = aft.contains(&key);
            if must_exist && !exists {
                return Err(ProgrammingError::NotFound(key));
            }
            if !exists && aft.table_len(key.kind()) >= self.config.max_entries_per_table {
                return Err(ProgrammingError::ResourceExhausted(format!(
                    "{} table of {} holds {} entries",
                    key.kind(),
                    ni,
                    self.config.max_entries_per_table
                )));
            }
            if let Some(missing) = op.entry.references().into_iter().find(|r| !aft.contains(r)) {
                return Err(ProgrammingError::ForwardReference {
                    dependent: key,
                    missing,
                });
            }
        }

        // Hardware first: a rejected entry never reaches the RIB.
        if let Err(e) = self.push_to_forwarding(ni, &op.entry).await {
            self.stats.forwarding_failures += 1;
            return Err(ProgrammingError::ForwardingPlane {
                key,
                message: e.to_string(),
            });
        }

        self.instance_mut(ni)?
            .install(op.entry.clone(), ctx.client_id, result)
            .map_err(|e| ProgrammingError::invalid_entry(format!("{}: {}", key, e)))
    }

    async fn delete(&mut self, ni: &str, key: &EntryKey) -> Result<(), ProgrammingError> {
        match self.instance(ni)?.ref_count(key) {
            None => return Err(ProgrammingError::NotFound(*key)),
            Some(count) if count > 0 => {
                return Err(ProgrammingError::StillReferenced { key: *key, count })
            }
            Some(_) => {}
        }

        if let Err(e) = self.withdraw_from_forwarding(ni, key).await {
            self.stats.forwarding_failures += 1;
            return Err(ProgrammingError::ForwardingPlane {
                key: *key,
                message: e.to_string(),
            });
        }

        self.instance_mut(ni)?
            .remove(key)
            .map(|_| ())
            .map_err(|e| ProgrammingError::invalid_entry(format!("{}: {}", key, e)))
    }

    /// Removes every entry owned by `client` from every network instance.
    pub async fn remove_owned_by(&mut self, client: ClientId) -> RemovalSummary {
        let mut summary = RemovalSummary::default();
        for ni in self.network_instances() {
            summary += self.remove_where(&ni, Some(client)).await;
        }
        summary
    }

    /// Removes every entry of a network instance.
    pub async fn flush_network_instance(&mut self, ni: &str) -> RemovalSummary {
        self.remove_where(ni, None).await
    }

    /// Removes IPv4 entries, then next-hop-groups, then next-hops. Entries
    /// still referenced by an entry outside the selection are left in place.
    async fn remove_where(&mut self, ni: &str, owner: Option<ClientId>) -> RemovalSummary {
        let mut summary = RemovalSummary::default();
        for kind in [EntryKind::Ipv4, EntryKind::NextHopGroup, EntryKind::NextHop] {
            let keys = match self.instances.get(ni) {
                Some(aft) => aft.keys_of(kind, owner),
                None => return summary,
            };
            for key in keys {
                match self.delete(ni, &key).await {
                    Ok(()) => summary.removed += 1,
                    Err(ProgrammingError::StillReferenced { .. }) => summary.remaining += 1,
                    Err(e) => {
                        // The forwarding plane may already have dropped it.
                        warn!("AftOrch: removing {} from {}: {}", key, ni, e);
                        if let Some(aft) = self.instances.get_mut(ni) {
                            if aft.remove(&key).is_ok() {
                                summary.removed += 1;
                            }
                        }
                    }
                }
            }
        }
        if summary.removed > 0 || summary.remaining > 0 {
            info!(
                "AftOrch: removed {} entries from {} ({} still referenced)",
                summary.removed, ni, summary.remaining
            );
        }
        summary
    }

    fn instance(&self, ni: &str) -> Result<&NetworkInstanceAft, ProgrammingError> {
        self.instances
            .get(ni)
            .ok_or_else(|| ProgrammingError::invalid_entry(format!("unknown network instance {}", ni)))
    }

    fn instance_mut(&mut self, ni: &str) -> Result<&mut NetworkInstanceAft, ProgrammingError> {
        self.instances
            .get_mut(ni)
            .ok_or_else(|| ProgrammingError::invalid_entry(format!("unknown network instance {}", ni)))
    }

    async fn push_to_forwarding(&self, ni: &str, entry: &AftEntry) -> Result<(), ForwardingError> {
        match entry {
            AftEntry::NextHop(nh) => self.forwarding.program_next_hop(ni, nh).await,
            AftEntry::NextHopGroup(nhg) => self.forwarding.program_next_hop_group(ni, nhg).await,
            AftEntry::Ipv4(e) => self.forwarding.program_ipv4(ni, e).await,
        }
    }

    async fn withdraw_from_forwarding(&self, ni: &str, key: &EntryKey) -> Result<(), ForwardingError> {
        match key {
            EntryKey::NextHop(index) => self.forwarding.remove_next_hop(ni, *index).await,
            EntryKey::NextHopGroup(id) => self.forwarding.remove_next_hop_group(ni, *id).await,
            EntryKey::Ipv4(prefix) => self.forwarding.remove_ipv4(ni, prefix).await,
        }
    }
}

/// Ids must be non-zero and strictly increasing within a session. A rejected
/// id is not consumed.
fn check_operation_id(ctx: &mut ProgramContext, op: &AftOperation) -> Result<(), ProgrammingError> {
    if op.id == 0 || op.id <= ctx.last_operation_id {
        return Err(ProgrammingError::InvalidOperationId {
            id: op.id,
            last: ctx.last_operation_id,
        });
    }
    ctx.last_operation_id = op.id;
    Ok(())
}

fn check_election(ctx: &ProgramContext, op: &AftOperation) -> Result<(), ProgrammingError> {
    match ctx.redundancy {
        RedundancyMode::AllPrimary => {
            if op.election_id.is_some() {
                return Err(ProgrammingError::invalid_entry(
                    "election id is only valid with SINGLE_ELECTED_PRIMARY",
                ));
            }
            Ok(())
        }
        RedundancyMode::SingleElectedPrimary => {
            let presented = op.election_id.or(ctx.client_election_id);
            match (presented, ctx.primary_election_id) {
                (None, _) => Err(ProgrammingError::not_primary("no election id presented")),
                (Some(id), Some(primary)) if id < primary => Err(ProgrammingError::not_primary(
                    format!("election id {} is lower than primary {}", id, primary),
                )),
                _ => Ok(()),
            }
        }
    }
}
