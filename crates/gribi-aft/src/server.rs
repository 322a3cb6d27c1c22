//! The gRIBI responder and its client-facing stub.

use async_trait::async_trait;
use gribi_common::{
    now_ns, AckType, AftOperation, AftResult, ElectionId, FlushRequest, FlushResponse,
    FlushResult, FlushTarget, ModifyRequest, ModifyResponse, Persistence, RedundancyMode,
    SessionParameters,
};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::aft::{AftOrch, AftOrchConfig, ClientId, ForwardingPlane, ProgramContext};
use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::session::Session;
use crate::state::{AftState, GetEntry, GetResponse};

/// Client end of an open `Modify` stream.
pub struct ServerStream {
    pub client_id: ClientId,
    pub requests: mpsc::Sender<ModifyRequest>,
    /// Unbounded, so the responder never waits on a client that has not
    /// started reading yet.
    pub responses: mpsc::UnboundedReceiver<ModifyResponse>,
    /// Completes once the responder has finished cleaning up the session.
    pub session: JoinHandle<()>,
}

/// The RPCs a gRIBI client can call.
#[async_trait]
pub trait GribiStub: Send + Sync {
    /// Opens a `Modify` stream.
    fn connect(&self) -> ServerStream;

    async fn flush(&self, request: FlushRequest) -> Result<FlushResponse>;

    async fn get(&self, network_instance: &str) -> Result<GetResponse>;
}

#[derive(Debug, Clone, Default)]
struct SessionRecord {
    params: Option<SessionParameters>,
    election_id: Option<ElectionId>,
}

struct ServerState {
    aft: AftOrch,
    sessions: BTreeMap<ClientId, SessionRecord>,
    /// Highest election id ever presented; survives disconnects.
    primary_election_id: Option<ElectionId>,
}

struct ServerInner {
    config: ServerConfig,
    state: Mutex<ServerState>,
    next_client_id: AtomicU64,
}

/// Handle to the responder. Cloning shares the same AFT and sessions.
#[derive(Clone)]
pub struct GribiServer {
    inner: Arc<ServerInner>,
}

impl GribiServer {
    pub fn new(config: ServerConfig, forwarding: Arc<dyn ForwardingPlane>) -> Self {
        let aft_config = AftOrchConfig {
            network_instances: config.all_network_instances(),
            max_entries_per_table: config.max_entries_per_table,
        };
        let state = ServerState {
            aft: AftOrch::new(aft_config, forwarding),
            sessions: BTreeMap::new(),
            primary_election_id: None,
        };
        Self {
            inner: Arc::new(ServerInner {
                config,
                state: Mutex::new(state),
                next_client_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.state.lock().await.sessions.len()
    }

    pub async fn primary_election_id(&self) -> Option<ElectionId> {
        self.inner.state.lock().await.primary_election_id
    }

    /// Snapshot of a network instance's AFT; empty when it is unknown.
    pub async fn aft_state(&self, network_instance: &str) -> AftState {
        let state = self.inner.state.lock().await;
        match state.aft.network_instance(network_instance) {
            Some(aft) => AftState::from_aft(network_instance, aft),
            None => AftState::empty(network_instance),
        }
    }

    /// Accepts the session parameters of a client.
    ///
    /// Every connected client must use the same parameters.
    pub(crate) async fn negotiate(
        &self,
        client_id: ClientId,
        params: SessionParameters,
    ) -> Result<()> {
        params.validate()?;
        if params.ack_type == AckType::RibAndFib && !self.inner.config.fib_ack_supported {
            return Err(ServerError::UnsupportedParameters(
                "RIB_AND_FIB acknowledgment is not supported".to_string(),
            ));
        }

        let mut state = self.inner.state.lock().await;
        let conflicting = state
            .sessions
            .iter()
            .filter(|(id, _)| **id != client_id)
            .filter_map(|(_, s)| s.params)
            .find(|other| *other != params);
        if let Some(other) = conflicting {
            return Err(ServerError::UnsupportedParameters(format!(
                "parameters {:?} differ from those of connected clients {:?}",
                params, other
            )));
        }

        state.sessions.entry(client_id).or_default().params = Some(params);
        info!(
            "GribiServer: client {} negotiated {:?}/{}/{:?}",
            client_id, params.redundancy, params.persistence, params.ack_type
        );
        Ok(())
    }

    /// Records a client's election id and returns the highest one known.
    pub(crate) async fn update_election(
        &self,
        client_id: ClientId,
        election_id: ElectionId,
    ) -> Result<ElectionId> {
        election_id.validate()?;

        let mut state = self.inner.state.lock().await;
        let redundancy = state
            .sessions
            .get(&client_id)
            .and_then(|s| s.params)
            .map(|p| p.redundancy)
            .unwrap_or_default();
        if redundancy != RedundancyMode::SingleElectedPrimary {
            return Err(ServerError::Election(
                "election id requires SINGLE_ELECTED_PRIMARY redundancy".to_string(),
            ));
        }

        state.sessions.entry(client_id).or_default().election_id = Some(election_id);
        let primary = match state.primary_election_id {
            Some(current) if current >= election_id => current,
            _ => {
                info!(
                    "GribiServer: client {} elected primary with {}",
                    client_id, election_id
                );
                election_id
            }
        };
        state.primary_election_id = Some(primary);
        Ok(primary)
    }

    /// Programs a batch on behalf of a client.
    pub(crate) async fn program(
        &self,
        client_id: ClientId,
        last_operation_id: &mut u64,
        operations: Vec<AftOperation>,
    ) -> Vec<AftResult> {
        let mut state = self.inner.state.lock().await;
        let record = state.sessions.get(&client_id).cloned().unwrap_or_default();
        let params = record.params.unwrap_or_default();

        let mut ctx = ProgramContext {
            client_id,
            redundancy: params.redundancy,
            ack_type: params.ack_type,
            client_election_id: record.election_id,
            primary_election_id: state.primary_election_id,
            last_operation_id: *last_operation_id,
        };
        let results = state.aft.apply_batch(&mut ctx, operations).await;
        *last_operation_id = ctx.last_operation_id;
        results
    }

    /// Ends a client's session, removing its entries unless it asked for
    /// them to be preserved.
    pub(crate) async fn disconnect(&self, client_id: ClientId) {
        let mut state = self.inner.state.lock().await;
        let Some(record) = state.sessions.remove(&client_id) else {
            return;
        };

        let persistence = record.params.map(|p| p.persistence).unwrap_or_default();
        match persistence {
            Persistence::Delete => {
                let summary = state.aft.remove_owned_by(client_id).await;
                info!(
                    "GribiServer: client {} disconnected, removed {} entries ({} still referenced)",
                    client_id, summary.removed, summary.remaining
                );
            }
            Persistence::Preserve => {
                info!(
                    "GribiServer: client {} disconnected, entries preserved",
                    client_id
                );
            }
        }
    }

    fn check_flush_election(state: &ServerState, request: &FlushRequest) -> Result<()> {
        if request.election_override {
            return Ok(());
        }
        let single_primary = state
            .sessions
            .values()
            .filter_map(|s| s.params)
            .any(|p| p.redundancy == RedundancyMode::SingleElectedPrimary);

        match (request.election_id, state.primary_election_id) {
            (Some(id), _) if id.is_zero() => Err(ServerError::FlushRejected(
                "election id must be greater than zero".to_string(),
            )),
            (Some(id), Some(primary)) if id < primary => Err(ServerError::FlushRejected(
                format!("election id {} is lower than primary {}", id, primary),
            )),
            (None, _) if single_primary => Err(ServerError::FlushRejected(
                "an election id or election override is required".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl GribiStub for GribiServer {
    fn connect(&self) -> ServerStream {
        let client_id = self.inner.next_client_id.fetch_add(1, Ordering::Relaxed);
        let depth = self.inner.config.channel_depth.max(1);
        let (req_tx, req_rx) = mpsc::channel(depth);
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        let session = Session::new(client_id, self.clone(), req_rx, resp_tx);
        let handle = tokio::spawn(session.run());

        ServerStream {
            client_id,
            requests: req_tx,
            responses: resp_rx,
            session: handle,
        }
    }

    async fn flush(&self, request: FlushRequest) -> Result<FlushResponse> {
        let mut state = self.inner.state.lock().await;
        Self::check_flush_election(&state, &request)?;

        let targets = match &request.target {
            FlushTarget::All => state.aft.network_instances(),
            FlushTarget::NetworkInstance(name) => {
                if !state.aft.has_network_instance(name) {
                    return Err(ServerError::UnknownNetworkInstance(name.clone()));
                }
                vec![name.clone()]
            }
        };

        let mut remaining = 0;
        for ni in &targets {
            remaining += state.aft.flush_network_instance(ni).await.remaining;
        }
        if remaining > 0 {
            warn!("GribiServer: flush left {} referenced entries", remaining);
        }

        Ok(FlushResponse {
            timestamp_ns: now_ns(),
            result: if remaining == 0 {
                FlushResult::Ok
            } else {
                FlushResult::NonZeroReferenceRemain
            },
        })
    }

    async fn get(&self, network_instance: &str) -> Result<GetResponse> {
        let state = self.inner.state.lock().await;
        if !state.aft.has_network_instance(network_instance) {
            return Err(ServerError::UnknownNetworkInstance(
                network_instance.to_string(),
            ));
        }
        let entries = state
            .aft
            .entries(network_instance)
            .into_iter()
            .map(|e| GetEntry {
                network_instance: network_instance.to_string(),
                entry: e.entry,
                owner: e.owner,
                result: e.result,
            })
            .collect();
        Ok(GetResponse { entries })
    }
}
