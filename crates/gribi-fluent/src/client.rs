//! The fluent gRIBI client.

use gribi_aft::{GetResponse, GribiStub, ServerStream};
use gribi_common::{
    AckType, AftOperation, ElectionId, FlushRequest, FlushResponse, FlushTarget, ModifyRequest,
    ModifyResponse, OperationType, Persistence, RedundancyMode, SessionParameters,
    SessionParamsResult,
};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::entry::EntryBuilder;
use crate::error::{ClientError, Result};
use crate::result::OpResult;

/// Options of the `Modify` session, set before [`GribiClient::start`].
#[derive(Clone, Default)]
pub struct Connection {
    stub: Option<Arc<dyn GribiStub>>,
    redundancy: RedundancyMode,
    persistence: Persistence,
    ack_type: AckType,
    initial_election_id: Option<ElectionId>,
}

impl Connection {
    pub fn with_stub(&mut self, stub: impl GribiStub + 'static) -> &mut Self {
        self.stub = Some(Arc::new(stub));
        self
    }

    pub fn with_redundancy_mode(&mut self, mode: RedundancyMode) -> &mut Self {
        self.redundancy = mode;
        self
    }

    /// Election id sent with the first request. Low word first.
    pub fn with_initial_election_id(&mut self, low: u64, high: u64) -> &mut Self {
        self.initial_election_id = Some(ElectionId::new(low, high));
        self
    }

    /// Keep programmed entries when the session ends.
    pub fn with_persistence(&mut self) -> &mut Self {
        self.persistence = Persistence::Preserve;
        self
    }

    /// Ask for acknowledgments once entries reach hardware.
    pub fn with_fib_ack(&mut self) -> &mut Self {
        self.ack_type = AckType::RibAndFib;
        self
    }

    pub fn params(&self) -> SessionParameters {
        SessionParameters {
            redundancy: self.redundancy,
            persistence: self.persistence,
            ack_type: self.ack_type,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.stub.is_none() {
            return Err(ClientError::NoStub);
        }
        match (self.redundancy, self.initial_election_id) {
            (RedundancyMode::SingleElectedPrimary, None) => Err(ClientError::InvalidConnection(
                "an elected primary client needs an initial election id".to_string(),
            )),
            (RedundancyMode::AllPrimary, Some(_)) => Err(ClientError::InvalidConnection(
                "election ids are only used by elected primary clients".to_string(),
            )),
            (_, Some(id)) if id.is_zero() => Err(ClientError::InvalidConnection(
                "election id must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Acknowledgments the client is still waiting for.
#[derive(Debug, Default)]
struct Pending {
    params: bool,
    election: bool,
    operations: BTreeSet<u64>,
}

impl Pending {
    fn count(&self) -> usize {
        usize::from(self.params) + usize::from(self.election) + self.operations.len()
    }

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// A gRIBI client.
///
/// Operation ids are assigned by the client, starting at 1. Every submitted
/// operation is expected to be acknowledged exactly once.
pub struct GribiClient {
    connection: Connection,
    stream: Option<ServerStream>,
    election_id: Option<ElectionId>,
    next_operation_id: u64,
    pending: Pending,
    results: Vec<OpResult>,
}

impl Default for GribiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GribiClient {
    pub fn new() -> Self {
        Self {
            connection: Connection::default(),
            stream: None,
            election_id: None,
            next_operation_id: 1,
            pending: Pending::default(),
            results: Vec::new(),
        }
    }

    /// Connection options; changes apply to the next [`start`](Self::start).
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.connection
    }

    pub fn is_started(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the `Modify` stream.
    pub fn start(&mut self) -> Result<()> {
        self.connection.validate()?;
        let stub = self.connection.stub.as_ref().ok_or(ClientError::NoStub)?;
        let stream = stub.connect();
        info!("GribiClient: session {} started", stream.client_id);
        self.stream = Some(stream);
        self.election_id = self.connection.initial_election_id;
        self.pending = Pending::default();
        Ok(())
    }

    /// Sends the session parameters and the initial election id.
    pub async fn start_sending(&mut self) -> Result<()> {
        let mut request = ModifyRequest::default().with_params(self.connection.params());
        if let Some(id) = self.election_id {
            request = request.with_election_id(id);
            self.pending.election = true;
        }
        self.pending.params = true;
        self.send(request).await
    }

    /// Presents a new election id.
    pub async fn update_election_id(&mut self, low: u64, high: u64) -> Result<()> {
        let id = ElectionId::new(low, high);
        self.election_id = Some(id);
        self.pending.election = true;
        self.send(ModifyRequest::default().with_election_id(id)).await
    }

    /// Starts a batch of operations.
    pub fn modify(&mut self) -> Modify<'_> {
        Modify {
            client: self,
            operations: Vec::new(),
        }
    }

    /// Starts a `Flush` request.
    pub fn flush(&self) -> Flush<'_> {
        Flush {
            client: self,
            target: None,
            election_override: false,
        }
    }

    pub async fn get(&self, network_instance: &str) -> Result<GetResponse> {
        let stub = self.connection.stub.as_ref().ok_or(ClientError::NoStub)?;
        Ok(stub.get(network_instance).await?)
    }

    /// Waits until every pending acknowledgment has arrived.
    ///
    /// Expiry of `timeout` is reported as [`ClientError::AwaitTimeout`].
    pub async fn await_timeout(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !self.pending.is_empty() {
            let stream = self.stream.as_mut().ok_or(ClientError::NotStarted)?;
            let response = match tokio::time::timeout_at(deadline, stream.responses.recv()).await {
                Err(_) => {
                    return Err(ClientError::AwaitTimeout {
                        timeout,
                        pending: self.pending.count(),
                    })
                }
                Ok(None) => return Err(ClientError::SessionClosed),
                Ok(Some(response)) => response,
            };
            self.handle_response(response)?;
        }
        Ok(())
    }

    /// Every result received so far, in arrival order.
    pub fn results(&self) -> &[OpResult] {
        &self.results
    }

    /// Closes the stream and waits for the server to finish the session.
    pub async fn stop(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        let client_id = stream.client_id;
        let ServerStream {
            requests, session, ..
        } = stream;
        drop(requests);
        if let Err(e) = session.await {
            warn!("GribiClient: session {} ended abnormally: {}", client_id, e);
        }
        info!("GribiClient: session {} stopped", client_id);
    }

    async fn send(&mut self, request: ModifyRequest) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(ClientError::NotStarted)?;
        stream
            .requests
            .send(request)
            .await
            .map_err(|_| ClientError::SessionClosed)
    }

    fn handle_response(&mut self, response: ModifyResponse) -> Result<()> {
        if let Some(params) = response.session_params_result {
            self.pending.params = false;
            self.results.push(OpResult {
                timestamp_ns: gribi_common::now_ns(),
                session_params: Some(params.clone()),
                ..Default::default()
            });
            if let SessionParamsResult::Error(msg) = params {
                return Err(ClientError::ParamsRejected(msg));
            }
        }

        if let Some(id) = response.election_id {
            self.pending.election = false;
            self.results.push(OpResult {
                timestamp_ns: gribi_common::now_ns(),
                current_election_id: Some(id),
                ..Default::default()
            });
        }

        for ack in &response.results {
            if !self.pending.operations.remove(&ack.id) {
                warn!("GribiClient: unexpected acknowledgment {}", ack);
            }
            debug!("GribiClient: {}", ack);
            self.results.push(OpResult::from(ack));
        }

        match response.error {
            Some(err) => Err(ClientError::Session(err)),
            None => Ok(()),
        }
    }
}

/// A batch under construction. Sent as a single request.
pub struct Modify<'a> {
    client: &'a mut GribiClient,
    operations: Vec<(OperationType, Result<(String, gribi_common::AftEntry)>)>,
}

impl Modify<'_> {
    pub fn add_entry(mut self, entry: impl EntryBuilder) -> Self {
        self.operations.push((OperationType::Add, entry.build()));
        self
    }

    pub fn replace_entry(mut self, entry: impl EntryBuilder) -> Self {
        self.operations.push((OperationType::Replace, entry.build()));
        self
    }

    pub fn delete_entry(mut self, entry: impl EntryBuilder) -> Self {
        self.operations.push((OperationType::Delete, entry.build()));
        self
    }

    /// Assigns operation ids in call order and submits the batch. Returns the
    /// assigned ids.
    pub async fn send(self) -> Result<Vec<u64>> {
        let client = self.client;
        let mut operations = Vec::with_capacity(self.operations.len());
        for (op, built) in self.operations {
            let (ni, entry) = built?;
            operations.push((op, ni, entry));
        }

        let election_id = match client.connection.redundancy {
            RedundancyMode::SingleElectedPrimary => client.election_id,
            RedundancyMode::AllPrimary => None,
        };
        let mut ids = Vec::with_capacity(operations.len());
        let batch: Vec<AftOperation> = operations
            .into_iter()
            .map(|(op, ni, entry)| {
                let id = client.next_operation_id;
                client.next_operation_id += 1;
                ids.push(id);
                let operation = AftOperation::new(id, ni, op, entry);
                match election_id {
                    Some(e) => operation.with_election_id(e),
                    None => operation,
                }
            })
            .collect();

        client.send(ModifyRequest::default().with_operations(batch)).await?;
        client.pending.operations.extend(ids.iter().copied());
        Ok(ids)
    }
}

/// A `Flush` request under construction.
pub struct Flush<'a> {
    client: &'a GribiClient,
    target: Option<FlushTarget>,
    election_override: bool,
}

impl Flush<'_> {
    pub fn with_election_override(mut self) -> Self {
        self.election_override = true;
        self
    }

    pub fn with_all_network_instances(mut self) -> Self {
        self.target = Some(FlushTarget::All);
        self
    }

    pub fn with_network_instance(mut self, name: impl Into<String>) -> Self {
        self.target = Some(FlushTarget::NetworkInstance(name.into()));
        self
    }

    pub async fn send(self) -> Result<FlushResponse> {
        let target = self.target.ok_or_else(|| {
            ClientError::InvalidConnection("flush needs a network instance selection".to_string())
        })?;
        let stub = self
            .client
            .connection
            .stub
            .as_ref()
            .ok_or(ClientError::NoStub)?;
        let request = FlushRequest {
            target,
            election_override: self.election_override,
            election_id: if self.election_override {
                None
            } else {
                self.client.election_id
            },
        };
        Ok(stub.flush(request).await?)
    }
}
