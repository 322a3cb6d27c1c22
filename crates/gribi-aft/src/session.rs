//! Per-client `Modify` stream handling.

use gribi_common::{ModifyRequest, ModifyResponse, SessionParameters, SessionParamsResult};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::aft::ClientId;
use crate::error::{Result, ServerError};
use crate::server::GribiServer;

/// Serves one `Modify` stream until the client closes it or a stream-level
/// error occurs.
pub(crate) struct Session {
    client_id: ClientId,
    server: GribiServer,
    requests: mpsc::Receiver<ModifyRequest>,
    responses: mpsc::UnboundedSender<ModifyResponse>,
    negotiated: bool,
    last_operation_id: u64,
}

impl Session {
    pub(crate) fn new(
        client_id: ClientId,
        server: GribiServer,
        requests: mpsc::Receiver<ModifyRequest>,
        responses: mpsc::UnboundedSender<ModifyResponse>,
    ) -> Self {
        Self {
            client_id,
            server,
            requests,
            responses,
            negotiated: false,
            last_operation_id: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Session {}: opened", self.client_id);

        while let Some(request) = self.requests.recv().await {
            if let Err(e) = self.handle_request(request).await {
                warn!("Session {}: closing on error: {}", self.client_id, e);
                let _ = self
                    .responses
                    .send(ModifyResponse::with_error(e.to_string()));
                break;
            }
        }

        self.server.disconnect(self.client_id).await;
        info!("Session {}: closed", self.client_id);
    }

    async fn handle_request(&mut self, request: ModifyRequest) -> Result<()> {
        debug!(
            "Session {}: request with {} operations",
            self.client_id,
            request.operations.len()
        );

        match request.params {
            Some(_) if self.negotiated => return Err(ServerError::ParamsAfterFirstRequest),
            Some(params) => {
                if let Err(e) = self.server.negotiate(self.client_id, params).await {
                    self.respond(ModifyResponse::with_params_result(
                        SessionParamsResult::Error(e.to_string()),
                    ))?;
                    return Err(e);
                }
                self.respond(ModifyResponse::with_params_result(SessionParamsResult::Ok))?;
            }
            None if !self.negotiated => {
                self.server
                    .negotiate(self.client_id, SessionParameters::default())
                    .await?;
            }
            None => {}
        }
        self.negotiated = true;

        if let Some(election_id) = request.election_id {
            let primary = self
                .server
                .update_election(self.client_id, election_id)
                .await?;
            self.respond(ModifyResponse::with_election_id(primary))?;
        }

        if !request.operations.is_empty() {
            let results = self
                .server
                .program(self.client_id, &mut self.last_operation_id, request.operations)
                .await;
            self.respond(ModifyResponse::with_results(results))?;
        }
        Ok(())
    }

    fn respond(&self, response: ModifyResponse) -> Result<()> {
        self.responses
            .send(response)
            .map_err(|_| ServerError::SessionClosed)
    }
}
