//! Integration tests for the gRIBI responder.
//!
//! These drive the server through raw `Modify` streams, the way a client
//! library would.

use gribi_aft::{GribiServer, GribiStub, ServerConfig, ServerStream, SimulatedFib};
use gribi_common::{
    AckType, AftOperation, ElectionId, FlushRequest, FlushResult, FlushTarget, Ipv4Entry,
    ModifyRequest, ModifyResponse, NextHopEntry, NextHopGroupEntry, OperationType, Persistence,
    ProgrammingResult, RedundancyMode, SessionParameters, SessionParamsResult,
};
use gribi_types::{IpAddress, IpPrefix};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const NI: &str = "DEFAULT";

fn server(config: ServerConfig) -> (GribiServer, Arc<SimulatedFib>) {
    let fib = Arc::new(SimulatedFib::new());
    (GribiServer::new(config, fib.clone()), fib)
}

fn params(persistence: Persistence, ack_type: AckType) -> SessionParameters {
    SessionParameters {
        redundancy: RedundancyMode::SingleElectedPrimary,
        persistence,
        ack_type,
    }
}

fn prefix() -> IpPrefix {
    "203.0.113.0/24".parse().unwrap()
}

fn chain(first_id: u64) -> Vec<AftOperation> {
    vec![
        AftOperation::new(
            first_id,
            NI,
            OperationType::Add,
            NextHopEntry::new(42).with_ip_address("192.0.2.6".parse::<IpAddress>().unwrap()),
        ),
        AftOperation::new(
            first_id + 1,
            NI,
            OperationType::Add,
            NextHopGroupEntry::new(10).add_next_hop(42, 1),
        ),
        AftOperation::new(
            first_id + 2,
            NI,
            OperationType::Add,
            Ipv4Entry::new(prefix(), 10),
        ),
    ]
}

async fn recv(stream: &mut ServerStream) -> ModifyResponse {
    tokio::time::timeout(Duration::from_secs(5), stream.responses.recv())
        .await
        .expect("response timed out")
        .expect("stream closed")
}

async fn open(server: &GribiServer, p: SessionParameters) -> ServerStream {
    let mut stream = server.connect();
    stream
        .requests
        .send(
            ModifyRequest::default()
                .with_params(p)
                .with_election_id(ElectionId::new(1, 0)),
        )
        .await
        .unwrap();
    assert_eq!(
        recv(&mut stream).await.session_params_result,
        Some(SessionParamsResult::Ok)
    );
    assert_eq!(
        recv(&mut stream).await.election_id,
        Some(ElectionId::new(1, 0))
    );
    stream
}

async fn close(stream: ServerStream) {
    drop(stream.requests);
    stream.session.await.unwrap();
}

#[tokio::test]
async fn test_programs_chain_and_reports_state() {
    let (server, fib) = server(ServerConfig::default());
    let mut stream = open(&server, params(Persistence::Preserve, AckType::RibAndFib)).await;

    stream
        .requests
        .send(ModifyRequest::default().with_operations(chain(1)))
        .await
        .unwrap();
    let resp = recv(&mut stream).await;
    let got: Vec<_> = resp.results.iter().map(|r| (r.id, r.result)).collect();
    assert_eq!(
        got,
        vec![
            (1, ProgrammingResult::InstalledInFib),
            (2, ProgrammingResult::InstalledInFib),
            (3, ProgrammingResult::InstalledInFib),
        ]
    );

    let state = server.aft_state(NI).await;
    assert_eq!(state.next_hop_group(10).unwrap().weights(), vec![1]);
    assert!(state.ipv4_entry(&prefix()).is_some());
    assert_eq!(fib.route_count(NI), 1);

    let get = server.get(NI).await.unwrap();
    assert_eq!(get.entries.len(), 3);
    close(stream).await;
}

#[tokio::test]
async fn test_delete_persistence_cleans_up_on_disconnect() {
    let (server, fib) = server(ServerConfig::default());
    let mut stream = open(&server, params(Persistence::Delete, AckType::Rib)).await;
    stream
        .requests
        .send(ModifyRequest::default().with_operations(chain(1)))
        .await
        .unwrap();
    recv(&mut stream).await;

    close(stream).await;
    assert!(server.aft_state(NI).await.ipv4_entries.is_empty());
    assert_eq!(fib.route_count(NI), 0);
    assert_eq!(server.session_count().await, 0);
}

#[tokio::test]
async fn test_preserve_persistence_keeps_entries_until_flush() {
    let (server, _) = server(ServerConfig::default());
    let mut stream = open(&server, params(Persistence::Preserve, AckType::Rib)).await;
    stream
        .requests
        .send(ModifyRequest::default().with_operations(chain(1)))
        .await
        .unwrap();
    recv(&mut stream).await;
    close(stream).await;

    assert_eq!(server.aft_state(NI).await.ipv4_entries.len(), 1);

    let resp = server
        .flush(FlushRequest {
            target: FlushTarget::All,
            election_override: true,
            election_id: None,
        })
        .await
        .unwrap();
    assert_eq!(resp.result, FlushResult::Ok);
    assert_eq!(server.aft_state(NI).await, gribi_aft::AftState::empty(NI));
}

#[tokio::test]
async fn test_fib_ack_rejected_when_unsupported() {
    let (server, _) = server(ServerConfig::default().with_fib_ack_supported(false));
    let mut stream = server.connect();
    stream
        .requests
        .send(ModifyRequest::default().with_params(params(Persistence::Delete, AckType::RibAndFib)))
        .await
        .unwrap();

    match recv(&mut stream).await.session_params_result {
        Some(SessionParamsResult::Error(msg)) => assert!(msg.contains("RIB_AND_FIB")),
        other => panic!("unexpected params result {:?}", other),
    }
    assert!(recv(&mut stream).await.error.is_some());
    assert!(stream.responses.recv().await.is_none());
}

#[tokio::test]
async fn test_connected_clients_must_agree_on_parameters() {
    let (server, _) = server(ServerConfig::default());
    let first = open(&server, params(Persistence::Preserve, AckType::Rib)).await;

    let mut second = server.connect();
    second
        .requests
        .send(ModifyRequest::default().with_params(params(Persistence::Delete, AckType::Rib)))
        .await
        .unwrap();
    assert!(matches!(
        recv(&mut second).await.session_params_result,
        Some(SessionParamsResult::Error(_))
    ));

    close(first).await;
}

#[tokio::test]
async fn test_params_after_first_request_close_stream() {
    let (server, _) = server(ServerConfig::default());
    let mut stream = open(&server, params(Persistence::Delete, AckType::Rib)).await;
    stream
        .requests
        .send(ModifyRequest::default().with_params(params(Persistence::Delete, AckType::Rib)))
        .await
        .unwrap();

    let resp = recv(&mut stream).await;
    assert!(resp.error.unwrap().contains("first request"));
    assert!(stream.responses.recv().await.is_none());
}

#[tokio::test]
async fn test_lower_election_id_cannot_program() {
    let (server, _) = server(ServerConfig::default());
    let mut primary = server.connect();
    primary
        .requests
        .send(
            ModifyRequest::default()
                .with_params(params(Persistence::Preserve, AckType::Rib))
                .with_election_id(ElectionId::new(5, 0)),
        )
        .await
        .unwrap();
    recv(&mut primary).await;
    assert_eq!(
        recv(&mut primary).await.election_id,
        Some(ElectionId::new(5, 0))
    );

    // A backup client with a lower id learns the current primary.
    let mut backup = server.connect();
    backup
        .requests
        .send(
            ModifyRequest::default()
                .with_params(params(Persistence::Preserve, AckType::Rib))
                .with_election_id(ElectionId::new(1, 0)),
        )
        .await
        .unwrap();
    recv(&mut backup).await;
    assert_eq!(
        recv(&mut backup).await.election_id,
        Some(ElectionId::new(5, 0))
    );

    backup
        .requests
        .send(ModifyRequest::default().with_operations(chain(1)))
        .await
        .unwrap();
    let resp = recv(&mut backup).await;
    assert!(resp
        .results
        .iter()
        .all(|r| r.result == ProgrammingResult::Failed));

    let err = server
        .flush(FlushRequest {
            target: FlushTarget::All,
            election_override: false,
            election_id: Some(ElectionId::new(1, 0)),
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("lower than primary"));

    close(backup).await;
    close(primary).await;
}

#[tokio::test]
async fn test_flush_unknown_network_instance() {
    let (server, _) = server(ServerConfig::default());
    let err = server
        .flush(FlushRequest {
            target: FlushTarget::NetworkInstance("VRF-X".to_string()),
            election_override: true,
            election_id: None,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("VRF-X"));
    assert!(server.get("VRF-X").await.is_err());
    assert!(server.aft_state("VRF-X").await.next_hops.is_empty());
}
