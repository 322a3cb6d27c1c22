//! The suite end to end against the simulated testbed.

use gribi_aft::GribiStub;
use gribi_common::{OperationType, Persistence, ProgrammingResult};
use gribi_fluent::{GribiClient, OpResult};
use ordering_ack::attrs::{DUT_DST, NHG_INDEX};
use ordering_ack::cases::run_case;
use ordering_ack::dut::InterfaceConfig;
use ordering_ack::{Case, CaseOutcome, Suite, SuiteConfig, Testbed, ALL_PERSISTENCE};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn fast_config() -> SuiteConfig {
    let mut config = SuiteConfig::default();
    config.timing.await_timeout_secs = 5;
    config.traffic.duration_ms = 20;
    config.traffic.rate_pps = 10_000;
    config
}

/// Operation acknowledgments without timestamps, in arrival order.
fn acks(results: &[OpResult]) -> Vec<(u64, OperationType, ProgrammingResult)> {
    results
        .iter()
        .filter_map(|r| Some((r.operation_id?, r.op_type?, r.programming_result?)))
        .collect()
}

#[tokio::test]
async fn test_all_cases_pass_in_both_modes() {
    let mut suite = Suite::new(fast_config()).unwrap();
    let report = suite.run(&ALL_PERSISTENCE).await;

    assert_eq!(report.runs.len(), 2);
    for case in report.cases() {
        assert_eq!(
            case.outcome,
            CaseOutcome::Passed,
            "{} [{}]: {:?}",
            case.name,
            case.persistence,
            case.failures
        );
    }
    assert_eq!(report.cases().count(), 8);
    assert!(report.is_passed());

    let traffic: Vec<_> = report.cases().flat_map(|c| c.flows.iter()).collect();
    assert_eq!(traffic.len(), 4);
    assert!(traffic.iter().all(|f| f.tx_frames > 0 && f.rx_frames == f.tx_frames));
}

#[tokio::test]
async fn test_forward_reference_fails_only_dependent() {
    let mut suite = Suite::new(fast_config()).unwrap();
    let report = suite
        .run_case(Persistence::Delete, Case::ModifyIpv4Nhg)
        .await;

    assert!(report.is_passed(), "{:?}", report.failures);
    assert_eq!(
        acks(&report.results),
        vec![
            (1, OperationType::Add, ProgrammingResult::InstalledInFib),
            (2, OperationType::Add, ProgrammingResult::Failed),
            (3, OperationType::Add, ProgrammingResult::InstalledInFib),
        ]
    );
}

#[tokio::test]
async fn test_add_delete_add_leaves_prefix_installed() {
    let mut suite = Suite::new(fast_config()).unwrap();
    let report = suite
        .run_case(Persistence::Delete, Case::ModifyIpv4AddDelAdd)
        .await;

    assert!(report.is_passed(), "{:?}", report.failures);
    let ops: Vec<_> = acks(&report.results)
        .into_iter()
        .map(|(id, op, _)| (id, op))
        .collect();
    assert_eq!(
        ops,
        vec![
            (1, OperationType::Add),
            (2, OperationType::Add),
            (3, OperationType::Add),
            (4, OperationType::Delete),
            (5, OperationType::Add),
        ]
    );
}

#[tokio::test]
async fn test_entries_removed_after_each_case() {
    let mut suite = Suite::new(fast_config()).unwrap();
    for persistence in ALL_PERSISTENCE {
        let report = suite.run_case(persistence, Case::ModifyNhgIpv4).await;
        assert!(report.is_passed(), "{:?}", report.failures);

        let testbed = suite.testbed();
        let state = testbed.dut.aft_state(testbed.network_instance()).await;
        assert!(state.next_hops.is_empty(), "{}", persistence);
        assert!(state.next_hop_groups.is_empty(), "{}", persistence);
        assert!(state.ipv4_entries.is_empty(), "{}", persistence);
        assert_eq!(testbed.dut.fib().route_count(testbed.network_instance()), 0);
        assert_eq!(testbed.dut.server().session_count().await, 0);
    }
}

#[tokio::test]
async fn test_persistence_mode_does_not_change_results() {
    let mut suite = Suite::new(fast_config()).unwrap();
    for case in Case::ALL {
        let preserve = suite.run_case(Persistence::Preserve, case).await;
        let delete = suite.run_case(Persistence::Delete, case).await;
        assert_eq!(acks(&preserve.results), acks(&delete.results), "{}", case);
        assert_eq!(preserve.outcome, delete.outcome, "{}", case);
    }
}

#[tokio::test]
async fn test_rib_ack_only_deviation() {
    let mut config = fast_config();
    config.deviations.gribi_rib_ack_only = true;
    let mut suite = Suite::new(config).unwrap();
    let report = suite.run(&ALL_PERSISTENCE).await;

    assert!(report.is_passed());
    for case in report.cases() {
        assert!(acks(&case.results)
            .iter()
            .all(|(_, _, result)| *result != ProgrammingResult::InstalledInFib));
    }
}

#[tokio::test]
async fn test_preserve_only_deviation_skips_delete() {
    let mut config = fast_config();
    config.deviations.gribi_preserve_only = true;
    let mut suite = Suite::new(config).unwrap();
    let report = suite.run(&ALL_PERSISTENCE).await;

    assert_eq!(report.runs[0].persistence, Persistence::Preserve);
    assert_eq!(report.runs[0].cases.len(), 4);
    assert_eq!(report.runs[1].persistence, Persistence::Delete);
    assert!(report.runs[1].skipped.is_some());
    assert!(report.runs[1].cases.is_empty());
    assert!(report.is_passed());
}

#[tokio::test]
async fn test_custom_network_instance_and_interface_enabled() {
    let mut config = fast_config();
    config.deviations.default_network_instance = "default".to_string();
    config.deviations.interface_enabled = true;
    let mut suite = Suite::new(config).unwrap();

    let dut = &suite.testbed().dut;
    assert_eq!(dut.interface("Ethernet0").unwrap().enabled, Some(true));

    let report = suite
        .run_case(Persistence::Preserve, Case::ModifyIpv4AddDelAdd)
        .await;
    assert!(report.is_passed(), "{:?}", report.failures);
}

#[tokio::test]
async fn test_disabled_egress_reports_loss() {
    let config = fast_config();
    let mut testbed = Testbed::new(&config).unwrap();
    let name = testbed.dut.port("port2").unwrap().to_string();
    let mut intf = InterfaceConfig::from_attrs(&name, &DUT_DST, false).unwrap();
    intf.enabled = Some(false);
    testbed.dut.replace_interface(intf).unwrap();

    let report = run_case(&mut testbed, &config, Persistence::Delete, Case::ModifyNhgIpv4).await;
    assert_eq!(report.outcome, CaseOutcome::Failed);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].check, "traffic");
    assert_eq!(report.flows[0].rx_frames, 0);
}

#[tokio::test]
async fn test_negotiation_failure_is_fatal() {
    let config = fast_config();
    let mut testbed = Testbed::new(&config).unwrap();

    // A connected client with different parameters blocks negotiation.
    let mut other = GribiClient::new();
    other.connection().with_stub(testbed.dut.server().clone());
    other.start().unwrap();
    other.start_sending().await.unwrap();
    other.await_timeout(Duration::from_secs(5)).await.unwrap();

    let report = run_case(&mut testbed, &config, Persistence::Delete, Case::ModifyNhg).await;
    match report.outcome {
        CaseOutcome::Fatal { ref reason } => {
            assert!(reason.contains("session negotiation"), "{}", reason)
        }
        ref outcome => panic!("unexpected outcome {}", outcome),
    }
    assert!(acks(&report.results).is_empty());

    other.stop().await;
    let state = testbed.dut.aft_state(testbed.network_instance()).await;
    assert!(state.next_hop_group(NHG_INDEX).is_none());
    let get = testbed
        .dut
        .server()
        .get(testbed.network_instance())
        .await
        .unwrap();
    assert!(get.entries.is_empty());
}
