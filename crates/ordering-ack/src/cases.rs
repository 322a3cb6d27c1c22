//! The ordering and acknowledgment cases.
//!
//! Every case runs with its own elected-primary client (election id 1) and
//! checks the acknowledgments of its operations by id. Checks that fail are
//! recorded and the case continues; a failed wait for acknowledgments after
//! a batch ends the case.

use gribi_common::{OperationType, Persistence, ProgrammingResult, RedundancyMode};
use gribi_fluent::{
    chk, ipv4_entry, next_hop_entry, next_hop_group_entry, operation_result, GribiClient, OpResult,
    OperationResultBuilder,
};
use gribi_types::IpPrefix;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::attrs::{
    ATE_DST, ATE_DST_NET_CIDR, ATE_DST_NET_NAME, ATE_SRC, NHG_INDEX, NH_INDEX, NH_WEIGHT,
};
use crate::config::SuiteConfig;
use crate::error::{Result, SuiteError};
use crate::report::CaseReport;
use crate::testbed::Testbed;

/// Name of the flow used for traffic verification.
pub const FLOW_NAME: &str = "Flow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Case {
    /// NH and NHG in one batch.
    ModifyNhg,
    /// NH, an IPv4 entry referencing a not yet defined NHG, then the NHG.
    ModifyIpv4Nhg,
    /// NH, NHG, then the IPv4 entry.
    ModifyNhgIpv4,
    /// NH and NHG, then add, delete and add of the IPv4 entry in one batch.
    ModifyIpv4AddDelAdd,
}

impl Case {
    pub const ALL: [Case; 4] = [
        Case::ModifyNhg,
        Case::ModifyIpv4Nhg,
        Case::ModifyNhgIpv4,
        Case::ModifyIpv4AddDelAdd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Case::ModifyNhg => "Modify NHG",
            Case::ModifyIpv4Nhg => "Modify IPv4 and NHG",
            Case::ModifyNhgIpv4 => "Modify NHG and IPv4",
            Case::ModifyIpv4AddDelAdd => "Modify IPv4 Add Del Add",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Case::ModifyNhg => {
                "A NextHopGroup referencing a NextHop is acknowledged as installed \
                 and is reported through the AFT telemetry."
            }
            Case::ModifyIpv4Nhg => {
                "A single ModifyRequest with an IPv4Entry referencing NextHopGroup 10 \
                 ahead of the operation defining NextHopGroup 10 fails the IPv4Entry."
            }
            Case::ModifyNhgIpv4 => {
                "A single ModifyRequest with NextHopGroup 10 pointing to a NextHop on \
                 ATE port-2, then an IPv4Entry referencing it, is installed and \
                 verified through telemetry and traffic."
            }
            Case::ModifyIpv4AddDelAdd => {
                "A single ModifyRequest adding, deleting and adding IPv4Entry \
                 203.0.113.0/24 is installed and verified through telemetry and traffic."
            }
        }
    }

    async fn run(&self, args: &mut CaseArgs<'_>) -> Result<()> {
        match self {
            Case::ModifyNhg => modify_nhg(args).await,
            Case::ModifyIpv4Nhg => modify_ipv4_nhg(args).await,
            Case::ModifyNhgIpv4 => modify_nhg_ipv4(args).await,
            Case::ModifyIpv4AddDelAdd => modify_ipv4_add_del_add(args).await,
        }
    }
}

impl fmt::Display for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a case works with.
struct CaseArgs<'a> {
    client: &'a mut GribiClient,
    testbed: &'a mut Testbed,
    report: &'a mut CaseReport,
    want_installed: ProgrammingResult,
    network_instance: String,
    await_timeout: Duration,
    traffic_duration: Duration,
}

impl CaseArgs<'_> {
    async fn await_acks(&mut self) -> Result<()> {
        self.client.await_timeout(self.await_timeout).await?;
        Ok(())
    }

    fn expect_result(&mut self, want: OpResult) {
        if let Err(e) = chk::has_result(self.client.results(), &want) {
            self.report.fail("result", e.to_string());
        }
    }

    fn expect_installed(&mut self, id: u64, op: OperationType, target: Target) {
        let want = target
            .apply(operation_result())
            .with_operation_id(id)
            .with_operation_type(op)
            .with_programming_result(self.want_installed)
            .as_result();
        self.expect_result(want);
    }

    async fn check_next_hop_weights(&mut self) {
        let state = self.testbed.dut.aft_state(&self.network_instance).await;
        let mut got = state
            .next_hop_group(NHG_INDEX)
            .map(|g| g.weights())
            .unwrap_or_default();
        got.sort_unstable();
        let want = vec![NH_WEIGHT];
        if got != want {
            self.report.fail(
                "telemetry",
                format!(
                    "next-hop-group/next-hop/state/weight got {:?}, want {:?}",
                    got, want
                ),
            );
        }
    }

    async fn check_ipv4_prefix(&mut self) -> Result<()> {
        let prefix = dst_net_prefix()?;
        let state = self.testbed.dut.aft_state(&self.network_instance).await;
        match state.ipv4_entry(&prefix) {
            Some(entry) if entry.prefix == prefix => {}
            Some(entry) => self.report.fail(
                "telemetry",
                format!("ipv4-entry/state/prefix got {}, want {}", entry.prefix, prefix),
            ),
            None => self.report.fail(
                "telemetry",
                format!("ipv4-entry/state/prefix got none, want {}", prefix),
            ),
        }
        Ok(())
    }

    /// Runs a flow from the source interface to the destination network and
    /// expects no loss.
    async fn check_traffic(&mut self) -> Result<()> {
        let ate = &mut self.testbed.ate;
        ate.new_flow(FLOW_NAME, ATE_SRC.name, ATE_DST_NET_NAME)?;
        ate.start_traffic()?;
        tokio::time::sleep(self.traffic_duration).await;
        ate.stop_traffic(&self.testbed.dut)?;

        let stats = self
            .testbed
            .ate
            .flow_stats(FLOW_NAME)
            .cloned()
            .ok_or_else(|| SuiteError::Traffic(format!("no counters for flow {}", FLOW_NAME)))?;
        let loss = stats.loss_pct();
        if loss > 0.0 {
            self.report.fail(
                "traffic",
                format!("LossPct for flow {} got {}, want 0", FLOW_NAME, loss),
            );
        }
        self.report.flows.push(stats);
        Ok(())
    }
}

/// The entry an expected result refers to.
#[derive(Debug, Clone, Copy)]
enum Target {
    NextHop(u64),
    NextHopGroup(u64),
    Ipv4(IpPrefix),
}

impl Target {
    fn apply(self, builder: OperationResultBuilder) -> OperationResultBuilder {
        match self {
            Target::NextHop(index) => builder.with_next_hop_operation(index),
            Target::NextHopGroup(id) => builder.with_next_hop_group_operation(id),
            Target::Ipv4(prefix) => builder.with_ipv4_operation(prefix),
        }
    }
}

fn dst_net_prefix() -> Result<IpPrefix> {
    ATE_DST_NET_CIDR
        .parse()
        .map_err(|e| SuiteError::Testbed(format!("{}: {}", ATE_DST_NET_CIDR, e)))
}

/// Programs NH 42 and NHG 10 (operation ids 1 and 2).
async fn modify_nhg(args: &mut CaseArgs<'_>) -> Result<()> {
    let ni = args.network_instance.clone();
    args.client
        .modify()
        .add_entry(
            next_hop_entry()
                .with_network_instance(&ni)
                .with_index(NH_INDEX)
                .with_ip_address(ATE_DST.ipv4),
        )
        .add_entry(
            next_hop_group_entry()
                .with_network_instance(&ni)
                .with_id(NHG_INDEX)
                .add_next_hop(NH_INDEX, NH_WEIGHT),
        )
        .send()
        .await?;
    if let Err(e) = args.await_acks().await {
        args.report
            .fail("await", format!("Await got error for ModifyRequest: {}", e));
    }

    args.expect_installed(1, OperationType::Add, Target::NextHop(NH_INDEX));
    args.expect_installed(2, OperationType::Add, Target::NextHopGroup(NHG_INDEX));
    args.check_next_hop_weights().await;
    Ok(())
}

async fn modify_ipv4_nhg(args: &mut CaseArgs<'_>) -> Result<()> {
    let ni = args.network_instance.clone();
    let prefix = dst_net_prefix()?;
    args.client
        .modify()
        .add_entry(
            next_hop_entry()
                .with_network_instance(&ni)
                .with_index(NH_INDEX)
                .with_ip_address(ATE_DST.ipv4),
        )
        .add_entry(
            ipv4_entry()
                .with_network_instance(&ni)
                .with_prefix(ATE_DST_NET_CIDR)
                .with_next_hop_group(NHG_INDEX),
        )
        .add_entry(
            next_hop_group_entry()
                .with_network_instance(&ni)
                .with_id(NHG_INDEX)
                .add_next_hop(NH_INDEX, NH_WEIGHT),
        )
        .send()
        .await?;
    args.await_acks().await?;

    args.expect_result(
        operation_result()
            .with_operation_id(2)
            .with_operation_type(OperationType::Add)
            .with_ipv4_operation(prefix)
            .with_programming_result(ProgrammingResult::Failed)
            .as_result(),
    );
    // The forward reference fails only the entry that holds it.
    args.expect_installed(1, OperationType::Add, Target::NextHop(NH_INDEX));
    args.expect_installed(3, OperationType::Add, Target::NextHopGroup(NHG_INDEX));
    Ok(())
}

async fn modify_nhg_ipv4(args: &mut CaseArgs<'_>) -> Result<()> {
    let ni = args.network_instance.clone();
    let prefix = dst_net_prefix()?;
    args.client
        .modify()
        .add_entry(
            next_hop_entry()
                .with_network_instance(&ni)
                .with_index(NH_INDEX)
                .with_ip_address(ATE_DST.ipv4),
        )
        .add_entry(
            next_hop_group_entry()
                .with_network_instance(&ni)
                .with_id(NHG_INDEX)
                .add_next_hop(NH_INDEX, NH_WEIGHT),
        )
        .add_entry(
            ipv4_entry()
                .with_network_instance(&ni)
                .with_prefix(ATE_DST_NET_CIDR)
                .with_next_hop_group(NHG_INDEX),
        )
        .send()
        .await?;
    args.await_acks().await?;

    args.expect_installed(1, OperationType::Add, Target::NextHop(NH_INDEX));
    args.expect_installed(2, OperationType::Add, Target::NextHopGroup(NHG_INDEX));
    args.expect_installed(3, OperationType::Add, Target::Ipv4(prefix));

    args.check_next_hop_weights().await;
    args.check_ipv4_prefix().await?;
    args.check_traffic().await
}

async fn modify_ipv4_add_del_add(args: &mut CaseArgs<'_>) -> Result<()> {
    modify_nhg(args).await?;

    let prefix = dst_net_prefix()?;
    let entry = ipv4_entry()
        .with_network_instance(&args.network_instance)
        .with_prefix(ATE_DST_NET_CIDR)
        .with_next_hop_group(NHG_INDEX);
    args.client
        .modify()
        .add_entry(entry.clone())
        .delete_entry(entry.clone())
        .add_entry(entry)
        .send()
        .await?;
    args.await_acks().await?;

    args.expect_installed(3, OperationType::Add, Target::Ipv4(prefix));
    args.expect_installed(4, OperationType::Delete, Target::Ipv4(prefix));
    args.expect_installed(5, OperationType::Add, Target::Ipv4(prefix));

    args.check_ipv4_prefix().await?;
    args.check_traffic().await
}

/// Opens the session and waits for the parameters and election id to be
/// acknowledged.
async fn negotiate(client: &mut GribiClient, timeout: Duration) -> Result<()> {
    client.start()?;
    client.start_sending().await?;
    client.await_timeout(timeout).await?;
    Ok(())
}

/// Runs one case with a fresh client under `persistence`.
///
/// With PRESERVE, every network instance is flushed once the case ends. The
/// client is stopped before returning, so DELETE cleanup has completed.
pub async fn run_case(
    testbed: &mut Testbed,
    config: &SuiteConfig,
    persistence: Persistence,
    case: Case,
) -> CaseReport {
    let started = Instant::now();
    let mut report = CaseReport::new(case.name(), case.description(), persistence);
    info!("Name: {}", case.name());
    info!("Description: {}", case.description());

    let mut client = GribiClient::new();
    let conn = client
        .connection()
        .with_stub(testbed.dut.server().clone())
        .with_redundancy_mode(RedundancyMode::SingleElectedPrimary)
        .with_initial_election_id(1, 0);
    if persistence == Persistence::Preserve {
        conn.with_persistence();
    }
    if !config.deviations.gribi_rib_ack_only {
        conn.with_fib_ack();
    }

    let want_installed = if config.deviations.gribi_rib_ack_only {
        ProgrammingResult::InstalledInRib
    } else {
        ProgrammingResult::InstalledInFib
    };

    let fatal = match negotiate(&mut client, config.await_timeout()).await {
        Err(e) => Some(format!("Await got error during session negotiation: {}", e)),
        Ok(()) => {
            let network_instance = testbed.network_instance().to_string();
            let mut args = CaseArgs {
                client: &mut client,
                testbed,
                report: &mut report,
                want_installed,
                network_instance,
                await_timeout: config.await_timeout(),
                traffic_duration: config.traffic_duration(),
            };
            let fatal = case.run(&mut args).await.err().map(|e| e.to_string());

            if persistence == Persistence::Preserve {
                match client
                    .flush()
                    .with_election_override()
                    .with_all_network_instances()
                    .send()
                    .await
                {
                    Ok(response) => debug!("{}: flush {:?}", case, response.result),
                    Err(e) => report.fail("flush", format!("Cannot flush: {}", e)),
                }
            }
            fatal
        }
    };

    client.stop().await;
    report.results = client.results().to_vec();
    report.finish(fatal, started.elapsed());
    info!("{} [{}]: {}", case, persistence, report.outcome);
    report
}
