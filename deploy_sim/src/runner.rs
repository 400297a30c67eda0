//! Scenario runner - drives the coordinator through fault scenarios.

use crate::monitor::IdleMonitor;
use crate::scenarios::ScenarioId;
use crate::topology::{self, BENCH_WORLD, CHURN_ACTIONS, CLIENT_WORLD, OBSERVER_WORLD, SERVER_WORLD};
use crate::world::{SimConfig, SimWorld};

use deploy_core::config::WorldSpec;
use deploy_core::{
    CoordinatorSettings, DeploymentDocument, InitializationMode, LivenessMonitor, LoadReport, Transition,
    WorldAction, WorldKind, WorldStage,
};
use deploy_env::{Endpoint, NetworkController, NodeId};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info, warn};

/// Random stream the staggered join order is drawn from.
const JOIN_STREAM: u64 = 1;

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run (or the topology file name)
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Nodes that checked in at least once
    pub nodes_checked_in: usize,

    /// Configuration commands handed to the network
    pub commands_sent: u64,

    /// Node actions handed to the network
    pub actions_dispatched: u64,

    /// Messages the coordinator could not hand over
    pub undeliverable: u64,

    /// Check-ins refused
    pub config_errors: u64,

    /// Nodes that came back from another host
    pub endpoint_conflicts: u64,

    /// Envelopes that reached a node
    pub envelopes_delivered: u64,

    /// Envelopes lost in the network
    pub envelopes_dropped: u64,

    /// Topology entries dropped while loading
    pub load_warnings: usize,
}

impl ScenarioMetrics {
    fn collect(world: &SimWorld, report: &LoadReport) -> Self {
        let stats = world.coordinator().stats();
        let router = world.router_stats();
        Self {
            nodes_checked_in: world.coordinator().graph().connected_count(),
            commands_sent: stats.commands_sent,
            actions_dispatched: stats.actions_dispatched,
            undeliverable: stats.undeliverable,
            config_errors: stats.config_errors,
            endpoint_conflicts: stats.endpoint_conflicts,
            envelopes_delivered: router.delivered,
            envelopes_dropped: router.dropped,
            load_warnings: report.warnings.len(),
        }
    }
}

/// First failed expectation of a run.
#[derive(Debug, Default)]
struct Checks {
    failure: Option<String>,
}

impl Checks {
    fn expect(&mut self, ok: bool, what: impl FnOnce() -> String) {
        if !ok && self.failure.is_none() {
            let reason = what();
            debug!("Check failed: {}", reason);
            self.failure = Some(reason);
        }
    }

    fn expect_eq<T: PartialEq + std::fmt::Debug>(&mut self, what: &str, actual: T, expected: T) {
        self.expect(actual == expected, || {
            format!("{}: expected {:?}, got {:?}", what, expected, actual)
        });
    }
}

/// Runs deployment scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Client nodes in the built-in topology
    clients: u32,

    /// Base coordinator settings
    settings: CoordinatorSettings,

    /// Maximum duration in seconds
    max_duration_secs: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            clients: 4,
            settings: CoordinatorSettings::default(),
            max_duration_secs: 60.0,
        }
    }

    /// Sets the number of client nodes (at least 2).
    pub fn with_clients(mut self, clients: u32) -> Self {
        self.clients = clients.max(2);
        self
    }

    /// Sets the base coordinator settings.
    pub fn with_settings(mut self, settings: CoordinatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    fn max_ticks(&self, settings: &CoordinatorSettings) -> u64 {
        let tick = settings.tick_period().as_secs_f64();
        (self.max_duration_secs / tick).ceil() as u64
    }

    fn world(&self, settings: CoordinatorSettings, doc: &DeploymentDocument) -> (SimWorld, LoadReport) {
        SimWorld::new(
            SimConfig {
                seed: self.seed,
                settings,
            },
            doc,
        )
    }

    /// Settings for scenarios that rely on the readiness gate.
    fn gated(&self) -> CoordinatorSettings {
        self.settings.clone().with_wait_for_all_nodes(true)
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let (world, report, checks) = match scenario {
            ScenarioId::Baseline => self.run_baseline().await,
            ScenarioId::StaggeredJoin => self.run_staggered_join().await,
            ScenarioId::NodeDropout => self.run_node_dropout().await,
            ScenarioId::Partition => self.run_partition().await,
            ScenarioId::LossyLink => self.run_lossy_link().await,
            ScenarioId::AddressConflict => self.run_address_conflict().await,
            ScenarioId::UnknownNode => self.run_unknown_node().await,
            ScenarioId::MalformedTimeline => self.run_malformed_timeline().await,
            ScenarioId::NoReadinessGate => self.run_no_readiness_gate().await,
        };

        self.finish(scenario.name(), &world, &report, checks)
    }

    /// Runs an arbitrary topology: every declared node checks in at once
    /// and the timeline plays out.
    pub async fn run_document(&self, name: &str, doc: &DeploymentDocument) -> ScenarioResult {
        info!("Running topology {} (seed={})", name, self.seed);

        let (mut world, report) = self.world(self.settings.clone(), doc);
        let ids: Vec<NodeId> = world.coordinator().graph().node_ids().collect();
        for id in &ids {
            world.connect_node(*id).await;
        }

        let mut checks = Checks::default();
        let idle = self.drain(&mut world).await;
        checks.expect(idle, || "run did not go idle before the time limit".to_string());
        checks.expect(world.coordinator().graph().all_nodes_connected(), || {
            "not every node checked in".to_string()
        });
        for id in &ids {
            let declared = world
                .coordinator()
                .graph()
                .node(*id)
                .map(|node| node.worlds().len())
                .unwrap_or(0);
            let configured = world.node(*id).map(|node| node.worlds().count()).unwrap_or(0);
            checks.expect(declared == configured, || {
                format!("{} configured {} of {} worlds", id, configured, declared)
            });
        }

        self.finish(name, &world, &report, checks)
    }

    fn finish(&self, name: &str, world: &SimWorld, report: &LoadReport, checks: Checks) -> ScenarioResult {
        let metrics = ScenarioMetrics::collect(world, report);
        debug!("{} metrics: {:?}", name, metrics);

        ScenarioResult {
            scenario: name.to_string(),
            seed: self.seed,
            passed: checks.failure.is_none(),
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            failure_reason: checks.failure,
            metrics,
        }
    }

    /// Steps until the idle monitor stops the run.
    ///
    /// Once the timeline has finished every node leaves. Returns false if
    /// the time limit hit first.
    async fn drain(&self, world: &mut SimWorld) -> bool {
        let max_ticks = self.max_ticks(&world.config.settings);
        let mut monitor = IdleMonitor::default();
        let mut shut_down = false;

        while world.tick_count() < max_ticks {
            world.step().await;

            let snapshot = world.coordinator().snapshot();
            if !shut_down && snapshot.experiment_started && snapshot.experiment_finished {
                debug!("Timeline finished at t={:.1}s, nodes leaving", world.time());
                world.disconnect_all().await;
                shut_down = true;
            }

            if monitor.should_terminate(&world.coordinator().snapshot()) {
                return true;
            }
        }

        warn!("Time limit reached after {} ticks", world.tick_count());
        false
    }

    async fn connect_all(world: &mut SimWorld, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            world.connect_node(id).await;
        }
    }

    fn all_ids(&self) -> Vec<NodeId> {
        (0..=self.clients).map(NodeId).collect()
    }

    fn client_history(world: &SimWorld, id: NodeId, name: &str) -> Vec<Transition> {
        world
            .node(id)
            .map(|node| {
                node.history()
                    .iter()
                    .filter(|(world, _)| world == name)
                    .map(|(_, transition)| *transition)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn stage(world: &SimWorld, id: NodeId, name: &str) -> WorldStage {
        world
            .node(id)
            .map(|node| node.stage(name))
            .unwrap_or(WorldStage::Absent)
    }

    fn connected_to(world: &SimWorld, id: NodeId, name: &str) -> Option<SocketAddr> {
        world.node(id)?.world(name)?.connected_to
    }

    /// Worlds declared in the built-in topology.
    fn declared_worlds(&self) -> u64 {
        // arena + observer, one client world per client, plus the bench
        2 + u64::from(self.clients) + 1
    }

    /// DEP-001: Baseline - every node joins, the churn timeline plays out.
    async fn run_baseline(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();

        Self::connect_all(&mut world, self.all_ids()).await;
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        let coordinator = world.coordinator_address();
        let loopback = SocketAddr::new(Endpoint::LOOPBACK.ip(), coordinator.port());

        checks.expect(report.is_clean(), || format!("load warnings: {:?}", report.warnings));
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect(world.coordinator().graph().all_nodes_connected(), || {
            "not every node checked in".to_string()
        });
        checks.expect_eq("commands sent", stats.commands_sent, self.declared_worlds());
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS);
        checks.expect_eq("undeliverable", stats.undeliverable, 0);
        checks.expect_eq(
            "node 1 churn",
            Self::client_history(&world, NodeId(1), CLIENT_WORLD),
            vec![
                Transition::Create,
                Transition::Start,
                Transition::Connect,
                Transition::Stop,
                Transition::Create,
                Transition::Start,
                Transition::Connect,
                Transition::Stop,
            ],
        );
        for id in 2..=self.clients {
            checks.expect_eq(
                "client server address",
                Self::connected_to(&world, NodeId(id), CLIENT_WORLD),
                Some(coordinator),
            );
        }
        checks.expect_eq(
            "observer server address",
            Self::connected_to(&world, NodeId(0), OBSERVER_WORLD),
            Some(loopback),
        );
        checks.expect_eq("server stage", Self::stage(&world, NodeId(0), SERVER_WORLD), WorldStage::Started);
        checks.expect_eq(
            "bench stage",
            Self::stage(&world, NodeId(self.clients), BENCH_WORLD),
            WorldStage::Started,
        );

        (world, report, checks)
    }

    /// DEP-002: StaggeredJoin - the timeline waits for the last node.
    async fn run_staggered_join(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();

        let mut rng = world.context.fork_rng(JOIN_STREAM);
        let joins: BTreeMap<NodeId, u64> = self
            .all_ids()
            .into_iter()
            .map(|id| (id, rng.gen_range(0..10u64)))
            .collect();
        let last_join = joins.values().copied().max().unwrap_or(0);

        let mut started_at_tick = None;
        for tick in 0..=last_join {
            for (id, _) in joins.iter().filter(|(_, join)| **join == tick) {
                debug!("{} joins at tick {}", id, tick);
                world.connect_node(*id).await;
            }
            world.step().await;
            if started_at_tick.is_none() && world.coordinator().snapshot().experiment_started {
                started_at_tick = Some(world.tick_count());
            }
        }
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect_eq("experiment start tick", started_at_tick, Some(last_join + 1));
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS);
        checks.expect_eq("undeliverable", stats.undeliverable, 0);

        (world, report, checks)
    }

    /// DEP-003: NodeDropout - actions for a departed node are dropped.
    async fn run_node_dropout(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();

        Self::connect_all(&mut world, self.all_ids()).await;
        world.step().await;
        world.disconnect_node(NodeId(1)).await;
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect(idle, || "run did not go idle".to_string());
        // Node 1 owns three of the four churn actions
        checks.expect_eq("undeliverable", stats.undeliverable, 3);
        checks.expect_eq("actions dispatched", stats.actions_dispatched, 1);
        checks.expect(world.coordinator().graph().all_nodes_connected(), || {
            "check-in record lost on disconnect".to_string()
        });
        checks.expect_eq(
            "node 1 stage",
            Self::stage(&world, NodeId(1), CLIENT_WORLD),
            WorldStage::Connected,
        );

        (world, report, checks)
    }

    /// DEP-004: Partition - failed sends are not retried after healing.
    async fn run_partition(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();
        let max_ticks = self.max_ticks(&world.config.settings);

        Self::connect_all(&mut world, self.all_ids()).await;
        world.step().await;

        world.isolate_node(NodeId(1));
        while world.coordinator().scheduler().pending() == CHURN_ACTIONS as usize
            && world.tick_count() < max_ticks
        {
            world.step().await;
        }
        world.network_controller.heal_all();
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect_eq("undeliverable", stats.undeliverable, 1);
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS - 1);
        // The lost Stop leaves the world connected, so Connect is a no-op
        checks.expect_eq(
            "node 1 churn",
            Self::client_history(&world, NodeId(1), CLIENT_WORLD),
            vec![
                Transition::Create,
                Transition::Start,
                Transition::Connect,
                Transition::Stop,
            ],
        );

        (world, report, checks)
    }

    /// DEP-005: LossyLink - fire-and-forget means lost actions stay lost.
    async fn run_lossy_link(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();

        Self::connect_all(&mut world, self.all_ids()).await;
        world.set_node_loss(NodeId(1), 1.0);
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS);
        checks.expect_eq("undeliverable", stats.undeliverable, 0);
        checks.expect_eq("envelopes dropped", world.router_stats().dropped, 3);
        checks.expect_eq(
            "node 1 stage",
            Self::stage(&world, NodeId(1), CLIENT_WORLD),
            WorldStage::Connected,
        );

        (world, report, checks)
    }

    /// DEP-006: AddressConflict - a node reappears on another host.
    async fn run_address_conflict(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();
        let moved: IpAddr = "192.168.77.2".parse().unwrap_or(Endpoint::LOOPBACK.ip());

        Self::connect_all(&mut world, self.all_ids()).await;
        world.step().await;
        world.reconnect_from(NodeId(1), moved).await;
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        let node_1_worlds = world
            .coordinator()
            .graph()
            .node(NodeId(1))
            .map(|node| node.worlds().len() as u64)
            .unwrap_or(0);

        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect_eq("endpoint conflicts", stats.endpoint_conflicts, 1);
        checks.expect_eq(
            "recorded endpoint",
            world.coordinator().graph().endpoint(NodeId(1)),
            Some(Endpoint::new(moved)),
        );
        checks.expect_eq(
            "commands sent",
            stats.commands_sent,
            self.declared_worlds() + node_1_worlds,
        );
        // Actions follow the node to its new connection
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS);
        checks.expect_eq("undeliverable", stats.undeliverable, 0);

        (world, report, checks)
    }

    /// DEP-007: UnknownNode - a stranger is refused and ignored.
    async fn run_unknown_node(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();
        let stranger = NodeId(9_999);

        Self::connect_all(&mut world, self.all_ids()).await;
        world.add_stranger(stranger, "10.99.0.1".parse().unwrap_or(Endpoint::LOOPBACK.ip()));
        world.connect_node(stranger).await;
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect_eq("config errors", stats.config_errors, 1);
        checks.expect_eq(
            "stranger errors",
            world.node(stranger).map(|node| node.errors().len()),
            Some(1),
        );
        checks.expect(
            world.node(stranger).map(|node| !node.is_configured()).unwrap_or(false),
            || "stranger received configuration".to_string(),
        );
        checks.expect_eq(
            "graph size",
            world.coordinator().graph().node_count(),
            self.clients as usize + 1,
        );
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS);

        (world, report, checks)
    }

    /// DEP-008: MalformedTimeline - broken entries drop, the rest runs.
    async fn run_malformed_timeline(&self) -> (SimWorld, LoadReport, Checks) {
        let mut doc = topology::star_with_churn(self.clients);
        let orphan: WorldSpec = topology::world("orphan", WorldKind::Client, InitializationMode::Connect, Some(4_242));
        if let Some(node) = doc.nodes.iter_mut().find(|node| node.node_id == 1) {
            node.world_configs.push(orphan);
        }

        let mut mismatched = topology::action(1, 1, &[(CLIENT_WORLD, WorldAction::Stop)]);
        mismatched.actions[0].world_names.push(CLIENT_WORLD.to_string());
        let mut negative = topology::action(1, 1, &[(CLIENT_WORLD, WorldAction::Stop)]);
        negative.actions[0].node_id = -1;
        let mut paused = topology::action(1, 1, &[(CLIENT_WORLD, WorldAction::Stop)]);
        paused.actions[0].actions[0] = "Pause".to_string();
        doc.experiment_actions.extend([
            topology::action(1, 7_777, &[(CLIENT_WORLD, WorldAction::Start)]),
            mismatched,
            topology::action(1, 1, &[("nowhere", WorldAction::Start)]),
            negative,
            paused,
        ]);

        let (mut world, report) = self.world(self.gated(), &doc);
        let mut checks = Checks::default();

        Self::connect_all(&mut world, self.all_ids()).await;
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect_eq("load warnings", report.warnings.len(), 6);
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS);
        checks.expect_eq("undeliverable", stats.undeliverable, 0);
        // No server to dial: the world stays started
        checks.expect_eq("orphan stage", Self::stage(&world, NodeId(1), "orphan"), WorldStage::Started);

        (world, report, checks)
    }

    /// DEP-009: NoReadinessGate - the clock starts without the last node.
    async fn run_no_readiness_gate(&self) -> (SimWorld, LoadReport, Checks) {
        let doc = topology::star_with_churn(self.clients);
        let settings = self.settings.clone().with_wait_for_all_nodes(false);
        let (mut world, report) = self.world(settings, &doc);
        let mut checks = Checks::default();

        // The bench node never shows up
        Self::connect_all(&mut world, (0..self.clients).map(NodeId)).await;
        world.step().await;
        let started_early = world.coordinator().snapshot().experiment_started;
        let idle = self.drain(&mut world).await;

        let stats = world.coordinator().stats();
        checks.expect(started_early, || "experiment clock did not start".to_string());
        checks.expect(idle, || "run did not go idle".to_string());
        checks.expect(!world.coordinator().graph().all_nodes_connected(), || {
            "missing node reported as checked in".to_string()
        });
        checks.expect_eq("undeliverable", stats.undeliverable, 1);
        checks.expect_eq("actions dispatched", stats.actions_dispatched, CHURN_ACTIONS - 1);

        (world, report, checks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario).await;
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[tokio::test]
    async fn test_scenarios_pass_across_seeds() {
        for seed in [1, 7, 1234, 99_999] {
            let runner = ScenarioRunner::new(seed).with_clients(3);
            for scenario in [ScenarioId::StaggeredJoin, ScenarioId::AddressConflict] {
                let result = runner.run(scenario).await;
                assert!(result.passed, "{} seed={} failed: {:?}", scenario, seed, result.failure_reason);
            }
        }
    }

    #[tokio::test]
    async fn test_finer_tick_interval() {
        let settings = CoordinatorSettings::default().with_tick_interval(Duration::from_millis(250));
        let runner = ScenarioRunner::new(42).with_settings(settings);
        for scenario in [ScenarioId::Baseline, ScenarioId::Partition] {
            let result = runner.run(scenario).await;
            assert!(result.passed, "{} failed: {:?}", scenario, result.failure_reason);
        }
    }

    #[tokio::test]
    async fn test_determinism() {
        let a = ScenarioRunner::new(5).run(ScenarioId::StaggeredJoin).await;
        let b = ScenarioRunner::new(5).run(ScenarioId::StaggeredJoin).await;

        assert_eq!(a.total_ticks, b.total_ticks);
        assert_eq!(a.metrics.commands_sent, b.metrics.commands_sent);
        assert_eq!(a.metrics.envelopes_delivered, b.metrics.envelopes_delivered);
    }

    #[tokio::test]
    async fn test_time_limit_fails_the_run() {
        let result = ScenarioRunner::new(42)
            .with_duration(3.0)
            .run(ScenarioId::Baseline)
            .await;

        assert!(!result.passed);
        assert_eq!(result.total_ticks, 3);
    }

    #[tokio::test]
    async fn test_run_document() {
        let doc = topology::star_with_churn(2);
        let result = ScenarioRunner::new(42).run_document("star", &doc).await;

        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.nodes_checked_in, 3);
        assert_eq!(result.metrics.actions_dispatched, CHURN_ACTIONS);
        assert_eq!(result.metrics.load_warnings, 0);
    }

    #[tokio::test]
    async fn test_run_document_with_load_warnings() {
        let mut doc = topology::star(2);
        doc.nodes[2].node_ip = None;
        doc.nodes[1]
            .world_configs
            .push(topology::world("peer", WorldKind::Client, InitializationMode::Connect, Some(2)));

        let result = ScenarioRunner::new(42).run_document("custom", &doc).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.load_warnings, 1);
        // arena, observer, two client worlds, bench, peer
        assert_eq!(result.metrics.commands_sent, 6);
    }
}
