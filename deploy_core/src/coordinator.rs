//! Coordinator - owns the deployment graph and the experiment timeline.
//!
//! This is the explicit context object every subsystem goes through: there
//! is no global graph or scheduler. Connectivity events are applied one at a
//! time by the owner of the coordinator (the [`Coordinator::run`] event
//! loop, or a simulation driver), so no reader can observe a node whose
//! check-in was half applied.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Coordinator                           │
//! │   CoordinatorEvent ──► handle_event ──► DeploymentGraph       │
//! │                              │                │               │
//! │                              ▼                ▼               │
//! │   tick (periodic) ──► ExperimentScheduler   commands          │
//! │                              │                │               │
//! │                              └──► Transport ◄─┘               │
//! │                                                               │
//! │   watch::Sender<LivenessSnapshot> ──► external monitor        │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use crate::config::DeploymentDocument;
use crate::graph::{parse_deployment_config, DeploymentGraph, EndpointCheck, LoadReport, LoadedDeployment};
use crate::liveness::{LivenessMonitor, LivenessSnapshot};
use crate::protocol::DeploymentMessage;
use crate::scheduler::{ExperimentScheduler, NodeAction};
use crate::settings::CoordinatorSettings;

use deploy_env::{ConnectionHandle, DeployContext, Endpoint, NodeId, Transport};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Inbound connectivity events, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorEvent {
    /// Node `node_id` connected from `observed` on `handle` and asked for
    /// its configuration.
    CheckIn {
        node_id: NodeId,
        observed: SocketAddr,
        handle: ConnectionHandle,
    },

    /// The transport closed a connection.
    Disconnected { handle: ConnectionHandle },
}

/// Counters describing what the coordinator did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Configuration commands handed to the transport
    pub commands_sent: u64,

    /// Node actions handed to the transport
    pub actions_dispatched: u64,

    /// Messages that could not be handed over (no connection, send failed)
    pub undeliverable: u64,

    /// Check-ins refused because the node is unknown
    pub config_errors: u64,

    /// Checked-in nodes that came back from a different host
    pub endpoint_conflicts: u64,
}

/// The coordinating process state.
///
/// Generic over the context and transport implementations, so the same
/// coordinator runs in production (tokio) or in simulation.
pub struct Coordinator<Ctx, Net>
where
    Ctx: DeployContext,
    Net: Transport,
{
    context: Arc<Ctx>,
    transport: Arc<Net>,
    settings: CoordinatorSettings,
    graph: DeploymentGraph,
    scheduler: ExperimentScheduler,

    /// Context time at which the experiment clock started
    experiment_started_at: Option<Duration>,

    stats: CoordinatorStats,
    liveness: watch::Sender<LivenessSnapshot>,
}

impl<Ctx, Net> Coordinator<Ctx, Net>
where
    Ctx: DeployContext,
    Net: Transport,
{
    /// Creates a coordinator from an already loaded deployment.
    pub fn new(
        context: Arc<Ctx>,
        transport: Arc<Net>,
        settings: CoordinatorSettings,
        loaded: LoadedDeployment,
    ) -> Self {
        let (liveness, _) = watch::channel(LivenessSnapshot::default());
        let mut coordinator = Self {
            context,
            transport,
            settings,
            graph: loaded.graph,
            scheduler: loaded.scheduler,
            experiment_started_at: None,
            stats: CoordinatorStats::default(),
            liveness,
        };
        coordinator.publish_liveness();
        coordinator
    }

    /// Loads `doc` and creates a coordinator for it.
    pub fn from_document(
        context: Arc<Ctx>,
        transport: Arc<Net>,
        settings: CoordinatorSettings,
        doc: &DeploymentDocument,
    ) -> (Self, LoadReport) {
        let mut loaded = parse_deployment_config(doc, &settings);
        let report = std::mem::take(&mut loaded.report);
        (Self::new(context, transport, settings, loaded), report)
    }

    pub fn graph(&self) -> &DeploymentGraph {
        &self.graph
    }

    pub fn scheduler(&self) -> &ExperimentScheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// Time since the experiment clock started, if it has.
    pub fn experiment_elapsed(&self) -> Option<Duration> {
        self.experiment_started_at
            .map(|started| self.context.now().saturating_sub(started))
    }

    /// Subscribes to liveness snapshots.
    pub fn subscribe(&self) -> watch::Receiver<LivenessSnapshot> {
        self.liveness.subscribe()
    }

    /// Current bookkeeping, as a snapshot.
    pub fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot {
            total_nodes: self.graph.node_count(),
            checked_in: self.graph.connected_count(),
            active_connections: self.graph.active_connections(),
            pending_actions: self.scheduler.pending(),
            experiment_started: self.experiment_started_at.is_some(),
            experiment_finished: self.scheduler.is_finished(),
        }
    }

    fn publish_liveness(&mut self) -> LivenessSnapshot {
        let snapshot = self.snapshot();
        self.liveness.send_replace(snapshot);
        snapshot
    }

    /// Applies one connectivity event.
    pub async fn handle_event(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::CheckIn {
                node_id,
                observed,
                handle,
            } => self.handle_check_in(node_id, observed, handle).await,
            CoordinatorEvent::Disconnected { handle } => self.handle_disconnect(handle),
        }
    }

    /// Records a node's check-in and answers with its configuration.
    ///
    /// Unknown nodes receive a `ConfigError`. A node coming back from a
    /// different host is logged and accepted; its new address replaces the
    /// recorded one.
    pub async fn handle_check_in(
        &mut self,
        node_id: NodeId,
        observed: SocketAddr,
        handle: ConnectionHandle,
    ) {
        let endpoint = Endpoint::from(observed);

        match self.graph.check_endpoint(node_id, endpoint) {
            EndpointCheck::UnknownNode => {
                warn!("Config request from unknown {} at {}", node_id, observed);
                self.stats.config_errors += 1;
                let reason = format!("{} is not part of this deployment", node_id);
                self.send(handle, DeploymentMessage::ConfigError { node_id, reason })
                    .await;
                return;
            }
            EndpointCheck::Conflict { recorded } => {
                let checked_in = self
                    .graph
                    .node(node_id)
                    .map(|node| node.is_connected())
                    .unwrap_or(false);
                if checked_in {
                    warn!(
                        "{} was recorded at {} but checked in again from {}",
                        node_id, recorded, endpoint
                    );
                    self.stats.endpoint_conflicts += 1;
                } else {
                    info!("{} advertised {} but connected from {}", node_id, recorded, endpoint);
                }
            }
            EndpointCheck::Matches => {}
        }

        self.graph.set_connected(node_id);
        self.graph.set_endpoint(node_id, endpoint, handle);

        let commands = self.graph.node_to_configuration_commands(node_id);
        debug!("Sending {} configuration commands to {}", commands.len(), node_id);
        for command in commands {
            if self.send(handle, DeploymentMessage::Configure(command)).await {
                self.stats.commands_sent += 1;
            }
        }
    }

    /// Forgets a closed connection.
    pub fn handle_disconnect(&mut self, handle: ConnectionHandle) {
        match self.graph.release_connection(handle) {
            Some(node_id) => info!("{} disconnected", node_id),
            None => debug!("Connection {} closed before check-in", handle),
        }
    }

    /// Advances the experiment timeline.
    ///
    /// Starts the experiment clock once the readiness gate passes, then
    /// dispatches every due action. Returns the number of node actions
    /// dispatched (successfully or not).
    pub async fn tick(&mut self) -> usize {
        let now = self.context.now();

        let started_at = match self.experiment_started_at {
            Some(started_at) => started_at,
            None => {
                if self.settings.wait_for_all_nodes && !self.graph.all_nodes_connected() {
                    return 0;
                }
                info!(
                    "Experiment clock started with {}/{} nodes checked in",
                    self.graph.connected_count(),
                    self.graph.node_count()
                );
                self.experiment_started_at = Some(now);
                now
            }
        };

        let due = self.scheduler.take_due(now.saturating_sub(started_at));
        let count = due.len();
        for action in due {
            self.dispatch(action).await;
        }
        count
    }

    /// Best-effort delivery of one node action.
    async fn dispatch(&mut self, action: NodeAction) {
        let Some(handle) = self.graph.connection_for(action.node_id) else {
            warn!("{} is not connected, dropping its world actions", action.node_id);
            self.stats.undeliverable += 1;
            return;
        };

        if self
            .send(handle, DeploymentMessage::WorldAction(action.to_command()))
            .await
        {
            self.stats.actions_dispatched += 1;
        }
    }

    /// Fire-and-forget send. Failures are logged and counted, never returned.
    async fn send(&mut self, handle: ConnectionHandle, message: DeploymentMessage) -> bool {
        let envelope = match message.encode(self.context.timestamp_ms()) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Failed to encode message for {}: {}", message.node_id(), e);
                self.stats.undeliverable += 1;
                return false;
            }
        };

        match self.transport.send(handle, envelope).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Send to {} on {} failed: {}", message.node_id(), handle, e);
                self.stats.undeliverable += 1;
                false
            }
        }
    }

    /// Single-writer event loop.
    ///
    /// Applies events as they arrive and ticks the scheduler every
    /// `tick_interval`. After each step the liveness snapshot is published
    /// and shown to `monitor`. Returns when the event channel closes or the
    /// monitor asks to stop.
    pub async fn run<M: LivenessMonitor>(
        mut self,
        mut events: mpsc::Receiver<CoordinatorEvent>,
        mut monitor: M,
    ) -> Self {
        info!(
            "Coordinator running as {} ({} nodes, {} experiment actions)",
            self.settings.coordinator_node,
            self.graph.node_count(),
            self.scheduler.len()
        );

        let context = Arc::clone(&self.context);
        let mut next_tick = context.now();

        loop {
            let wait = next_tick.saturating_sub(context.now());

            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        info!("Event source closed, coordinator stopping");
                        break;
                    }
                },
                _ = context.sleep(wait) => {
                    self.tick().await;
                    next_tick += self.settings.tick_period();
                }
            }

            let snapshot = self.publish_liveness();
            if monitor.should_terminate(&snapshot) {
                info!("Liveness monitor requested shutdown");
                break;
            }
        }

        self.publish_liveness();
        self
    }
}
