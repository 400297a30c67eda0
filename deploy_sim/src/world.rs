//! SimWorld - The simulation harness container.
//!
//! Owns the coordinator, the simulated nodes and the router between them.
//! The world is the coordinator's single writer: check-ins, disconnects and
//! ticks are applied in the order the harness issues them.

use crate::context::SimContext;
use crate::network::{NetworkMessage, SimNetwork, SimNetworkController};
use crate::node::SimulatedNode;

use deploy_core::{Coordinator, CoordinatorEvent, CoordinatorSettings, DeploymentDocument, LoadReport, NodeMessage};
use deploy_env::{ConnectionHandle, DeployContext, Endpoint, NetworkController, NodeId, Transport};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Coordinator settings (tick interval doubles as the simulation step)
    pub settings: CoordinatorSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            settings: CoordinatorSettings::default(),
        }
    }
}

/// Router counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Envelopes delivered to a node
    pub delivered: u64,

    /// Envelopes lost to link loss or a closed connection
    pub dropped: u64,

    /// Envelopes a node could not decode
    pub rejected: u64,
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Network controller for fault injection
    pub network_controller: Arc<SimNetworkController>,

    coordinator: Coordinator<SimContext, SimNetwork>,

    /// Coordinator-side view of the network, kept for its address
    network: Arc<SimNetwork>,

    nodes: BTreeMap<NodeId, SimulatedNode>,

    /// Open connections
    connections: HashMap<ConnectionHandle, NodeId>,

    /// Central router receiver
    router_rx: mpsc::Receiver<NetworkMessage>,

    router_stats: RouterStats,

    /// Current tick count
    tick_count: u64,
}

impl SimWorld {
    /// Creates a world for `doc`, with one simulated node per declared node.
    ///
    /// Nodes start disconnected; the coordinator listens on its own node's
    /// advertised address.
    pub fn new(config: SimConfig, doc: &DeploymentDocument) -> (Self, LoadReport) {
        let context = SimContext::shared(config.seed);
        let network_controller = Arc::new(SimNetworkController::new());

        let hosts: BTreeMap<NodeId, IpAddr> = doc
            .nodes
            .iter()
            .map(|spec| {
                let host = spec
                    .node_ip
                    .as_deref()
                    .and_then(Endpoint::parse)
                    .unwrap_or(Endpoint::LOOPBACK);
                (NodeId(spec.node_id), host.ip())
            })
            .collect();

        let coordinator_host = hosts
            .get(&config.settings.coordinator_node)
            .copied()
            .unwrap_or(Endpoint::LOOPBACK.ip());
        let local_address = SocketAddr::new(coordinator_host, config.settings.server_port);

        // Create central router channel
        let (router_tx, router_rx) = mpsc::channel::<NetworkMessage>(10000);
        let network = Arc::new(SimNetwork::new(
            local_address,
            router_tx,
            Arc::clone(&network_controller),
        ));

        let (coordinator, report) = Coordinator::from_document(
            Arc::clone(&context),
            Arc::clone(&network),
            config.settings.clone(),
            doc,
        );

        let nodes = hosts
            .into_iter()
            .map(|(id, host)| (id, SimulatedNode::new(id, host)))
            .collect();

        let world = Self {
            config,
            context,
            network_controller,
            coordinator,
            network,
            nodes,
            connections: HashMap::new(),
            router_rx,
            router_stats: RouterStats::default(),
            tick_count: 0,
        };
        (world, report)
    }

    /// Adds a node that is not part of the deployment.
    pub fn add_stranger(&mut self, id: NodeId, host: IpAddr) {
        self.nodes.insert(id, SimulatedNode::new(id, host));
    }

    /// Opens a connection for `id` and checks it in with the coordinator.
    ///
    /// The node's check-in travels through the wire encoding like any other
    /// message. Returns the new handle, or `None` if the node does not exist.
    pub async fn connect_node(&mut self, id: NodeId) -> Option<ConnectionHandle> {
        let Some(node) = self.nodes.get(&id) else {
            warn!("Cannot connect {}: no such simulated node", id);
            return None;
        };

        let (handle, port) = self.context.with_rng(|rng| {
            (ConnectionHandle::from_seed(rng.gen()), rng.gen_range(49152..=65535u16))
        });
        let observed = SocketAddr::new(node.host(), port);

        let request = match node.check_in(self.context.timestamp_ms()).and_then(|env| NodeMessage::decode(&env)) {
            Ok(request) => request,
            Err(e) => {
                warn!("{} could not build its check-in: {}", id, e);
                return None;
            }
        };
        let NodeMessage::ConfigRequest { node_id } = request;

        self.connections.insert(handle, id);
        debug!("{} connected from {} on {}", id, observed, handle);
        self.coordinator
            .handle_event(CoordinatorEvent::CheckIn {
                node_id,
                observed,
                handle,
            })
            .await;
        self.process_network();
        Some(handle)
    }

    /// Closes every connection `id` holds.
    pub async fn disconnect_node(&mut self, id: NodeId) {
        let handles: Vec<ConnectionHandle> = self
            .connections
            .iter()
            .filter(|(_, node)| **node == id)
            .map(|(handle, _)| *handle)
            .collect();

        for handle in handles {
            self.connections.remove(&handle);
            self.coordinator
                .handle_event(CoordinatorEvent::Disconnected { handle })
                .await;
        }
    }

    /// Closes every open connection.
    pub async fn disconnect_all(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.disconnect_node(id).await;
        }
    }

    /// Moves `id` to `host` and checks it in again from there.
    pub async fn reconnect_from(&mut self, id: NodeId, host: IpAddr) -> Option<ConnectionHandle> {
        self.disconnect_node(id).await;
        self.nodes.get_mut(&id)?.set_host(host);
        self.connect_node(id).await
    }

    /// Cuts the node off: sends to its connections fail until healed.
    pub fn isolate_node(&self, id: NodeId) {
        for handle in self.handles_of(id) {
            self.network_controller.isolate(handle);
        }
    }

    /// Drops `loss_rate` of the envelopes routed to `id`.
    pub fn set_node_loss(&self, id: NodeId, loss_rate: f64) {
        for handle in self.handles_of(id) {
            self.network_controller.set_link_loss(handle, loss_rate);
        }
    }

    fn handles_of(&self, id: NodeId) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .filter(|(_, node)| **node == id)
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Advances simulation by one tick.
    ///
    /// Moves the virtual clock by the tick interval, lets the coordinator
    /// fire due actions, then routes whatever it sent. Returns the number of
    /// node actions dispatched.
    pub async fn step(&mut self) -> usize {
        self.context.advance_time(self.config.settings.tick_period());
        let dispatched = self.coordinator.tick().await;
        self.process_network();
        self.tick_count += 1;
        dispatched
    }

    /// Routes pending envelopes to the nodes.
    pub fn process_network(&mut self) {
        let sender = self.network.local_address();

        // Drain all pending messages
        while let Ok(msg) = self.router_rx.try_recv() {
            let Some(id) = self.connections.get(&msg.to).copied() else {
                debug!("Dropping envelope for closed connection {}", msg.to);
                self.router_stats.dropped += 1;
                continue;
            };

            let loss = self.network_controller.get_loss(msg.to);
            if loss > 0.0 && self.context.with_rng(|rng| rng.gen::<f64>()) < loss {
                self.router_stats.dropped += 1;
                continue;
            }

            let Some(node) = self.nodes.get_mut(&id) else {
                self.router_stats.dropped += 1;
                continue;
            };
            match node.receive(&msg.envelope, sender) {
                Ok(()) => self.router_stats.delivered += 1,
                Err(e) => {
                    warn!("{} rejected an envelope: {}", id, e);
                    self.router_stats.rejected += 1;
                }
            }
        }
    }

    pub fn coordinator(&self) -> &Coordinator<SimContext, SimNetwork> {
        &self.coordinator
    }

    /// Address nodes see the coordinator at.
    pub fn coordinator_address(&self) -> SocketAddr {
        self.network.local_address()
    }

    pub fn node(&self, id: NodeId) -> Option<&SimulatedNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SimulatedNode> {
        self.nodes.values()
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router_stats
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the number of simulated nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deploy_core::WorldStage;
    use std::time::Duration;

    const TOPOLOGY: &str = r#"{
        "nodes": [
            { "nodeID": 0, "nodeIP": "10.0.0.1", "worldConfigs": [
                { "worldName": "server", "worldType": "Server",
                  "initializationMode": "Start", "serverNodeID": 0 } ] },
            { "nodeID": 1, "nodeIP": "10.0.0.2", "worldConfigs": [
                { "worldName": "client", "worldType": "Client",
                  "initializationMode": "Connect", "serverNodeID": 0 } ] }
        ],
        "experimentActions": [
            { "delay": 2, "actions": [
                { "nodeID": 1, "worldNames": ["client"], "actions": ["Stop"] } ] }
        ]
    }"#;

    fn world(seed: u64) -> SimWorld {
        let doc = DeploymentDocument::from_json_str(TOPOLOGY).unwrap();
        let (world, report) = SimWorld::new(
            SimConfig {
                seed,
                ..Default::default()
            },
            &doc,
        );
        assert!(report.is_clean());
        world
    }

    #[test]
    fn test_sim_world_creation() {
        let world = world(42);

        assert_eq!(world.node_count(), 2);
        assert_eq!(world.coordinator_address(), "10.0.0.1:7979".parse().unwrap());
        assert_eq!(world.tick_count(), 0);
        assert_eq!(world.time(), 0.0);
    }

    #[tokio::test]
    async fn test_check_in_configures_node() {
        let mut world = world(42);

        world.connect_node(NodeId(1)).await.unwrap();

        let node = world.node(NodeId(1)).unwrap();
        assert_eq!(node.stage("client"), WorldStage::Connected);
        assert_eq!(
            node.world("client").unwrap().connected_to,
            Some(world.coordinator_address())
        );
        assert_eq!(world.router_stats().delivered, 1);
    }

    #[tokio::test]
    async fn test_step_fires_timeline() {
        let mut world = world(42);
        world.connect_node(NodeId(0)).await.unwrap();
        world.connect_node(NodeId(1)).await.unwrap();

        for _ in 0..3 {
            world.step().await;
        }

        assert_eq!(world.node(NodeId(1)).unwrap().stage("client"), WorldStage::Absent);
        assert!(world.coordinator().scheduler().is_finished());
        assert_eq!(world.tick_count(), 3);
        assert_eq!(world.context.now(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_full_loss_drops_everything() {
        let mut world = world(42);
        world.connect_node(NodeId(0)).await.unwrap();
        world.connect_node(NodeId(1)).await.unwrap();
        world.set_node_loss(NodeId(1), 1.0);

        for _ in 0..3 {
            world.step().await;
        }

        // The stop never arrived
        assert_eq!(world.node(NodeId(1)).unwrap().stage("client"), WorldStage::Connected);
        assert_eq!(world.router_stats().dropped, 1);
    }

    #[tokio::test]
    async fn test_disconnect_releases_connection() {
        let mut world = world(42);
        world.connect_node(NodeId(1)).await.unwrap();
        assert_eq!(world.coordinator().graph().active_connections(), 1);

        world.disconnect_node(NodeId(1)).await;
        assert_eq!(world.coordinator().graph().active_connections(), 0);
    }

    #[tokio::test]
    async fn test_same_seed_same_handles() {
        let mut a = world(7);
        let mut b = world(7);

        assert_eq!(a.connect_node(NodeId(1)).await, b.connect_node(NodeId(1)).await);
    }
}
