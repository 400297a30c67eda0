//! The Deployment Graph - cluster topology, check-in bookkeeping and the
//! translation of declared worlds into configuration commands.
//!
//! The node set is fixed once [`parse_deployment_config`] returns. After
//! that only the per-node `connected` flag, the recorded endpoint and the
//! connection table change, driven by the coordinator's connectivity events.

use crate::config::{
    DeploymentDocument, EmulationType, InitializationMode, StreamingRole, WorldAction, WorldKind, WorldSpec,
};
use crate::lifecycle::ActionMask;
use crate::protocol::{AddressResolution, ConfigurationCommand};
use crate::scheduler::{ExperimentAction, ExperimentScheduler, NodeAction, WorldTarget};
use crate::settings::CoordinatorSettings;
use deploy_env::{ConnectionHandle, Endpoint, NodeId};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A world as declared on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldConfig {
    pub name: String,
    pub kind: WorldKind,
    pub initialization_mode: InitializationMode,
    pub server_node: Option<NodeId>,
    pub streaming_node: Option<NodeId>,
    pub streaming_role: StreamingRole,
    pub thin_clients: u32,
    pub emulation: EmulationType,
    pub services: Vec<String>,
}

/// A participating process.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    connected: bool,
    endpoint: Endpoint,
    worlds: Vec<WorldConfig>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// True once the node has checked in at least once.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn worlds(&self) -> &[WorldConfig] {
        &self.worlds
    }

    /// Position of a world in declaration order.
    pub fn world_index(&self, name: &str) -> Option<usize> {
        self.worlds.iter().position(|world| world.name == name)
    }
}

/// Which transport connection currently reaches which node.
///
/// Kept apart from [`Node`]: the transport owns connection lifetime, the
/// graph only looks handles up.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTable {
    by_handle: HashMap<ConnectionHandle, NodeId>,
    by_node: HashMap<NodeId, ConnectionHandle>,
}

impl ConnectionTable {
    /// Binds `handle` to `node`, replacing the node's previous handle.
    ///
    /// Returns the replaced handle, if any.
    pub fn bind(&mut self, node: NodeId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        if let Some(other) = self.by_handle.insert(handle, node) {
            if other != node {
                self.by_node.remove(&other);
            }
        }
        let previous = self.by_node.insert(node, handle);
        match previous {
            Some(old) if old != handle => {
                self.by_handle.remove(&old);
                Some(old)
            }
            _ => None,
        }
    }

    /// Forgets a closed connection. Returns the node it reached.
    pub fn release(&mut self, handle: ConnectionHandle) -> Option<NodeId> {
        let node = self.by_handle.remove(&handle)?;
        self.by_node.remove(&node);
        Some(node)
    }

    pub fn handle_for(&self, node: NodeId) -> Option<ConnectionHandle> {
        self.by_node.get(&node).copied()
    }

    pub fn node_for(&self, handle: ConnectionHandle) -> Option<NodeId> {
        self.by_handle.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }
}

/// Outcome of comparing an observed address with the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointCheck {
    UnknownNode,
    Matches,
    Conflict { recorded: Endpoint },
}

/// A configuration problem that was tolerated while loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadWarning {
    #[error("{node} has no advertised address, defaulting to loopback")]
    MissingNodeAddress { node: NodeId },

    #[error("{node} advertises unparsable address {value:?}, defaulting to loopback")]
    InvalidNodeAddress { node: NodeId, value: String },

    #[error("{node} is declared more than once, keeping the first declaration")]
    DuplicateNode { node: NodeId },

    #[error("{node} declares world {world:?} more than once, keeping the first")]
    DuplicateWorld { node: NodeId, world: String },

    #[error("World {world:?} on {node} references unknown {field} node {target}")]
    DanglingReference {
        node: NodeId,
        world: String,
        field: &'static str,
        target: i64,
    },

    #[error("Coordinator node {node} is not declared in the topology")]
    CoordinatorNotDeclared { node: NodeId },

    #[error("Experiment action #{action} targets unknown node id {node}, dropped")]
    UnknownActionNode { action: usize, node: i64 },

    #[error("Experiment action #{action} for {node} names {worlds} worlds but {actions} actions, dropped")]
    ActionLengthMismatch {
        action: usize,
        node: NodeId,
        worlds: usize,
        actions: usize,
    },

    #[error("Experiment action #{action} gives world {world:?} on {node} unknown action {value:?}, dropped")]
    InvalidWorldAction {
        action: usize,
        node: NodeId,
        world: String,
        value: String,
    },

    #[error("Experiment action #{action} names unknown world {world:?} on {node}, dropped")]
    UnknownActionWorld {
        action: usize,
        node: NodeId,
        world: String,
    },
}

/// Everything tolerated while loading a document.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    fn push(&mut self, warning: LoadWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Output of [`parse_deployment_config`].
#[derive(Debug, Clone)]
pub struct LoadedDeployment {
    pub graph: DeploymentGraph,
    pub scheduler: ExperimentScheduler,
    pub report: LoadReport,
}

/// Single source of truth for topology and liveness.
#[derive(Debug, Clone)]
pub struct DeploymentGraph {
    nodes: BTreeMap<NodeId, Node>,
    connections: ConnectionTable,
    coordinator_node: NodeId,
    server_port: u16,
}

impl DeploymentGraph {
    pub fn node_exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn coordinator_node(&self) -> NodeId {
        self.coordinator_node
    }

    pub fn server_port(&self) -> u16 {
        self.server_port
    }

    /// Marks a node as having checked in. Idempotent; unknown ids are ignored.
    pub fn set_connected(&mut self, id: NodeId) {
        match self.nodes.get_mut(&id) {
            Some(node) if !node.connected => {
                node.connected = true;
                info!("{} checked in", id);
            }
            Some(_) => {}
            None => debug!("Ignoring check-in of unknown {}", id),
        }
    }

    /// Number of nodes that have checked in at least once.
    pub fn connected_count(&self) -> usize {
        self.nodes.values().filter(|node| node.connected).count()
    }

    /// True iff every node has checked in.
    pub fn all_nodes_connected(&self) -> bool {
        self.nodes.values().all(|node| node.connected)
    }

    /// Records the latest observed address and connection of a node.
    pub fn set_endpoint(&mut self, id: NodeId, endpoint: Endpoint, handle: ConnectionHandle) {
        let Some(node) = self.nodes.get_mut(&id) else {
            warn!("Cannot record endpoint {} for unknown {}", endpoint, id);
            return;
        };
        node.endpoint = endpoint;
        if let Some(old) = self.connections.bind(id, handle) {
            debug!("{} moved from connection {} to {}", id, old, handle);
        }
    }

    pub fn endpoint(&self, id: NodeId) -> Option<Endpoint> {
        self.nodes.get(&id).map(|node| node.endpoint)
    }

    /// Compares an observed address with the recorded one.
    pub fn check_endpoint(&self, id: NodeId, candidate: Endpoint) -> EndpointCheck {
        match self.nodes.get(&id) {
            None => EndpointCheck::UnknownNode,
            Some(node) if node.endpoint == candidate => EndpointCheck::Matches,
            Some(node) => EndpointCheck::Conflict {
                recorded: node.endpoint,
            },
        }
    }

    /// False only when the node is known and recorded at another address.
    pub fn compare_endpoint(&self, id: NodeId, candidate: Endpoint) -> bool {
        !matches!(self.check_endpoint(id, candidate), EndpointCheck::Conflict { .. })
    }

    pub fn connection_for(&self, id: NodeId) -> Option<ConnectionHandle> {
        self.connections.handle_for(id)
    }

    pub fn node_for_connection(&self, handle: ConnectionHandle) -> Option<NodeId> {
        self.connections.node_for(handle)
    }

    /// Forgets a closed connection. The node stays marked as connected.
    pub fn release_connection(&mut self, handle: ConnectionHandle) -> Option<NodeId> {
        self.connections.release(handle)
    }

    /// Number of nodes currently reachable through a connection.
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// One command per declared world of `id`, in declaration order.
    ///
    /// Unknown nodes yield no commands.
    pub fn node_to_configuration_commands(&self, id: NodeId) -> Vec<ConfigurationCommand> {
        let Some(node) = self.nodes.get(&id) else {
            warn!("No configuration for unknown {}", id);
            return Vec::new();
        };

        node.worlds
            .iter()
            .map(|world| ConfigurationCommand {
                node_id: id,
                actions: ActionMask::for_mode(world.initialization_mode),
                world_name: world.name.clone(),
                world_kind: world.kind,
                streaming_role: world.streaming_role,
                server_address: self.resolve_peer(id, world, "server", world.server_node),
                server_port: self.server_port,
                signalling_address: self.resolve_peer(id, world, "streaming", world.streaming_node),
                thin_clients: world.thin_clients,
                emulation: world.emulation,
                services: world.services.clone(),
            })
            .collect()
    }

    /// Address under which `target` should reach `peer`.
    fn resolve_peer(
        &self,
        target: NodeId,
        world: &WorldConfig,
        field: &str,
        peer: Option<NodeId>,
    ) -> AddressResolution {
        let Some(peer) = peer else {
            return AddressResolution::Unset;
        };

        if peer == target {
            return AddressResolution::Loopback;
        }

        match self.nodes.get(&peer) {
            None => {
                warn!(
                    "World {:?} on {} references unknown {} node {}, leaving address unset",
                    world.name, target, field, peer
                );
                AddressResolution::Unset
            }
            // Remotes learn the coordinator's address from the command itself
            Some(_) if peer == self.coordinator_node => AddressResolution::UseSenderAddress,
            Some(node) => AddressResolution::Literal(node.endpoint.ip()),
        }
    }
}

/// Converts a raw document reference; negative values mean "none".
fn node_reference(raw: Option<i64>) -> Result<Option<NodeId>, i64> {
    match raw {
        None => Ok(None),
        Some(value) if value < 0 => Ok(None),
        Some(value) => u32::try_from(value).map(|id| Some(NodeId(id))).map_err(|_| value),
    }
}

fn world_config(spec: &WorldSpec) -> (WorldConfig, Vec<(&'static str, i64)>) {
    let mut invalid = Vec::new();
    let mut reference = |field: &'static str, raw: Option<i64>| match node_reference(raw) {
        Ok(id) => id,
        Err(value) => {
            invalid.push((field, value));
            None
        }
    };

    let server_node = reference("server", spec.server_node_id);
    let streaming_node = reference("streaming", spec.streaming_node_id);

    let world = WorldConfig {
        name: spec.world_name.clone(),
        kind: spec.world_type,
        initialization_mode: spec.initialization_mode,
        server_node,
        streaming_node,
        streaming_role: spec.multiplay_streaming_roles,
        thin_clients: spec.num_thin_clients,
        emulation: spec.emulation_type,
        services: spec.services.clone(),
    };
    (world, invalid)
}

/// Builds the graph and the experiment timeline from a topology document.
///
/// Loading never fails: every malformed entry is logged, recorded in the
/// returned [`LoadReport`] and dropped, and the rest of the document loads.
pub fn parse_deployment_config(
    doc: &DeploymentDocument,
    settings: &CoordinatorSettings,
) -> LoadedDeployment {
    let mut report = LoadReport::default();
    let mut nodes: BTreeMap<NodeId, Node> = BTreeMap::new();

    for spec in &doc.nodes {
        let id = NodeId(spec.node_id);
        if nodes.contains_key(&id) {
            report.push(LoadWarning::DuplicateNode { node: id });
            continue;
        }

        let endpoint = match spec.node_ip.as_deref().map(str::trim) {
            None | Some("") => {
                report.push(LoadWarning::MissingNodeAddress { node: id });
                Endpoint::LOOPBACK
            }
            Some(text) => Endpoint::parse(text).unwrap_or_else(|| {
                report.push(LoadWarning::InvalidNodeAddress {
                    node: id,
                    value: text.to_string(),
                });
                Endpoint::LOOPBACK
            }),
        };

        let mut worlds: Vec<WorldConfig> = Vec::with_capacity(spec.world_configs.len());
        for world_spec in &spec.world_configs {
            if worlds.iter().any(|w| w.name == world_spec.world_name) {
                report.push(LoadWarning::DuplicateWorld {
                    node: id,
                    world: world_spec.world_name.clone(),
                });
                continue;
            }
            let (world, invalid) = world_config(world_spec);
            for (field, target) in invalid {
                report.push(LoadWarning::DanglingReference {
                    node: id,
                    world: world.name.clone(),
                    field,
                    target,
                });
            }
            worlds.push(world);
        }

        nodes.insert(
            id,
            Node {
                id,
                connected: false,
                endpoint,
                worlds,
            },
        );
    }

    // References are checked once every node is known
    let mut dangling = Vec::new();
    for node in nodes.values() {
        for world in &node.worlds {
            for (field, peer) in [("server", world.server_node), ("streaming", world.streaming_node)] {
                if let Some(peer) = peer.filter(|peer| !nodes.contains_key(peer)) {
                    dangling.push(LoadWarning::DanglingReference {
                        node: node.id,
                        world: world.name.clone(),
                        field,
                        target: i64::from(peer.0),
                    });
                }
            }
        }
    }
    for warning in dangling {
        report.push(warning);
    }

    if !nodes.contains_key(&settings.coordinator_node) {
        report.push(LoadWarning::CoordinatorNotDeclared {
            node: settings.coordinator_node,
        });
    }

    let mut timeline = Vec::with_capacity(doc.experiment_actions.len());
    for (index, spec) in doc.experiment_actions.iter().enumerate() {
        let mut node_actions = Vec::with_capacity(spec.actions.len());

        for action in &spec.actions {
            let declared = u32::try_from(action.node_id)
                .ok()
                .map(NodeId)
                .and_then(|id| nodes.get(&id).map(|node| (id, node)));
            let Some((node_id, node)) = declared else {
                report.push(LoadWarning::UnknownActionNode {
                    action: index,
                    node: action.node_id,
                });
                continue;
            };

            if action.world_names.len() != action.actions.len() {
                report.push(LoadWarning::ActionLengthMismatch {
                    action: index,
                    node: node_id,
                    worlds: action.world_names.len(),
                    actions: action.actions.len(),
                });
                continue;
            }

            let mut worlds = Vec::with_capacity(action.world_names.len());
            for (name, action_name) in action.world_names.iter().zip(&action.actions) {
                let Ok(world_action) = action_name.parse::<WorldAction>() else {
                    report.push(LoadWarning::InvalidWorldAction {
                        action: index,
                        node: node_id,
                        world: name.clone(),
                        value: action_name.clone(),
                    });
                    continue;
                };
                match node.world_index(name) {
                    Some(world_index) => worlds.push(WorldTarget {
                        index: world_index,
                        name: name.clone(),
                        action: world_action,
                    }),
                    None => report.push(LoadWarning::UnknownActionWorld {
                        action: index,
                        node: node_id,
                        world: name.clone(),
                    }),
                }
            }

            if !worlds.is_empty() {
                node_actions.push(NodeAction { node_id, worlds });
            }
        }

        timeline.push(ExperimentAction::new(Duration::from_secs(spec.delay), node_actions));
    }

    info!(
        "Loaded deployment: {} nodes, {} experiment actions, {} warnings",
        nodes.len(),
        timeline.len(),
        report.warnings.len()
    );

    LoadedDeployment {
        graph: DeploymentGraph {
            nodes,
            connections: ConnectionTable::default(),
            coordinator_node: settings.coordinator_node,
            server_port: settings.server_port,
        },
        scheduler: ExperimentScheduler::new(timeline),
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldAction;
    use tracing_test::traced_test;

    const TOPOLOGY: &str = r#"{
        "nodes": [
            { "nodeID": 0, "nodeIP": "10.0.0.1",
              "worldConfigs": [
                { "worldName": "server", "worldType": "Server",
                  "initializationMode": "Start", "serverNodeID": 0 }
              ] },
            { "nodeID": 1, "nodeIP": "10.0.0.2:7979",
              "worldConfigs": [
                { "worldName": "client", "worldType": "Client",
                  "initializationMode": "Connect", "serverNodeID": 0,
                  "streamingNodeID": 2, "multiplayStreamingRoles": "Guest" },
                { "worldName": "bots", "worldType": "ThinClient",
                  "initializationMode": "Create", "serverNodeID": 2,
                  "numThinClients": 8 }
              ] },
            { "nodeID": 2, "nodeIP": "10.0.0.3",
              "worldConfigs": [
                { "worldName": "host", "worldType": "HostServer",
                  "initializationMode": "Connect", "serverNodeID": 2,
                  "streamingNodeID": 2, "multiplayStreamingRoles": "Host" }
              ] }
        ],
        "experimentActions": [
            { "delay": 5, "actions": [
                { "nodeID": 1, "worldNames": ["client"], "actions": ["Stop"] } ] },
            { "delay": 10, "actions": [
                { "nodeID": 1, "worldNames": ["client", "bots"], "actions": ["Start", "Connect"] } ] }
        ]
    }"#;

    fn load(text: &str) -> LoadedDeployment {
        let doc = DeploymentDocument::from_json_str(text).unwrap();
        parse_deployment_config(&doc, &CoordinatorSettings::default())
    }

    fn addr(text: &str) -> Endpoint {
        Endpoint::parse(text).unwrap()
    }

    #[test]
    fn test_load_clean_topology() {
        let loaded = load(TOPOLOGY);
        assert!(loaded.report.is_clean(), "{:?}", loaded.report.warnings);
        assert_eq!(loaded.graph.node_count(), 3);
        assert_eq!(loaded.scheduler.len(), 2);
        assert_eq!(loaded.graph.endpoint(NodeId(1)), Some(addr("10.0.0.2")));
        assert_eq!(
            loaded.graph.node_ids().collect::<Vec<_>>(),
            vec![NodeId(0), NodeId(1), NodeId(2)]
        );
    }

    #[test]
    fn test_one_command_per_world_in_order() {
        let graph = load(TOPOLOGY).graph;
        let commands = graph.node_to_configuration_commands(NodeId(1));

        let names: Vec<_> = commands.iter().map(|c| c.world_name.as_str()).collect();
        assert_eq!(names, vec!["client", "bots"]);
        assert_eq!(commands[0].actions.bits(), 7);
        assert_eq!(commands[1].actions.bits(), 1);
        assert_eq!(commands[1].thin_clients, 8);
        assert!(commands.iter().all(|c| c.server_port == 7979));
        assert!(commands.iter().all(|c| c.node_id == NodeId(1)));
    }

    #[test]
    fn test_address_resolution_rules() {
        let graph = load(TOPOLOGY).graph;

        // Self-hosted server is loopback, never an external address
        let server = &graph.node_to_configuration_commands(NodeId(0))[0];
        assert_eq!(server.server_address, AddressResolution::Loopback);

        // Coordinator-hosted server is reached via the sender's address
        let client = &graph.node_to_configuration_commands(NodeId(1))[0];
        assert_eq!(client.server_address, AddressResolution::UseSenderAddress);
        assert_eq!(
            client.signalling_address,
            AddressResolution::Literal("10.0.0.3".parse().unwrap())
        );

        // Any other peer resolves to its recorded endpoint
        let bots = &graph.node_to_configuration_commands(NodeId(1))[1];
        assert_eq!(bots.server_address, AddressResolution::Literal("10.0.0.3".parse().unwrap()));
        assert_eq!(bots.signalling_address, AddressResolution::Unset);

        let host = &graph.node_to_configuration_commands(NodeId(2))[0];
        assert_eq!(host.server_address, AddressResolution::Loopback);
        assert_eq!(host.signalling_address, AddressResolution::Loopback);
    }

    #[test]
    fn test_literal_follows_latest_endpoint() {
        let mut graph = load(TOPOLOGY).graph;
        graph.set_endpoint(NodeId(2), addr("172.16.0.9"), ConnectionHandle::from_seed(2));
        let bots = &graph.node_to_configuration_commands(NodeId(1))[1];
        assert_eq!(bots.server_address, AddressResolution::Literal("172.16.0.9".parse().unwrap()));
    }

    #[test]
    fn test_coordinator_resolves_itself_as_loopback() {
        let text = r#"{ "nodes": [
            { "nodeID": 0, "worldConfigs": [
                { "worldName": "client", "worldType": "Client",
                  "initializationMode": "Connect", "serverNodeID": 0 } ] } ] }"#;
        let graph = load(text).graph;
        let cmd = &graph.node_to_configuration_commands(NodeId(0))[0];
        assert_eq!(cmd.server_address, AddressResolution::Loopback);
    }

    #[test]
    #[traced_test]
    fn test_unknown_server_degrades_to_unset() {
        let text = r#"{ "nodes": [
            { "nodeID": 0, "nodeIP": "10.0.0.1", "worldConfigs": [] },
            { "nodeID": 1, "nodeIP": "10.0.0.2", "worldConfigs": [
                { "worldName": "client", "worldType": "Client",
                  "initializationMode": "Connect", "serverNodeID": 42,
                  "streamingNodeID": -1 } ] } ] }"#;
        let loaded = load(text);
        assert_eq!(
            loaded.report.warnings,
            vec![LoadWarning::DanglingReference {
                node: NodeId(1),
                world: "client".to_string(),
                field: "server",
                target: 42,
            }]
        );

        let cmd = &loaded.graph.node_to_configuration_commands(NodeId(1))[0];
        assert_eq!(cmd.server_address, AddressResolution::Unset);
        assert_eq!(cmd.signalling_address, AddressResolution::Unset);
        assert!(logs_contain("references unknown server node node-42"));
    }

    #[test]
    fn test_unknown_node_has_no_commands() {
        let graph = load(TOPOLOGY).graph;
        assert!(graph.node_to_configuration_commands(NodeId(99)).is_empty());
    }

    #[test]
    fn test_bad_addresses_default_to_loopback() {
        let text = r#"{ "nodes": [
            { "nodeID": 0, "nodeIP": "server.local" },
            { "nodeID": 1 },
            { "nodeID": 2, "nodeIP": "  " } ] }"#;
        let loaded = load(text);
        for id in 0..3 {
            assert_eq!(loaded.graph.endpoint(NodeId(id)), Some(Endpoint::LOOPBACK));
        }
        assert_eq!(
            loaded.report.warnings,
            vec![
                LoadWarning::InvalidNodeAddress {
                    node: NodeId(0),
                    value: "server.local".to_string()
                },
                LoadWarning::MissingNodeAddress { node: NodeId(1) },
                LoadWarning::MissingNodeAddress { node: NodeId(2) },
            ]
        );
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let text = r#"{ "nodes": [
            { "nodeID": 0, "nodeIP": "10.0.0.1", "worldConfigs": [
                { "worldName": "w", "worldType": "Server", "initializationMode": "Create" },
                { "worldName": "w", "worldType": "Client", "initializationMode": "Connect" } ] },
            { "nodeID": 0, "nodeIP": "10.0.0.2" } ] }"#;
        let loaded = load(text);
        assert_eq!(loaded.graph.node_count(), 1);
        assert_eq!(loaded.graph.endpoint(NodeId(0)), Some(addr("10.0.0.1")));
        let worlds = loaded.graph.node(NodeId(0)).unwrap().worlds();
        assert_eq!(worlds.len(), 1);
        assert_eq!(worlds[0].kind, WorldKind::Server);
        assert_eq!(loaded.report.warnings.len(), 2);
    }

    #[test]
    fn test_coordinator_not_declared_is_reported() {
        let doc = DeploymentDocument::from_json_str(r#"{ "nodes": [ { "nodeID": 1, "nodeIP": "10.0.0.2" } ] }"#)
            .unwrap();
        let loaded = parse_deployment_config(&doc, &CoordinatorSettings::default());
        assert_eq!(
            loaded.report.warnings,
            vec![LoadWarning::CoordinatorNotDeclared { node: NodeId(0) }]
        );
    }

    #[test]
    #[traced_test]
    fn test_malformed_actions_are_dropped_individually() {
        let text = r#"{
            "nodes": [
                { "nodeID": 0, "nodeIP": "10.0.0.1", "worldConfigs": [
                    { "worldName": "server", "worldType": "Server", "initializationMode": "Start" },
                    { "worldName": "client", "worldType": "Client", "initializationMode": "Connect" } ] }
            ],
            "experimentActions": [
                { "delay": 1, "actions": [
                    { "nodeID": 7, "worldNames": ["server"], "actions": ["Stop"] },
                    { "nodeID": 0, "worldNames": ["server"], "actions": ["Stop", "Start"] },
                    { "nodeID": 0, "worldNames": ["client", "ghost"], "actions": ["Stop", "Start"] } ] },
                { "delay": 2, "actions": [
                    { "nodeID": 0, "worldNames": ["server"], "actions": ["Start"] } ] }
            ]
        }"#;
        let loaded = load(text);

        assert_eq!(
            loaded.report.warnings,
            vec![
                LoadWarning::UnknownActionNode { action: 0, node: 7 },
                LoadWarning::ActionLengthMismatch {
                    action: 0,
                    node: NodeId(0),
                    worlds: 1,
                    actions: 2
                },
                LoadWarning::UnknownActionWorld {
                    action: 0,
                    node: NodeId(0),
                    world: "ghost".to_string()
                },
            ]
        );
        assert!(logs_contain("targets unknown node id 7"));

        let timeline = loaded.scheduler.actions();
        assert_eq!(timeline.len(), 2);

        // Only the valid world reference of the third node action survives
        let first = timeline[0].actions();
        assert_eq!(first.len(), 1);
        assert_eq!(
            first[0].worlds,
            vec![WorldTarget {
                index: 1,
                name: "client".to_string(),
                action: WorldAction::Stop
            }]
        );

        // The well-formed action loads untouched
        assert_eq!(timeline[1].actions()[0].worlds[0].index, 0);
    }

    #[test]
    #[traced_test]
    fn test_bad_node_ids_and_action_names_drop_only_their_entry() {
        let text = r#"{
            "nodes": [
                { "nodeID": 0, "nodeIP": "10.0.0.1", "worldConfigs": [
                    { "worldName": "server", "worldType": "Server", "initializationMode": "Start" },
                    { "worldName": "client", "worldType": "Client", "initializationMode": "Connect" } ] }
            ],
            "experimentActions": [
                { "delay": 1, "actions": [
                    { "nodeID": -1, "worldNames": ["server"], "actions": ["Stop"] },
                    { "nodeID": 0, "worldNames": ["server"], "actions": ["Stop"] } ] },
                { "delay": 2, "actions": [
                    { "nodeID": 0, "worldNames": ["client", "server"], "actions": ["Pause", "Start"] },
                    { "nodeID": 4294967296, "worldNames": ["client"], "actions": ["Start"] } ] },
                { "delay": 3, "actions": [
                    { "nodeID": 0, "worldNames": ["client"], "actions": ["Connect"] } ] }
            ]
        }"#;
        let loaded = load(text);

        assert_eq!(
            loaded.report.warnings,
            vec![
                LoadWarning::UnknownActionNode { action: 0, node: -1 },
                LoadWarning::InvalidWorldAction {
                    action: 1,
                    node: NodeId(0),
                    world: "client".to_string(),
                    value: "Pause".to_string()
                },
                LoadWarning::UnknownActionNode {
                    action: 1,
                    node: 4_294_967_296
                },
            ]
        );
        assert!(logs_contain("unknown action \"Pause\""));

        let timeline = loaded.scheduler.actions();
        assert_eq!(timeline.len(), 3);

        let target = |action: usize| {
            timeline[action]
                .actions()
                .iter()
                .flat_map(|node_action| node_action.worlds.iter())
                .map(|world| (world.name.clone(), world.action))
                .collect::<Vec<_>>()
        };
        assert_eq!(target(0), vec![("server".to_string(), WorldAction::Stop)]);
        assert_eq!(target(1), vec![("server".to_string(), WorldAction::Start)]);
        assert_eq!(target(2), vec![("client".to_string(), WorldAction::Connect)]);
    }

    #[test]
    fn test_all_nodes_connected_gate() {
        let mut graph = load(TOPOLOGY).graph;
        assert!(!graph.all_nodes_connected());

        graph.set_connected(NodeId(0));
        graph.set_connected(NodeId(2));
        graph.set_connected(NodeId(99));
        assert!(!graph.all_nodes_connected());
        assert_eq!(graph.connected_count(), 2);

        graph.set_connected(NodeId(1));
        assert!(graph.all_nodes_connected());

        // Idempotent, and stays true
        graph.set_connected(NodeId(1));
        assert!(graph.all_nodes_connected());
    }

    #[test]
    fn test_compare_endpoint() {
        let mut graph = load(TOPOLOGY).graph;

        assert!(graph.compare_endpoint(NodeId(99), addr("1.2.3.4")));
        assert_eq!(graph.check_endpoint(NodeId(99), addr("1.2.3.4")), EndpointCheck::UnknownNode);

        assert!(graph.compare_endpoint(NodeId(1), addr("10.0.0.2")));
        assert!(!graph.compare_endpoint(NodeId(1), addr("10.0.0.8")));
        assert_eq!(
            graph.check_endpoint(NodeId(1), addr("10.0.0.8")),
            EndpointCheck::Conflict { recorded: addr("10.0.0.2") }
        );

        // Same host, different port is the same endpoint
        let seen: std::net::SocketAddr = "10.0.0.8:51000".parse().unwrap();
        graph.set_endpoint(NodeId(1), seen.into(), ConnectionHandle::from_seed(1));
        let again: std::net::SocketAddr = "10.0.0.8:52000".parse().unwrap();
        assert!(graph.compare_endpoint(NodeId(1), again.into()));
    }

    #[test]
    fn test_set_endpoint_idempotent() {
        let mut graph = load(TOPOLOGY).graph;
        let handle = ConnectionHandle::from_seed(11);

        graph.set_endpoint(NodeId(1), addr("10.0.0.8"), handle);
        let before = graph.node_to_configuration_commands(NodeId(2));
        graph.set_endpoint(NodeId(1), addr("10.0.0.8"), handle);

        assert_eq!(graph.endpoint(NodeId(1)), Some(addr("10.0.0.8")));
        assert_eq!(graph.node_to_configuration_commands(NodeId(2)), before);
        assert_eq!(graph.active_connections(), 1);
        assert_eq!(graph.connection_for(NodeId(1)), Some(handle));

        // Only the handle changes on a reconnect
        let fresh = ConnectionHandle::from_seed(12);
        graph.set_endpoint(NodeId(1), addr("10.0.0.8"), fresh);
        assert_eq!(graph.connection_for(NodeId(1)), Some(fresh));
        assert_eq!(graph.node_for_connection(handle), None);
        assert_eq!(graph.active_connections(), 1);
    }

    #[test]
    fn test_set_endpoint_unknown_node_is_noop() {
        let mut graph = load(TOPOLOGY).graph;
        graph.set_endpoint(NodeId(99), addr("10.9.9.9"), ConnectionHandle::from_seed(1));
        assert_eq!(graph.endpoint(NodeId(99)), None);
        assert_eq!(graph.active_connections(), 0);
    }

    #[test]
    fn test_release_connection_keeps_checked_in_flag() {
        let mut graph = load(TOPOLOGY).graph;
        let handle = ConnectionHandle::from_seed(3);
        graph.set_connected(NodeId(2));
        graph.set_endpoint(NodeId(2), addr("10.0.0.3"), handle);

        assert_eq!(graph.release_connection(handle), Some(NodeId(2)));
        assert_eq!(graph.release_connection(handle), None);
        assert_eq!(graph.connection_for(NodeId(2)), None);
        assert!(graph.node(NodeId(2)).unwrap().is_connected());
        assert_eq!(graph.endpoint(NodeId(2)), Some(addr("10.0.0.3")));
    }

    #[test]
    fn test_connection_table_rebinding_handle() {
        let mut table = ConnectionTable::default();
        let handle = ConnectionHandle::from_seed(1);
        table.bind(NodeId(1), handle);

        // A handle reused for another node no longer reaches the first one
        table.bind(NodeId(2), handle);
        assert_eq!(table.handle_for(NodeId(1)), None);
        assert_eq!(table.node_for(handle), Some(NodeId(2)));
        assert_eq!(table.len(), 1);
    }
}
