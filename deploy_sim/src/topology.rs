//! Built-in deployment documents for the scenarios.
//!
//! The default cluster is a star: node 0 runs the authoritative server (and
//! a local observer client), every other node runs one client world.

use deploy_core::config::{EmulationType, ExperimentActionSpec, NodeActionSpec, NodeSpec, StreamingRole, WorldSpec};
use deploy_core::{DeploymentDocument, InitializationMode, WorldAction, WorldKind};

/// Name of the server world on node 0.
pub const SERVER_WORLD: &str = "arena";

/// Name of node 0's own client world.
pub const OBSERVER_WORLD: &str = "observer";

/// Name of the client world on every other node.
pub const CLIENT_WORLD: &str = "game";

/// Name of the bot world on the last client node.
pub const BENCH_WORLD: &str = "bench";

/// Advertised address of node `id`.
pub fn node_host(id: u32) -> String {
    format!("10.0.{}.{}", id / 250, id % 250 + 1)
}

pub fn world(name: &str, kind: WorldKind, mode: InitializationMode, server: Option<i64>) -> WorldSpec {
    WorldSpec {
        world_name: name.to_string(),
        world_type: kind,
        initialization_mode: mode,
        server_node_id: server,
        streaming_node_id: None,
        multiplay_streaming_roles: StreamingRole::Disabled,
        num_thin_clients: 0,
        emulation_type: EmulationType::None,
        services: Vec::new(),
    }
}

pub fn node(id: u32, worlds: Vec<WorldSpec>) -> NodeSpec {
    NodeSpec {
        node_id: id,
        node_ip: Some(node_host(id)),
        world_configs: worlds,
    }
}

/// One experiment action for a single node.
pub fn action(delay: u64, node: u32, worlds: &[(&str, WorldAction)]) -> ExperimentActionSpec {
    ExperimentActionSpec {
        delay,
        actions: vec![NodeActionSpec {
            node_id: i64::from(node),
            world_names: worlds.iter().map(|(name, _)| name.to_string()).collect(),
            actions: worlds.iter().map(|(_, action)| action.to_string()).collect(),
        }],
    }
}

/// Star cluster with `clients` client nodes and no timeline.
pub fn star(clients: u32) -> DeploymentDocument {
    let clients = clients.max(1);
    let mut nodes = vec![node(
        0,
        vec![
            world(SERVER_WORLD, WorldKind::Server, InitializationMode::Start, Some(0)),
            world(OBSERVER_WORLD, WorldKind::Client, InitializationMode::Connect, Some(0)),
        ],
    )];

    for id in 1..=clients {
        let mut worlds = vec![world(CLIENT_WORLD, WorldKind::Client, InitializationMode::Connect, Some(0))];
        if id == clients {
            let mut bench = world(BENCH_WORLD, WorldKind::SimulatedClient, InitializationMode::Create, Some(0));
            bench.emulation_type = EmulationType::Simulation;
            bench.services = vec!["bots".to_string()];
            worlds.push(bench);
        }
        nodes.push(node(id, worlds));
    }

    DeploymentDocument {
        nodes,
        experiment_actions: Vec::new(),
    }
}

/// Star cluster with the churn timeline:
///
/// | delay | node      | action                 |
/// |-------|-----------|------------------------|
/// | 2     | 1         | `game` Stop            |
/// | 3     | last      | `bench` Start          |
/// | 4     | 1         | `game` Connect         |
/// | 6     | 1         | `game` Stop            |
pub fn star_with_churn(clients: u32) -> DeploymentDocument {
    let clients = clients.max(1);
    let mut doc = star(clients);
    doc.experiment_actions = vec![
        action(2, 1, &[(CLIENT_WORLD, WorldAction::Stop)]),
        action(3, clients, &[(BENCH_WORLD, WorldAction::Start)]),
        action(4, 1, &[(CLIENT_WORLD, WorldAction::Connect)]),
        action(6, 1, &[(CLIENT_WORLD, WorldAction::Stop)]),
    ];
    doc
}

/// Node actions in the churn timeline.
pub const CHURN_ACTIONS: u64 = 4;
