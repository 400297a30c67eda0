//! The topology document - declarative input of the coordinator.
//!
//! The document is only read, never written. Field names follow the JSON
//! layout produced by the experiment tooling (`nodeID`, `worldConfigs`, ...).
//!
//! Node and world declarations are typed strictly: a syntax or type error
//! there makes the whole document unloadable, since the cluster shape itself
//! is in doubt. Experiment actions are read as written (signed node ids, raw
//! action names) so that [`crate::graph::parse_deployment_config`] can drop
//! one broken entry with a warning and keep the rest of the timeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading a topology document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read deployment config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    
    #[error("Malformed deployment config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Kind of world a node can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldKind {
    Server,
    Client,
    ThinClient,
    SimulatedClient,
    HostServer,
    Streamed,
}

/// How far a world is brought up when its node first checks in.
///
/// Each mode implies the previous ones: `Connect` implies `Start` implies
/// `Create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InitializationMode {
    Create,
    Start,
    Connect,
}

/// Role of a world in a streamed (render-remotely) session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamingRole {
    #[default]
    Disabled,
    Host,
    Guest,
}

/// Input emulation attached to a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EmulationType {
    #[default]
    None,
    Playback,
    Simulation,
}

/// A timeline action applied to a single world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldAction {
    Stop,
    Start,
    Connect,
}

impl WorldAction {
    pub fn name(self) -> &'static str {
        match self {
            WorldAction::Stop => "Stop",
            WorldAction::Start => "Start",
            WorldAction::Connect => "Connect",
        }
    }
}

impl fmt::Display for WorldAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An action name the timeline does not know.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown world action {0:?}")]
pub struct UnknownWorldAction(pub String);

impl FromStr for WorldAction {
    type Err = UnknownWorldAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Stop" => Ok(WorldAction::Stop),
            "Start" => Ok(WorldAction::Start),
            "Connect" => Ok(WorldAction::Connect),
            other => Err(UnknownWorldAction(other.to_string())),
        }
    }
}

/// Root of the topology document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDocument {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    
    #[serde(default)]
    pub experiment_actions: Vec<ExperimentActionSpec>,
}

/// A node entry as declared in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(rename = "nodeID")]
    pub node_id: u32,
    
    /// Advertised address; may be absent, may carry a port.
    #[serde(rename = "nodeIP", default)]
    pub node_ip: Option<String>,
    
    #[serde(rename = "worldConfigs", default)]
    pub world_configs: Vec<WorldSpec>,
}

/// A world entry as declared in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSpec {
    pub world_name: String,
    
    pub world_type: WorldKind,
    
    pub initialization_mode: InitializationMode,
    
    /// Node hosting the server this world connects to. Negative means none.
    #[serde(rename = "serverNodeID", default)]
    pub server_node_id: Option<i64>,
    
    /// Node hosting the signalling peer. Negative means none.
    #[serde(rename = "streamingNodeID", default)]
    pub streaming_node_id: Option<i64>,
    
    #[serde(default)]
    pub multiplay_streaming_roles: StreamingRole,
    
    #[serde(default)]
    pub num_thin_clients: u32,
    
    #[serde(default)]
    pub emulation_type: EmulationType,
    
    #[serde(default)]
    pub services: Vec<String>,
}

/// A timed batch of node actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentActionSpec {
    /// Whole seconds since experiment start.
    pub delay: u64,
    
    #[serde(default)]
    pub actions: Vec<NodeActionSpec>,
}

/// Per-node part of an experiment action; `world_names[i]` receives `actions[i]`.
///
/// Ids and action names are checked on load, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeActionSpec {
    /// Target node; negative or unknown ids drop this entry.
    #[serde(rename = "nodeID")]
    pub node_id: i64,
    
    #[serde(default)]
    pub world_names: Vec<String>,
    
    /// Action names as written, parsed with [`WorldAction::from_str`].
    #[serde(default)]
    pub actions: Vec<String>,
}

impl DeploymentDocument {
    /// Parses a document from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
    
    /// Reads and parses a document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    const SAMPLE: &str = r#"{
        "nodes": [
            { "nodeID": 0, "nodeIP": "10.0.0.1",
              "worldConfigs": [
                { "worldName": "server", "worldType": "Server",
                  "initializationMode": "Start", "serverNodeID": 0 }
              ] },
            { "nodeID": 1,
              "worldConfigs": [
                { "worldName": "client", "worldType": "Client",
                  "initializationMode": "Connect", "serverNodeID": 0,
                  "streamingNodeID": -1, "multiplayStreamingRoles": "Guest",
                  "numThinClients": 4, "services": ["terrain"] }
              ] }
        ],
        "experimentActions": [
            { "delay": 5, "actions": [
                { "nodeID": 1, "worldNames": ["client"], "actions": ["Stop"] } ] }
        ]
    }"#;
    
    #[test]
    fn test_parse_sample_document() {
        let doc = DeploymentDocument::from_json_str(SAMPLE).unwrap();
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].node_ip.as_deref(), Some("10.0.0.1"));
        assert!(doc.nodes[1].node_ip.is_none());
        
        let client = &doc.nodes[1].world_configs[0];
        assert_eq!(client.world_type, WorldKind::Client);
        assert_eq!(client.initialization_mode, InitializationMode::Connect);
        assert_eq!(client.streaming_node_id, Some(-1));
        assert_eq!(client.multiplay_streaming_roles, StreamingRole::Guest);
        assert_eq!(client.num_thin_clients, 4);
        assert_eq!(client.emulation_type, EmulationType::None);
        
        assert_eq!(doc.experiment_actions[0].delay, 5);
        assert_eq!(doc.experiment_actions[0].actions[0].actions, vec!["Stop".to_string()]);
    }
    
    #[test]
    fn test_bad_timeline_entries_still_load() {
        let text = r#"{
            "nodes": [ { "nodeID": 0, "worldConfigs": [] } ],
            "experimentActions": [
                { "delay": 1, "actions": [
                    { "nodeID": -1, "worldNames": ["w"], "actions": ["Stop"] },
                    { "nodeID": 0, "worldNames": ["w"], "actions": ["Pause"] },
                    { "nodeID": 0, "worldNames": ["w"], "actions": ["Start"] } ] }
            ]
        }"#;
        let doc = DeploymentDocument::from_json_str(text).unwrap();
        let actions = &doc.experiment_actions[0].actions;
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].node_id, -1);
        assert_eq!(actions[1].actions, vec!["Pause".to_string()]);
    }
    
    #[test]
    fn test_world_action_names() {
        for action in [WorldAction::Stop, WorldAction::Start, WorldAction::Connect] {
            assert_eq!(action.name().parse::<WorldAction>(), Ok(action));
        }
        assert_eq!(
            "Pause".parse::<WorldAction>(),
            Err(UnknownWorldAction("Pause".to_string()))
        );
        // Names are case-sensitive, as in the document format
        assert!("stop".parse::<WorldAction>().is_err());
    }
    
    #[test]
    fn test_missing_sections_default_to_empty() {
        let doc = DeploymentDocument::from_json_str("{}").unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.experiment_actions.is_empty());
    }
    
    #[test]
    fn test_unknown_world_type_is_parse_error() {
        let text = r#"{ "nodes": [ { "nodeID": 0, "worldConfigs": [
            { "worldName": "w", "worldType": "Toaster", "initializationMode": "Create" } ] } ] }"#;
        assert!(matches!(
            DeploymentDocument::from_json_str(text),
            Err(ConfigError::Parse(_))
        ));
    }
    
    #[test]
    fn test_missing_file_is_io_error() {
        let err = DeploymentDocument::from_path("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
    
    #[test]
    fn test_initialization_modes_are_ordered() {
        assert!(InitializationMode::Create < InitializationMode::Start);
        assert!(InitializationMode::Start < InitializationMode::Connect);
    }
}
