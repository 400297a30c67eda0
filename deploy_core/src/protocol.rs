//! Configuration Command Protocol.
//!
//! Messages exchanged between the coordinator and the nodes it configures.
//! Everything travels as JSON inside a transport [`Envelope`].

use crate::config::{EmulationType, StreamingRole, WorldAction, WorldKind};
use crate::lifecycle::ActionMask;
use deploy_env::{Envelope, NodeId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;

/// Errors raised while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    
    #[error("Failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    
    #[error("Action mask {0:#05b} is not a Create/Start/Connect prefix")]
    InvalidActionMask(u8),
}

/// How a receiver finds the peer a world should talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "address")]
pub enum AddressResolution {
    /// No peer could be resolved; the field is left empty.
    #[default]
    Unset,
    /// The peer runs on the receiving host.
    Loopback,
    /// The peer is the coordinator; use the address the command came from.
    UseSenderAddress,
    /// A literal host address.
    Literal(IpAddr),
}

impl AddressResolution {
    /// Resolves to a concrete address on the receiving side.
    ///
    /// `sender` is the address the command arrived from.
    pub fn resolve(&self, sender: IpAddr) -> Option<IpAddr> {
        match self {
            AddressResolution::Unset => None,
            AddressResolution::Loopback => Some(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST)),
            AddressResolution::UseSenderAddress => Some(sender),
            AddressResolution::Literal(ip) => Some(*ip),
        }
    }
}

/// Tells one node to bring one of its worlds up to a lifecycle stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationCommand {
    #[serde(rename = "nodeID")]
    pub node_id: NodeId,
    pub actions: ActionMask,
    pub world_name: String,
    pub world_kind: WorldKind,
    pub streaming_role: StreamingRole,
    pub server_address: AddressResolution,
    pub server_port: u16,
    pub signalling_address: AddressResolution,
    pub thin_clients: u32,
    pub emulation: EmulationType,
    pub services: Vec<String>,
}

/// Timeline action for one node: each named world receives its action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldActionCommand {
    #[serde(rename = "nodeID")]
    pub node_id: NodeId,
    pub worlds: Vec<(String, WorldAction)>,
}

/// Coordinator → node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMessage {
    Configure(ConfigurationCommand),
    WorldAction(WorldActionCommand),
    /// The coordinator refused a configuration request.
    ConfigError { node_id: NodeId, reason: String },
}

/// Node → coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeMessage {
    /// Sent once on connect; the coordinator answers with configuration.
    ConfigRequest { node_id: NodeId },
}

fn encode<T: Serialize>(message: &T, timestamp_ms: u64) -> Result<Envelope, ProtocolError> {
    let payload = serde_json::to_vec(message).map_err(ProtocolError::Encode)?;
    Ok(Envelope::new(payload, timestamp_ms))
}

fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ProtocolError> {
    serde_json::from_slice(&envelope.payload).map_err(ProtocolError::Decode)
}

impl DeploymentMessage {
    pub fn encode(&self, timestamp_ms: u64) -> Result<Envelope, ProtocolError> {
        encode(self, timestamp_ms)
    }
    
    pub fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        decode(envelope)
    }
    
    /// Node the message is addressed to.
    pub fn node_id(&self) -> NodeId {
        match self {
            DeploymentMessage::Configure(cmd) => cmd.node_id,
            DeploymentMessage::WorldAction(cmd) => cmd.node_id,
            DeploymentMessage::ConfigError { node_id, .. } => *node_id,
        }
    }
}

impl NodeMessage {
    pub fn encode(&self, timestamp_ms: u64) -> Result<Envelope, ProtocolError> {
        encode(self, timestamp_ms)
    }
    
    pub fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        decode(envelope)
    }
}
