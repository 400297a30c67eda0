//! SimulatedNode - a deployment target that honors the command contract.
//!
//! Each node hosts a set of named worlds. Configuration commands and
//! timeline actions move those worlds along the lifecycle; a `Connect`
//! dials the resolved server address, substituting the coordinator's own
//! address for `UseSenderAddress`.

use deploy_core::protocol::WorldActionCommand;
use deploy_core::{ConfigurationCommand, DeploymentMessage, NodeMessage, ProtocolError, Transition, WorldStage};
use deploy_env::{Envelope, NodeId};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use tracing::{debug, info, warn};

/// One world hosted by a simulated node.
#[derive(Debug, Clone)]
pub struct HostedWorld {
    /// Last configuration received for this world
    pub config: ConfigurationCommand,

    /// Current lifecycle stage
    pub stage: WorldStage,

    /// Server the world is connected to, while `Connected`
    pub connected_to: Option<SocketAddr>,
}

/// A node running in the simulated cluster.
#[derive(Debug, Clone)]
pub struct SimulatedNode {
    id: NodeId,

    /// Host the node connects from
    host: IpAddr,

    worlds: BTreeMap<String, HostedWorld>,

    /// Every transition applied, in order
    history: Vec<(String, Transition)>,

    /// Errors reported by the coordinator
    errors: Vec<String>,
}

impl SimulatedNode {
    pub fn new(id: NodeId, host: IpAddr) -> Self {
        Self {
            id,
            host,
            worlds: BTreeMap::new(),
            history: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// Moves the node to another host (takes effect on the next check-in).
    pub fn set_host(&mut self, host: IpAddr) {
        self.host = host;
    }

    /// Builds the check-in message sent right after connecting.
    pub fn check_in(&self, timestamp_ms: u64) -> Result<Envelope, ProtocolError> {
        NodeMessage::ConfigRequest { node_id: self.id }.encode(timestamp_ms)
    }

    /// Handles one envelope from the coordinator at `sender`.
    pub fn receive(&mut self, envelope: &Envelope, sender: SocketAddr) -> Result<(), ProtocolError> {
        let message = DeploymentMessage::decode(envelope)?;

        if message.node_id() != self.id {
            warn!("{} received a message addressed to {}", self.id, message.node_id());
            return Ok(());
        }

        match message {
            DeploymentMessage::Configure(command) => self.configure(command, sender.ip()),
            DeploymentMessage::WorldAction(command) => self.apply_actions(command, sender.ip()),
            DeploymentMessage::ConfigError { reason, .. } => {
                warn!("{} was refused: {}", self.id, reason);
                self.errors.push(reason);
            }
        }
        Ok(())
    }

    fn configure(&mut self, command: ConfigurationCommand, sender: IpAddr) {
        let target = command.actions.target_stage();
        let name = command.world_name.clone();

        let world = self.worlds.entry(name.clone()).or_insert_with(|| HostedWorld {
            config: command.clone(),
            stage: WorldStage::Absent,
            connected_to: None,
        });
        world.config = command;

        debug!("{} configuring '{}' towards {:?}", self.id, name, target);
        Self::advance(self.id, &name, world, target, sender, &mut self.history);
    }

    fn apply_actions(&mut self, command: WorldActionCommand, sender: IpAddr) {
        for (name, action) in command.worlds {
            let Some(world) = self.worlds.get_mut(&name) else {
                warn!("{} has no world '{}', ignoring {:?}", self.id, name, action);
                continue;
            };
            info!("{} world '{}': {:?}", self.id, name, action);
            Self::advance(self.id, &name, world, WorldStage::from(action), sender, &mut self.history);
        }
    }

    /// Walks `world` towards `target`, one transition at a time.
    fn advance(
        id: NodeId,
        name: &str,
        world: &mut HostedWorld,
        target: WorldStage,
        sender: IpAddr,
        history: &mut Vec<(String, Transition)>,
    ) {
        for transition in world.stage.transitions_to(target) {
            if transition == Transition::Connect {
                let Some(server) = world.config.server_address.resolve(sender) else {
                    warn!("{} world '{}' has no server to connect to", id, name);
                    return;
                };
                world.connected_to = Some(SocketAddr::new(server, world.config.server_port));
            }
            if transition == Transition::Stop {
                world.connected_to = None;
            }

            match world.stage.apply(transition) {
                Some(next) => world.stage = next,
                None => {
                    warn!("{} world '{}': {:?} not valid from {:?}", id, name, transition, world.stage);
                    return;
                }
            }
            history.push((name.to_string(), transition));
        }
    }

    /// Stage of a hosted world (`Absent` if never configured).
    pub fn stage(&self, world: &str) -> WorldStage {
        self.worlds
            .get(world)
            .map(|w| w.stage)
            .unwrap_or(WorldStage::Absent)
    }

    pub fn world(&self, name: &str) -> Option<&HostedWorld> {
        self.worlds.get(name)
    }

    pub fn worlds(&self) -> impl Iterator<Item = (&str, &HostedWorld)> {
        self.worlds.iter().map(|(name, world)| (name.as_str(), world))
    }

    pub fn history(&self) -> &[(String, Transition)] {
        &self.history
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// True once at least one world was configured.
    pub fn is_configured(&self) -> bool {
        !self.worlds.is_empty()
    }
}
