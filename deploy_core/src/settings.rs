//! Coordinator configuration.

use deploy_env::NodeId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shortest tick period a run will use.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Cluster-wide settings of a coordinator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Node the coordinator itself runs as (default: 0)
    pub coordinator_node: NodeId,
    
    /// Server port stamped on every configuration command (default: 7979)
    pub server_port: u16,
    
    /// Scheduler tick period (default: 1s). Read through [`Self::tick_period`].
    pub tick_interval: Duration,
    
    /// Hold the experiment clock until every node has checked in (default: true)
    pub wait_for_all_nodes: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            coordinator_node: NodeId(0),
            server_port: 7979,
            tick_interval: Duration::from_secs(1),
            wait_for_all_nodes: true,
        }
    }
}

impl CoordinatorSettings {
    pub fn with_coordinator_node(mut self, node: NodeId) -> Self {
        self.coordinator_node = node;
        self
    }
    
    pub fn with_server_port(mut self, port: u16) -> Self {
        self.server_port = port;
        self
    }
    
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
    
    pub fn with_wait_for_all_nodes(mut self, wait: bool) -> Self {
        self.wait_for_all_nodes = wait;
        self
    }

    /// Tick period, never shorter than [`MIN_TICK_INTERVAL`].
    pub fn tick_period(&self) -> Duration {
        self.tick_interval.max(MIN_TICK_INTERVAL)
    }
}
