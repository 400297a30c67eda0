//! Liveness bookkeeping exposed to external watchdogs.
//!
//! The coordinator publishes a [`LivenessSnapshot`] after every event and
//! tick. Deciding when the run is over belongs to a [`LivenessMonitor`];
//! the coordinator itself has no timeout policy.

use serde::Serialize;

/// Point-in-time view of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LivenessSnapshot {
    /// Nodes declared in the topology
    pub total_nodes: usize,
    
    /// Nodes that have checked in at least once
    pub checked_in: usize,
    
    /// Nodes currently reachable through a connection
    pub active_connections: usize,
    
    /// Experiment actions that have not fired yet
    pub pending_actions: usize,
    
    /// Whether the experiment clock is running
    pub experiment_started: bool,
    
    /// Whether every experiment action has fired
    pub experiment_finished: bool,
}

impl LivenessSnapshot {
    /// True while any node is still reachable.
    pub fn any_active(&self) -> bool {
        self.active_connections > 0
    }
}

/// External policy deciding when the coordinator should stop.
pub trait LivenessMonitor: Send {
    /// Inspects the latest snapshot. Returning true ends the event loop.
    fn should_terminate(&mut self, snapshot: &LivenessSnapshot) -> bool;
}

/// Monitor that never asks to stop; the loop ends when its event source closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTerminate;

impl LivenessMonitor for NeverTerminate {
    fn should_terminate(&mut self, _snapshot: &LivenessSnapshot) -> bool {
        false
    }
}
