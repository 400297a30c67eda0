//! Termination policy for simulated runs.

use deploy_core::{LivenessMonitor, LivenessSnapshot};

/// Stops a run once nothing is left to do.
///
/// Terminates when the timeline has finished and every connection is
/// closed, or after `grace` consecutive snapshots without any connection.
#[derive(Debug, Clone)]
pub struct IdleMonitor {
    grace: u32,
    idle_streak: u32,
}

impl IdleMonitor {
    pub fn new(grace: u32) -> Self {
        Self { grace, idle_streak: 0 }
    }
}

impl Default for IdleMonitor {
    fn default() -> Self {
        Self::new(30)
    }
}

impl LivenessMonitor for IdleMonitor {
    fn should_terminate(&mut self, snapshot: &LivenessSnapshot) -> bool {
        if snapshot.active_connections > 0 {
            self.idle_streak = 0;
            return false;
        }
        if snapshot.experiment_started && snapshot.experiment_finished {
            return true;
        }

        self.idle_streak += 1;
        self.idle_streak >= self.grace
    }
}
