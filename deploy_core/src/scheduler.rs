//! Experiment Scheduler - a one-shot timeline of world actions.
//!
//! The timeline is built once from the topology document. Each
//! [`ExperimentAction`] fires at most once, when the experiment clock
//! reaches its delay; actions with equal delays fire in declaration order.
//! There is no cancellation and no retry.

use crate::config::WorldAction;
use crate::protocol::WorldActionCommand;
use deploy_env::NodeId;
use std::time::Duration;
use tracing::{debug, info};

/// One world of a node, addressed by its position in the node's world list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldTarget {
    pub index: usize,
    pub name: String,
    pub action: WorldAction,
}

/// Actions for a single node within an experiment action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAction {
    pub node_id: NodeId,
    pub worlds: Vec<WorldTarget>,
}

impl NodeAction {
    /// Wire form of this action.
    pub fn to_command(&self) -> WorldActionCommand {
        WorldActionCommand {
            node_id: self.node_id,
            worlds: self
                .worlds
                .iter()
                .map(|target| (target.name.clone(), target.action))
                .collect(),
        }
    }
}

/// A timed batch of node actions.
#[derive(Debug, Clone)]
pub struct ExperimentAction {
    delay: Duration,
    done: bool,
    actions: Vec<NodeAction>,
}

impl ExperimentAction {
    pub fn new(delay: Duration, actions: Vec<NodeAction>) -> Self {
        Self {
            delay,
            done: false,
            actions,
        }
    }
    
    pub fn delay(&self) -> Duration {
        self.delay
    }
    
    pub fn is_done(&self) -> bool {
        self.done
    }
    
    pub fn actions(&self) -> &[NodeAction] {
        &self.actions
    }
}

/// Holds the experiment timeline and decides what is due.
#[derive(Debug, Clone, Default)]
pub struct ExperimentScheduler {
    timeline: Vec<ExperimentAction>,
}

impl ExperimentScheduler {
    /// Builds the timeline. Sorting is stable, so equal delays keep
    /// declaration order.
    pub fn new(mut actions: Vec<ExperimentAction>) -> Self {
        actions.sort_by_key(|action| action.delay);
        Self { timeline: actions }
    }
    
    /// Marks every due action done and hands out its node actions, in
    /// timeline order.
    ///
    /// An action is due when `elapsed >= delay` and it has not fired yet.
    /// The caller dispatches the returned actions best-effort; the scheduler
    /// never hears back about delivery.
    pub fn take_due(&mut self, elapsed: Duration) -> Vec<NodeAction> {
        let mut due = Vec::new();
        
        for (index, action) in self.timeline.iter_mut().enumerate() {
            if action.delay > elapsed {
                // Sorted: nothing later can be due either
                break;
            }
            if action.done {
                continue;
            }
            
            info!(
                "Experiment action #{} due at {}s fires ({} node actions)",
                index,
                action.delay.as_secs(),
                action.actions.len()
            );
            due.extend(action.actions.iter().cloned());
            action.done = true;
        }
        
        if !due.is_empty() {
            debug!("{} actions pending after t={:.1}s", self.pending(), elapsed.as_secs_f64());
        }
        due
    }
    
    /// Number of actions that have not fired yet.
    pub fn pending(&self) -> usize {
        self.timeline.iter().filter(|action| !action.done).count()
    }
    
    /// True once every action has fired.
    pub fn is_finished(&self) -> bool {
        self.timeline.iter().all(|action| action.done)
    }
    
    /// Delay of the earliest action still pending.
    pub fn next_delay(&self) -> Option<Duration> {
        self.timeline
            .iter()
            .find(|action| !action.done)
            .map(|action| action.delay)
    }
    
    pub fn len(&self) -> usize {
        self.timeline.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }
    
    /// The timeline in firing order.
    pub fn actions(&self) -> &[ExperimentAction] {
        &self.timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    
    fn action_for(node: u32, delay_secs: u64) -> ExperimentAction {
        ExperimentAction::new(
            Duration::from_secs(delay_secs),
            vec![NodeAction {
                node_id: NodeId(node),
                worlds: vec![WorldTarget {
                    index: 0,
                    name: "client".to_string(),
                    action: WorldAction::Start,
                }],
            }],
        )
    }
    
    fn fired_nodes(actions: &[NodeAction]) -> Vec<u32> {
        actions.iter().map(|a| a.node_id.0).collect()
    }
    
    #[test]
    fn test_delays_fire_in_order() {
        let mut scheduler = ExperimentScheduler::new(vec![
            action_for(1, 0),
            action_for(2, 5),
            action_for(3, 5),
            action_for(4, 10),
        ]);
        
        assert_eq!(fired_nodes(&scheduler.take_due(Duration::ZERO)), vec![1]);
        assert!(scheduler.take_due(Duration::from_secs(4)).is_empty());
        
        // Both delay-5 actions, in declaration order
        assert_eq!(fired_nodes(&scheduler.take_due(Duration::from_secs(5))), vec![2, 3]);
        assert_eq!(scheduler.pending(), 1);
        assert_eq!(scheduler.next_delay(), Some(Duration::from_secs(10)));
        
        assert!(scheduler.take_due(Duration::from_secs(7)).is_empty());
        assert_eq!(fired_nodes(&scheduler.take_due(Duration::from_secs(10))), vec![4]);
        assert!(scheduler.is_finished());
        
        // Repeated ticking past every delay fires nothing
        assert!(scheduler.take_due(Duration::from_secs(60)).is_empty());
    }
    
    #[test]
    fn test_late_tick_fires_everything_once() {
        let mut scheduler = ExperimentScheduler::new(vec![
            action_for(4, 10),
            action_for(2, 5),
            action_for(3, 5),
        ]);
        
        // Timeline is chronological; ties keep declaration order
        assert_eq!(fired_nodes(&scheduler.take_due(Duration::from_secs(30))), vec![2, 3, 4]);
        assert!(scheduler.actions().iter().all(ExperimentAction::is_done));
    }
    
    #[test]
    fn test_empty_action_still_marked_done() {
        let mut scheduler =
            ExperimentScheduler::new(vec![ExperimentAction::new(Duration::from_secs(1), vec![])]);
        assert!(scheduler.take_due(Duration::from_secs(1)).is_empty());
        assert!(scheduler.is_finished());
        assert_eq!(scheduler.next_delay(), None);
    }
    
    #[test]
    fn test_to_command() {
        let command = action_for(7, 0).actions()[0].to_command();
        assert_eq!(command.node_id, NodeId(7));
        assert_eq!(command.worlds, vec![("client".to_string(), WorldAction::Start)]);
    }
    
    proptest! {
        #[test]
        fn prop_each_action_fires_at_most_once(
            delays in proptest::collection::vec(0u64..30, 0..12),
            ticks in proptest::collection::vec(0u64..40, 1..20),
        ) {
            let actions = delays
                .iter()
                .enumerate()
                .map(|(i, d)| action_for(i as u32, *d))
                .collect();
            let mut scheduler = ExperimentScheduler::new(actions);
            
            let mut sorted_ticks = ticks.clone();
            sorted_ticks.sort_unstable();
            
            let mut fired = Vec::new();
            for tick in sorted_ticks.iter() {
                fired.extend(fired_nodes(&scheduler.take_due(Duration::from_secs(*tick))));
            }
            
            let mut unique = fired.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), fired.len());
            
            let last = *sorted_ticks.last().unwrap();
            let expected = delays.iter().filter(|d| **d <= last).count();
            prop_assert_eq!(fired.len(), expected);
            prop_assert_eq!(scheduler.pending(), delays.len() - expected);
        }
    }
}
