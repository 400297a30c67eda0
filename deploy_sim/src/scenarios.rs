//! Fault scenarios for the deployment coordinator.

use thiserror::Error;

/// Returned when a scenario name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown scenario: {0}")]
pub struct UnknownScenario(pub String);

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// DEP-001: every node checks in, the churn timeline runs to completion
    Baseline,

    /// DEP-002: nodes join at seeded random times
    StaggeredJoin,

    /// DEP-003: a client disconnects before its timeline actions
    NodeDropout,

    /// DEP-004: a client is unreachable for part of the timeline
    Partition,

    /// DEP-005: every envelope to one client is lost
    LossyLink,

    /// DEP-006: a checked-in node comes back from another host
    AddressConflict,

    /// DEP-007: a node outside the deployment asks for configuration
    UnknownNode,

    /// DEP-008: the topology carries broken references and actions
    MalformedTimeline,

    /// DEP-009: the timeline starts without waiting for every node
    NoReadinessGate,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Baseline,
            ScenarioId::StaggeredJoin,
            ScenarioId::NodeDropout,
            ScenarioId::Partition,
            ScenarioId::LossyLink,
            ScenarioId::AddressConflict,
            ScenarioId::UnknownNode,
            ScenarioId::MalformedTimeline,
            ScenarioId::NoReadinessGate,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::StaggeredJoin => "staggered_join",
            ScenarioId::NodeDropout => "node_dropout",
            ScenarioId::Partition => "partition",
            ScenarioId::LossyLink => "lossy_link",
            ScenarioId::AddressConflict => "address_conflict",
            ScenarioId::UnknownNode => "unknown_node",
            ScenarioId::MalformedTimeline => "malformed_timeline",
            ScenarioId::NoReadinessGate => "no_readiness_gate",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Baseline => "All nodes check in, worlds come up, churn timeline fires once",
            ScenarioId::StaggeredJoin => "Random join order; the timeline waits for the last node",
            ScenarioId::NodeDropout => "Client leaves early; its actions are dropped, the rest still fire",
            ScenarioId::Partition => "Client isolated for a while; sends fail and are not retried",
            ScenarioId::LossyLink => "100% loss to one client; actions are sent once and lost",
            ScenarioId::AddressConflict => "Node reconnects from a new host; conflict logged, address replaced",
            ScenarioId::UnknownNode => "Stranger checks in and is refused without blocking the cluster",
            ScenarioId::MalformedTimeline => "Broken entries are dropped, valid ones still load and fire",
            ScenarioId::NoReadinessGate => "Timeline starts immediately; a missing node misses its actions",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "baseline" | "dep-001" => Ok(ScenarioId::Baseline),
            "staggered_join" | "staggeredjoin" | "dep-002" => Ok(ScenarioId::StaggeredJoin),
            "node_dropout" | "nodedropout" | "dep-003" => Ok(ScenarioId::NodeDropout),
            "partition" | "dep-004" => Ok(ScenarioId::Partition),
            "lossy_link" | "lossylink" | "dep-005" => Ok(ScenarioId::LossyLink),
            "address_conflict" | "addressconflict" | "dep-006" => Ok(ScenarioId::AddressConflict),
            "unknown_node" | "unknownnode" | "dep-007" => Ok(ScenarioId::UnknownNode),
            "malformed_timeline" | "malformedtimeline" | "dep-008" => Ok(ScenarioId::MalformedTimeline),
            "no_readiness_gate" | "noreadinessgate" | "dep-009" => Ok(ScenarioId::NoReadinessGate),
            _ => Err(UnknownScenario(s.to_string())),
        }
    }
}
