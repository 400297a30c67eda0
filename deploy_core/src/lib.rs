//! Deployment Core - coordination of distributed game experiments
//!
//! This library turns a declarative cluster topology into the commands that
//! bring every node's worlds up, and replays a scripted experiment timeline
//! against the running cluster:
//! 1. **Deployment Graph**: which nodes exist, which have checked in and from
//!    where, and what each of them must run
//! 2. **Configuration Command Protocol**: lifecycle-safe commands with
//!    resolved server and signalling addresses
//! 3. **Experiment Scheduler**: one-shot, delay-ordered world actions
//!
//! The [`Coordinator`] ties them together behind the `deploy_env` context and
//! transport abstractions.

pub mod config;
pub mod coordinator;
pub mod graph;
pub mod lifecycle;
pub mod liveness;
pub mod protocol;
pub mod scheduler;
pub mod settings;

// Re-export key types for convenience
pub use config::{ConfigError, DeploymentDocument, InitializationMode, WorldAction, WorldKind};
pub use coordinator::{Coordinator, CoordinatorEvent, CoordinatorStats};
pub use graph::{parse_deployment_config, DeploymentGraph, EndpointCheck, LoadReport, LoadWarning, LoadedDeployment};
pub use lifecycle::{ActionMask, Transition, WorldStage};
pub use liveness::{LivenessMonitor, LivenessSnapshot, NeverTerminate};
pub use protocol::{AddressResolution, ConfigurationCommand, DeploymentMessage, NodeMessage, ProtocolError};
pub use scheduler::{ExperimentAction, ExperimentScheduler, NodeAction};
pub use settings::CoordinatorSettings;
