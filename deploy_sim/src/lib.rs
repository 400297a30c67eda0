//! Deployment Deterministic Simulation Testing (DST) Harness
//!
//! This crate runs the deployment coordinator against a simulated cluster,
//! deterministically:
//! - **Time**: a virtual clock that only moves when the harness steps it
//! - **Network**: channels with per-connection isolation and link loss
//! - **Randomness**: join order, ports and handles derived from one seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ Coordinator<SimContext, SimNetwork>                  │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       ▲ CheckIn / Disconnected     │ Envelopes              │
//! │       │                       ┌────▼─────┐                  │
//! │       │                       │  Router  │ isolation, loss  │
//! │       │                       └────┬─────┘                  │
//! │  ┌────┴──────┐  ┌───────────┐  ┌───▼───────┐                │
//! │  │  Node #0  │  │  Node #1  │  │  Node #2  │    ...         │
//! │  └───────────┘  └───────────┘  └───────────┘                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use deploy_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Partition).await;
//! assert!(result.passed);
//! ```

mod context;
mod monitor;
mod network;
mod node;
mod runner;
mod world;
pub mod scenarios;
pub mod topology;

pub use context::SimContext;
pub use monitor::IdleMonitor;
pub use network::{NetworkMessage, SimNetwork, SimNetworkController};
pub use node::{HostedWorld, SimulatedNode};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{RouterStats, SimConfig, SimWorld};
