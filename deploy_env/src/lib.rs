//! Deployment Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the deployment
//! coordinator to run in both **Production** (tokio) and **Simulation**
//! (virtual clock + channel network) environments.
//!
//! # Core Concept: The Reactor Pattern
//!
//! The coordinator never touches sockets or wall clocks directly. All I/O
//! goes through two seams:
//! - Time (`now()`, `sleep()`) via [`DeployContext`]
//! - Network (`send()` to a connection handle) via [`Transport`]
//!
//! Inbound connectivity events are delivered to the coordinator as plain
//! values, so a simulated cluster can replay the same event stream
//! deterministically from a seed.
//!
//! # Example
//!
//! ```ignore
//! use deploy_env::{DeployContext, Transport};
//!
//! async fn coordinator_loop<Ctx: DeployContext, Net: Transport>(
//!     ctx: &Ctx,
//!     net: &Net,
//!     events: &mut Receiver<Event>,
//! ) {
//!     loop {
//!         tokio::select! {
//!             event = events.recv() => handle_event(net, event).await,
//!             _ = ctx.sleep(Duration::from_secs(1)) => tick(net).await,
//!         }
//!     }
//! }
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;

pub use context::DeployContext;
pub use network::{Transport, NetworkController};
pub use types::{ConnectionHandle, Endpoint, Envelope, NodeId};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
