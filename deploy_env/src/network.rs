//! Network transport abstraction for the deployment coordinator.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{ConnectionHandle, Envelope};
use std::net::SocketAddr;

/// Abstraction for delivering messages to connected nodes.
///
/// The transport owns connection lifetime. The coordinator only addresses
/// peers through the opaque [`ConnectionHandle`] it was given when the node
/// checked in.
///
/// # Implementations
///
/// - **Production**: Wraps a socket/RPC layer
/// - **Simulation**: Channel-based with configurable faults
///
/// # Message Flow
///
/// ```text
/// Coordinator                Transport                  Node
///   |                           |                          |
///   |<-- check-in (id, addr, H) |<------ connect ----------|
///   |-- send(H, envelope) ----->|                          |
///   |                           |-- [may be dropped] ----->|
/// ```
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends an envelope on a connection.
    ///
    /// # Returns
    /// * `Ok(())` - Envelope queued for delivery
    /// * `Err(EnvError::NodeUnreachable)` - Connection closed or partitioned
    /// * `Err(EnvError::NetworkError)` - Immediate send failure
    ///
    /// # Note
    /// Success does not guarantee delivery. Callers treat every send as
    /// fire-and-forget.
    async fn send(&self, handle: ConnectionHandle, envelope: Envelope) -> Result<(), EnvError>;
    
    /// Address the coordinator is reachable at, as seen by its peers.
    fn local_address(&self) -> SocketAddr;
}

/// Marker trait for network controllers in simulation.
///
/// Allows injecting faults like partitions and lossy links.
pub trait NetworkController: Send + Sync {
    /// Makes a connection unreachable until healed.
    fn isolate(&self, handle: ConnectionHandle);
    
    /// Heals all isolated connections.
    fn heal_all(&self);
    
    /// Sets message loss probability for a connection (0.0 - 1.0).
    fn set_link_loss(&self, handle: ConnectionHandle, loss_rate: f64);
}
