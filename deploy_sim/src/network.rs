//! Simulated network transport with fault injection.

use async_trait::async_trait;
use deploy_env::{ConnectionHandle, EnvError, Envelope, NetworkController, Transport};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Envelope in flight from the coordinator to a connection.
#[derive(Debug)]
pub struct NetworkMessage {
    pub to: ConnectionHandle,
    pub envelope: Envelope,
}

/// The coordinator's side of the simulated network.
pub struct SimNetwork {
    /// Address peers see the coordinator at
    local_address: SocketAddr,
    
    /// Sender to central router
    tx: mpsc::Sender<NetworkMessage>,
    
    /// Fault injection state shared with the router
    controller: Arc<SimNetworkController>,
}

impl SimNetwork {
    /// Creates a new simulated network interface.
    pub fn new(
        local_address: SocketAddr,
        tx: mpsc::Sender<NetworkMessage>,
        controller: Arc<SimNetworkController>,
    ) -> Self {
        Self {
            local_address,
            tx,
            controller,
        }
    }
    
    /// Creates a stub network for testing (accepts and discards everything).
    pub fn new_stub(local_address: SocketAddr) -> Self {
        let (tx, _) = mpsc::channel(1);
        Self {
            local_address,
            tx,
            controller: Arc::new(SimNetworkController::new()),
        }
    }
}

#[async_trait]
impl Transport for SimNetwork {
    async fn send(&self, handle: ConnectionHandle, envelope: Envelope) -> Result<(), EnvError> {
        if self.controller.is_isolated(handle) {
            return Err(EnvError::unreachable(handle));
        }
        
        let msg = NetworkMessage {
            to: handle,
            envelope,
        };
        
        // A stub network has no router; treat the message as sent
        if self.tx.is_closed() {
            return Ok(());
        }
        self.tx.send(msg).await.map_err(|_| EnvError::network("Channel closed"))
    }
    
    fn local_address(&self) -> SocketAddr {
        self.local_address
    }
}

/// Network controller for fault injection.
pub struct SimNetworkController {
    /// Connections that cannot be reached
    isolated: Mutex<HashSet<ConnectionHandle>>,
    
    /// Per-connection message loss rate (0.0 - 1.0)
    link_loss: Mutex<HashMap<ConnectionHandle, f64>>,
}

impl SimNetworkController {
    /// Creates a new network controller.
    pub fn new() -> Self {
        Self {
            isolated: Mutex::new(HashSet::new()),
            link_loss: Mutex::new(HashMap::new()),
        }
    }
    
    /// Checks if a connection is currently cut off.
    pub fn is_isolated(&self, handle: ConnectionHandle) -> bool {
        self.isolated.lock().contains(&handle)
    }
    
    /// Gets the loss rate for a connection (default 0.0).
    pub fn get_loss(&self, handle: ConnectionHandle) -> f64 {
        *self.link_loss.lock().get(&handle).unwrap_or(&0.0)
    }
}

impl Default for SimNetworkController {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkController for SimNetworkController {
    fn isolate(&self, handle: ConnectionHandle) {
        self.isolated.lock().insert(handle);
    }
    
    fn heal_all(&self) {
        self.isolated.lock().clear();
    }
    
    fn set_link_loss(&self, handle: ConnectionHandle, loss_rate: f64) {
        self.link_loss.lock().insert(handle, loss_rate.clamp(0.0, 1.0));
    }
}
