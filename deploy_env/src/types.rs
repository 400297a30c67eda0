//! Common types for the deployment environment abstraction.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Stable integer identifier of a node, as declared in the topology document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Opaque reference to a transport-level connection.
///
/// The transport owns the connection; the coordinator only keeps the handle
/// as a lookup key. Uses UUID v4 for uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionHandle(pub Uuid);

impl ConnectionHandle {
    /// Creates a new random handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a deterministic handle from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for ConnectionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Normalized, host-only network address of a node.
///
/// Ports are stripped and IPv4-mapped IPv6 addresses are folded back to
/// IPv4, so two observations of the same host always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(IpAddr);

impl Endpoint {
    /// `127.0.0.1`, the default for nodes without a usable advertised address.
    pub const LOOPBACK: Endpoint = Endpoint(IpAddr::V4(Ipv4Addr::LOCALHOST));
    
    /// Creates an endpoint from a host address.
    pub fn new(ip: IpAddr) -> Self {
        Self(ip.to_canonical())
    }
    
    /// Parses a host address, accepting an optional `:port` suffix.
    ///
    /// Returns `None` for anything that is not a literal IP address.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(ip) = text.parse::<IpAddr>() {
            return Some(Self::new(ip));
        }
        text.parse::<SocketAddr>().ok().map(Self::from)
    }
    
    /// Returns the host address.
    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip())
    }
}

impl From<IpAddr> for Endpoint {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Envelope for messages exchanged between the coordinator and nodes.
///
/// This is a transport-layer wrapper - the payload is opaque bytes that
/// the protocol layer encodes and decodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The encoded message bytes
    pub payload: Vec<u8>,
    
    /// Timestamp when the envelope was created (sender's clock)
    pub timestamp_ms: u64,
}

impl Envelope {
    /// Creates a new envelope from payload bytes.
    pub fn new(payload: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            payload,
            timestamp_ms,
        }
    }
    
    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;
    
    #[test]
    fn test_endpoint_strips_port() {
        let a = Endpoint::from("10.0.0.5:7979".parse::<SocketAddr>().unwrap());
        let b = Endpoint::from("10.0.0.5:40122".parse::<SocketAddr>().unwrap());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "10.0.0.5");
    }
    
    #[test]
    fn test_endpoint_parse_variants() {
        assert_eq!(Endpoint::parse(" 192.168.1.2 ").unwrap().to_string(), "192.168.1.2");
        assert_eq!(Endpoint::parse("192.168.1.2:9000").unwrap().to_string(), "192.168.1.2");
        assert_eq!(Endpoint::parse("[::1]:9000").unwrap().to_string(), "::1");
        assert!(Endpoint::parse("not-an-address").is_none());
        assert!(Endpoint::parse("").is_none());
    }
    
    #[test]
    fn test_endpoint_canonicalizes_mapped_ipv4() {
        let mapped = IpAddr::V6(Ipv4Addr::new(10, 1, 2, 3).to_ipv6_mapped());
        assert_eq!(Endpoint::new(mapped), Endpoint::parse("10.1.2.3").unwrap());
        assert_ne!(Endpoint::new(IpAddr::V6(Ipv6Addr::LOCALHOST)), Endpoint::LOOPBACK);
    }
    
    #[test]
    fn test_connection_handle_from_seed() {
        assert_eq!(ConnectionHandle::from_seed(3), ConnectionHandle::from_seed(3));
        assert_ne!(ConnectionHandle::from_seed(3), ConnectionHandle::from_seed(4));
        assert_ne!(ConnectionHandle::new(), ConnectionHandle::new());
    }
    
    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId(4).to_string(), "node-4");
    }
}
