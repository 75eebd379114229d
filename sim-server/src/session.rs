//! Registry of connected ground stations

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Information about one connected client
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub addr: SocketAddr,
    pub connected_at: Instant,
    pub commands_received: u64,
}

/// Tracks all connected clients
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SocketAddr, ClientInfo>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, addr: SocketAddr) {
        let info = ClientInfo {
            addr,
            connected_at: Instant::now(),
            commands_received: 0,
        };
        self.sessions.write().await.insert(addr, info);
    }

    /// Remove a client, returning what was known about it
    pub async fn unregister(&self, addr: SocketAddr) -> Option<ClientInfo> {
        self.sessions.write().await.remove(&addr)
    }

    pub async fn record_command(&self, addr: SocketAddr) {
        let mut sessions = self.sessions.write().await;
        if let Some(info) = sessions.get_mut(&addr) {
            info.commands_received += 1;
        }
    }

    pub async fn info(&self, addr: SocketAddr) -> Option<ClientInfo> {
        self.sessions.read().await.get(&addr).cloned()
    }

    /// Number of connected clients
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
