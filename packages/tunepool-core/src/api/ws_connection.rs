//! WebSocket connection tracking and management.
//!
//! - `WsConnectionManager`: tracks every room member's socket
//! - `ConnectionGuard`: RAII guard for automatic cleanup on disconnect

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

struct ConnectionState {
    room: String,
}

/// Manages all active WebSocket connections.
///
/// Uses hierarchical cancellation tokens so every socket can be closed at
/// once on shutdown.
pub struct WsConnectionManager {
    /// Active connections: connection_id -> state
    connections: DashMap<String, ConnectionState>,
    next_id: AtomicU64,
    /// Parent of every connection token. Replaced after `close_all()`.
    global_cancel: RwLock<CancellationToken>,
}

impl WsConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Registers a member socket for `room`.
    ///
    /// The returned guard unregisters the connection when dropped.
    pub fn register(self: &Arc<Self>, room: &str) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let conn_id = format!("ws-{}", id);
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(
            conn_id.clone(),
            ConnectionState {
                room: room.to_string(),
            },
        );
        log::info!(
            "[WS] Connection registered: {} in room '{}' (total: {})",
            conn_id,
            room,
            self.connections.len()
        );

        ConnectionGuard {
            id: conn_id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: &str) {
        if self.connections.remove(id).is_some() {
            log::info!(
                "[WS] Connection unregistered: {} (remaining: {})",
                id,
                self.connections.len()
            );
        }
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns the number of sockets connected to `room`.
    #[must_use]
    pub fn room_member_count(&self, room: &str) -> usize {
        self.connections.iter().filter(|c| c.room == room).count()
    }

    /// Force-closes all connections.
    ///
    /// New connections can still be accepted afterwards. Returns the number of
    /// connections that were signaled to close.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
            let mut guard = self.global_cancel.write();
            guard.cancel();
            *guard = CancellationToken::new();
        }
        count
    }
}

impl Default for WsConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that unregisters a connection when dropped.
pub struct ConnectionGuard {
    id: String,
    manager: Arc<WsConnectionManager>,
    /// Cancelled on force-close.
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(&self.id);
    }
}
