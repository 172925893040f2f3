use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use dashmap::DashMap;
use tokio::sync::watch;

pub type ConnectionId = u64;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
}

/// Live connections, so shutdown can wait for them and force-close stragglers.
#[derive(Debug)]
pub struct Registry {
    conns: DashMap<ConnectionId, ConnectionInfo>,
    next_id: AtomicU64,
    /// Number of live connections, republished on every change
    live: watch::Sender<usize>,
    /// Flipped to true once when the shutdown budget is exhausted
    force_close: watch::Sender<bool>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
            next_id: AtomicU64::new(1),
            live: watch::Sender::new(0),
            force_close: watch::Sender::new(false),
        }
    }

    /// Tracks a connection until the returned guard is dropped.
    pub fn register(self: &Arc<Self>, peer: Option<SocketAddr>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.conns.insert(id, ConnectionInfo { id, peer });
        self.publish();

        ConnectionGuard {
            id,
            registry: Arc::clone(self),
            force_close: self.force_close.subscribe(),
        }
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        let mut out: Vec<ConnectionInfo> = self.conns.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|c| c.id);
        out
    }

    /// Resolves once no connection is registered.
    pub async fn wait_empty(&self) {
        let mut rx = self.live.subscribe();
        // the sender lives in self, so wait_for only fails if self is gone
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Tells every live connection to disconnect now. Returns how many were live.
    pub fn force_close_all(&self) -> usize {
        self.force_close.send_replace(true);
        self.len()
    }

    fn remove(&self, id: ConnectionId) {
        self.conns.remove(&id);
        self.publish();
    }

    fn publish(&self) {
        self.live.send_replace(self.conns.len());
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration of one connection. Dropping it unregisters.
pub struct ConnectionGuard {
    id: ConnectionId,
    registry: Arc<Registry>,
    force_close: watch::Receiver<bool>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Resolves when shutdown gives up waiting and wants this connection gone.
    pub async fn force_closed(&mut self) {
        let signalled = self.force_close.wait_for(|forced| *forced).await.is_ok();
        if !signalled {
            // registry dropped: nobody can ask us to close anymore
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn guards_track_live_connections() {
        let registry = Arc::new(Registry::new());
        let a = registry.register(Some("10.0.0.1:1000".parse().unwrap()));
        let b = registry.register(None);

        assert_eq!(registry.len(), 2);
        assert_ne!(a.id(), b.id());
        let ids: Vec<ConnectionId> = registry.connections().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);

        drop(a);
        assert_eq!(registry.len(), 1);
        drop(b);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn wait_empty_returns_immediately_without_connections() {
        let registry = Arc::new(Registry::new());
        timeout(Duration::from_millis(100), registry.wait_empty())
            .await
            .expect("empty registry must not block");
    }

    #[tokio::test]
    async fn wait_empty_resolves_after_last_guard_drops() {
        let registry = Arc::new(Registry::new());
        let guard = registry.register(None);

        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_empty().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn force_close_reaches_every_guard() {
        let registry = Arc::new(Registry::new());
        let mut first = registry.register(None);
        let mut second = registry.register(None);

        assert_eq!(registry.force_close_all(), 2);

        timeout(Duration::from_secs(1), first.force_closed()).await.unwrap();
        timeout(Duration::from_secs(1), second.force_closed()).await.unwrap();
    }

    #[tokio::test]
    async fn late_registrations_see_force_close() {
        let registry = Arc::new(Registry::new());
        registry.force_close_all();

        let mut late = registry.register(None);
        timeout(Duration::from_secs(1), late.force_closed()).await.unwrap();
    }
}
