use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use onelap_core::ids::SessionId;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// Unique identifier for a connected WebSocket peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(pub String);

impl Default for ClientId {
    fn default() -> Self {
        Self(format!("client_{}", Uuid::new_v4().as_simple()))
    }
}

impl ClientId {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected WebSocket peer: a monitor or a dashboard. A peer that has
/// joined a session carries that session id as its room tag; the tag is
/// dropped with the client on disconnect.
pub struct Client {
    pub id: ClientId,
    room: RwLock<Option<SessionId>>,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ClientId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            room: RwLock::new(None),
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn room(&self) -> Option<SessionId> {
        *self.room.read()
    }

    fn enter_room(&self, session_id: SessionId) {
        *self.room.write() = Some(session_id);
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Registry of all connected WebSocket peers and their room membership.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<Client>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Register a new client and return its ID + the receiving half of
    /// its send queue.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        self.clients
            .insert(id.clone(), Arc::new(Client::new(id.clone(), tx)));
        (id, rx)
    }

    /// Remove a client. Its room membership disappears with it.
    pub fn unregister(&self, id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.connected.store(false, Ordering::Relaxed);
        }
    }

    /// Tag a client with a session id. Returns false if the client is
    /// gone (disconnected between receive and dispatch).
    pub fn join_room(&self, client_id: &ClientId, session_id: SessionId) -> bool {
        match self.clients.get(client_id) {
            Some(client) => {
                client.enter_room(session_id);
                true
            }
            None => false,
        }
    }

    /// Send a message to one client. A full or closed queue drops the
    /// message for that client only.
    pub fn send_to(&self, client_id: &ClientId, message: &str) -> bool {
        let Some(client) = self.clients.get(client_id) else {
            return false;
        };
        match client.tx.try_send(message.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    client_id = %client_id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Deliver a message to every connected member of a session's room.
    /// Returns the number of recipients reached. A slow member loses the
    /// message; it never stalls the publisher or the other members.
    pub fn broadcast_to_room(&self, session_id: &SessionId, message: &str) -> usize {
        let mut delivered = 0;
        for entry in self.clients.iter() {
            let client = entry.value();
            if client.room() == Some(*session_id)
                && client.is_connected()
                && client.tx.try_send(message.to_string()).is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Current members of a session's room.
    pub fn members_of(&self, session_id: &SessionId) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|entry| entry.value().room() == Some(*session_id))
            .map(|entry| entry.value().id.clone())
            .collect()
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Remove clients that haven't answered pings within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.value().id.clone())
            .collect();

        let removed = dead.len();
        for id in dead {
            self.unregister(&id);
            tracing::info!(client_id = %id, "Cleaned up dead client");
        }
        removed
    }

    #[cfg(test)]
    fn get(&self, id: &ClientId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|entry| Arc::clone(entry.value()))
    }
}

/// Handle a WebSocket connection: split into reader/writer, manage
/// lifecycle with a heartbeat ping, unregister on close.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client_id: ClientId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    on_message: mpsc::Sender<(ClientId, String)>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued messages to the socket + periodic ping
    let writer_cid = client_id.clone();
    let writer_registry = Arc::clone(&registry);
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(client_id = %writer_cid, "Sent ping");
                }
            }
        }

        if let Some(client) = writer_registry.clients.get(&writer_cid) {
            client.connected.store(false, Ordering::Relaxed);
        }
    });

    // Reader task: forward inbound text to the processor, track pongs
    let reader_cid = client_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    let _ = on_message.send((reader_cid.clone(), text.to_string())).await;
                }
                WsMessage::Pong(_) => {
                    if let Some(client) = reader_registry.clients.get(&reader_cid) {
                        client.record_pong();
                    }
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pongs automatically
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&client_id);
    tracing::info!(client_id = %client_id, "WebSocket client disconnected");
}

/// Start a background task that periodically cleans up dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed = removed, "Dead client cleanup");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ids_unique() {
        let a = ClientId::new();
        let b = ClientId::new();
        assert_ne!(a, b);
        assert!(a.0.starts_with("client_"));
    }

    #[test]
    fn register_and_unregister() {
        let registry = ClientRegistry::new(32);
        assert_eq!(registry.count(), 0);

        let (id1, _rx1) = registry.register();
        let (id2, _rx2) = registry.register();
        assert_eq!(registry.count(), 2);

        registry.unregister(&id1);
        assert_eq!(registry.count(), 1);

        registry.unregister(&id2);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn join_room_tags_the_client() {
        let registry = ClientRegistry::new(32);
        let (id, _rx) = registry.register();
        let session = SessionId::new();

        assert!(registry.join_room(&id, session));
        assert_eq!(registry.members_of(&session), vec![id]);
    }

    #[test]
    fn join_room_on_gone_client_is_false() {
        let registry = ClientRegistry::new(32);
        assert!(!registry.join_room(&ClientId::new(), SessionId::new()));
    }

    #[test]
    fn broadcast_reaches_only_room_members() {
        let registry = ClientRegistry::new(32);
        let (id1, mut rx1) = registry.register();
        let (id2, mut rx2) = registry.register();
        let (_id3, mut rx3) = registry.register();

        let session = SessionId::new();
        registry.join_room(&id1, session);
        registry.join_room(&id2, session);

        let delivered = registry.broadcast_to_room(&session, "hello");
        assert_eq!(delivered, 2);

        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn rooms_are_isolated() {
        let registry = ClientRegistry::new(32);
        let (id_a, mut rx_a) = registry.register();
        let (id_b, mut rx_b) = registry.register();

        let session_a = SessionId::new();
        let session_b = SessionId::new();
        registry.join_room(&id_a, session_a);
        registry.join_room(&id_b, session_b);

        registry.broadcast_to_room(&session_a, "for a");

        assert_eq!(rx_a.try_recv().unwrap(), "for a");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn send_to_specific_client() {
        let registry = ClientRegistry::new(32);
        let (id, mut rx) = registry.register();

        assert!(registry.send_to(&id, "test message"));
        assert_eq!(rx.try_recv().unwrap(), "test message");
    }

    #[test]
    fn send_to_gone_client_is_false() {
        let registry = ClientRegistry::new(32);
        assert!(!registry.send_to(&ClientId::new(), "test"));
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let registry = ClientRegistry::new(2);
        let (id, _rx) = registry.register();

        assert!(registry.send_to(&id, "msg1"));
        assert!(registry.send_to(&id, "msg2"));
        assert!(!registry.send_to(&id, "msg3"));
    }

    #[test]
    fn unregister_drops_membership() {
        let registry = ClientRegistry::new(32);
        let (id, _rx) = registry.register();
        let session = SessionId::new();
        registry.join_room(&id, session);

        registry.unregister(&id);
        assert!(registry.members_of(&session).is_empty());
        assert_eq!(registry.broadcast_to_room(&session, "nobody home"), 0);
    }

    #[test]
    fn pong_keeps_client_alive() {
        let registry = ClientRegistry::new(32);
        let (id, _rx) = registry.register();
        let client = registry.get(&id).unwrap();

        assert!(client.is_alive());
        client.record_pong();
        assert!(client.is_alive());
    }

    #[test]
    fn cleanup_removes_expired_clients() {
        let registry = ClientRegistry::new(32);
        let (id, _rx) = registry.register();
        assert_eq!(registry.count(), 1);

        registry
            .get(&id)
            .unwrap()
            .last_pong
            .store(0, Ordering::Relaxed);

        assert_eq!(registry.cleanup_dead_clients(), 1);
        assert_eq!(registry.count(), 0);
    }
}
