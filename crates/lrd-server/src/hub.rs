//! Connection hub.
//!
//! The hub task is the single owner of the connection set. Every mutation
//! arrives as a [`ControlMessage`] on one bounded channel and is applied in
//! order, so no lock guards the set and observable behavior follows message
//! order alone.
//!
//! A failed send does not evict a connection. The failure is recorded on
//! the connection's entry, later broadcasts skip it, and the entry stays
//! until its session unregisters or a compact sweep discards it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::protocol::ServerMessage;

/// Control messages buffered toward the hub task.
const CONTROL_BUFFER_SIZE: usize = 256;

/// Outbound buffer per connection.
///
/// A client that falls this many messages behind is marked failed rather
/// than allowed to stall the hub.
pub(crate) const CONNECTION_BUFFER_SIZE: usize = 64;

/// Identifier for one client connection.
pub(crate) type ConnectionId = u64;

/// Why a send to a connection failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendFailure {
    /// The outbound buffer was full; the client is not draining it.
    Backpressure,
    /// The session dropped its receiver.
    Closed,
}

/// A tracked connection.
struct ConnectionRecord {
    sender: mpsc::Sender<ServerMessage>,
    last_error: Option<SendFailure>,
}

/// Messages consumed by the hub task.
enum ControlMessage {
    /// Stop the hub loop.
    Quit,
    /// Broadcast a reload for a changed file.
    FileChanged(String),
    /// Start tracking a connection.
    ConnectionAdded(ConnectionId, mpsc::Sender<ServerMessage>),
    /// Stop tracking a connection. Unknown ids are ignored.
    ConnectionRemoved(ConnectionId),
    /// Discard every record with a recorded send failure.
    Compact,
}

/// Cloneable handle onto the hub task.
#[derive(Clone)]
pub(crate) struct HubHandle {
    tx: mpsc::Sender<ControlMessage>,
    next_id: Arc<AtomicU64>,
}

impl HubHandle {
    /// Announce a new connection to the hub.
    ///
    /// Allocates an id, creates the connection's outbound channel, and
    /// returns the receiving end for the session to drain.
    pub(crate) async fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);
        self.send(ControlMessage::ConnectionAdded(id, tx)).await;
        (id, rx)
    }

    /// Drop a connection from the hub.
    pub(crate) async fn unregister(&self, id: ConnectionId) {
        self.send(ControlMessage::ConnectionRemoved(id)).await;
    }

    /// Broadcast a reload for `path` to every healthy connection.
    pub(crate) async fn file_changed(&self, path: String) {
        self.send(ControlMessage::FileChanged(path)).await;
    }

    /// Sweep out connections with recorded send failures.
    pub(crate) async fn compact(&self) {
        self.send(ControlMessage::Compact).await;
    }

    /// Stop the hub task.
    pub(crate) async fn quit(&self) {
        self.send(ControlMessage::Quit).await;
    }

    async fn send(&self, message: ControlMessage) {
        if self.tx.send(message).await.is_err() {
            tracing::debug!("hub task is gone, control message dropped");
        }
    }
}

/// The hub task state.
pub(crate) struct Hub {
    rx: mpsc::Receiver<ControlMessage>,
    connections: HashMap<ConnectionId, ConnectionRecord>,
}

impl Hub {
    /// Spawn the hub task and return a handle onto it.
    ///
    /// The task ends on [`HubHandle::quit`] or when the last handle is
    /// dropped.
    pub(crate) fn spawn() -> HubHandle {
        let (tx, rx) = mpsc::channel(CONTROL_BUFFER_SIZE);
        let hub = Self {
            rx,
            connections: HashMap::new(),
        };
        tokio::spawn(hub.run());
        HubHandle {
            tx,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    async fn run(mut self) {
        while let Some(message) = self.rx.recv().await {
            match message {
                ControlMessage::Quit => break,
                ControlMessage::FileChanged(path) => self.broadcast(&path),
                ControlMessage::ConnectionAdded(id, sender) => {
                    self.connections.insert(
                        id,
                        ConnectionRecord {
                            sender,
                            last_error: None,
                        },
                    );
                    tracing::debug!(
                        connection = id,
                        total = self.connections.len(),
                        "connection added"
                    );
                }
                ControlMessage::ConnectionRemoved(id) => {
                    if self.connections.remove(&id).is_some() {
                        tracing::debug!(
                            connection = id,
                            total = self.connections.len(),
                            "connection removed"
                        );
                    }
                }
                ControlMessage::Compact => {
                    let before = self.connections.len();
                    self.connections
                        .retain(|_, record| record.last_error.is_none());
                    let removed = before - self.connections.len();
                    if removed > 0 {
                        tracing::debug!(removed, "compacted connection set");
                    }
                }
            }
        }
    }

    /// Queue a reload message onto every connection without a recorded
    /// failure. Never blocks: a full or closed buffer marks the record
    /// failed and the loop moves on.
    fn broadcast(&mut self, path: &str) {
        let message = ServerMessage::reload(path);
        let mut delivered = 0_usize;
        for (id, record) in &mut self.connections {
            if record.last_error.is_some() {
                continue;
            }
            match record.sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    let failure = match error {
                        TrySendError::Full(_) => SendFailure::Backpressure,
                        TrySendError::Closed(_) => SendFailure::Closed,
                    };
                    record.last_error = Some(failure);
                    tracing::warn!(
                        connection = *id,
                        ?failure,
                        "send failed, connection excluded from broadcasts"
                    );
                }
            }
        }
        tracing::debug!(path, delivered, "reload broadcast");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::timeout;

    use super::*;

    fn reload(path: &str) -> ServerMessage {
        ServerMessage::reload(path)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_healthy_connection() {
        let hub = Hub::spawn();
        let (_, mut rx_a) = hub.register().await;
        let (_, mut rx_b) = hub.register().await;
        let (_, mut rx_c) = hub.register().await;

        hub.file_changed("index.html".to_owned()).await;

        assert_eq!(rx_a.recv().await, Some(reload("index.html")));
        assert_eq!(rx_b.recv().await, Some(reload("index.html")));
        assert_eq!(rx_c.recv().await, Some(reload("index.html")));

        // Exactly one message each.
        assert_eq!(rx_a.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(rx_b.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(rx_c.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn closed_connection_is_skipped_on_later_broadcasts() {
        let hub = Hub::spawn();
        let (_, rx_gone) = hub.register().await;
        let (_, mut rx_live) = hub.register().await;

        drop(rx_gone);

        hub.file_changed("a.css".to_owned()).await;
        hub.file_changed("b.css".to_owned()).await;

        assert_eq!(rx_live.recv().await, Some(reload("a.css")));
        assert_eq!(rx_live.recv().await, Some(reload("b.css")));
        assert_eq!(rx_live.try_recv(), Err(TryRecvError::Empty));
    }

    /// Queue one more broadcast than the connection's buffer holds, without
    /// draining, so the overflow is guaranteed to trip the failure mark.
    /// The sentinel on a second connection proves the hub worked through
    /// the whole burst before the caller continues.
    async fn overflow_connection(hub: &HubHandle) {
        for n in 0..=CONNECTION_BUFFER_SIZE {
            hub.file_changed(format!("{n}.html")).await;
        }

        let (_, mut barrier_rx) = hub.register().await;
        hub.file_changed("sentinel.html".to_owned()).await;
        assert_eq!(barrier_rx.recv().await, Some(reload("sentinel.html")));
    }

    #[tokio::test]
    async fn backpressure_marks_connection_failed_without_blocking() {
        let hub = Hub::spawn();
        let (_, mut rx) = hub.register().await;

        overflow_connection(&hub).await;

        // The buffered messages survive, the overflowing one was dropped,
        // and nothing sent after the failure arrives.
        for n in 0..CONNECTION_BUFFER_SIZE {
            assert_eq!(rx.recv().await, Some(reload(&format!("{n}.html"))));
        }
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn failed_record_is_kept_until_compacted() {
        let hub = Hub::spawn();
        let (_, mut rx) = hub.register().await;

        overflow_connection(&hub).await;
        for _ in 0..CONNECTION_BUFFER_SIZE {
            rx.recv().await.unwrap();
        }

        // Failed but still tracked: the hub holds the sender, so the
        // channel reports empty rather than disconnected.
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        hub.compact().await;

        // Compact drops the record and with it the sender.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn compact_keeps_healthy_connections() {
        let hub = Hub::spawn();
        let (_, mut rx) = hub.register().await;

        hub.compact().await;
        hub.file_changed("index.html".to_owned()).await;

        assert_eq!(rx.recv().await, Some(reload("index.html")));
    }

    #[tokio::test]
    async fn unregister_drops_the_connection() {
        let hub = Hub::spawn();
        let (id, mut rx) = hub.register().await;

        hub.unregister(id).await;
        hub.file_changed("index.html".to_owned()).await;

        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn unregistering_unknown_id_is_harmless() {
        let hub = Hub::spawn();
        let (_, mut rx) = hub.register().await;

        hub.unregister(4096).await;
        hub.file_changed("index.html".to_owned()).await;

        assert_eq!(rx.recv().await, Some(reload("index.html")));
    }

    #[tokio::test]
    async fn quit_stops_processing() {
        let hub = Hub::spawn();
        let (_, mut rx) = hub.register().await;

        hub.quit().await;
        hub.file_changed("index.html".to_owned()).await;

        // The hub loop broke before the broadcast; dropping its state
        // closes the channel without delivering anything.
        let outcome = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("hub did not release the connection channel");
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn ids_are_unique_across_registrations() {
        let hub = Hub::spawn();
        let (id_a, _rx_a) = hub.register().await;
        let (id_b, _rx_b) = hub.register().await;

        assert!(id_a != id_b);
    }
}
