/**
 * Connection Hub
 *
 * One task owns the [`Registry`] and processes commands from a bounded queue
 * strictly in arrival order. Registering, unregistering, broadcasting and
 * targeted sends never interleave, and a message enqueued before a
 * registration is never delivered to that registration.
 *
 * # Caller contract
 *
 * - `broadcast` / `send_to_users` are synchronous `try_send` calls. They
 *   never wait; when the hub queue is full the message is dropped and logged.
 * - `register` / `unregister` wait for queue space so lifecycle changes are
 *   never lost.
 * - Introspection queries are answered by the hub task itself, after every
 *   command enqueued before them.
 *
 * Delivery to a connection is a non-blocking enqueue onto its own bounded
 * queue; see [`Registry`] for the pruning rules.
 */

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::registry::{Connection, ConnectionId, Registry};
use crate::shared::RealtimeEvent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

enum Command {
    Register(Connection),
    Unregister(ConnectionId),
    Broadcast(Arc<str>),
    SendToUsers { users: Vec<Uuid>, payload: Arc<str> },
    ConnectionCount(oneshot::Sender<usize>),
    UserConnectionCount(Uuid, oneshot::Sender<usize>),
}

/// A registered connection as seen by its socket: its id and the receiving
/// half of its outbound queue. The stream should be closed once `outbound`
/// yields `None`.
#[derive(Debug)]
pub struct ClientChannel {
    pub id: ConnectionId,
    pub outbound: mpsc::Receiver<Arc<str>>,
}

/// Cloneable handle to the hub task
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<Command>,
    connection_buffer: usize,
}

impl HubHandle {
    /// Start the hub task. It stops once every handle is dropped.
    pub fn spawn(queue_capacity: usize, connection_buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(run(rx));
        Self {
            tx,
            connection_buffer: connection_buffer.max(1),
        }
    }

    /// Register a connection, optionally tagged with a user
    pub async fn register(&self, user: Option<Uuid>) -> Result<ClientChannel, HubError> {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.connection_buffer);
        let id = ConnectionId::new();
        let connection = Connection {
            id,
            user,
            outbound: outbound_tx,
        };
        self.tx
            .send(Command::Register(connection))
            .await
            .map_err(|_| HubError::Closed)?;
        Ok(ClientChannel {
            id,
            outbound: outbound_rx,
        })
    }

    /// Remove a connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.tx
            .send(Command::Unregister(id))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Fire-and-forget delivery to every connection
    pub fn broadcast(&self, event: &RealtimeEvent) {
        if let Some(payload) = encode(event) {
            self.submit(Command::Broadcast(payload), event.kind());
        }
    }

    /// Fire-and-forget delivery to the given users' connections
    pub fn send_to_users(&self, users: &[Uuid], event: &RealtimeEvent) {
        if users.is_empty() {
            return;
        }
        if let Some(payload) = encode(event) {
            let command = Command::SendToUsers {
                users: users.to_vec(),
                payload,
            };
            self.submit(command, event.kind());
        }
    }

    fn submit(&self, command: Command, kind: &str) {
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("[Hub] Queue full, dropping {} message", kind);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("[Hub] Hub stopped, dropping {} message", kind);
            }
        }
    }

    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::ConnectionCount(reply))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn user_connection_count(&self, user: Uuid) -> Result<usize, HubError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::UserConnectionCount(user, reply))
            .await
            .map_err(|_| HubError::Closed)?;
        rx.await.map_err(|_| HubError::Closed)
    }

    pub async fn is_user_online(&self, user: Uuid) -> Result<bool, HubError> {
        Ok(self.user_connection_count(user).await? > 0)
    }
}

fn encode(event: &RealtimeEvent) -> Option<Arc<str>> {
    match event.to_json() {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            tracing::error!("[Hub] Failed to encode {} event: {}", event.kind(), e);
            None
        }
    }
}

async fn run(mut rx: mpsc::Receiver<Command>) {
    let mut registry = Registry::new();
    tracing::info!("[Hub] Started");

    while let Some(command) = rx.recv().await {
        match command {
            Command::Register(connection) => {
                match connection.user {
                    Some(user) => tracing::info!(
                        "[Hub] Connection {} registered for user {} ({} total)",
                        connection.id,
                        user,
                        registry.user_connection_count(user) + 1
                    ),
                    None => tracing::info!("[Hub] Connection {} registered (anonymous)", connection.id),
                }
                registry.insert(connection);
            }
            Command::Unregister(id) => {
                if registry.remove(id) {
                    tracing::info!("[Hub] Connection {} unregistered", id);
                }
            }
            Command::Broadcast(payload) => {
                let delivery = registry.broadcast(&payload);
                tracing::debug!(
                    "[Hub] Broadcast to {} connections ({} pruned)",
                    delivery.delivered,
                    delivery.pruned
                );
            }
            Command::SendToUsers { users, payload } => {
                let delivery = registry.send_to_users(&users, &payload);
                tracing::debug!(
                    "[Hub] Targeted send to {} users reached {} connections ({} pruned)",
                    users.len(),
                    delivery.delivered,
                    delivery.pruned
                );
            }
            Command::ConnectionCount(reply) => {
                let _ = reply.send(registry.len());
            }
            Command::UserConnectionCount(user, reply) => {
                let _ = reply.send(registry.user_connection_count(user));
            }
        }
    }

    tracing::info!("[Hub] Stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_count() {
        let hub = HubHandle::spawn(16, 4);
        let user = Uuid::new_v4();
        let _a = hub.register(Some(user)).await.unwrap();
        let _b = hub.register(Some(user)).await.unwrap();
        let _c = hub.register(None).await.unwrap();

        assert_eq!(hub.connection_count().await.unwrap(), 3);
        assert_eq!(hub.user_connection_count(user).await.unwrap(), 2);
        assert!(hub.is_user_online(user).await.unwrap());
        assert!(!hub.is_user_online(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_then_register_ordering() {
        let hub = HubHandle::spawn(16, 4);
        let mut early = hub.register(None).await.unwrap();
        hub.broadcast(&RealtimeEvent::financial_changed());
        let mut late = hub.register(None).await.unwrap();
        hub.connection_count().await.unwrap();

        assert!(early.outbound.try_recv().is_ok());
        assert!(late.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_closes_outbound() {
        let hub = HubHandle::spawn(16, 4);
        let mut client = hub.register(None).await.unwrap();
        hub.unregister(client.id).await.unwrap();
        hub.unregister(client.id).await.unwrap();
        hub.broadcast(&RealtimeEvent::financial_changed());

        assert_eq!(hub.connection_count().await.unwrap(), 0);
        assert!(client.outbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_target_list_is_ignored() {
        let hub = HubHandle::spawn(16, 4);
        let mut client = hub.register(Some(Uuid::new_v4())).await.unwrap();
        hub.send_to_users(&[], &RealtimeEvent::financial_changed());
        hub.connection_count().await.unwrap();
        assert!(client.outbound.try_recv().is_err());
    }
}
