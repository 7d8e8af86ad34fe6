//! Connection registry owned by the hub task.
//!
//! Two views over one connection set: every live connection by id, and the
//! ids of each user's connections. A connection is in `by_user` only if it
//! is in `connections` and tagged with that user. Nothing outside the hub
//! task touches a `Registry`, so it needs no locking.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registry side of a connection: the sending half of its outbound queue.
/// Dropping it ends the socket's writer task, which closes the stream.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: Option<Uuid>,
    pub outbound: mpsc::Sender<Arc<str>>,
}

/// Outcome of one delivery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub pruned: usize,
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    by_user: HashMap<Uuid, Vec<ConnectionId>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, connection: Connection) {
        if let Some(user) = connection.user {
            self.by_user.entry(user).or_default().push(connection.id);
        }
        self.connections.insert(connection.id, connection);
    }

    /// Remove from every view. Absent ids are a no-op.
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        let Some(connection) = self.connections.remove(&id) else {
            return false;
        };
        if let Some(user) = connection.user {
            if let Some(ids) = self.by_user.get_mut(&user) {
                ids.retain(|other| *other != id);
                if ids.is_empty() {
                    self.by_user.remove(&user);
                }
            }
        }
        true
    }

    /// Deliver to every registered connection
    pub fn broadcast(&mut self, payload: &Arc<str>) -> Delivery {
        let targets: Vec<ConnectionId> = self.connections.keys().copied().collect();
        self.deliver(targets, payload)
    }

    /// Deliver to the connections of the given users only
    pub fn send_to_users(&mut self, users: &[Uuid], payload: &Arc<str>) -> Delivery {
        let mut seen = HashSet::new();
        let targets: Vec<ConnectionId> = users
            .iter()
            .filter_map(|user| self.by_user.get(user))
            .flatten()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        self.deliver(targets, payload)
    }

    /// Enqueue without waiting. A full or closed queue counts as a failed
    /// write and the connection is pruned; the others are unaffected.
    fn deliver(&mut self, targets: Vec<ConnectionId>, payload: &Arc<str>) -> Delivery {
        let mut delivery = Delivery::default();
        let mut failed = Vec::new();
        for id in targets {
            let Some(connection) = self.connections.get(&id) else {
                continue;
            };
            match connection.outbound.try_send(Arc::clone(payload)) {
                Ok(()) => delivery.delivered += 1,
                Err(err) => {
                    tracing::warn!("[Hub] Pruning connection {}: {}", id, err);
                    failed.push(id);
                }
            }
        }
        for id in failed {
            if self.remove(id) {
                delivery.pruned += 1;
            }
        }
        delivery
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn user_connection_count(&self, user: Uuid) -> usize {
        self.by_user.get(&user).map_or(0, Vec::len)
    }

    /// Both views describe the same connection set
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let tagged = self.connections.values().filter(|c| c.user.is_some()).count();
        let indexed: usize = self.by_user.values().map(Vec::len).sum();
        tagged == indexed
            && self.by_user.iter().all(|(user, ids)| {
                !ids.is_empty()
                    && ids
                        .iter()
                        .all(|id| self.connections.get(id).is_some_and(|c| c.user == Some(*user)))
            })
    }
}
