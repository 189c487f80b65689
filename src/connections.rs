// Copyright (C) 2020  Kerem Çakırer

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

use crate::common::utils::now_ms;
use crate::common::{ConnectionId, Event, UserId};

/// `Connections` maps live connection IDs to their event channels. The
/// transport registers a connection per client and drains the receiver;
/// a dropped receiver is how the core notices a dead connection.
#[derive(Clone)]
pub struct Connections {
    inner: Arc<RwLock<Inner>>,
    max_errors_per_sec: u32,
}

struct Inner {
    conns: HashMap<ConnectionId, Handle>,
    by_user: HashMap<UserId, ConnectionId>,
    error_windows: HashMap<UserId, (u64, u32)>,
}

struct Handle {
    user_id: UserId,
    tx: UnboundedSender<Event>,
}

impl Connections {
    pub fn new(max_errors_per_sec: u32) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                conns: HashMap::new(),
                by_user: HashMap::new(),
                error_windows: HashMap::new(),
            })),
            max_errors_per_sec,
        }
    }

    /// Register a connection for a user and get its event stream. A user
    /// reconnecting replaces their previous connection.
    pub async fn register(
        &self,
        conn_id: ConnectionId,
        user_id: UserId,
    ) -> UnboundedReceiver<Event> {
        let (tx, rx) = unbounded();
        let mut inner = self.inner.write().await;
        if let Some(old) = inner.by_user.insert(user_id.clone(), conn_id.clone()) {
            if old != conn_id {
                inner.conns.remove(&old);
            }
        }
        inner.conns.insert(conn_id, Handle { user_id, tx });
        rx
    }

    pub async fn disconnect(&self, conn_id: &ConnectionId) -> Option<UserId> {
        let mut inner = self.inner.write().await;
        let handle = inner.conns.remove(conn_id)?;
        if inner.by_user.get(&handle.user_id) == Some(conn_id) {
            inner.by_user.remove(&handle.user_id);
        }
        Some(handle.user_id)
    }

    pub async fn is_alive(&self, conn_id: &ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .conns
            .get(conn_id)
            .map(|h| !h.tx.is_closed())
            .unwrap_or(false)
    }

    pub async fn send(&self, conn_id: &ConnectionId, event: Event) -> bool {
        let mut inner = self.inner.write().await;
        let delivered = match inner.conns.get(conn_id) {
            Some(handle) => handle.tx.unbounded_send(event).is_ok(),
            None => false,
        };
        if !delivered {
            if let Some(handle) = inner.conns.remove(conn_id) {
                if inner.by_user.get(&handle.user_id) == Some(conn_id) {
                    inner.by_user.remove(&handle.user_id);
                }
            }
        }
        delivered
    }

    pub async fn send_to_user(&self, user_id: &UserId, event: Event) -> bool {
        let conn_id = match self.inner.read().await.by_user.get(user_id) {
            Some(conn_id) => conn_id.clone(),
            None => return false,
        };
        self.send(&conn_id, event).await
    }

    /// Error events are rate limited per user so a misbehaving client
    /// cannot flood its own channel.
    pub async fn error_to_user(&self, user_id: &UserId, event: Event) -> bool {
        {
            let mut inner = self.inner.write().await;
            let window = now_ms() / 1000;
            let entry = inner
                .error_windows
                .entry(user_id.clone())
                .or_insert((window, 0));
            if entry.0 != window {
                *entry = (window, 0);
            }
            if entry.1 >= self.max_errors_per_sec {
                return false;
            }
            entry.1 += 1;
        }
        self.send_to_user(user_id, event).await
    }

    pub async fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.inner.read().await.by_user.get(user_id).cloned()
    }
}
