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

pub mod chess;
pub mod common;
pub mod config;
pub mod connections;
pub mod engine;
pub mod game;
pub mod matchmaking;
pub mod store;
pub mod tournament;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::delay_for;

use common::ConnectionId;
use config::Config;
use connections::Connections;
use game::GameController;
use matchmaking::Matchmaker;
use store::SessionStore;
use tournament::Tournaments;

/// `Server` wires the subsystems together and owns the background loops:
/// the queue idle sweep, the session garbage collector and the timer
/// tick. The transport in front of it calls the subsystems directly.
#[derive(Clone)]
pub struct Server {
    config: Arc<Config>,
    pub connections: Connections,
    pub store: SessionStore,
    pub games: GameController,
    pub matchmaking: Matchmaker,
    pub tournaments: Tournaments,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connections = Connections::new(config.max_errors_per_sec());
        let store = SessionStore::new(config.clone());
        let games = GameController::new(store.clone(), connections.clone());
        let matchmaking = Matchmaker::new(
            connections.clone(),
            games.clone(),
            config.clone(),
            shutdown_rx.clone(),
        );
        let tournaments = Tournaments::new(
            connections.clone(),
            games.clone(),
            matchmaking.clone(),
            config.clone(),
        );
        Self {
            config,
            connections,
            store,
            games,
            matchmaking,
            tournaments,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Spawn the periodic loops. Each one stops when `shutdown` fires.
    pub fn start(&self) {
        let matchmaking = self.matchmaking.clone();
        let shutdown = self.shutdown_rx.clone();
        let interval = self.config.cleanup_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = delay_for(Duration::from_millis(interval)) => {
                        matchmaking.cleanup_idle_users().await;
                    }
                    _ = wait_shutdown(shutdown.clone()) => break,
                }
            }
        });
        let store = self.store.clone();
        let shutdown = self.shutdown_rx.clone();
        let interval = self.config.gc_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = delay_for(Duration::from_millis(interval)) => {
                        store.garbage_collect().await;
                    }
                    _ = wait_shutdown(shutdown.clone()) => break,
                }
            }
        });
        let store = self.store.clone();
        let games = self.games.clone();
        let shutdown = self.shutdown_rx.clone();
        let interval = self.config.timer_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = delay_for(Duration::from_millis(interval)) => {
                        for session_id in store.active_session_ids().await {
                            let _ = games.update_timers(&session_id, None).await;
                        }
                    }
                    _ = wait_shutdown(shutdown.clone()) => break,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.broadcast(true);
    }

    /// Connection death: unregister the channel and cancel any pending
    /// matchmaking or tournament slot it held.
    pub async fn disconnect(&self, conn_id: &ConnectionId) {
        self.connections.disconnect(conn_id).await;
        self.matchmaking.evict_connection(conn_id).await;
        self.tournaments.evict_connection(conn_id).await;
    }
}

/// Resolve once the shutdown flag flips to `true`. The watch channel
/// yields its current value first, so skip the initial `false`.
pub(crate) async fn wait_shutdown(mut rx: watch::Receiver<bool>) {
    loop {
        match rx.recv().await {
            Some(true) | None => break,
            Some(false) => continue,
        }
    }
}
