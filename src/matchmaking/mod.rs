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

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::delay_for;

use crate::common::utils::now_ms;
use crate::common::{
    ConnectionId, Error, ErrorCode, Event, MatchSource, Player, Subvariant, UserId, Variant,
};
use crate::config::Config;
use crate::connections::Connections;
use crate::game::GameController;
use crate::wait_shutdown;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryStatus {
    Waiting,
    Matched,
}

/// One user waiting in a queue. The score orders the queue: rank
/// dominates, the join timestamp breaks ties in favour of earlier joiners.
#[derive(Clone, Debug)]
pub struct QueueEntry {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub rank: f64,
    pub variant: Variant,
    pub subvariant: Option<Subvariant>,
    pub joined_at: u64,
    pub status: EntryStatus,
}

impl QueueEntry {
    pub fn score(&self) -> f64 {
        self.rank + self.joined_at as f64 / 1e13
    }
}

/// `Matchmaker` pairs anonymous waiters per variant: closest rank first,
/// oldest joiner as the 10 s fallback, with cooldowns against instant
/// rejoins and a sweep for users who left their tab open.
#[derive(Clone)]
pub struct Matchmaker {
    connections: Connections,
    games: GameController,
    config: Arc<Config>,
    inner: Arc<Mutex<Inner>>,
    shutdown: watch::Receiver<bool>,
}

struct Inner {
    queues: HashMap<Variant, HashMap<UserId, QueueEntry>>,
    user_variant: HashMap<UserId, Variant>,
    cooldowns: HashMap<UserId, u64>,
    players: HashMap<UserId, Player>,
}

impl Matchmaker {
    pub fn new(
        connections: Connections,
        games: GameController,
        config: Arc<Config>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connections,
            games,
            config,
            inner: Arc::new(Mutex::new(Inner {
                queues: HashMap::new(),
                user_variant: HashMap::new(),
                cooldowns: HashMap::new(),
                players: HashMap::new(),
            })),
            shutdown,
        }
    }

    /// Join a queue. Returns whether a match happened immediately; if not,
    /// a fallback attempt in time order runs after the configured delay.
    pub async fn join_queue(
        &self,
        player: Player,
        conn_id: ConnectionId,
        variant: Variant,
        subvariant: Option<Subvariant>,
    ) -> Result<bool, Error> {
        let now = now_ms();
        let user_id = player.user_id.clone();
        {
            let mut inner = self.inner.lock().await;
            if let Some(&until) = inner.cooldowns.get(&user_id) {
                if until > now {
                    drop(inner);
                    self.connections
                        .send(&conn_id, Event::QueueCooldown { until })
                        .await;
                    return Ok(false);
                }
            }
            remove_everywhere(&mut inner, &user_id);
            if variant == Variant::Classic && subvariant.is_none() {
                drop(inner);
                return Err(self
                    .fail(&conn_id, ErrorCode::InvalidInput, "classic needs a subvariant")
                    .await);
            }
            let rank = match player.ratings.get(variant, subvariant) {
                Some(rank) => rank,
                None => {
                    drop(inner);
                    return Err(self
                        .fail(&conn_id, ErrorCode::InvalidInput, "no rating for that variant")
                        .await);
                }
            };
            let entry = QueueEntry {
                user_id: user_id.clone(),
                connection_id: conn_id,
                rank,
                variant,
                subvariant,
                joined_at: now,
                status: EntryStatus::Waiting,
            };
            inner
                .queues
                .entry(variant)
                .or_insert_with(HashMap::new)
                .insert(user_id.clone(), entry);
            inner.user_variant.insert(user_id.clone(), variant);
            inner.players.insert(user_id.clone(), player);
        }
        let matched = self.try_match(&user_id, variant, true).await;
        if !matched {
            self.schedule_fallback(user_id, variant);
        }
        Ok(matched)
    }

    pub async fn leave_queue(&self, user_id: &UserId) {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        if let Some(entry) = remove_entry(&mut inner, user_id) {
            if entry.status == EntryStatus::Waiting {
                inner
                    .cooldowns
                    .insert(user_id.clone(), now + self.config.cooldown());
            }
        }
    }

    /// One match attempt for `user_id`. `by_rank` restricts candidates to
    /// the rank window; the fallback pass takes the oldest waiter instead.
    pub async fn try_match(&self, user_id: &UserId, variant: Variant, by_rank: bool) -> bool {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        let caller = match inner.queues.get(&variant).and_then(|q| q.get(user_id)) {
            Some(entry) if entry.status == EntryStatus::Waiting => entry.clone(),
            _ => return false,
        };
        if !self.connections.is_alive(&caller.connection_id).await {
            remove_entry(&mut inner, user_id);
            return false;
        }
        let queue_len = inner.queues.get(&variant).map(|q| q.len()).unwrap_or(0);
        let mut range = if queue_len > self.config.crowded_queue_len() {
            self.config.crowded_rank_range()
        } else {
            self.config.rank_range()
        };
        if now.saturating_sub(caller.joined_at) > self.config.long_wait() {
            range *= 2.0;
        }
        let mut dead: Vec<UserId> = Vec::new();
        let mut best: Option<QueueEntry> = None;
        if let Some(queue) = inner.queues.get(&variant) {
            for entry in queue.values() {
                if entry.user_id == caller.user_id || entry.status != EntryStatus::Waiting {
                    continue;
                }
                if variant == Variant::Classic && entry.subvariant != caller.subvariant {
                    continue;
                }
                if by_rank && (entry.rank - caller.rank).abs() > range {
                    continue;
                }
                if !self.connections.is_alive(&entry.connection_id).await {
                    dead.push(entry.user_id.clone());
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some(current) => {
                        if by_rank {
                            let diff = (entry.rank - caller.rank).abs();
                            let current_diff = (current.rank - caller.rank).abs();
                            diff < current_diff
                                || (diff == current_diff && entry.joined_at < current.joined_at)
                        } else {
                            entry.joined_at < current.joined_at
                        }
                    }
                };
                if better {
                    best = Some(entry.clone());
                }
            }
        }
        for user_id in dead {
            remove_entry(&mut inner, &user_id);
        }
        let best = match best {
            Some(best) => best,
            None => return false,
        };
        // Both connections must still be alive at match time; evict the
        // dead one and abort otherwise.
        if !self.connections.is_alive(&caller.connection_id).await {
            remove_entry(&mut inner, &caller.user_id);
            return false;
        }
        if !self.connections.is_alive(&best.connection_id).await {
            remove_entry(&mut inner, &best.user_id);
            return false;
        }
        let (caller, best, p1, p2) = match claim_pair(&mut inner, &caller.user_id, &best.user_id, now, self.config.cooldown()) {
            Some(claimed) => claimed,
            None => return false,
        };
        drop(inner);
        self.finalize_match(caller, best, p1, p2, variant).await;
        true
    }

    /// Periodic sweep: drop entries that sat in a queue past the idle
    /// timeout or whose connection died.
    pub async fn cleanup_idle_users(&self) {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        let mut stale: Vec<UserId> = Vec::new();
        for queue in inner.queues.values() {
            for entry in queue.values() {
                if entry.joined_at + self.config.idle_timeout() < now
                    || !self.connections.is_alive(&entry.connection_id).await
                {
                    stale.push(entry.user_id.clone());
                }
            }
        }
        for user_id in stale {
            remove_entry(&mut inner, &user_id);
        }
        inner.cooldowns.retain(|_, until| *until > now);
    }

    /// Connection death cancels pending matchmaking for that user.
    pub async fn evict_connection(&self, conn_id: &ConnectionId) -> Option<UserId> {
        let mut inner = self.inner.lock().await;
        let user_id = inner
            .queues
            .values()
            .flat_map(|q| q.values())
            .find(|e| e.connection_id == *conn_id)
            .map(|e| e.user_id.clone())?;
        remove_entry(&mut inner, &user_id);
        Some(user_id)
    }

    /// Cross-queue pick for the tournament overlay: the best waiting
    /// candidate around `rank`, removed and cooled down atomically.
    pub(crate) async fn take_match_for(
        &self,
        rank: f64,
        variant: Variant,
        subvariant: Option<Subvariant>,
    ) -> Option<(QueueEntry, Player)> {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        let mut dead: Vec<UserId> = Vec::new();
        let mut best: Option<QueueEntry> = None;
        if let Some(queue) = inner.queues.get(&variant) {
            for entry in queue.values() {
                if entry.status != EntryStatus::Waiting {
                    continue;
                }
                if variant == Variant::Classic && entry.subvariant != subvariant {
                    continue;
                }
                if (entry.rank - rank).abs() > self.config.rank_range() {
                    continue;
                }
                if !self.connections.is_alive(&entry.connection_id).await {
                    dead.push(entry.user_id.clone());
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some(current) => {
                        let diff = (entry.rank - rank).abs();
                        let current_diff = (current.rank - rank).abs();
                        diff < current_diff
                            || (diff == current_diff && entry.joined_at < current.joined_at)
                    }
                };
                if better {
                    best = Some(entry.clone());
                }
            }
        }
        for user_id in dead {
            remove_entry(&mut inner, &user_id);
        }
        let best = best?;
        let player = inner.players.get(&best.user_id)?.clone();
        let mut entry = remove_entry(&mut inner, &best.user_id)?;
        entry.status = EntryStatus::Matched;
        inner
            .cooldowns
            .insert(best.user_id.clone(), now + self.config.cooldown());
        Some((entry, player))
    }

    /// Start a cooldown for a user matched outside the regular queue (the
    /// tournament overlay applies the same 10 s rule).
    pub(crate) async fn set_cooldown(&self, user_id: &UserId) {
        let until = now_ms() + self.config.cooldown();
        self.inner.lock().await.cooldowns.insert(user_id.clone(), until);
    }

    // Test and diagnostics surface

    pub async fn waiting_count(&self, variant: Variant) -> usize {
        self.inner
            .lock()
            .await
            .queues
            .get(&variant)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub async fn entry_of(&self, user_id: &UserId) -> Option<QueueEntry> {
        let inner = self.inner.lock().await;
        let variant = inner.user_variant.get(user_id)?;
        inner.queues.get(variant)?.get(user_id).cloned()
    }

    pub async fn cooldown_until(&self, user_id: &UserId) -> Option<u64> {
        self.inner.lock().await.cooldowns.get(user_id).copied()
    }

    // Helper functions

    fn schedule_fallback(&self, user_id: UserId, variant: Variant) {
        let matchmaker = self.clone();
        let shutdown = self.shutdown.clone();
        let delay = self.config.fallback_delay();
        tokio::spawn(async move {
            tokio::select! {
                _ = delay_for(Duration::from_millis(delay)) => {
                    matchmaker.try_match(&user_id, variant, false).await;
                }
                _ = wait_shutdown(shutdown) => {}
            }
        });
    }

    async fn finalize_match(
        &self,
        e1: QueueEntry,
        e2: QueueEntry,
        p1: Player,
        p2: Player,
        variant: Variant,
    ) {
        let subvariant = e1.subvariant;
        let r1 = p1.ratings.get(variant, e1.subvariant).unwrap_or(e1.rank);
        let r2 = p2.ratings.get(variant, e2.subvariant).unwrap_or(e2.rank);
        let mut sources = HashMap::new();
        sources.insert(p1.user_id.clone(), MatchSource::Matchmaking);
        sources.insert(p2.user_id.clone(), MatchSource::Matchmaking);
        let session = match self
            .games
            .create_session(p1.summary(r1), p2.summary(r2), variant, subvariant, sources, true)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                for entry in &[&e1, &e2] {
                    self.connections
                        .send(
                            &entry.connection_id,
                            Event::QueueError {
                                message: err.message().to_string(),
                                code: Some(err.code()),
                            },
                        )
                        .await;
                }
                return;
            }
        };
        for entry in &[&e1, &e2] {
            let opponent = if session.players.white.user_id == entry.user_id {
                session.players.black.clone()
            } else {
                session.players.white.clone()
            };
            self.connections
                .send(
                    &entry.connection_id,
                    Event::QueueMatched {
                        session_id: session.session_id.clone(),
                        opponent,
                        variant,
                        subvariant,
                        initial_state: Box::new(session.clone()),
                        tournament: false,
                    },
                )
                .await;
        }
    }

    async fn fail(&self, conn_id: &ConnectionId, code: ErrorCode, message: &str) -> Error {
        self.connections
            .send(
                conn_id,
                Event::QueueError {
                    message: message.to_string(),
                    code: Some(code),
                },
            )
            .await;
        Error::new(code, message)
    }
}

// Helper functions

fn remove_everywhere(inner: &mut Inner, user_id: &UserId) {
    for queue in inner.queues.values_mut() {
        queue.remove(user_id);
    }
    inner.user_variant.remove(user_id);
    inner.players.remove(user_id);
}

fn remove_entry(inner: &mut Inner, user_id: &UserId) -> Option<QueueEntry> {
    let variant = inner.user_variant.remove(user_id);
    inner.players.remove(user_id);
    match variant {
        Some(variant) => inner.queues.get_mut(&variant).and_then(|q| q.remove(user_id)),
        None => {
            for queue in inner.queues.values_mut() {
                if let Some(entry) = queue.remove(user_id) {
                    return Some(entry);
                }
            }
            None
        }
    }
}

/// Take both sides of a match out of the queue in one step: entries
/// removed, status flipped to matched, cooldowns set.
fn claim_pair(
    inner: &mut Inner,
    u1: &UserId,
    u2: &UserId,
    now: u64,
    cooldown: u64,
) -> Option<(QueueEntry, QueueEntry, Player, Player)> {
    if !inner.user_variant.contains_key(u1) || !inner.user_variant.contains_key(u2) {
        return None;
    }
    let p1 = inner.players.get(u1)?.clone();
    let p2 = inner.players.get(u2)?.clone();
    let mut e1 = remove_entry(inner, u1)?;
    let mut e2 = remove_entry(inner, u2)?;
    e1.status = EntryStatus::Matched;
    e2.status = EntryStatus::Matched;
    inner.cooldowns.insert(u1.clone(), now + cooldown);
    inner.cooldowns.insert(u2.clone(), now + cooldown);
    Some((e1, e2, p1, p2))
}
