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

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::common::utils::now_ms;
use crate::common::{
    ConnectionId, Error, ErrorCode, Event, MatchSource, Player, TournamentId, UserId,
};
use crate::config::Config;
use crate::connections::Connections;
use crate::game::GameController;
use crate::matchmaking::{EntryStatus, Matchmaker, QueueEntry};

const DEFAULT_DURATION: u64 = 3_600_000;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TournamentStatus {
    Open,
    InProgress,
    Finished,
}

/// The public snapshot of a tournament, as sent with `tournamentJoined`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentDetails {
    pub id: TournamentId,
    pub name: String,
    pub status: TournamentStatus,
    pub participants: usize,
    pub capacity: usize,
    pub starts_at: u64,
    pub duration: u64,
}

struct TournamentRecord {
    id: TournamentId,
    name: String,
    status: TournamentStatus,
    capacity: usize,
    participants: HashSet<UserId>,
    starts_at: u64,
    duration: u64,
}

impl TournamentRecord {
    fn details(&self) -> TournamentDetails {
        TournamentDetails {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status,
            participants: self.participants.len(),
            capacity: self.capacity,
            starts_at: self.starts_at,
            duration: self.duration,
        }
    }
}

struct TournamentEntry {
    entry: QueueEntry,
    tournament_id: TournamentId,
}

/// `Tournaments` overlays the regular queue: one active tournament at a
/// time, a random variant per game, and permission to pair with waiters
/// from the regular queue when no tournament peer fits.
#[derive(Clone)]
pub struct Tournaments {
    connections: Connections,
    games: GameController,
    matchmaker: Matchmaker,
    config: Arc<Config>,
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    active: Option<TournamentId>,
    tournaments: HashMap<TournamentId, TournamentRecord>,
    queue: HashMap<UserId, TournamentEntry>,
    players: HashMap<UserId, Player>,
}

impl Tournaments {
    pub fn new(
        connections: Connections,
        games: GameController,
        matchmaker: Matchmaker,
        config: Arc<Config>,
    ) -> Self {
        Self {
            connections,
            games,
            matchmaker,
            config,
            inner: Arc::new(Mutex::new(Inner {
                active: None,
                tournaments: HashMap::new(),
                queue: HashMap::new(),
                players: HashMap::new(),
            })),
        }
    }

    /// Join the active tournament, creating one if none is running. The
    /// caller is assigned a random variant for their next game and queued.
    pub async fn join_tournament(
        &self,
        player: Player,
        conn_id: ConnectionId,
    ) -> Result<bool, Error> {
        let now = now_ms();
        let user_id = player.user_id.clone();
        let mut created: Option<(TournamentId, String)> = None;
        let details;
        {
            let mut inner = self.inner.lock().await;
            let tournament_id = match inner.active.clone() {
                Some(id) => id,
                None => {
                    let id = TournamentId::new();
                    let name = format!("Arena {}", id.as_str());
                    inner.tournaments.insert(
                        id.clone(),
                        TournamentRecord {
                            id: id.clone(),
                            name: name.clone(),
                            status: TournamentStatus::Open,
                            capacity: self.config.tournament_capacity(),
                            participants: HashSet::new(),
                            starts_at: now,
                            duration: DEFAULT_DURATION,
                        },
                    );
                    inner.active = Some(id.clone());
                    created = Some((id.clone(), name));
                    id
                }
            };
            let record = inner
                .tournaments
                .get_mut(&tournament_id)
                .expect("active tournament must exist");
            if record.participants.len() >= record.capacity
                && !record.participants.contains(&user_id)
            {
                drop(inner);
                return Err(self
                    .fail(&conn_id, ErrorCode::ValidationError, "tournament is full")
                    .await);
            }
            record.participants.insert(user_id.clone());
            let pool = self.config.tournament_variants();
            let &(variant, subvariant) = match pool.choose(&mut thread_rng()) {
                Some(pick) => pick,
                None => {
                    drop(inner);
                    return Err(self
                        .fail(&conn_id, ErrorCode::InternalError, "no variants configured")
                        .await);
                }
            };
            let rank = match player.ratings.get(variant, subvariant) {
                Some(rank) => rank,
                None => {
                    if let Some(record) = inner.tournaments.get_mut(&tournament_id) {
                        record.participants.remove(&user_id);
                    }
                    drop(inner);
                    return Err(self
                        .fail(&conn_id, ErrorCode::InvalidInput, "no rating for that variant")
                        .await);
                }
            };
            inner.queue.insert(
                user_id.clone(),
                TournamentEntry {
                    entry: QueueEntry {
                        user_id: user_id.clone(),
                        connection_id: conn_id.clone(),
                        rank,
                        variant,
                        subvariant,
                        joined_at: now,
                        status: EntryStatus::Waiting,
                    },
                    tournament_id: tournament_id.clone(),
                },
            );
            inner.players.insert(user_id.clone(), player);
            details = inner
                .tournaments
                .get(&tournament_id)
                .map(|r| r.details())
                .expect("active tournament must exist");
        }
        if let Some((id, name)) = created {
            self.connections
                .send(&conn_id, Event::TournamentNewActive { id, name })
                .await;
        }
        let status = details.status;
        self.connections
            .send(&conn_id, Event::TournamentJoined { details, status })
            .await;
        Ok(self.try_match_tournament(&user_id).await)
    }

    pub async fn leave_tournament(&self, user_id: &UserId) {
        let mut inner = self.inner.lock().await;
        if let Some(te) = inner.queue.remove(user_id) {
            if let Some(record) = inner.tournaments.get_mut(&te.tournament_id) {
                record.participants.remove(user_id);
            }
            inner.players.remove(user_id);
            if te.entry.status == EntryStatus::Waiting {
                drop(inner);
                self.matchmaker.set_cooldown(user_id).await;
            }
        }
    }

    pub async fn active_details(&self) -> Option<TournamentDetails> {
        let inner = self.inner.lock().await;
        let id = inner.active.clone()?;
        inner.tournaments.get(&id).map(|r| r.details())
    }

    /// Match attempt for a tournament waiter: first the tournament queue
    /// in descending score order, then the regular queue of the assigned
    /// variant (cross-queue).
    pub async fn try_match_tournament(&self, user_id: &UserId) -> bool {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        let caller = match inner.queue.get(user_id) {
            Some(te) if te.entry.status == EntryStatus::Waiting => TournamentEntry {
                entry: te.entry.clone(),
                tournament_id: te.tournament_id.clone(),
            },
            _ => return false,
        };
        if !self.connections.is_alive(&caller.entry.connection_id).await {
            evict(&mut inner, user_id);
            return false;
        }
        let mut candidates: Vec<QueueEntry> = inner
            .queue
            .values()
            .filter(|te| {
                te.tournament_id == caller.tournament_id
                    && te.entry.user_id != caller.entry.user_id
                    && te.entry.status == EntryStatus::Waiting
                    && te.entry.variant == caller.entry.variant
                    && te.entry.subvariant == caller.entry.subvariant
            })
            .map(|te| te.entry.clone())
            .collect();
        candidates.sort_by(|a, b| {
            b.score()
                .partial_cmp(&a.score())
                .unwrap_or(Ordering::Equal)
        });
        let mut peer: Option<QueueEntry> = None;
        for candidate in candidates {
            if self.connections.is_alive(&candidate.connection_id).await {
                peer = Some(candidate);
                break;
            }
            evict(&mut inner, &candidate.user_id);
        }
        if let Some(peer) = peer {
            let p1 = match inner.players.get(user_id) {
                Some(player) => player.clone(),
                None => return false,
            };
            let p2 = match inner.players.get(&peer.user_id) {
                Some(player) => player.clone(),
                None => return false,
            };
            let caller_entry = match claim(&mut inner, user_id) {
                Some(entry) => entry,
                None => return false,
            };
            let peer_entry = match claim(&mut inner, &peer.user_id) {
                Some(entry) => entry,
                None => return false,
            };
            mark_in_progress(&mut inner, &caller.tournament_id);
            drop(inner);
            self.matchmaker.set_cooldown(&caller_entry.user_id).await;
            self.matchmaker.set_cooldown(&peer_entry.user_id).await;
            self.initiate_match(caller_entry, p1, peer_entry, p2, true)
                .await;
            return true;
        }
        // Cross-queue: a regular waiter on the same variant will do.
        let picked = self
            .matchmaker
            .take_match_for(
                caller.entry.rank,
                caller.entry.variant,
                caller.entry.subvariant,
            )
            .await;
        let (other_entry, other_player) = match picked {
            Some(picked) => picked,
            None => return false,
        };
        let p1 = match inner.players.get(user_id) {
            Some(player) => player.clone(),
            None => return false,
        };
        let caller_entry = match claim(&mut inner, user_id) {
            Some(entry) => entry,
            None => return false,
        };
        mark_in_progress(&mut inner, &caller.tournament_id);
        drop(inner);
        self.matchmaker.set_cooldown(&caller_entry.user_id).await;
        self.initiate_match(caller_entry, p1, other_entry, other_player, false)
            .await;
        true
    }

    /// A dropped connection leaves whichever queue it was in and gives its
    /// tournament slot back.
    pub async fn evict_connection(&self, conn_id: &ConnectionId) -> Option<UserId> {
        let mut inner = self.inner.lock().await;
        let user_id = inner
            .queue
            .values()
            .find(|te| te.entry.connection_id == *conn_id)
            .map(|te| te.entry.user_id.clone())?;
        evict(&mut inner, &user_id);
        Some(user_id)
    }

    // Helper functions

    /// Both sides are already claimed from their queues; resolve ratings,
    /// create the session and notify. `metadata.source` records per user
    /// whether they came from the tournament or the regular queue.
    async fn initiate_match(
        &self,
        t_entry: QueueEntry,
        t_player: Player,
        other_entry: QueueEntry,
        other_player: Player,
        other_from_tournament: bool,
    ) {
        let variant = t_entry.variant;
        let subvariant = t_entry.subvariant;
        let r1 = t_player
            .ratings
            .get(variant, subvariant)
            .unwrap_or(t_entry.rank);
        let r2 = other_player
            .ratings
            .get(variant, other_entry.subvariant)
            .unwrap_or(other_entry.rank);
        let mut sources = HashMap::new();
        sources.insert(t_player.user_id.clone(), MatchSource::Tournament);
        sources.insert(
            other_player.user_id.clone(),
            if other_from_tournament {
                MatchSource::Tournament
            } else {
                MatchSource::Matchmaking
            },
        );
        let session = match self
            .games
            .create_session(
                t_player.summary(r1),
                other_player.summary(r2),
                variant,
                subvariant,
                sources,
                true,
            )
            .await
        {
            Ok(session) => session,
            Err(err) => {
                for entry in &[&t_entry, &other_entry] {
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
        let sides = [
            (&t_entry, true),
            (&other_entry, other_from_tournament),
        ];
        for (entry, tournament) in &sides {
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
                        tournament: *tournament,
                    },
                )
                .await;
        }
    }

    async fn fail(&self, conn_id: &ConnectionId, code: ErrorCode, message: &str) -> Error {
        self.connections
            .send(
                conn_id,
                Event::TournamentError {
                    message: message.to_string(),
                },
            )
            .await;
        Error::new(code, message)
    }
}

fn evict(inner: &mut Inner, user_id: &UserId) {
    if let Some(te) = inner.queue.remove(user_id) {
        if let Some(record) = inner.tournaments.get_mut(&te.tournament_id) {
            record.participants.remove(user_id);
        }
    }
    inner.players.remove(user_id);
}

/// Take a user out of the tournament queue as matched. Participation in
/// the tournament itself is kept.
fn claim(inner: &mut Inner, user_id: &UserId) -> Option<QueueEntry> {
    let mut te = inner.queue.remove(user_id)?;
    inner.players.remove(user_id);
    te.entry.status = EntryStatus::Matched;
    Some(te.entry)
}

fn mark_in_progress(inner: &mut Inner, tournament_id: &TournamentId) {
    if let Some(record) = inner.tournaments.get_mut(tournament_id) {
        if record.status == TournamentStatus::Open {
            record.status = TournamentStatus::InProgress;
        }
    }
}
