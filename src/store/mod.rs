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

pub mod session;


use std::collections::HashMap;
use std::sync::Arc;

use rand::{thread_rng, Rng};
use tokio::sync::Mutex;

use crate::common::utils::now_ms;
use crate::common::{
    ColorMap, EndReason, Error, ErrorCode, MatchSource, PlayerSummary, SessionId, SessionStatus,
    Subvariant, UserId, Variant,
};
use crate::config::Config;
use crate::engine::board::Board;

use session::{GameSummary, Session, SessionMetadata};

/// `SessionStore` owns every live session plus the user→session index.
/// One lock guards both maps, which is what makes the multi-key writes of
/// `create_session` and `end_session` atomic.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Inner>>,
    config: Arc<Config>,
}

struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    user_sessions: HashMap<UserId, UserSessionEntry>,
}

struct SessionRecord {
    session: Session,
    expires_at: u64,
}

struct UserSessionEntry {
    session_id: SessionId,
    expires_at: u64,
}

impl SessionStore {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sessions: HashMap::new(),
                user_sessions: HashMap::new(),
            })),
            config,
        }
    }

    /// Create a session for two players. Colors are assigned uniformly at
    /// random between them. The session hash, its TTL and both
    /// user→session mappings are written under one lock: all or nothing.
    pub async fn create_session(
        &self,
        p1: PlayerSummary,
        p2: PlayerSummary,
        variant: Variant,
        subvariant: Option<Subvariant>,
        sources: HashMap<UserId, MatchSource>,
        rated: bool,
    ) -> Result<Session, Error> {
        if p1.user_id == p2.user_id {
            return Err(Error::new(
                ErrorCode::InvalidPlayer,
                "a player cannot be matched with themselves",
            ));
        }
        if p1.name.is_empty() || p2.name.is_empty() {
            return Err(Error::new(ErrorCode::InvalidPlayer, "player name missing"));
        }
        if variant == Variant::Classic && subvariant.is_none() {
            return Err(Error::new(
                ErrorCode::ValidationError,
                "classic requires a subvariant",
            ));
        }
        let now = now_ms();
        let (white, black) = if thread_rng().gen::<bool>() {
            (p1, p2)
        } else {
            (p2, p1)
        };
        let session_id = SessionId::new();
        let session = Session {
            session_id: session_id.clone(),
            variant,
            subvariant,
            players: ColorMap {
                white: white.clone(),
                black: black.clone(),
            },
            board: Board::initial(variant, subvariant, now),
            status: SessionStatus::Active,
            created_at: now,
            last_activity: now,
            move_count: 0,
            metadata: SessionMetadata {
                source: sources,
                rated,
                allow_spectators: true,
                draw_offers: ColorMap::default(),
            },
            moves: Vec::new(),
            last_move: None,
            result: None,
            result_reason: None,
            winner_color: None,
            ended_at: None,
        };
        let expires_at = now + self.config.session_ttl();
        let mut inner = self.inner.lock().await;
        for user_id in &[&white.user_id, &black.user_id] {
            if let Some(entry) = inner.user_sessions.get(*user_id) {
                let active = inner
                    .sessions
                    .get(&entry.session_id)
                    .map(|r| r.expires_at > now && r.session.is_active())
                    .unwrap_or(false);
                if active {
                    return Err(Error::new(
                        ErrorCode::DuplicateKey,
                        "player already has an active session",
                    ));
                }
            }
        }
        inner.sessions.insert(
            session_id.clone(),
            SessionRecord {
                session: session.clone(),
                expires_at,
            },
        );
        inner.user_sessions.insert(
            white.user_id.clone(),
            UserSessionEntry {
                session_id: session_id.clone(),
                expires_at,
            },
        );
        inner.user_sessions.insert(
            black.user_id.clone(),
            UserSessionEntry {
                session_id,
                expires_at,
            },
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Option<Session> {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        match inner.sessions.get(session_id) {
            Some(record) if record.expires_at > now => Some(record.session.clone()),
            Some(_) => {
                inner.sessions.remove(session_id);
                None
            }
            None => None,
        }
    }

    /// The session a user is currently playing, if any. A mapping whose
    /// session has disappeared is an orphan and gets cleaned up here.
    pub async fn get_user_active_session(&self, user_id: &UserId) -> Option<Session> {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        let session_id = match inner.user_sessions.get(user_id) {
            Some(entry) if entry.expires_at > now => entry.session_id.clone(),
            Some(_) => {
                inner.user_sessions.remove(user_id);
                return None;
            }
            None => return None,
        };
        match inner.sessions.get(&session_id) {
            Some(record) if record.expires_at > now && record.session.is_active() => {
                Some(record.session.clone())
            }
            _ => {
                inner.user_sessions.remove(user_id);
                None
            }
        }
    }

    /// Write back a mutated session and refresh every TTL that belongs to
    /// it.
    pub async fn update_session(
        &self,
        session_id: &SessionId,
        session: Session,
    ) -> Result<(), Error> {
        let now = now_ms();
        let expires_at = now + self.config.session_ttl();
        let mut inner = self.inner.lock().await;
        let record = inner
            .sessions
            .get_mut(session_id)
            .filter(|r| r.expires_at > now)
            .ok_or_else(|| Error::new(ErrorCode::GameNotFound, "session not found"))?;
        record.session = session;
        record.expires_at = expires_at;
        let white = record.session.players.white.user_id.clone();
        let black = record.session.players.black.user_id.clone();
        for user_id in &[white, black] {
            if let Some(entry) = inner.user_sessions.get_mut(user_id) {
                if entry.session_id == *session_id {
                    entry.expires_at = expires_at;
                }
            }
        }
        Ok(())
    }

    /// Close a session: mark it finished, drop the hash, the move list
    /// and both user mappings, and hand back the summary for the durable
    /// result store.
    pub async fn end_session(
        &self,
        session_id: &SessionId,
        reason: EndReason,
        winner: Option<crate::common::Color>,
    ) -> Result<GameSummary, Error> {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        let mut record = inner
            .sessions
            .remove(session_id)
            .ok_or_else(|| Error::new(ErrorCode::GameNotFound, "session not found"))?;
        if record.session.is_active() {
            record.session.finish(reason, winner, now);
        }
        let white = record.session.players.white.user_id.clone();
        let black = record.session.players.black.user_id.clone();
        for user_id in &[white, black] {
            if let Some(entry) = inner.user_sessions.get(user_id) {
                if entry.session_id == *session_id {
                    inner.user_sessions.remove(user_id);
                }
            }
        }
        Ok(GameSummary::from(&record.session))
    }

    pub async fn touch(&self, session_id: &SessionId) {
        let now = now_ms();
        let expires_at = now + self.config.session_ttl();
        let mut inner = self.inner.lock().await;
        if let Some(record) = inner.sessions.get_mut(session_id) {
            record.expires_at = expires_at;
        }
    }

    pub async fn active_session_ids(&self) -> Vec<SessionId> {
        let now = now_ms();
        let inner = self.inner.lock().await;
        inner
            .sessions
            .iter()
            .filter(|(_, r)| r.expires_at > now && r.session.is_active())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Sweep everything whose TTL ran out. The TTL is the backstop for
    /// sessions nobody touches anymore, terminal or not.
    pub async fn garbage_collect(&self) {
        let now = now_ms();
        let mut inner = self.inner.lock().await;
        inner.sessions.retain(|_, r| r.expires_at > now);
        let sessions = &inner.sessions;
        let stale: Vec<UserId> = inner
            .user_sessions
            .iter()
            .filter(|(_, e)| e.expires_at <= now || !sessions.contains_key(&e.session_id))
            .map(|(user_id, _)| user_id.clone())
            .collect();
        for user_id in stale {
            inner.user_sessions.remove(&user_id);
        }
    }
}
