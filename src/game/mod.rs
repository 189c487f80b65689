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

use crate::chess::VerboseMove;
use crate::common::utils::now_ms;
use crate::common::{
    Color, ColorMap, EndReason, Error, ErrorCode, Event, MatchSource, PlayerSummary, SessionId,
    Subvariant, UserId, Variant,
};
use crate::connections::Connections;
use crate::engine::{self, MoveInput, MoveReply};
use crate::store::session::Session;
use crate::store::SessionStore;

/// `GameController` orchestrates a move: load the session, dispatch to the
/// variant engine, persist what came back, tell both players. The engines
/// own every rule; the controller only ferries state.
#[derive(Clone)]
pub struct GameController {
    store: SessionStore,
    connections: Connections,
}

impl GameController {
    pub fn new(store: SessionStore, connections: Connections) -> Self {
        Self { store, connections }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Session creation on behalf of the queues (C5/C6 go through here).
    pub async fn create_session(
        &self,
        p1: PlayerSummary,
        p2: PlayerSummary,
        variant: Variant,
        subvariant: Option<Subvariant>,
        sources: HashMap<UserId, MatchSource>,
        rated: bool,
    ) -> Result<Session, Error> {
        self.store
            .create_session(p1, p2, variant, subvariant, sources, rated)
            .await
    }

    pub async fn make_move(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        mv: MoveInput,
        timestamp: Option<u64>,
        variant: Option<Variant>,
        subvariant: Option<Subvariant>,
    ) -> Result<MoveReply, Error> {
        let mut session = self.load_active(session_id, user_id).await?;
        let color = self.player_color(&session, user_id).await?;
        if variant.map(|v| v != session.variant).unwrap_or(false)
            || subvariant.map(|s| session.subvariant != Some(s)).unwrap_or(false)
        {
            return Err(self
                .fail(
                    user_id,
                    Some(session_id.clone()),
                    ErrorCode::InvalidInput,
                    "variant does not match this session",
                )
                .await);
        }
        let reply = engine::validate_and_apply(
            session.variant,
            session.subvariant,
            &session.board,
            &mv,
            color,
            timestamp,
        );
        match &reply {
            MoveReply::Valid {
                mv: rec,
                state,
                game_ended,
                end_reason,
                winner_color,
            } => {
                let now = now_ms();
                session.board = (**state).clone();
                session.last_activity = now;
                if let Some(rec) = rec {
                    session.moves.push(rec.clone());
                    session.last_move = Some(rec.clone());
                    session.move_count += 1;
                    session.metadata.draw_offers = ColorMap::default();
                }
                if *game_ended {
                    let reason = end_reason.unwrap_or(EndReason::Checkmate);
                    self.finish(&mut session, reason, *winner_color, now).await?;
                } else {
                    self.store
                        .update_session(session_id, session.clone())
                        .await?;
                    if let Some(rec) = rec {
                        self.broadcast(
                            &session,
                            Event::GameMove {
                                session_id: session_id.clone(),
                                mv: rec.clone(),
                                state: Box::new(session.board.clone()),
                            },
                        )
                        .await;
                    }
                    self.broadcast(&session, self.timer_event(&session)).await;
                }
            }
            MoveReply::Reject { code, reason } => {
                if code.is_rule_reject() {
                    self.connections
                        .send_to_user(
                            user_id,
                            Event::GameWarning {
                                session_id: session_id.clone(),
                                code: *code,
                                message: reason.clone(),
                                state: None,
                            },
                        )
                        .await;
                } else {
                    self.connections
                        .error_to_user(
                            user_id,
                            Event::GameError {
                                session_id: Some(session_id.clone()),
                                code: *code,
                                message: reason.clone(),
                            },
                        )
                        .await;
                }
            }
            MoveReply::Warning {
                code,
                reason,
                state,
            } => {
                if let Some(state) = state {
                    session.board = (**state).clone();
                    session.last_activity = now_ms();
                    self.store
                        .update_session(session_id, session.clone())
                        .await?;
                }
                self.broadcast(
                    &session,
                    Event::GameWarning {
                        session_id: session_id.clone(),
                        code: *code,
                        message: reason.clone(),
                        state: state.clone(),
                    },
                )
                .await;
                self.broadcast(&session, self.timer_event(&session)).await;
            }
        }
        Ok(reply)
    }

    /// Variant-filtered legal moves from one square; `"pocket"` lists the
    /// drops a Crazyhouse player has available.
    pub async fn get_possible_moves(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        square: &str,
    ) -> Result<Vec<VerboseMove>, Error> {
        let session = match self.store.get_session(session_id).await {
            Some(session) => session,
            None => {
                return Err(self
                    .fail(
                        user_id,
                        Some(session_id.clone()),
                        ErrorCode::GameNotFound,
                        "session not found",
                    )
                    .await)
            }
        };
        engine::moves_from(
            session.variant,
            session.subvariant,
            &session.board,
            square,
            now_ms(),
        )
        .map_err(|(code, reason)| Error::new(code, reason))
    }

    pub async fn resign(&self, session_id: &SessionId, user_id: &UserId) -> Result<(), Error> {
        let mut session = self.load_active(session_id, user_id).await?;
        let color = self.player_color(&session, user_id).await?;
        let now = now_ms();
        session
            .board
            .end(EndReason::Resignation, Some(color.opponent()), now);
        self.finish(&mut session, EndReason::Resignation, Some(color.opponent()), now)
            .await
    }

    pub async fn offer_draw(&self, session_id: &SessionId, user_id: &UserId) -> Result<(), Error> {
        let mut session = self.load_active(session_id, user_id).await?;
        let color = self.player_color(&session, user_id).await?;
        *session.metadata.draw_offers.get_mut(color) = true;
        session.last_activity = now_ms();
        self.store
            .update_session(session_id, session.clone())
            .await?;
        self.broadcast(
            &session,
            Event::GameState {
                session_id: session_id.clone(),
                state: Box::new(session.clone()),
            },
        )
        .await;
        Ok(())
    }

    pub async fn accept_draw(&self, session_id: &SessionId, user_id: &UserId) -> Result<(), Error> {
        let mut session = self.load_active(session_id, user_id).await?;
        let color = self.player_color(&session, user_id).await?;
        if !*session.metadata.draw_offers.get(color.opponent()) {
            return Err(self
                .fail(
                    user_id,
                    Some(session_id.clone()),
                    ErrorCode::InvalidInput,
                    "no outstanding draw offer",
                )
                .await);
        }
        let now = now_ms();
        session.board.end(EndReason::MutualAgreement, None, now);
        self.finish(&mut session, EndReason::MutualAgreement, None, now)
            .await
    }

    pub async fn decline_draw(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<(), Error> {
        let mut session = self.load_active(session_id, user_id).await?;
        let color = self.player_color(&session, user_id).await?;
        *session.metadata.draw_offers.get_mut(color.opponent()) = false;
        session.last_activity = now_ms();
        self.store
            .update_session(session_id, session.clone())
            .await?;
        self.broadcast(
            &session,
            Event::GameState {
                session_id: session_id.clone(),
                state: Box::new(session.clone()),
            },
        )
        .await;
        Ok(())
    }

    /// Timer poll for one session. Applies everything that happens with
    /// time alone and reports it: clock ticks, drop-timer expiry, decay
    /// freezing, SixPointer per-move timeouts, flag falls.
    pub async fn update_timers(
        &self,
        session_id: &SessionId,
        now: Option<u64>,
    ) -> Result<(), Error> {
        let mut session = match self.store.get_session(session_id).await {
            Some(session) if session.is_active() => session,
            Some(_) | None => return Ok(()),
        };
        let now = now.unwrap_or_else(now_ms);
        let update = engine::update_timers(session.variant, session.subvariant, &session.board, now);
        session.board = (*update.state).clone();
        if update.game_ended {
            let reason = session.board.end_reason.unwrap_or(EndReason::Timeout);
            let winner = session.board.winner_color;
            self.finish(&mut session, reason, winner, now).await?;
            return Ok(());
        }
        if update.changed || update.warning.is_some() {
            session.last_activity = now;
            self.store
                .update_session(session_id, session.clone())
                .await?;
        }
        if let Some((code, message)) = update.warning {
            self.broadcast(
                &session,
                Event::GameWarning {
                    session_id: session_id.clone(),
                    code,
                    message,
                    state: Some(Box::new(session.board.clone())),
                },
            )
            .await;
        }
        if update.changed {
            self.broadcast(
                &session,
                Event::GameState {
                    session_id: session_id.clone(),
                    state: Box::new(session.clone()),
                },
            )
            .await;
        }
        self.broadcast(&session, self.timer_event(&session)).await;
        Ok(())
    }

    pub async fn get_state(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<Session, Error> {
        let session = match self.store.get_session(session_id).await {
            Some(session) => session,
            None => {
                return Err(self
                    .fail(
                        user_id,
                        Some(session_id.clone()),
                        ErrorCode::GameNotFound,
                        "session not found",
                    )
                    .await)
            }
        };
        self.connections
            .send_to_user(
                user_id,
                Event::GameState {
                    session_id: session_id.clone(),
                    state: Box::new(session.clone()),
                },
            )
            .await;
        Ok(session)
    }

    // Helper functions

    async fn load_active(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<Session, Error> {
        match self.store.get_session(session_id).await {
            Some(session) if session.is_active() => Ok(session),
            Some(_) => Err(self
                .fail(
                    user_id,
                    Some(session_id.clone()),
                    ErrorCode::GameEnded,
                    "the game is already over",
                )
                .await),
            None => Err(self
                .fail(
                    user_id,
                    Some(session_id.clone()),
                    ErrorCode::GameNotFound,
                    "session not found",
                )
                .await),
        }
    }

    async fn player_color(&self, session: &Session, user_id: &UserId) -> Result<Color, Error> {
        match session.player_color(user_id) {
            Some(color) => Ok(color),
            None => Err(self
                .fail(
                    user_id,
                    Some(session.session_id.clone()),
                    ErrorCode::NotAPlayer,
                    "you are not a player in this session",
                )
                .await),
        }
    }

    /// Emit an error event (rate limited) and build the matching `Error`.
    async fn fail(
        &self,
        user_id: &UserId,
        session_id: Option<SessionId>,
        code: ErrorCode,
        message: &str,
    ) -> Error {
        self.connections
            .error_to_user(
                user_id,
                Event::GameError {
                    session_id,
                    code,
                    message: message.to_string(),
                },
            )
            .await;
        Error::new(code, message)
    }

    /// Persist the terminal state, close the session and tell both sides.
    async fn finish(
        &self,
        session: &mut Session,
        reason: EndReason,
        winner: Option<Color>,
        now: u64,
    ) -> Result<(), Error> {
        session.finish(reason, winner, now);
        self.store
            .update_session(&session.session_id, session.clone())
            .await?;
        self.store
            .end_session(&session.session_id, reason, winner)
            .await?;
        self.broadcast(
            session,
            Event::GameEnd {
                session_id: session.session_id.clone(),
                state: Box::new(session.clone()),
            },
        )
        .await;
        Ok(())
    }

    async fn broadcast(&self, session: &Session, event: Event) {
        self.connections
            .send_to_user(&session.players.white.user_id, event.clone())
            .await;
        self.connections
            .send_to_user(&session.players.black.user_id, event)
            .await;
    }

    fn timer_event(&self, session: &Session) -> Event {
        let board = &session.board;
        let frozen_pieces = match (session.variant, session.subvariant) {
            (Variant::Crazyhouse, Some(Subvariant::WithTimer)) => {
                Some(engine::frozen_view(board))
            }
            (Variant::Decay, _) => board.frozen_pieces.clone(),
            _ => None,
        };
        Event::GameTimer {
            session_id: session.session_id.clone(),
            white: board.white_time,
            black: board.black_time,
            drop_timers: board.drop_timers.clone(),
            frozen_pieces,
        }
    }
}
