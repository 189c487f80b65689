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

use serde::{Deserialize, Serialize};

use crate::common::{
    Color, ColorMap, EndReason, GameResult, MatchSource, PlayerSummary, SessionId, SessionStatus,
    Subvariant, UserId, Variant,
};
use crate::engine::board::{Board, MoveRecord};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// How each player got here; differs per side on a cross-queue match.
    pub source: HashMap<UserId, MatchSource>,
    pub rated: bool,
    pub allow_spectators: bool,
    #[serde(default)]
    pub draw_offers: ColorMap<bool>,
}

/// One running (or just finished) game. Owned exclusively by the store;
/// everyone else works on snapshots and writes back through it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub variant: Variant,
    #[serde(default)]
    pub subvariant: Option<Subvariant>,
    pub players: ColorMap<PlayerSummary>,
    pub board: Board,
    pub status: SessionStatus,
    pub created_at: u64,
    pub last_activity: u64,
    pub move_count: u32,
    pub metadata: SessionMetadata,
    #[serde(default)]
    pub moves: Vec<MoveRecord>,
    #[serde(default)]
    pub last_move: Option<MoveRecord>,
    #[serde(default)]
    pub result: Option<GameResult>,
    #[serde(default)]
    pub result_reason: Option<EndReason>,
    #[serde(default)]
    pub winner_color: Option<Color>,
    #[serde(default)]
    pub ended_at: Option<u64>,
}

impl Session {
    pub fn player_color(&self, user_id: &UserId) -> Option<Color> {
        if self.players.white.user_id == *user_id {
            Some(Color::White)
        } else if self.players.black.user_id == *user_id {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player(&self, color: Color) -> &PlayerSummary {
        self.players.get(color)
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Fold a terminal board into the session's result fields.
    pub fn finish(&mut self, reason: EndReason, winner: Option<Color>, now: u64) {
        self.status = SessionStatus::Finished;
        self.result = Some(reason.result_for(winner));
        self.result_reason = Some(reason);
        self.winner_color = winner;
        self.ended_at = Some(now);
        self.last_activity = now;
    }
}

/// What survives a session: the digest handed to the durable result store
/// when a game ends. Rating updates and leaderboards live outside the
/// core and consume this.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub session_id: SessionId,
    pub variant: Variant,
    #[serde(default)]
    pub subvariant: Option<Subvariant>,
    pub players: ColorMap<PlayerSummary>,
    pub result: Option<GameResult>,
    pub result_reason: Option<EndReason>,
    pub winner_color: Option<Color>,
    pub move_count: u32,
    pub created_at: u64,
    pub ended_at: Option<u64>,
}

impl From<&Session> for GameSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            variant: session.variant,
            subvariant: session.subvariant,
            players: session.players.clone(),
            result: session.result,
            result_reason: session.result_reason,
            winner_color: session.winner_color,
            move_count: session.move_count,
            created_at: session.created_at,
            ended_at: session.ended_at,
        }
    }
}
