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

use serde::Serialize;

use crate::engine::board::{Board, MoveRecord};
use crate::store::session::Session;
use crate::tournament::{TournamentDetails, TournamentStatus};

use super::data::{ColorMap, PlayerSummary, SessionId, Subvariant, TournamentId, Variant};
use super::error::ErrorCode;

/// Everything the core pushes at a connection. The transport in front of
/// the crate turns these into whatever wire frames it speaks.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "type")]
pub enum Event {
    /// The user tried to rejoin a queue before their cooldown ran out.
    #[serde(rename_all = "camelCase")]
    QueueCooldown { until: u64 },
    /// Both sides of a fresh match receive this with the same session ID.
    #[serde(rename_all = "camelCase")]
    QueueMatched {
        session_id: SessionId,
        opponent: PlayerSummary,
        variant: Variant,
        subvariant: Option<Subvariant>,
        initial_state: Box<Session>,
        tournament: bool,
    },
    #[serde(rename_all = "camelCase")]
    QueueError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
    #[serde(rename_all = "camelCase")]
    TournamentJoined {
        details: TournamentDetails,
        status: TournamentStatus,
    },
    /// A new tournament became the active one.
    #[serde(rename_all = "camelCase")]
    TournamentNewActive { id: TournamentId, name: String },
    #[serde(rename_all = "camelCase")]
    TournamentError { message: String },
    /// A move was applied; `state` is the board after it.
    #[serde(rename_all = "camelCase")]
    GameMove {
        session_id: SessionId,
        #[serde(rename = "move")]
        mv: MoveRecord,
        state: Box<Board>,
    },
    /// Full session snapshot, sent after structural changes and on demand.
    #[serde(rename_all = "camelCase")]
    GameState {
        session_id: SessionId,
        state: Box<Session>,
    },
    #[serde(rename_all = "camelCase")]
    GameTimer {
        session_id: SessionId,
        white: i64,
        black: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        drop_timers: Option<ColorMap<HashMap<String, u64>>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        frozen_pieces: Option<ColorMap<Vec<String>>>,
    },
    #[serde(rename_all = "camelCase")]
    GameEnd {
        session_id: SessionId,
        state: Box<Session>,
    },
    /// A rule-level reject. The client keeps its local state.
    #[serde(rename_all = "camelCase")]
    GameWarning {
        session_id: SessionId,
        code: ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        state: Option<Box<Board>>,
    },
    #[serde(rename_all = "camelCase")]
    GameError {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        code: ErrorCode,
        message: String,
    },
}
