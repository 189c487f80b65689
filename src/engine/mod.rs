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

pub mod board;
pub mod clock;

mod classic;
mod crazyhouse;
mod crazyhouse_timer;
mod decay;
mod sixpointer;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use shakmaty::CastlingMode;

use crate::chess::{Pos, VerboseMove};
use crate::common::utils::now_ms;
use crate::common::{Color, EndReason, ErrorCode, PieceKind, Subvariant, Variant};

use board::{Board, MoveRecord};

pub use crazyhouse_timer::{derived_frozen, frozen_view};

/// A move as submitted by a client: either a regular from/to move or a
/// Crazyhouse drop.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MoveInput {
    #[serde(rename_all = "camelCase")]
    Drop {
        drop: bool,
        piece: PieceKind,
        to: String,
    },
    #[serde(rename_all = "camelCase")]
    Normal {
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<PieceKind>,
    },
}

impl MoveInput {
    pub fn normal<T: Into<String>>(from: T, to: T) -> Self {
        MoveInput::Normal {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    pub fn promoting<T: Into<String>>(from: T, to: T, promotion: PieceKind) -> Self {
        MoveInput::Normal {
            from: from.into(),
            to: to.into(),
            promotion: Some(promotion),
        }
    }

    pub fn pocket_drop<T: Into<String>>(piece: PieceKind, to: T) -> Self {
        MoveInput::Drop {
            drop: true,
            piece,
            to: to.into(),
        }
    }
}

/// Outcome of a move submission. `Reject` and `Warning` never mutate the
/// input board; `Valid` carries the successor state. A `Warning` may carry
/// a successor too (SixPointer per-move timeouts mutate without a move).
#[derive(Clone, Debug)]
pub enum MoveReply {
    Valid {
        mv: Option<MoveRecord>,
        state: Box<Board>,
        game_ended: bool,
        end_reason: Option<EndReason>,
        winner_color: Option<Color>,
    },
    Reject {
        code: ErrorCode,
        reason: String,
    },
    Warning {
        code: ErrorCode,
        reason: String,
        state: Option<Box<Board>>,
    },
}

/// Result of a timer poll between moves.
#[derive(Clone, Debug)]
pub struct TimerUpdate {
    pub state: Box<Board>,
    /// Something structural happened (freeze, pocket shift, turn pass),
    /// not just clock ticks.
    pub changed: bool,
    pub warning: Option<(ErrorCode, String)>,
    pub game_ended: bool,
}

/// Authoritative validation entry point. Dispatches to the variant engine;
/// a missing `now` is normalized to the wall clock.
pub fn validate_and_apply(
    variant: Variant,
    subvariant: Option<Subvariant>,
    board: &Board,
    mv: &MoveInput,
    color: Color,
    now: Option<u64>,
) -> MoveReply {
    let now = now.unwrap_or_else(now_ms);
    match (variant, subvariant) {
        (Variant::Crazyhouse, Some(Subvariant::WithTimer)) => {
            crazyhouse_timer::validate_and_apply(board, mv, color, now)
        }
        (Variant::Crazyhouse, _) => crazyhouse::validate_and_apply(board, mv, color, now),
        (Variant::Decay, _) => decay::validate_and_apply(board, mv, color, now),
        (Variant::SixPointer, _) => sixpointer::validate_and_apply(board, mv, color, now),
        (Variant::Classic, _) => classic::validate_and_apply(subvariant, board, mv, color, now),
    }
}

/// Apply everything that happens with time alone: main clocks, drop-timer
/// expiry, decay freezing, SixPointer per-move timeouts.
pub fn update_timers(
    variant: Variant,
    subvariant: Option<Subvariant>,
    board: &Board,
    now: u64,
) -> TimerUpdate {
    match (variant, subvariant) {
        (Variant::Crazyhouse, Some(Subvariant::WithTimer)) => {
            crazyhouse_timer::update_timers(board, now)
        }
        (Variant::Crazyhouse, _) => crazyhouse::update_timers(board, now),
        (Variant::Decay, _) => decay::update_timers(board, now),
        (Variant::SixPointer, _) => sixpointer::update_timers(board, now),
        (Variant::Classic, _) => classic::update_timers(subvariant, board, now),
    }
}

/// Variant-filtered legal moves originating at `square`. For the
/// Crazyhouse variants, `square = "pocket"` lists drop moves instead.
pub fn moves_from(
    variant: Variant,
    subvariant: Option<Subvariant>,
    board: &Board,
    square: &str,
    now: u64,
) -> Result<Vec<VerboseMove>, (ErrorCode, String)> {
    match (variant, subvariant) {
        (Variant::Crazyhouse, Some(Subvariant::WithTimer)) => {
            crazyhouse_timer::moves_from(board, square, now)
        }
        (Variant::Crazyhouse, _) => crazyhouse::moves_from(board, square, now),
        (Variant::Decay, _) => decay::moves_from(board, square, now),
        (Variant::SixPointer, _) => sixpointer::moves_from(board, square),
        (Variant::Classic, _) => classic::moves_from(subvariant, board, square),
    }
}

// Shared pipeline pieces. Every variant engine runs the same spine:
// guard, parse, turn check, clock, variant rules, bookkeeping, terminal.

pub(crate) fn castling_mode(variant: Variant, subvariant: Option<Subvariant>) -> CastlingMode {
    match (variant, subvariant) {
        (Variant::Classic, Some(Subvariant::Fischer)) => CastlingMode::Chess960,
        _ => CastlingMode::Standard,
    }
}

pub(crate) fn reject<T: Into<String>>(code: ErrorCode, reason: T) -> MoveReply {
    MoveReply::Reject {
        code,
        reason: reason.into(),
    }
}

pub(crate) fn valid(board: Board, mv: Option<MoveRecord>) -> MoveReply {
    MoveReply::Valid {
        game_ended: board.game_ended,
        end_reason: board.end_reason,
        winner_color: board.winner_color,
        mv,
        state: Box::new(board),
    }
}

pub(crate) fn record_of(v: &VerboseMove, now: u64) -> MoveRecord {
    MoveRecord {
        color: v.color,
        from: Some(v.from.clone()),
        to: v.to.clone(),
        piece: v.piece,
        captured: v.captured,
        promotion: v.promotion,
        san: Some(v.san.clone()),
        drop: false,
        timestamp: now,
    }
}

/// Steps 2, 4 and 5 of the pipeline: reject ended games, parse the FEN,
/// verify it is the caller's turn. Returns the parsed position.
pub(crate) fn open_position(
    board: &Board,
    mode: CastlingMode,
    color: Color,
) -> Result<Pos, MoveReply> {
    if board.game_ended {
        return Err(reject(ErrorCode::GameEnded, "the game is already over"));
    }
    if board.fen.trim().is_empty() {
        return Err(reject(ErrorCode::MissingFen, "board has no position"));
    }
    let pos = Pos::from_fen(&board.fen, mode)
        .map_err(|code| reject(code, "board position cannot be parsed"))?;
    if pos.side_to_move() != color {
        return Err(reject(ErrorCode::WrongTurn, "it is not your turn"));
    }
    Ok(pos)
}

/// Pre-move clock commit. On a flag fall the board is closed with a
/// timeout in favour of the opponent and `true` is returned; the pending
/// move must not be applied.
pub(crate) fn flag_fall(board: &mut Board, now: u64) -> bool {
    if clock::deduct(board, now) {
        let loser = board.active_color;
        board.end(EndReason::Timeout, Some(loser.opponent()), now);
        true
    } else {
        false
    }
}

/// Step 10: shared post-move bookkeeping. The increment is credited to
/// the mover before the turn flips to the side encoded in the new FEN.
pub(crate) fn finish_move(board: &mut Board, pos: &Pos, rec: MoveRecord, now: u64) {
    board.fen = pos.fen();
    clock::credit_increment(board);
    board.active_color = pos.side_to_move();
    board.position_history.push(board.fen.clone());
    board.move_history.push(rec);
    board.last_move_timestamp = Some(now);
    board.turn_start_timestamp = now;
    board.game_started = true;
}

/// The classic terminal ladder: mate and the draw family. Returns `true`
/// when the game is over; `rep` is the repetition count of the position
/// just reached.
pub(crate) fn classic_terminal(
    board: &mut Board,
    pos: &Pos,
    rep: u32,
    mover: Color,
    now: u64,
) -> bool {
    if pos.is_checkmate() {
        board.end(EndReason::Checkmate, Some(mover), now);
        return true;
    }
    if pos.is_stalemate() {
        board.end(EndReason::Stalemate, None, now);
        return true;
    }
    if pos.is_insufficient_material() {
        board.end(EndReason::InsufficientMaterial, None, now);
        return true;
    }
    let halfmoves = pos.halfmove_clock();
    if halfmoves >= 150 {
        board.end(EndReason::SeventyFiveMoveRule, None, now);
        return true;
    }
    if halfmoves >= 100 {
        board.end(EndReason::FiftyMoveRule, None, now);
        return true;
    }
    if rep >= 5 {
        board.end(EndReason::FivefoldRepetition, None, now);
        return true;
    }
    if rep >= 3 {
        board.end(EndReason::ThreefoldRepetition, None, now);
        return true;
    }
    false
}

/// Plain timer poll shared by the variants whose only time rule is the
/// main clock.
pub(crate) fn main_clock_update(board: &Board, now: u64) -> TimerUpdate {
    let mut next = board.clone();
    let mut ended = false;
    if !next.game_ended && clock::deduct(&mut next, now) {
        let loser = next.active_color;
        next.end(EndReason::Timeout, Some(loser.opponent()), now);
        ended = true;
    }
    TimerUpdate {
        state: Box::new(next),
        changed: ended,
        warning: None,
        game_ended: ended,
    }
}
