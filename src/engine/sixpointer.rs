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

use shakmaty::CastlingMode;

use crate::chess::{Pos, VerboseMove};
use crate::common::{Color, EndReason, ErrorCode, Variant};

use super::board::{normalized_fen, Board};
use super::{
    finish_move, open_position, record_of, reject, valid, MoveInput, MoveReply, TimerUpdate,
};

pub const MAX_MOVES: u32 = 6;
pub const PER_MOVE_MS: i64 = 30_000;

pub(crate) fn validate_and_apply(
    board: &Board,
    mv: &MoveInput,
    color: Color,
    now: u64,
) -> MoveReply {
    let mut b = board.clone();
    b.ensure_variant_defaults(Variant::SixPointer, None);
    let mut pos = match open_position(&b, CastlingMode::Standard, color) {
        Ok(pos) => pos,
        Err(reply) => return reply,
    };
    // Per-move clock. Running out is not a loss here: the slow side pays a
    // point, both windows reset and the turn passes.
    if move_clock_expired(&b, now) {
        return match pass_on_timeout(&mut b, &mut pos, now) {
            Ok(()) => MoveReply::Warning {
                code: ErrorCode::Timeout,
                reason: "move time expired; a point was deducted".to_string(),
                state: Some(Box::new(b)),
            },
            Err(reply) => reply,
        };
    }
    let (from, to, promotion) = match mv {
        MoveInput::Normal {
            from,
            to,
            promotion,
        } => (from, to, *promotion),
        MoveInput::Drop { .. } => {
            return reject(ErrorCode::InvalidMove, "drops are not part of this variant")
        }
    };
    let played = *b
        .moves_played
        .as_ref()
        .expect("move counters initialized by ensure_variant_defaults")
        .get(color);
    let max = b.max_moves.unwrap_or(MAX_MOVES);
    if played >= max {
        return reject(
            ErrorCode::MoveLimitExceeded,
            "you have no moves remaining in this game",
        );
    }
    let preview = match pos.preview(from, to, promotion) {
        Some(preview) => preview,
        None => return reject(ErrorCode::IllegalMove, "that move is not legal here"),
    };
    let opponent_played = *b
        .moves_played
        .as_ref()
        .expect("move counters initialized by ensure_variant_defaults")
        .get(color.opponent());
    if preview.captured.is_some() && played + 1 == max && opponent_played >= max {
        return reject(
            ErrorCode::FoulPlay,
            "capturing on your final move is not allowed when the opponent cannot reply",
        );
    }
    let applied = match pos.apply(from, to, promotion) {
        Some(applied) => applied,
        None => return reject(ErrorCode::IllegalMove, "that move is not legal here"),
    };
    if let Some(captured) = applied.captured {
        b.captured_pieces.get_mut(color).push(captured);
        let points = b
            .points
            .as_mut()
            .expect("points initialized by ensure_variant_defaults");
        *points.get_mut(color) += captured.value();
    }
    *b.moves_played
        .as_mut()
        .expect("move counters initialized by ensure_variant_defaults")
        .get_mut(color) += 1;
    let rec = record_of(&applied, now);
    finish_move(&mut b, &pos, rec.clone(), now);
    reset_move_clocks(&mut b, now);
    let rep = b.bump_repetition(normalized_fen(&b.fen));
    terminal(&mut b, &pos, rep, color, now);
    valid(b, Some(rec))
}

pub(crate) fn update_timers(board: &Board, now: u64) -> TimerUpdate {
    let mut next = board.clone();
    next.ensure_variant_defaults(Variant::SixPointer, None);
    if next.game_ended || !next.game_started {
        return TimerUpdate {
            state: Box::new(next),
            changed: false,
            warning: None,
            game_ended: false,
        };
    }
    if move_clock_expired(&next, now) {
        let mut pos = match Pos::from_fen(&next.fen, CastlingMode::Standard) {
            Ok(pos) => pos,
            Err(_) => {
                return TimerUpdate {
                    state: Box::new(next),
                    changed: false,
                    warning: None,
                    game_ended: false,
                }
            }
        };
        let warning = match pass_on_timeout(&mut next, &mut pos, now) {
            Ok(()) => Some((
                ErrorCode::Timeout,
                "move time expired; a point was deducted".to_string(),
            )),
            Err(_) => None,
        };
        return TimerUpdate {
            state: Box::new(next),
            changed: warning.is_some(),
            warning,
            game_ended: false,
        };
    }
    super::clock::deduct(&mut next, now);
    TimerUpdate {
        state: Box::new(next),
        changed: false,
        warning: None,
        game_ended: false,
    }
}

pub(crate) fn moves_from(
    board: &Board,
    square: &str,
) -> Result<Vec<VerboseMove>, (ErrorCode, String)> {
    if board.game_ended {
        return Ok(Vec::new());
    }
    let pos = Pos::from_fen(&board.fen, CastlingMode::Standard)
        .map_err(|code| (code, "board position cannot be parsed".to_string()))?;
    let color = pos.side_to_move();
    let max = board.max_moves.unwrap_or(MAX_MOVES);
    let (played, opponent_played) = match board.moves_played.as_ref() {
        Some(counters) => (*counters.get(color), *counters.get(color.opponent())),
        None => (0, 0),
    };
    if played >= max {
        return Ok(Vec::new());
    }
    let last_and_locked = played + 1 == max && opponent_played >= max;
    Ok(pos
        .moves_from(square)
        .into_iter()
        .filter(|m| !(last_and_locked && m.captured.is_some()))
        .collect())
}

fn move_clock_expired(b: &Board, now: u64) -> bool {
    if !b.game_started || b.game_ended {
        return false;
    }
    let elapsed = now.saturating_sub(b.turn_start_timestamp) as i64;
    elapsed >= b.time_of(b.active_color)
}

/// Timeout consequence: minus one point (floor zero), fresh 30 s windows
/// for both sides, turn handed to the opponent.
fn pass_on_timeout(b: &mut Board, pos: &mut Pos, now: u64) -> Result<(), MoveReply> {
    let slow = b.active_color;
    if pos.pass_turn().is_err() {
        return Err(reject(
            ErrorCode::InternalError,
            "could not pass the turn after a timeout",
        ));
    }
    let slot = b
        .points
        .as_mut()
        .expect("points initialized by ensure_variant_defaults")
        .get_mut(slow);
    *slot = slot.saturating_sub(1);
    b.fen = pos.fen();
    b.active_color = pos.side_to_move();
    reset_move_clocks(b, now);
    Ok(())
}

fn reset_move_clocks(b: &mut Board, now: u64) {
    b.white_time = PER_MOVE_MS;
    b.black_time = PER_MOVE_MS;
    b.turn_start_timestamp = now;
}

/// SixPointer end of game: mate and the usual draws still apply; when both
/// sides have spent their six moves the points decide.
fn terminal(b: &mut Board, pos: &Pos, rep: u32, mover: Color, now: u64) -> bool {
    if pos.is_checkmate() {
        b.end(EndReason::Checkmate, Some(mover), now);
        return true;
    }
    if pos.is_stalemate() {
        b.end(EndReason::Stalemate, None, now);
        return true;
    }
    if pos.is_insufficient_material() {
        b.end(EndReason::InsufficientMaterial, None, now);
        return true;
    }
    if rep >= 5 {
        b.end(EndReason::FivefoldRepetition, None, now);
        return true;
    }
    if rep >= 3 {
        b.end(EndReason::ThreefoldRepetition, None, now);
        return true;
    }
    let max = b.max_moves.unwrap_or(MAX_MOVES);
    let counters = b
        .moves_played
        .as_ref()
        .expect("move counters initialized by ensure_variant_defaults");
    if counters.white >= max && counters.black >= max {
        let points = b
            .points
            .as_ref()
            .expect("points initialized by ensure_variant_defaults");
        let winner = if points.white > points.black {
            Some(Color::White)
        } else if points.black > points.white {
            Some(Color::Black)
        } else {
            None
        };
        b.end(EndReason::Points, winner, now);
        return true;
    }
    false
}
