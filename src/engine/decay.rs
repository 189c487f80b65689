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
use crate::common::{Color, EndReason, ErrorCode, PieceKind, Variant};

use super::board::{normalized_fen, Board, DecayTimer, MajorPieceTimer};
use super::{
    classic_terminal, finish_move, flag_fall, open_position, record_of, reject, valid, MoveInput,
    MoveReply, TimerUpdate,
};

pub const QUEEN_DECAY_MS: i64 = 25_000;
pub const MAJOR_DECAY_MS: i64 = 20_000;
pub const MOVE_BONUS_MS: i64 = 2_000;

/// The marker recorded in `frozenPieces` for a frozen queen. Frozen major
/// pieces are recorded by their square instead.
pub const QUEEN_MARKER: &'static str = "queen";

pub(crate) fn validate_and_apply(
    board: &Board,
    mv: &MoveInput,
    color: Color,
    now: u64,
) -> MoveReply {
    let mut b = board.clone();
    b.ensure_variant_defaults(Variant::Decay, None);
    let mut pos = match open_position(&b, CastlingMode::Standard, color) {
        Ok(pos) => pos,
        Err(reply) => return reply,
    };
    // Decay runs on wall time, so an expiry during the opponent's think
    // must land before this move is judged.
    decay_tick(&mut b, now);
    if flag_fall(&mut b, now) {
        return valid(b, None);
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
    let (piece_color, kind) = match pos.piece_at(from) {
        Some(piece) => piece,
        None => return reject(ErrorCode::IllegalMove, "there is no piece on that square"),
    };
    if piece_color != color {
        return reject(ErrorCode::IllegalMove, "that piece is not yours");
    }
    if is_frozen(&b, color, kind, from) {
        return reject(ErrorCode::PieceFrozen, "that piece has decayed and is frozen");
    }
    let applied = match pos.apply(from, to, promotion) {
        Some(applied) => applied,
        None => return reject(ErrorCode::IllegalMove, "that move is not legal here"),
    };
    if let Some(captured) = applied.captured {
        b.captured_pieces.get_mut(color).push(captured);
        release_captured_timers(&mut b, color.opponent(), captured, to);
    }
    feed_decay(&mut b, color, kind, from, to, now);
    let rec = record_of(&applied, now);
    finish_move(&mut b, &pos, rec.clone(), now);
    let rep = b.bump_repetition(normalized_fen(&b.fen));
    classic_terminal(&mut b, &pos, rep, color, now);
    valid(b, Some(rec))
}

pub(crate) fn update_timers(board: &Board, now: u64) -> TimerUpdate {
    let mut next = board.clone();
    next.ensure_variant_defaults(Variant::Decay, None);
    let mut changed = decay_tick(&mut next, now);
    let mut ended = false;
    if !next.game_ended && super::clock::deduct(&mut next, now) {
        let loser = next.active_color;
        next.end(EndReason::Timeout, Some(loser.opponent()), now);
        changed = true;
        ended = true;
    }
    TimerUpdate {
        state: Box::new(next),
        changed,
        warning: None,
        game_ended: ended,
    }
}

pub(crate) fn moves_from(
    board: &Board,
    square: &str,
    _now: u64,
) -> Result<Vec<VerboseMove>, (ErrorCode, String)> {
    if board.game_ended {
        return Ok(Vec::new());
    }
    let pos = Pos::from_fen(&board.fen, CastlingMode::Standard)
        .map_err(|code| (code, "board position cannot be parsed".to_string()))?;
    let color = pos.side_to_move();
    Ok(pos
        .moves_from(square)
        .into_iter()
        .filter(|m| !is_frozen(board, color, m.piece, &m.from))
        .collect())
}

fn is_frozen(b: &Board, color: Color, kind: PieceKind, from: &str) -> bool {
    let frozen = match b.frozen_pieces.as_ref() {
        Some(frozen) => frozen.get(color),
        None => return false,
    };
    if kind == PieceKind::Queen && frozen.iter().any(|m| m == QUEEN_MARKER) {
        return true;
    }
    frozen.iter().any(|m| m == from)
}

/// Continuous decrease: burn wall time off every active timer and freeze
/// the ones that reach zero. Returns whether anything froze.
pub(super) fn decay_tick(b: &mut Board, now: u64) -> bool {
    let mut changed = false;
    for &color in &[Color::White, Color::Black] {
        let timers = match b.decay_timers.as_mut() {
            Some(timers) => timers.get_mut(color),
            None => return false,
        };
        let mut newly_frozen: Option<String> = None;
        if let Some(q) = timers.queen.as_mut() {
            if q.active && !q.frozen {
                q.time_remaining -= now.saturating_sub(q.last_update_timestamp) as i64;
                q.last_update_timestamp = now;
                if q.time_remaining <= 0 {
                    q.time_remaining = 0;
                    q.frozen = true;
                    q.active = false;
                    newly_frozen = Some(QUEEN_MARKER.to_string());
                }
            }
        }
        if let Some(marker) = newly_frozen.take() {
            push_frozen(b, color, marker);
            changed = true;
        }
        let timers = b
            .decay_timers
            .as_mut()
            .expect("decay timers initialized by ensure_variant_defaults")
            .get_mut(color);
        if let Some(m) = timers.major_piece.as_mut() {
            if m.active && !m.frozen {
                m.time_remaining -= now.saturating_sub(m.last_update_timestamp) as i64;
                m.last_update_timestamp = now;
                if m.time_remaining <= 0 {
                    m.time_remaining = 0;
                    m.frozen = true;
                    m.active = false;
                    newly_frozen = Some(m.piece_square.clone());
                }
            }
        }
        if let Some(marker) = newly_frozen {
            push_frozen(b, color, marker);
            changed = true;
        }
    }
    changed
}

fn push_frozen(b: &mut Board, color: Color, marker: String) {
    if let Some(frozen) = b.frozen_pieces.as_mut() {
        let list = frozen.get_mut(color);
        if !list.iter().any(|m| *m == marker) {
            list.push(marker);
        }
    }
}

/// Post-move decay bookkeeping for the mover: queen moves start or feed
/// the queen timer; once the queen froze, the first major piece to move
/// becomes the tracked one.
fn feed_decay(b: &mut Board, color: Color, kind: PieceKind, from: &str, to: &str, now: u64) {
    let timers = b
        .decay_timers
        .as_mut()
        .expect("decay timers initialized by ensure_variant_defaults")
        .get_mut(color);
    if kind == PieceKind::Queen {
        match timers.queen.as_mut() {
            None => {
                timers.queen = Some(DecayTimer {
                    active: true,
                    frozen: false,
                    time_remaining: QUEEN_DECAY_MS,
                    move_count: 1,
                    last_update_timestamp: now,
                });
                b.decay_active = Some(true);
            }
            Some(q) if q.active && !q.frozen => {
                q.move_count += 1;
                q.time_remaining += MOVE_BONUS_MS;
            }
            Some(_) => {}
        }
        return;
    }
    let queen_frozen = timers.queen.as_ref().map(|q| q.frozen).unwrap_or(false);
    if !queen_frozen || !kind.is_major() {
        return;
    }
    match timers.major_piece.as_mut() {
        None => {
            timers.major_piece = Some(MajorPieceTimer {
                active: true,
                frozen: false,
                time_remaining: MAJOR_DECAY_MS,
                move_count: 1,
                last_update_timestamp: now,
                piece_type: kind,
                piece_square: to.to_string(),
            });
        }
        Some(m) if m.active && !m.frozen && m.piece_square == from => {
            m.move_count += 1;
            m.time_remaining += MOVE_BONUS_MS;
            m.piece_square = to.to_string();
        }
        Some(_) => {}
    }
}

/// Capturing the tracked queen or the tracked major piece stops its timer;
/// there is nothing left to freeze.
fn release_captured_timers(b: &mut Board, victim: Color, captured: PieceKind, to: &str) {
    let timers = match b.decay_timers.as_mut() {
        Some(timers) => timers.get_mut(victim),
        None => return,
    };
    if captured == PieceKind::Queen {
        if let Some(q) = timers.queen.as_mut() {
            if !q.frozen {
                q.active = false;
            }
        }
    }
    if let Some(m) = timers.major_piece.as_mut() {
        if m.active && !m.frozen && m.piece_square == to {
            m.active = false;
        }
    }
}
