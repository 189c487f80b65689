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
use crate::common::{Color, ColorMap, EndReason, ErrorCode, PieceKind, Subvariant, Variant};

use super::board::{normalized_fen, Board, MoveRecord, PocketPiece};
use super::crazyhouse::{drop_moves, drop_record, pocket_string, reverted_capture_kind, track_promoted};
use super::{
    finish_move, flag_fall, open_position, record_of, reject, valid, MoveInput, MoveReply,
    TimerUpdate,
};

/// How long the head of a pocket queue stays droppable.
pub const DROP_TIME_LIMIT: u64 = 10_000;

pub(crate) fn validate_and_apply(
    board: &Board,
    mv: &MoveInput,
    color: Color,
    now: u64,
) -> MoveReply {
    let mut b = board.clone();
    b.ensure_variant_defaults(Variant::Crazyhouse, Some(Subvariant::WithTimer));
    let mut pos = match open_position(&b, CastlingMode::Standard, color) {
        Ok(pos) => pos,
        Err(reply) => return reply,
    };
    let expired = expire_pockets(&mut b, now);
    if flag_fall(&mut b, now) {
        return valid(b, None);
    }
    let rec = match mv {
        MoveInput::Drop { piece, to, .. } => {
            match try_drop(&mut b, &mut pos, color, *piece, to, now, &expired) {
                Ok(rec) => rec,
                Err(reply) => return reply,
            }
        }
        MoveInput::Normal {
            from,
            to,
            promotion,
        } => match try_move(&mut b, &mut pos, color, from, to, *promotion, now) {
            Ok(rec) => rec,
            Err(reply) => return reply,
        },
    };
    finish_move(&mut b, &pos, rec.clone(), now);
    let rep = b.bump_repetition(repetition_key(&b));
    terminal(&mut b, &pos, rep, color, now);
    valid(b, Some(rec))
}

pub(crate) fn update_timers(board: &Board, now: u64) -> TimerUpdate {
    let mut next = board.clone();
    next.ensure_variant_defaults(Variant::Crazyhouse, Some(Subvariant::WithTimer));
    let mut changed = !expire_pockets(&mut next, now).is_empty();
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
    now: u64,
) -> Result<Vec<VerboseMove>, (ErrorCode, String)> {
    if board.game_ended {
        return Ok(Vec::new());
    }
    let pos = Pos::from_fen(&board.fen, CastlingMode::Standard)
        .map_err(|code| (code, "board position cannot be parsed".to_string()))?;
    if square == "pocket" {
        let color = pos.side_to_move();
        // Only the head of the queue is droppable, and only while its
        // timer runs.
        let mut probe = board.clone();
        probe.ensure_variant_defaults(Variant::Crazyhouse, Some(Subvariant::WithTimer));
        expire_pockets(&mut probe, now);
        let kinds = match droppable_head(&probe, color, now) {
            Some(kind) => vec![kind],
            None => Vec::new(),
        };
        return Ok(drop_moves(&pos, color, &kinds));
    }
    Ok(pos.moves_from(square))
}

/// The serialized `frozenPieces` view: every non-head pocket entry, plus
/// the head itself when it has no running timer.
pub fn derived_frozen(board: &Board, color: Color) -> Vec<String> {
    let queues = match board.pocketed_pieces.as_ref() {
        Some(queues) => queues,
        None => return Vec::new(),
    };
    let timers = board.drop_timers.as_ref();
    let queue = queues.get(color);
    let mut frozen = Vec::new();
    for (index, piece) in queue.iter().enumerate() {
        let head_timed = index == 0
            && timers
                .map(|t| t.get(color).contains_key(&piece.id))
                .unwrap_or(false);
        if !head_timed {
            frozen.push(piece.id.clone());
        }
    }
    frozen
}

pub fn frozen_view(board: &Board) -> ColorMap<Vec<String>> {
    ColorMap {
        white: derived_frozen(board, Color::White),
        black: derived_frozen(board, Color::Black),
    }
}

/// Shift expired heads. Each expiry starts the next head's window from the
/// moment the previous one lapsed, so a late poll drains the queue exactly
/// as real time did.
fn expire_pockets(b: &mut Board, now: u64) -> Vec<(Color, PieceKind)> {
    let mut expired = Vec::new();
    let (queues, timers) = match (b.pocketed_pieces.as_mut(), b.drop_timers.as_mut()) {
        (Some(queues), Some(timers)) => (queues, timers),
        _ => return expired,
    };
    for &color in &[Color::White, Color::Black] {
        let queue = queues.get_mut(color);
        let tmap = timers.get_mut(color);
        if queue.is_empty() {
            tmap.clear();
            continue;
        }
        loop {
            let head = match queue.front() {
                Some(head) => head.clone(),
                None => {
                    tmap.clear();
                    break;
                }
            };
            tmap.retain(|id, _| *id == head.id);
            match tmap.get(&head.id).copied() {
                Some(expiry) if expiry <= now => {
                    queue.pop_front();
                    tmap.remove(&head.id);
                    expired.push((color, head.kind));
                    if let Some(next) = queue.front() {
                        tmap.insert(next.id.clone(), expiry + DROP_TIME_LIMIT);
                    }
                }
                Some(_) => break,
                None => {
                    // A head without a timer can only come from legacy
                    // serialized state; give it a fresh window.
                    tmap.insert(head.id.clone(), now + DROP_TIME_LIMIT);
                    break;
                }
            }
        }
    }
    expired
}

fn droppable_head(b: &Board, color: Color, now: u64) -> Option<PieceKind> {
    let head = b.pocketed_pieces.as_ref()?.get(color).front()?.clone();
    let expiry = b.drop_timers.as_ref()?.get(color).get(&head.id).copied()?;
    if expiry > now {
        Some(head.kind)
    } else {
        None
    }
}

fn try_drop(
    b: &mut Board,
    pos: &mut Pos,
    color: Color,
    piece: PieceKind,
    to: &str,
    now: u64,
    expired: &[(Color, PieceKind)],
) -> Result<MoveRecord, MoveReply> {
    let queue = b
        .pocketed_pieces
        .as_ref()
        .expect("pocket queues initialized by ensure_variant_defaults")
        .get(color);
    let head = match queue.front() {
        Some(head) => head.clone(),
        None => {
            let code = if expired.iter().any(|(c, k)| *c == color && *k == piece) {
                ErrorCode::DropExpired
            } else {
                ErrorCode::PieceNotInPocket
            };
            return Err(reject(code, "that piece is no longer droppable"));
        }
    };
    if head.kind != piece {
        if expired.iter().any(|(c, k)| *c == color && *k == piece) {
            return Err(reject(
                ErrorCode::DropExpired,
                "the drop window for that piece has passed",
            ));
        }
        if queue.iter().any(|p| p.kind == piece) {
            return Err(reject(
                ErrorCode::SequentialDropOnly,
                "pocket pieces must be dropped in capture order",
            ));
        }
        return Err(reject(
            ErrorCode::PieceNotInPocket,
            "that piece is not in your pocket",
        ));
    }
    let expiry = b
        .drop_timers
        .as_ref()
        .and_then(|t| t.get(color).get(&head.id).copied());
    match expiry {
        Some(expiry) if expiry > now => {}
        _ => {
            return Err(reject(
                ErrorCode::DropExpired,
                "the drop window for that piece has passed",
            ))
        }
    }
    if let Err(code) = pos.drop_piece(color, piece, to) {
        let reason = match code {
            ErrorCode::SquareOccupied => "the target square is occupied",
            ErrorCode::InvalidPawnDrop => "pawns cannot be dropped on the back ranks",
            _ => "that drop would leave your king in check",
        };
        return Err(reject(code, reason));
    }
    let queues = b
        .pocketed_pieces
        .as_mut()
        .expect("pocket queues initialized by ensure_variant_defaults");
    let queue = queues.get_mut(color);
    queue.pop_front();
    let next_id = queue.front().map(|p| p.id.clone());
    if let Some(timers) = b.drop_timers.as_mut() {
        let tmap = timers.get_mut(color);
        tmap.remove(&head.id);
        if let Some(next_id) = next_id {
            tmap.insert(next_id, now + DROP_TIME_LIMIT);
        }
    }
    Ok(drop_record(color, piece, to, now))
}

fn try_move(
    b: &mut Board,
    pos: &mut Pos,
    color: Color,
    from: &str,
    to: &str,
    promotion: Option<PieceKind>,
    now: u64,
) -> Result<MoveRecord, MoveReply> {
    let applied = match pos.apply(from, to, promotion) {
        Some(applied) => applied,
        None => return Err(reject(ErrorCode::IllegalMove, "that move is not legal here")),
    };
    if let Some(captured) = applied.captured {
        b.captured_pieces.get_mut(color).push(captured);
        let kind = reverted_capture_kind(b, captured, to, &applied);
        let piece = PocketPiece {
            kind,
            id: format!("{}_{}", kind.as_char(), now),
            captured_at: now,
        };
        let queues = b
            .pocketed_pieces
            .as_mut()
            .expect("pocket queues initialized by ensure_variant_defaults");
        queues.get_mut(color).push_back(piece.clone());
        if let Some(timers) = b.drop_timers.as_mut() {
            let tmap = timers.get_mut(color);
            if tmap.is_empty() && queues.get(color).len() == 1 {
                tmap.insert(piece.id, now + DROP_TIME_LIMIT);
            }
        }
    }
    track_promoted(b, &applied, from, to);
    Ok(record_of(&applied, now))
}

fn repetition_key(b: &Board) -> String {
    let (white, black) = match b.pocketed_pieces.as_ref() {
        Some(queues) => (
            queues.white.iter().map(|p| p.kind).collect::<Vec<_>>(),
            queues.black.iter().map(|p| p.kind).collect::<Vec<_>>(),
        ),
        None => (Vec::new(), Vec::new()),
    };
    format!(
        "{}[{}][{}]",
        normalized_fen(&b.fen),
        pocket_string(&white),
        pocket_string(&black)
    )
}

fn terminal(b: &mut Board, pos: &Pos, rep: u32, mover: Color, now: u64) -> bool {
    let defender = mover.opponent();
    let defender_kinds = match droppable_head(b, defender, now) {
        Some(kind) => vec![kind],
        None => Vec::new(),
    };
    let defender_pocket_len = b
        .pocketed_pieces
        .as_ref()
        .map(|q| q.get(defender).len())
        .unwrap_or(0);
    if pos.is_checkmate() {
        if !defender_kinds.is_empty() && pos.has_saving_drop(defender, &defender_kinds) {
            return false;
        }
        b.end(EndReason::Checkmate, Some(mover), now);
        return true;
    }
    if pos.is_stalemate() {
        if defender_pocket_len > 0 {
            return false;
        }
        b.end(EndReason::Stalemate, None, now);
        return true;
    }
    let pockets_empty = b
        .pocketed_pieces
        .as_ref()
        .map(|q| q.white.is_empty() && q.black.is_empty())
        .unwrap_or(true);
    if pockets_empty && pos.is_insufficient_material() {
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
    false
}
