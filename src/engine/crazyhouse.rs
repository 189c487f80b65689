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

use super::board::{normalized_fen, Board, MoveRecord};
use super::{
    finish_move, flag_fall, open_position, record_of, reject, valid, MoveInput, MoveReply,
    TimerUpdate,
};

pub(crate) fn validate_and_apply(
    board: &Board,
    mv: &MoveInput,
    color: Color,
    now: u64,
) -> MoveReply {
    let mut b = board.clone();
    b.ensure_variant_defaults(Variant::Crazyhouse, None);
    let mut pos = match open_position(&b, CastlingMode::Standard, color) {
        Ok(pos) => pos,
        Err(reply) => return reply,
    };
    if flag_fall(&mut b, now) {
        return valid(b, None);
    }
    let rec = match mv {
        MoveInput::Drop { piece, to, .. } => {
            match try_drop(&mut b, &mut pos, color, *piece, to, now) {
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
    super::main_clock_update(board, now)
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
    if square == "pocket" {
        let color = pos.side_to_move();
        let mut kinds: Vec<PieceKind> = board
            .pocket_pieces
            .as_ref()
            .map(|p| p.get(color).clone())
            .unwrap_or_default();
        kinds.sort_by_key(|k| k.as_char());
        kinds.dedup();
        return Ok(drop_moves(&pos, color, &kinds));
    }
    Ok(pos.moves_from(square))
}

fn try_drop(
    b: &mut Board,
    pos: &mut Pos,
    color: Color,
    piece: PieceKind,
    to: &str,
    now: u64,
) -> Result<MoveRecord, MoveReply> {
    let pocket = b
        .pocket_pieces
        .as_mut()
        .expect("pocket initialized by ensure_variant_defaults");
    let held = pocket.get(color).iter().position(|&k| k == piece);
    let index = match held {
        Some(index) => index,
        None => {
            return Err(reject(
                ErrorCode::PieceNotInPocket,
                "that piece is not in your pocket",
            ))
        }
    };
    if let Err(code) = pos.drop_piece(color, piece, to) {
        let reason = match code {
            ErrorCode::SquareOccupied => "the target square is occupied",
            ErrorCode::InvalidPawnDrop => "pawns cannot be dropped on the back ranks",
            _ => "that drop would leave your king in check",
        };
        return Err(reject(code, reason));
    }
    pocket.get_mut(color).remove(index);
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
        if let Some(pocket) = b.pocket_pieces.as_mut() {
            pocket.get_mut(color).push(kind);
        }
    }
    track_promoted(b, &applied, from, to);
    Ok(record_of(&applied, now))
}

/// What the capturer pockets: the captured kind, or a pawn if the taken
/// piece had been promoted. Clears the promoted marker either way.
pub(super) fn reverted_capture_kind(
    b: &mut Board,
    captured: PieceKind,
    to: &str,
    applied: &VerboseMove,
) -> PieceKind {
    let was_promoted = !applied.flags.contains('e')
        && b.promoted_squares
            .as_ref()
            .map(|s| s.iter().any(|sq| sq == to))
            .unwrap_or(false);
    if was_promoted {
        if let Some(squares) = b.promoted_squares.as_mut() {
            squares.retain(|sq| sq != to);
        }
        PieceKind::Pawn
    } else {
        captured
    }
}

/// Keep the promoted-square markers in step with the move that was just
/// applied: promotions create one, moving a marked piece carries it along.
pub(super) fn track_promoted(b: &mut Board, applied: &VerboseMove, from: &str, to: &str) {
    let squares = match b.promoted_squares.as_mut() {
        Some(squares) => squares,
        None => return,
    };
    if let Some(index) = squares.iter().position(|sq| sq == from) {
        squares[index] = to.to_string();
    }
    if applied.promotion.is_some() && !squares.iter().any(|sq| sq == to) {
        squares.push(to.to_string());
    }
}

pub(super) fn drop_record(color: Color, piece: PieceKind, to: &str, now: u64) -> MoveRecord {
    MoveRecord {
        color,
        from: None,
        to: to.to_string(),
        piece,
        captured: None,
        promotion: None,
        san: Some(format!("{}@{}", piece.as_char().to_ascii_uppercase(), to)),
        drop: true,
        timestamp: now,
    }
}

pub(super) fn drop_moves(pos: &Pos, color: Color, kinds: &[PieceKind]) -> Vec<VerboseMove> {
    let mut moves = Vec::new();
    for &kind in kinds {
        for square in pos.drop_squares(color, kind) {
            moves.push(VerboseMove {
                color,
                from: "pocket".to_string(),
                to: square.clone(),
                piece: kind,
                captured: None,
                promotion: None,
                san: format!("{}@{}", kind.as_char().to_ascii_uppercase(), square),
                flags: "d".to_string(),
            });
        }
    }
    moves
}

/// Crazyhouse repetition hashing folds the pocket composition into the
/// position key.
fn repetition_key(b: &Board) -> String {
    let empty = Vec::new();
    let (white, black) = match b.pocket_pieces.as_ref() {
        Some(pocket) => (&pocket.white, &pocket.black),
        None => (&empty, &empty),
    };
    format!(
        "{}[{}][{}]",
        normalized_fen(&b.fen),
        pocket_string(white),
        pocket_string(black)
    )
}

pub(super) fn pocket_string(pieces: &[PieceKind]) -> String {
    let mut chars: Vec<char> = pieces.iter().map(|k| k.as_char()).collect();
    chars.sort();
    chars.into_iter().collect()
}

/// Mate and stalemate must account for drops: a mated side with a pocket
/// may be able to block, and a stalemated side with a pocket still has
/// moves.
fn terminal(b: &mut Board, pos: &Pos, rep: u32, mover: Color, now: u64) -> bool {
    let defender = mover.opponent();
    let mut defender_kinds: Vec<PieceKind> = b
        .pocket_pieces
        .as_ref()
        .map(|p| p.get(defender).clone())
        .unwrap_or_default();
    defender_kinds.sort_by_key(|k| k.as_char());
    defender_kinds.dedup();
    if pos.is_checkmate() {
        if !defender_kinds.is_empty() && pos.has_saving_drop(defender, &defender_kinds) {
            return false;
        }
        b.end(EndReason::Checkmate, Some(mover), now);
        return true;
    }
    if pos.is_stalemate() {
        if !defender_kinds.is_empty() {
            return false;
        }
        b.end(EndReason::Stalemate, None, now);
        return true;
    }
    let pockets_empty = b
        .pocket_pieces
        .as_ref()
        .map(|p| p.white.is_empty() && p.black.is_empty())
        .unwrap_or(true);
    if pockets_empty && pos.is_insufficient_material() {
        b.end(EndReason::InsufficientMaterial, None, now);
        return true;
    }
    let halfmoves = pos.halfmove_clock();
    if halfmoves >= 150 {
        b.end(EndReason::SeventyFiveMoveRule, None, now);
        return true;
    }
    if halfmoves >= 100 {
        b.end(EndReason::FiftyMoveRule, None, now);
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
