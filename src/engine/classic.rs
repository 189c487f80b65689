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

use crate::chess::VerboseMove;
use crate::common::{Color, ErrorCode, Subvariant, Variant};

use super::board::{normalized_fen, Board};
use super::{
    castling_mode, classic_terminal, finish_move, flag_fall, open_position, record_of, reject,
    valid, MoveInput, MoveReply, TimerUpdate,
};

/// Plain chess under the subvariant's time control. Fischer random only
/// differs in its starting position and castling mode.
pub(crate) fn validate_and_apply(
    subvariant: Option<Subvariant>,
    board: &Board,
    mv: &MoveInput,
    color: Color,
    now: u64,
) -> MoveReply {
    let mode = castling_mode(Variant::Classic, subvariant);
    let mut b = board.clone();
    b.ensure_variant_defaults(Variant::Classic, subvariant);
    let mut pos = match open_position(&b, mode, color) {
        Ok(pos) => pos,
        Err(reply) => return reply,
    };
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
    let applied = match pos.apply(from, to, promotion) {
        Some(applied) => applied,
        None => return reject(ErrorCode::IllegalMove, "that move is not legal here"),
    };
    if let Some(captured) = applied.captured {
        b.captured_pieces.get_mut(color).push(captured);
    }
    let rec = record_of(&applied, now);
    finish_move(&mut b, &pos, rec.clone(), now);
    let rep = b.bump_repetition(normalized_fen(&b.fen));
    classic_terminal(&mut b, &pos, rep, color, now);
    valid(b, Some(rec))
}

pub(crate) fn update_timers(
    _subvariant: Option<Subvariant>,
    board: &Board,
    now: u64,
) -> TimerUpdate {
    super::main_clock_update(board, now)
}

pub(crate) fn moves_from(
    subvariant: Option<Subvariant>,
    board: &Board,
    square: &str,
) -> Result<Vec<VerboseMove>, (ErrorCode, String)> {
    if board.game_ended {
        return Ok(Vec::new());
    }
    let mode = castling_mode(Variant::Classic, subvariant);
    let pos = crate::chess::Pos::from_fen(&board.fen, mode)
        .map_err(|code| (code, "board position cannot be parsed".to_string()))?;
    Ok(pos.moves_from(square))
}
