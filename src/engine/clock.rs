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

use crate::common::{Subvariant, Variant};

use super::board::Board;

#[derive(Clone, Copy, Debug)]
pub struct TimeControl {
    pub base: i64,
    pub increment: i64,
}

/// Base time and increment per variant. SixPointer's 30 s is a per-move
/// allowance, not a running main clock.
pub fn time_control(variant: Variant, subvariant: Option<Subvariant>) -> TimeControl {
    match (variant, subvariant) {
        (Variant::Classic, Some(Subvariant::Blitz)) => TimeControl {
            base: 180_000,
            increment: 2_000,
        },
        (Variant::Classic, Some(Subvariant::Bullet)) => TimeControl {
            base: 60_000,
            increment: 1_000,
        },
        (Variant::Classic, _) => TimeControl {
            base: 600_000,
            increment: 0,
        },
        (Variant::Crazyhouse, _) | (Variant::Decay, _) => TimeControl {
            base: 180_000,
            increment: 2_000,
        },
        (Variant::SixPointer, _) => TimeControl {
            base: 30_000,
            increment: 0,
        },
    }
}

/// Commit the elapsed turn time against the active side's clock. Returns
/// `true` when the flag fell: a clock at exactly zero has flagged, one
/// millisecond left has not. Clocks only run once the game has started.
pub fn deduct(board: &mut Board, now: u64) -> bool {
    if !board.game_started || board.game_ended {
        return false;
    }
    let elapsed = now.saturating_sub(board.turn_start_timestamp) as i64;
    if elapsed == 0 {
        return false;
    }
    let mover = board.active_color;
    let time = board.time_of_mut(mover);
    *time -= elapsed;
    board.turn_start_timestamp = now;
    if board.time_of(mover) <= 0 {
        *board.time_of_mut(mover) = 0;
        return true;
    }
    false
}

/// Fischer increment, credited to the mover after their move applies.
pub fn credit_increment(board: &mut Board) {
    let mover = board.active_color;
    let increment = board.increment;
    *board.time_of_mut(mover) += increment;
}
