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

pub mod data;
pub mod error;
pub mod event;
pub mod utils;

pub use data::{
    Color, ColorMap, ConnectionId, GameResult, MatchSource, PieceKind, Player, PlayerSummary,
    Rating, Ratings, SessionId, SessionStatus, Subvariant, TournamentId, UserId, Variant,
};
pub use error::{EndReason, Error, ErrorCode};
pub use event::Event;
