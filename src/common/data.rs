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

use super::utils::{rand_session_id, rand_tournament_id};

/// A unique ID which identifies a game session.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(rand_session_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for SessionId {
    fn from(t: T) -> Self {
        Self(t.into())
    }
}

/// A globally unique user ID. Issued by the account system, opaque here.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for UserId {
    fn from(t: T) -> Self {
        Self(t.into())
    }
}

/// Identifies one live client connection. A user reconnecting gets a fresh
/// connection ID; queue entries hold on to the one they joined with.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ConnectionId(String);

impl<T: Into<String>> From<T> for ConnectionId {
    fn from(t: T) -> Self {
        Self(t.into())
    }
}

/// Identifies a tournament.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TournamentId(String);

impl TournamentId {
    pub fn new() -> Self {
        Self(rand_tournament_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for TournamentId {
    fn from(t: T) -> Self {
        Self(t.into())
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// A pair of per-color values. Used for clocks, pockets, captured pieces,
/// decay timers and everything else the board keeps per side.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorMap<T> {
    pub white: T,
    pub black: T,
}

impl<T> ColorMap<T> {
    pub fn get(&self, color: Color) -> &T {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn get_mut(&mut self, color: Color) -> &mut T {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Classic,
    Crazyhouse,
    Decay,
    SixPointer,
}

/// Refinement of `Classic` (standard, blitz, bullet, fischer) or
/// `Crazyhouse` (standard, withTimer). The other variants carry none.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Subvariant {
    Standard,
    Blitz,
    Bullet,
    Fischer,
    WithTimer,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum PieceKind {
    #[serde(rename = "p")]
    Pawn,
    #[serde(rename = "n")]
    Knight,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "k")]
    King,
}

impl PieceKind {
    pub fn as_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    /// Material value used for SixPointer scoring.
    pub fn value(self) -> u32 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight => 3,
            PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }

    pub fn is_major(self) -> bool {
        match self {
            PieceKind::Rook | PieceKind::Knight | PieceKind::Bishop => true,
            _ => false,
        }
    }
}

/// Per-variant rating entry. Classic nests a rating per subvariant, the
/// other variants hold a flat number.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rating {
    Flat(f64),
    BySubvariant(HashMap<Subvariant, f64>),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Ratings(pub HashMap<Variant, Rating>);

impl Ratings {
    pub fn get(&self, variant: Variant, subvariant: Option<Subvariant>) -> Option<f64> {
        match self.0.get(&variant)? {
            Rating::Flat(r) => Some(*r),
            Rating::BySubvariant(map) => subvariant.and_then(|s| map.get(&s).copied()),
        }
    }
}

/// Matchmaking input: who is asking to play, and at which strength.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub user_id: UserId,
    pub name: String,
    pub ratings: Ratings,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Player {
    pub fn summary(&self, rating: f64) -> PlayerSummary {
        PlayerSummary {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            rating,
            avatar: self.avatar.clone(),
            title: self.title.clone(),
        }
    }
}

/// The slice of a player embedded in a session and in match events.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub user_id: UserId,
    pub name: String,
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// How a player entered their session.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Matchmaking,
    Tournament,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finished,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
}
