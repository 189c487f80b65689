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

use std::fmt;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::data::Color;

/// Stable error codes. The string forms are part of the client contract
/// and never change.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input
    InvalidInput,
    InvalidMove,
    InvalidPlayer,
    InvalidFen,
    MissingFen,
    InvalidObjectId,
    // Game-rule rejects. Reported as warnings, never mutate state.
    IllegalMove,
    WrongTurn,
    PieceFrozen,
    PieceNotInPocket,
    SequentialDropOnly,
    DropExpired,
    SquareOccupied,
    InvalidPawnDrop,
    MoveLimitExceeded,
    FoulPlay,
    // Terminal
    Timeout,
    Checkmate,
    Resignation,
    MutualAgreement,
    // Session
    GameNotFound,
    GameEnded,
    NotAPlayer,
    // Infrastructure
    DbError,
    ValidationError,
    DuplicateKey,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidMove => "INVALID_MOVE",
            ErrorCode::InvalidPlayer => "INVALID_PLAYER",
            ErrorCode::InvalidFen => "INVALID_FEN",
            ErrorCode::MissingFen => "MISSING_FEN",
            ErrorCode::InvalidObjectId => "INVALID_OBJECT_ID",
            ErrorCode::IllegalMove => "ILLEGAL_MOVE",
            ErrorCode::WrongTurn => "WRONG_TURN",
            ErrorCode::PieceFrozen => "PIECE_FROZEN",
            ErrorCode::PieceNotInPocket => "PIECE_NOT_IN_POCKET",
            ErrorCode::SequentialDropOnly => "SEQUENTIAL_DROP_ONLY",
            ErrorCode::DropExpired => "DROP_EXPIRED",
            ErrorCode::SquareOccupied => "SQUARE_OCCUPIED",
            ErrorCode::InvalidPawnDrop => "INVALID_PAWN_DROP",
            ErrorCode::MoveLimitExceeded => "MOVE_LIMIT_EXCEEDED",
            ErrorCode::FoulPlay => "FOUL_PLAY",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Checkmate => "CHECKMATE",
            ErrorCode::Resignation => "RESIGNATION",
            ErrorCode::MutualAgreement => "MUTUAL_AGREEMENT",
            ErrorCode::GameNotFound => "GAME_NOT_FOUND",
            ErrorCode::GameEnded => "GAME_ENDED",
            ErrorCode::NotAPlayer => "NOT_A_PLAYER",
            ErrorCode::DbError => "DB_ERROR",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::DuplicateKey => "DUPLICATE_KEY",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Rule-level rejects surface as warnings so the client can keep its
    /// local state; everything else goes down the error channel.
    pub fn is_rule_reject(self) -> bool {
        match self {
            ErrorCode::IllegalMove
            | ErrorCode::WrongTurn
            | ErrorCode::PieceFrozen
            | ErrorCode::PieceNotInPocket
            | ErrorCode::SequentialDropOnly
            | ErrorCode::DropExpired
            | ErrorCode::SquareOccupied
            | ErrorCode::InvalidPawnDrop
            | ErrorCode::MoveLimitExceeded
            | ErrorCode::FoulPlay => true,
            _ => false,
        }
    }
}

/// Why a game ended, terminal draws included.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FivefoldRepetition,
    FiftyMoveRule,
    SeventyFiveMoveRule,
    Timeout,
    Resignation,
    MutualAgreement,
    Points,
}

impl EndReason {
    pub fn result_for(self, winner: Option<Color>) -> super::data::GameResult {
        use super::data::GameResult;
        match winner {
            Some(Color::White) => GameResult::WhiteWin,
            Some(Color::Black) => GameResult::BlackWin,
            None => GameResult::Draw,
        }
    }
}

/// Error type shared by the store, the controller and the queues. Holds a
/// stable code plus a human-readable message; the message never carries
/// internals that shouldn't reach a client.
#[derive(Clone, Debug)]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    pub fn new<T: Into<String>>(code: ErrorCode, message: T) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(_: serde_json::Error) -> Self {
        Self::new(ErrorCode::InternalError, "serialization failed")
    }
}
