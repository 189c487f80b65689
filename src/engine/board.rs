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

use std::collections::{HashMap, VecDeque};

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

use crate::chess;
use crate::common::{Color, ColorMap, EndReason, PieceKind, Subvariant, Variant};

use super::clock;

pub const START_FEN: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// SixPointer games open from one of these balanced middlegame positions.
pub const SIXPOINTER_START_FENS: &'static [&'static str] = &[
    "r1bqk1nr/pppp1ppp/2n5/2b1p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
    "r1bqkb1r/pppp1ppp/2n2n2/4p3/4P3/2N2N2/PPPP1PPP/R1BQKB1R w KQkq - 4 4",
    "rnbqkb1r/ppp2ppp/4pn2/3p4/2PP4/2N5/PP2PPPP/R1BQKBNR w KQkq - 2 4",
    "rnbqkb1r/1p2pppp/p2p1n2/8/3NP3/2N5/PPP2PPP/R1BQKB1R w KQkq - 0 6",
    "rnbqkb1r/ppp2ppp/4pn2/3p4/3P1B2/4P3/PPP2PPP/RN1QKBNR w KQkq - 0 4",
    "r1bqkb1r/pp2pppp/2n2n2/3p4/3P4/2PB4/PP3PPP/RNBQK1NR w KQkq - 1 6",
];

/// One applied move as it appears in histories and events. Drops have no
/// origin square.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub piece: PieceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
    #[serde(default)]
    pub drop: bool,
    pub timestamp: u64,
}

/// A pocketed piece in the timed Crazyhouse variant. The queue is strict
/// FIFO; only the head ever has a running drop timer.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PocketPiece {
    #[serde(rename = "type")]
    pub kind: PieceKind,
    pub id: String,
    pub captured_at: u64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayTimer {
    pub active: bool,
    pub frozen: bool,
    pub time_remaining: i64,
    pub move_count: u32,
    pub last_update_timestamp: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorPieceTimer {
    pub active: bool,
    pub frozen: bool,
    pub time_remaining: i64,
    pub move_count: u32,
    pub last_update_timestamp: u64,
    pub piece_type: PieceKind,
    pub piece_square: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecayTimers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queen: Option<DecayTimer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major_piece: Option<MajorPieceTimer>,
}

/// Variant-specific game state. The common fields apply to every variant;
/// the optional blocks belong to one variant each and are rehydrated from
/// their serialized form before an engine touches them.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub fen: String,
    pub active_color: Color,
    pub white_time: i64,
    pub black_time: i64,
    pub increment: i64,
    pub turn_start_timestamp: u64,
    #[serde(default)]
    pub last_move_timestamp: Option<u64>,
    #[serde(default)]
    pub move_history: Vec<MoveRecord>,
    #[serde(default)]
    pub position_history: Vec<String>,
    #[serde(default)]
    pub game_started: bool,
    #[serde(default)]
    pub game_ended: bool,
    #[serde(default)]
    pub end_reason: Option<EndReason>,
    #[serde(default)]
    pub winner_color: Option<Color>,
    #[serde(default)]
    pub ended_at: Option<u64>,
    #[serde(default)]
    pub captured_pieces: ColorMap<Vec<PieceKind>>,
    #[serde(default)]
    pub repetition_map: HashMap<String, u32>,
    // Crazyhouse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pocket_pieces: Option<ColorMap<Vec<PieceKind>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_squares: Option<Vec<String>>,
    // Crazyhouse with timer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pocketed_pieces: Option<ColorMap<VecDeque<PocketPiece>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_timers: Option<ColorMap<HashMap<String, u64>>>,
    // Decay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_timers: Option<ColorMap<DecayTimers>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_pieces: Option<ColorMap<Vec<String>>>,
    // SixPointer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moves_played: Option<ColorMap<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_moves: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<ColorMap<u32>>,
}

impl Board {
    /// Fresh state for a new session of the given variant.
    pub fn initial(variant: Variant, subvariant: Option<Subvariant>, now: u64) -> Self {
        let tc = clock::time_control(variant, subvariant);
        let fen = match (variant, subvariant) {
            (Variant::Classic, Some(Subvariant::Fischer)) => chess::random_fischer_fen(),
            (Variant::SixPointer, _) => SIXPOINTER_START_FENS
                .choose(&mut thread_rng())
                .expect("opening pool is never empty")
                .to_string(),
            _ => START_FEN.to_string(),
        };
        let mut board = Self {
            fen: fen.clone(),
            active_color: Color::White,
            white_time: tc.base,
            black_time: tc.base,
            increment: tc.increment,
            turn_start_timestamp: now,
            last_move_timestamp: None,
            move_history: Vec::new(),
            position_history: vec![fen.clone()],
            game_started: false,
            game_ended: false,
            end_reason: None,
            winner_color: None,
            ended_at: None,
            captured_pieces: ColorMap::default(),
            repetition_map: HashMap::new(),
            pocket_pieces: None,
            promoted_squares: None,
            pocketed_pieces: None,
            drop_timers: None,
            decay_active: None,
            decay_timers: None,
            frozen_pieces: None,
            moves_played: None,
            max_moves: None,
            points: None,
        };
        board.repetition_map.insert(normalized_fen(&fen), 1);
        board.ensure_variant_defaults(variant, subvariant);
        board
    }

    /// Make sure the variant's optional blocks exist. A board loaded from
    /// storage may predate a field; engines call this before reading any
    /// of them.
    pub fn ensure_variant_defaults(&mut self, variant: Variant, subvariant: Option<Subvariant>) {
        match (variant, subvariant) {
            (Variant::Crazyhouse, Some(Subvariant::WithTimer)) => {
                if self.pocketed_pieces.is_none() {
                    self.pocketed_pieces = Some(ColorMap::default());
                }
                if self.drop_timers.is_none() {
                    self.drop_timers = Some(ColorMap::default());
                }
                if self.promoted_squares.is_none() {
                    self.promoted_squares = Some(Vec::new());
                }
            }
            (Variant::Crazyhouse, _) => {
                if self.pocket_pieces.is_none() {
                    self.pocket_pieces = Some(ColorMap::default());
                }
                if self.promoted_squares.is_none() {
                    self.promoted_squares = Some(Vec::new());
                }
            }
            (Variant::Decay, _) => {
                if self.decay_active.is_none() {
                    self.decay_active = Some(false);
                }
                if self.decay_timers.is_none() {
                    self.decay_timers = Some(ColorMap::default());
                }
                if self.frozen_pieces.is_none() {
                    self.frozen_pieces = Some(ColorMap::default());
                }
            }
            (Variant::SixPointer, _) => {
                if self.moves_played.is_none() {
                    self.moves_played = Some(ColorMap::default());
                }
                if self.max_moves.is_none() {
                    self.max_moves = Some(super::sixpointer::MAX_MOVES);
                }
                if self.points.is_none() {
                    self.points = Some(ColorMap::default());
                }
            }
            (Variant::Classic, _) => {}
        }
    }

    pub fn time_of(&self, color: Color) -> i64 {
        match color {
            Color::White => self.white_time,
            Color::Black => self.black_time,
        }
    }

    pub fn time_of_mut(&mut self, color: Color) -> &mut i64 {
        match color {
            Color::White => &mut self.white_time,
            Color::Black => &mut self.black_time,
        }
    }

    /// Count one more occurrence of a repetition key and return the total.
    pub fn bump_repetition(&mut self, key: String) -> u32 {
        let count = self.repetition_map.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    pub fn end(&mut self, reason: EndReason, winner: Option<Color>, now: u64) {
        self.game_ended = true;
        self.end_reason = Some(reason);
        self.winner_color = winner;
        self.ended_at = Some(now);
    }
}

/// Repetition key for plain positions: piece placement, side to move,
/// castling rights and en-passant square. Clocks and counters excluded.
pub fn normalized_fen(fen: &str) -> String {
    fen.split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}
