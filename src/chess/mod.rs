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

use std::num::NonZeroU32;

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::Uci;
use shakmaty::{
    CastlingMode, Chess, Color as EngineColor, EnPassantMode, FromSetup, Move, Piece, Position,
    Rank, Role, Square,
};

use crate::common::{Color, ErrorCode, PieceKind};

/// A parsed position. Thin façade over the embedded rule engine; everything
/// the variant engines need from plain chess goes through here.
#[derive(Clone)]
pub struct Pos {
    inner: Chess,
    mode: CastlingMode,
}

/// A legal move with every field a client needs to render it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerboseMove {
    pub color: Color,
    pub from: String,
    pub to: String,
    pub piece: PieceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured: Option<PieceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PieceKind>,
    pub san: String,
    pub flags: String,
}

impl Pos {
    pub fn from_fen(fen: &str, mode: CastlingMode) -> Result<Self, ErrorCode> {
        let parsed = Fen::from_ascii(fen.trim().as_bytes()).map_err(|_| ErrorCode::InvalidFen)?;
        let inner: Chess = parsed
            .into_position(mode)
            .map_err(|_| ErrorCode::InvalidFen)?;
        Ok(Self { inner, mode })
    }

    pub fn fen(&self) -> String {
        Fen::from_position(self.inner.clone(), EnPassantMode::Legal).to_string()
    }

    pub fn side_to_move(&self) -> Color {
        color_from(self.inner.turn())
    }

    pub fn legal_moves(&self) -> Vec<VerboseMove> {
        self.inner
            .legal_moves()
            .iter()
            .map(|m| self.verbose(m))
            .collect()
    }

    /// Legal moves originating at `square`.
    pub fn moves_from(&self, square: &str) -> Vec<VerboseMove> {
        let sq = match parse_square(square) {
            Some(sq) => sq,
            None => return Vec::new(),
        };
        self.inner
            .legal_moves()
            .iter()
            .filter(|m| m.from() == Some(sq))
            .map(|m| self.verbose(m))
            .collect()
    }

    /// Resolve a from/to pair (castling included) to a legal move, or
    /// `None` if no such move exists in this position.
    pub fn find_move(&self, from: &str, to: &str, promotion: Option<PieceKind>) -> Option<Move> {
        let uci = Uci::Normal {
            from: parse_square(from)?,
            to: parse_square(to)?,
            promotion: promotion.map(role_to),
        };
        uci.to_move(&self.inner).ok()
    }

    /// Apply a move in place, returning its verbose form. `None` means the
    /// move is illegal; the position is untouched in that case.
    pub fn apply(&mut self, from: &str, to: &str, promotion: Option<PieceKind>) -> Option<VerboseMove> {
        let m = self.find_move(from, to, promotion)?;
        let verbose = self.verbose(&m);
        self.inner.play_unchecked(&m);
        Some(verbose)
    }

    /// Verbose form of a candidate move without applying it.
    pub fn preview(&self, from: &str, to: &str, promotion: Option<PieceKind>) -> Option<VerboseMove> {
        let m = self.find_move(from, to, promotion)?;
        Some(self.verbose(&m))
    }

    pub fn piece_at(&self, square: &str) -> Option<(Color, PieceKind)> {
        let sq = parse_square(square)?;
        let piece = self.inner.board().piece_at(sq)?;
        Some((color_from(piece.color), kind_from(piece.role)))
    }

    /// Put a piece on an empty square without passing the turn. Used by the
    /// Crazyhouse engines; the caller keeps FEN and pocket in sync.
    pub fn place(&mut self, color: Color, kind: PieceKind, square: &str) -> Result<(), ErrorCode> {
        let sq = parse_square(square).ok_or(ErrorCode::InvalidInput)?;
        if self.inner.board().piece_at(sq).is_some() {
            return Err(ErrorCode::SquareOccupied);
        }
        let mut setup = self.inner.clone().into_setup(EnPassantMode::Legal);
        setup.board.set_piece_at(
            sq,
            Piece {
                color: color_to(color),
                role: role_to(kind),
            },
        );
        self.inner = rebuild(setup, self.mode).ok_or(ErrorCode::IllegalMove)?;
        Ok(())
    }

    /// Execute a Crazyhouse drop: place the piece, verify the dropper is
    /// not left in check, then hand the move to the opponent.
    pub fn drop_piece(
        &mut self,
        color: Color,
        kind: PieceKind,
        square: &str,
    ) -> Result<(), ErrorCode> {
        let sq = parse_square(square).ok_or(ErrorCode::InvalidInput)?;
        if self.inner.board().piece_at(sq).is_some() {
            return Err(ErrorCode::SquareOccupied);
        }
        if kind == PieceKind::Pawn && is_back_rank(sq) {
            return Err(ErrorCode::InvalidPawnDrop);
        }
        let mut setup = self.inner.clone().into_setup(EnPassantMode::Legal);
        setup.board.set_piece_at(
            sq,
            Piece {
                color: color_to(color),
                role: role_to(kind),
            },
        );
        // Probe with the turn unchanged: if the dropper's king is still
        // attacked, the drop does not resolve the check and is illegal.
        let probe = rebuild(setup.clone(), self.mode).ok_or(ErrorCode::IllegalMove)?;
        if probe.is_check() {
            return Err(ErrorCode::IllegalMove);
        }
        setup.turn = !setup.turn;
        setup.ep_square = None;
        setup.halfmoves = if kind == PieceKind::Pawn {
            0
        } else {
            setup.halfmoves.saturating_add(1)
        };
        if color == Color::Black {
            setup.fullmoves = NonZeroU32::new(setup.fullmoves.get() + 1).unwrap_or(setup.fullmoves);
        }
        self.inner = rebuild(setup, self.mode).ok_or(ErrorCode::IllegalMove)?;
        Ok(())
    }

    /// Flip the side to move without making a move. Used by SixPointer when
    /// a per-move timer runs out.
    pub fn pass_turn(&mut self) -> Result<(), ErrorCode> {
        let mut setup = self.inner.clone().into_setup(EnPassantMode::Legal);
        setup.turn = !setup.turn;
        setup.ep_square = None;
        self.inner = rebuild(setup, self.mode).ok_or(ErrorCode::InternalError)?;
        Ok(())
    }

    /// Whether `color`, currently to move and possibly in check, has any
    /// drop from `kinds` that leaves their king safe. Used by the
    /// Crazyhouse engines for drop-aware mate and stalemate detection.
    pub fn has_saving_drop(&self, color: Color, kinds: &[PieceKind]) -> bool {
        for sq in Square::ALL.iter() {
            if self.inner.board().piece_at(*sq).is_some() {
                continue;
            }
            for &kind in kinds {
                if kind == PieceKind::Pawn && is_back_rank(*sq) {
                    continue;
                }
                let mut probe = self.clone();
                if probe.place(color, kind, &sq.to_string()).is_ok() && !probe.in_check() {
                    return true;
                }
            }
        }
        false
    }

    /// Empty squares a piece of `kind` may be dropped on, self-check
    /// filtering included.
    pub fn drop_squares(&self, color: Color, kind: PieceKind) -> Vec<String> {
        let mut squares = Vec::new();
        for sq in Square::ALL.iter() {
            if self.inner.board().piece_at(*sq).is_some() {
                continue;
            }
            if kind == PieceKind::Pawn && is_back_rank(*sq) {
                continue;
            }
            let mut probe = self.clone();
            if probe.place(color, kind, &sq.to_string()).is_ok() && !probe.in_check() {
                squares.push(sq.to_string());
            }
        }
        squares
    }

    pub fn in_check(&self) -> bool {
        self.inner.is_check()
    }

    pub fn is_checkmate(&self) -> bool {
        self.inner.is_checkmate()
    }

    pub fn is_stalemate(&self) -> bool {
        self.inner.is_stalemate()
    }

    pub fn is_insufficient_material(&self) -> bool {
        self.inner.is_insufficient_material()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.inner.halfmoves()
    }

    fn verbose(&self, m: &Move) -> VerboseMove {
        let (from, to, promotion) = match m.to_uci(self.mode) {
            Uci::Normal {
                from,
                to,
                promotion,
            } => (from.to_string(), to.to_string(), promotion.map(kind_from)),
            _ => (String::new(), String::new(), None),
        };
        VerboseMove {
            color: color_from(self.inner.turn()),
            from,
            to,
            piece: kind_from(m.role()),
            captured: m.capture().map(kind_from),
            promotion,
            san: San::from_move(&self.inner, m).to_string(),
            flags: flags_of(m),
        }
    }
}

/// Chess960 back ranks: bishops on opposite colors, king between the
/// rooks. Yields exactly the 960 legal arrangements.
pub fn chess960_back_ranks() -> Vec<[Role; 8]> {
    let mut ranks = Vec::with_capacity(960);
    for &b1 in &[0usize, 2, 4, 6] {
        for &b2 in &[1usize, 3, 5, 7] {
            for q in 0..8 {
                if q == b1 || q == b2 {
                    continue;
                }
                let open: Vec<usize> = (0..8).filter(|&i| i != b1 && i != b2 && i != q).collect();
                for i in 0..open.len() {
                    for j in (i + 1)..open.len() {
                        let mut rank = [Role::Pawn; 8];
                        rank[b1] = Role::Bishop;
                        rank[b2] = Role::Bishop;
                        rank[q] = Role::Queen;
                        rank[open[i]] = Role::Knight;
                        rank[open[j]] = Role::Knight;
                        let rest: Vec<usize> = open
                            .iter()
                            .copied()
                            .filter(|&s| s != open[i] && s != open[j])
                            .collect();
                        rank[rest[0]] = Role::Rook;
                        rank[rest[1]] = Role::King;
                        rank[rest[2]] = Role::Rook;
                        ranks.push(rank);
                    }
                }
            }
        }
    }
    ranks
}

pub fn random_fischer_fen() -> String {
    let ranks = chess960_back_ranks();
    let rank = ranks
        .choose(&mut thread_rng())
        .expect("back rank set is never empty");
    let mut fen = String::new();
    for r in rank.iter() {
        fen.push(r.char());
    }
    fen.push_str("/pppppppp/8/8/8/8/PPPPPPPP/");
    for r in rank.iter() {
        fen.push(r.upper_char());
    }
    fen.push_str(" w KQkq - 0 1");
    fen
}

// Helper functions

pub fn parse_square(square: &str) -> Option<Square> {
    square.trim().to_ascii_lowercase().parse::<Square>().ok()
}

pub fn is_back_rank(square: Square) -> bool {
    square.rank() == Rank::First || square.rank() == Rank::Eighth
}

pub fn color_from(color: EngineColor) -> Color {
    match color {
        EngineColor::White => Color::White,
        EngineColor::Black => Color::Black,
    }
}

pub fn color_to(color: Color) -> EngineColor {
    match color {
        Color::White => EngineColor::White,
        Color::Black => EngineColor::Black,
    }
}

pub fn kind_from(role: Role) -> PieceKind {
    match role {
        Role::Pawn => PieceKind::Pawn,
        Role::Knight => PieceKind::Knight,
        Role::Bishop => PieceKind::Bishop,
        Role::Rook => PieceKind::Rook,
        Role::Queen => PieceKind::Queen,
        Role::King => PieceKind::King,
    }
}

pub fn role_to(kind: PieceKind) -> Role {
    match kind {
        PieceKind::Pawn => Role::Pawn,
        PieceKind::Knight => Role::Knight,
        PieceKind::Bishop => Role::Bishop,
        PieceKind::Rook => Role::Rook,
        PieceKind::Queen => Role::Queen,
        PieceKind::King => Role::King,
    }
}

fn rebuild(setup: shakmaty::Setup, mode: CastlingMode) -> Option<Chess> {
    Chess::from_setup(setup, mode)
        .or_else(|e| e.ignore_too_much_material())
        .or_else(|e| e.ignore_impossible_check())
        .ok()
}

fn flags_of(m: &Move) -> String {
    let mut flags = String::new();
    if m.is_en_passant() {
        flags.push('e');
    } else if m.is_capture() {
        flags.push('c');
    }
    if m.is_promotion() {
        flags.push('p');
    }
    if let Move::Castle { king, rook } = m {
        if rook.file() > king.file() {
            flags.push('k');
        } else {
            flags.push('q');
        }
    }
    if let (Some(from), Move::Normal { role: Role::Pawn, to, .. }) = (m.from(), m) {
        if (from.rank() as i32 - to.rank() as i32).abs() == 2 {
            flags.push('b');
        }
    }
    if flags.is_empty() {
        flags.push('n');
    }
    flags
}
