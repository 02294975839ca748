// Copyright 2023 Tobin Edwards
//
//    Licensed under the Apache License, Version 2.0 (the "License");
//    you may not use this file except in compliance with the License.
//    You may obtain a copy of the License at
//
//        http://www.apache.org/licenses/LICENSE-2.0
//
//    Unless required by applicable law or agreed to in writing, software
//    distributed under the License is distributed on an "AS IS" BASIS,
//    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//    See the License for the specific language governing permissions and
//    limitations under the License.

use anyhow::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use strum::IntoEnumIterator;
use thiserror::Error;

use super::material::{Color, Piece};
use super::position::{between, blocked, shielded};
use super::position::{MoveId, Pos, Position};
use super::position::{ALL_LINES, DIAGONALS, HORIZONTALS};
use super::square::{Direction, File, Mask, Offset, Rank, Square};
use super::Turn;

use Color::*;
use Piece::*;
use Rank::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("Not a legal move: {from}{to}")]
    IllegalMove { from: Square, to: Square },
    #[error("Not a legal move in this position: {0:?}")]
    InvalidSan(String),
}

/// A position together with the attack, check and pin information
/// needed to generate legal moves for the side to move.
#[derive(Debug, Clone)]
pub struct MoveState {
    position: Position,
    checks: Mask,
    evasions: Mask,
    attackers: [Mask; 64],
    pinned: [Option<Mask>; 64],
}

impl Default for MoveState {
    fn default() -> Self {
        Self::new(Position::default())
    }
}
impl Turn for MoveState {
    fn turn(&self) -> Color {
        self.position.turn()
    }
}

impl AsRef<Self> for MoveState {
    fn as_ref(&self) -> &Self {
        self
    }
}

impl AsRef<Position> for MoveState {
    fn as_ref(&self) -> &Position {
        &self.position
    }
}

impl Pos for MoveState {}

impl LegalMoves for MoveState {}

impl From<MoveState> for Position {
    fn from(value: MoveState) -> Self {
        value.position
    }
}

impl MoveState {
    pub fn new(position: Position) -> Self {
        let mut result = Self {
            position,
            checks: Mask::empty(),
            evasions: Mask::all(),
            attackers: [Mask::empty(); 64],
            pinned: [None; 64],
        };
        result.init();
        result
    }

    pub fn apply_move(&mut self, mv: LegalMove) -> MoveId {
        let move_id = self.position.apply_move(mv);
        self.reset();
        move_id
    }

    #[inline]
    pub fn is_check(&self) -> bool {
        !self.checks.is_empty()
    }
    #[inline]
    pub fn is_double_check(&self) -> bool {
        self.checks.len() > 1
    }
    #[inline]
    pub fn is_attacked(&self, square: Square) -> bool {
        !self.attackers(square).is_empty()
    }
    #[inline]
    pub fn checks(&self) -> Mask {
        self.checks
    }
    /// Destinations that resolve a single check: capturing the checker or
    /// interposing. All squares when not in check.
    #[inline]
    pub fn evasions(&self) -> Mask {
        self.evasions
    }
    #[inline]
    pub fn attackers(&self, square: Square) -> Mask {
        self.attackers[square]
    }
    #[inline]
    pub fn pinned(&self, square: Square) -> Option<Mask> {
        self.pinned[square]
    }

    pub fn is_lane_blocked(&self, lane: Mask) -> bool {
        !(lane & self.occupied()).is_empty()
    }

    pub fn is_lane_attacked(&self, lane: Mask) -> bool {
        lane.iter().any(|square| self.is_attacked(square))
    }

    fn reset(&mut self) {
        self.checks = Mask::empty();
        self.evasions = Mask::all();
        self.attackers = [Mask::empty(); 64];
        self.pinned = [None; 64];
        self.init();
    }

    fn init(&mut self) {
        for from in self.theirs().iter() {
            for to in attacked_from(&self.position, from).iter() {
                self.attackers[to] |= from;
            }
        }
        let king = self.our_king();
        self.checks = self.attackers(king);
        self.evasions = match self.checks.len() {
            0 => Mask::all(),
            1 => self
                .checks
                .iter()
                .fold(self.checks, |mask, checker| mask | between(checker, king)),
            _ => Mask::empty(),
        };
        for from in self.their_line_pieces().iter() {
            let aligned = match self.contents(from).map(|m| m.piece()) {
                Some(Rook) => HORIZONTALS[from].contains(king),
                Some(Bishop) => DIAGONALS[from].contains(king),
                Some(Queen) => ALL_LINES[from].contains(king),
                _ => false,
            };
            if !aligned {
                continue;
            }
            let lane = between(from, king);
            let blockers = lane & self.occupied();
            if blockers.len() == 1 && !(blockers & self.ours()).is_empty() {
                for square in blockers.iter() {
                    self.pinned[square] = Some(lane | from);
                }
            }
        }
    }

    fn exclude_blocked_moves(&self, from: Square, mut mask: Mask) -> Mask {
        let ours: Mask = self.ours() & mask;
        for square in ours.iter() {
            // exclude squares blocked by our own pieces
            mask &= !blocked(from, square);
        }
        let theirs: Mask = self.theirs() & mask;
        for square in theirs.iter() {
            // exclude squares shielded by their pieces
            mask &= !shielded(from, square);
        }
        mask
    }

    /// Whether the side to move would still have its king safe after `mv`.
    fn leaves_king_safe(&self, mv: LegalMove) -> bool {
        let us = self.turn();
        let mut next = self.position.clone();
        next.apply_move(mv);
        let king = next.occupied_by(us) & next.kings();
        next.occupied_by(!us)
            .iter()
            .all(|from| (attacked_from(&next, from) & king).is_empty())
    }
}

/// Squares attacked by the piece on `from`, stopping line pieces at the
/// first occupied square (which is itself attacked, whatever its color).
fn attacked_from(position: &Position, from: Square) -> Mask {
    let Some(material) = position.contents(from) else {
        return Mask::empty();
    };
    let lines = |mut mask: Mask| {
        for square in (position.occupied() & mask).iter() {
            mask &= !shielded(from, square);
        }
        mask
    };
    match material.piece() {
        King => KING_MOVES[from],
        Queen => lines(QUEEN_MOVES[from]),
        Rook => lines(ROOK_MOVES[from]),
        Bishop => lines(BISHOP_MOVES[from]),
        Knight => KNIGHT_MOVES[from],
        Pawn => match material.color() {
            White => WHITE_PAWN_ATTACKS[from],
            Black => BLACK_PAWN_ATTACKS[from],
        },
    }
}

pub trait LegalMoves: AsRef<Position> + AsRef<MoveState> {
    /// Resolves a from/to request into a legal move. For a pawn reaching
    /// the last rank the promotion piece comes from `mv.promotion` and
    /// defaults to a queen. The promotion is ignored for any other move.
    fn validate_move(&self, mv: Move) -> Result<LegalMove> {
        let illegal = MoveError::IllegalMove {
            from: mv.from,
            to: mv.to,
        };
        let legal = self
            .legal_moves(mv.from)
            .get(mv.to)
            .ok_or(illegal)?;
        Ok(match legal {
            LegalMove::Promoting(from, to, _) => {
                LegalMove::Promoting(from, to, mv.promotion.unwrap_or(Promotion::Queen))
            }
            other => other,
        })
    }

    fn has_any_legal_move(&self) -> bool {
        let pos: &Position = self.as_ref();
        pos.ours()
            .iter()
            .any(|from| !self.legal_moves(from).destinations().is_empty())
    }

    fn legal_moves(&self, from: Square) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let pos: &Position = self.as_ref();
        if let Some(material) = pos.contents(from) {
            if material.color() == pos.turn() {
                result = match material.piece() {
                    King => self.all_king_moves(from),
                    Queen => self.all_line_moves(from, QUEEN_MOVES[from]),
                    Rook => self.all_line_moves(from, ROOK_MOVES[from]),
                    Bishop => self.all_line_moves(from, BISHOP_MOVES[from]),
                    Knight => self.all_knight_moves(from),
                    Pawn => self.all_pawn_moves(from),
                }
            }
        }
        result
    }

    fn all_king_moves(&self, from: Square) -> MoveSet<LegalMove> {
        self.standard_king_moves(from) | self.short_castle_moves() | self.long_castle_moves()
    }

    fn standard_king_moves(&self, from: Square) -> MoveSet<LegalMove> {
        let state: &MoveState = self.as_ref();
        let mut destinations = KING_MOVES[from] & !state.ours();
        let mut result = MoveSet::new();
        let line_attackers = state.attackers(from) & state.line_pieces();
        for square in line_attackers.iter() {
            // exclude squares that would be attacked if they weren't
            // shielded by the king
            destinations &= !shielded(square, from);
        }
        for dest in destinations.iter() {
            if !state.is_attacked(dest) {
                result.insert(dest, LegalMove::Standard(from, dest));
            }
        }
        result
    }

    fn short_castle_moves(&self) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        let pos: &Position = self.as_ref();
        let castling = pos.our_castling();
        if castling.oo()
            && !state.is_check()
            && !state.is_lane_blocked(castling.oo_blocking_lane())
            && !state.is_lane_attacked(castling.oo_attacking_lane())
        {
            result.insert(castling.oo_king_dest(), LegalMove::ShortCastle);
        }
        result
    }

    fn long_castle_moves(&self) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        let pos: &Position = self.as_ref();
        let castling = pos.our_castling();
        if castling.ooo()
            && !state.is_check()
            && !state.is_lane_blocked(castling.ooo_blocking_lane())
            && !state.is_lane_attacked(castling.ooo_attacking_lane())
        {
            result.insert(castling.ooo_king_dest(), LegalMove::LongCastle);
        }
        result
    }

    fn all_line_moves(&self, from: Square, mut destinations: Mask) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        // restrict movement if pinned
        if let Some(lane) = state.pinned(from) {
            destinations &= lane;
        }
        let destinations = state.exclude_blocked_moves(from, destinations) & state.evasions();
        for dest in destinations.iter() {
            result.insert(dest, LegalMove::Standard(from, dest));
        }
        result
    }

    fn all_knight_moves(&self, from: Square) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        if state.pinned(from).is_none() {
            let destinations = KNIGHT_MOVES[from] & !state.ours() & state.evasions();
            for dest in destinations.iter() {
                result.insert(dest, LegalMove::Standard(from, dest))
            }
        }
        result
    }

    fn all_pawn_moves(&self, from: Square) -> MoveSet<LegalMove> {
        self.standard_pawn_moves(from)
            | self.double_advance_moves(from)
            | self.en_passant_moves(from)
    }

    fn standard_pawn_moves(&self, from: Square) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        let pos: &Position = self.as_ref();
        let (mut advances, mut captures) = match pos.turn() {
            White => (WHITE_SINGLE_ADVANCES[from], WHITE_PAWN_ATTACKS[from]),
            Black => (BLACK_SINGLE_ADVANCES[from], BLACK_PAWN_ATTACKS[from]),
        };
        // restrict movement if pinned
        if let Some(lane) = state.pinned(from) {
            advances &= lane;
            captures &= lane;
        }
        // double advances are handled by `double_advance_moves`
        advances &= !pos.occupied();
        captures &= pos.theirs();
        let destinations = (advances | captures) & state.evasions();
        let last_rank = Rank::back_rank(!pos.turn());
        for dest in destinations.iter() {
            if dest.rank() == last_rank {
                result.insert(dest, LegalMove::Promoting(from, dest, Promotion::Queen));
            } else {
                result.insert(dest, LegalMove::Standard(from, dest));
            }
        }
        result
    }

    fn double_advance_moves(&self, from: Square) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        let pos: &Position = self.as_ref();
        let mut destinations = match pos.turn() {
            White => WHITE_DOUBLE_ADVANCES[from],
            Black => BLACK_DOUBLE_ADVANCES[from],
        };
        if let Some(lane) = state.pinned(from) {
            destinations &= lane;
        }
        destinations &= !pos.occupied() & state.evasions();
        for dest in destinations.iter() {
            if (between(from, dest) & pos.occupied()).is_empty() {
                result.insert(dest, LegalMove::DoubleAdvance(from, dest));
            }
        }
        result
    }

    fn en_passant_moves(&self, from: Square) -> MoveSet<LegalMove> {
        let mut result = MoveSet::new();
        let state: &MoveState = self.as_ref();
        let pos: &Position = self.as_ref();
        if let Some(target) = pos.en_passant() {
            let destinations = match pos.turn() {
                White => WHITE_PAWN_ATTACKS[from],
                Black => BLACK_PAWN_ATTACKS[from],
            };
            if destinations.contains(target) {
                // Two pawns leave the rank at once, so pins and checks are
                // settled by playing the capture out.
                let mv = LegalMove::EnPassant(from, target);
                if state.leaves_king_safe(mv) {
                    result.insert(target, mv);
                }
            }
        }
        result
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Promotion>,
}

impl Move {
    pub fn new(from: Square, to: Square, promotion: Option<Promotion>) -> Self {
        Self {
            from,
            to,
            promotion,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Promotion {
    #[default]
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl From<Promotion> for Piece {
    fn from(value: Promotion) -> Self {
        match value {
            Promotion::Queen => Piece::Queen,
            Promotion::Rook => Piece::Rook,
            Promotion::Bishop => Piece::Bishop,
            Promotion::Knight => Piece::Knight,
        }
    }
}

impl TryFrom<Piece> for Promotion {
    type Error = Piece;

    fn try_from(value: Piece) -> std::result::Result<Self, Self::Error> {
        match value {
            Piece::Queen => Ok(Promotion::Queen),
            Piece::Rook => Ok(Promotion::Rook),
            Piece::Bishop => Ok(Promotion::Bishop),
            Piece::Knight => Ok(Promotion::Knight),
            other => Err(other),
        }
    }
}

impl fmt::Display for Promotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let piece: Piece = (*self).into();
        write!(f, "{}", piece.to_char())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegalMove {
    Standard(Square, Square),
    DoubleAdvance(Square, Square),
    EnPassant(Square, Square),
    Promoting(Square, Square, Promotion),
    ShortCastle,
    LongCastle,
}

/// Legal moves of one piece, keyed by destination square.
#[derive(Debug, Clone)]
pub struct MoveSet<T> {
    destinations: Mask,
    map: HashMap<Square, T>,
}

impl<T: Copy> MoveSet<T> {
    pub fn new() -> Self {
        Self {
            destinations: Mask::empty(),
            map: HashMap::new(),
        }
    }
    pub fn insert(&mut self, dest: Square, mv: T) {
        self.destinations |= dest;
        self.map.insert(dest, mv);
    }
    pub fn destinations(&self) -> Mask {
        self.destinations
    }
    pub fn get(&self, dest: Square) -> Option<T> {
        self.map.get(&dest).copied()
    }
    pub fn contains(&self, dest: Square) -> bool {
        self.destinations.contains(dest)
    }
}

impl<T: Copy> Default for MoveSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: Copy> BitOr for MoveSet<T> {
    type Output = Self;
    fn bitor(mut self, rhs: Self) -> Self::Output {
        self |= rhs;
        self
    }
}

impl<T: Copy> BitOrAssign for MoveSet<T> {
    fn bitor_assign(&mut self, rhs: Self) {
        for (dest, mv) in rhs.map {
            self.insert(dest, mv);
        }
    }
}

static KING_MOVES: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        array[square] = Mask::from_squares(Direction::iter().filter_map(|dir| square + dir));
    }
    array
});

static QUEEN_MOVES: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        array[square] = !square.to_mask() & ALL_LINES[square];
    }
    array
});

static ROOK_MOVES: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        array[square] = !square.to_mask() & HORIZONTALS[square];
    }
    array
});

static BISHOP_MOVES: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        array[square] = !square.to_mask() & DIAGONALS[square];
    }
    array
});

static KNIGHT_MOVES: Lazy<[Mask; 64]> = Lazy::new(|| {
    const OFFSETS: [Offset; 8] = [
        Offset::new(-2, -1),
        Offset::new(-2, 1),
        Offset::new(2, -1),
        Offset::new(2, 1),
        Offset::new(-1, -2),
        Offset::new(-1, 2),
        Offset::new(1, -2),
        Offset::new(1, 2),
    ];
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        array[square] =
            Mask::from_squares(OFFSETS.into_iter().filter_map(|offset| square + offset));
    }
    array
});

fn single_advances(step: Offset) -> [Mask; 64] {
    let mut array = [Mask::empty(); 64];
    for square in Square::iter() {
        if matches!(square.rank(), Rank1 | Rank8) {
            continue;
        }
        if let Some(dest) = square + step {
            array[square] = dest.to_mask();
        }
    }
    array
}

fn double_advances(start: Rank, step: Offset) -> [Mask; 64] {
    let mut array = [Mask::empty(); 64];
    for file in File::iter() {
        let square = Square::new(file, start);
        if let Some(dest) = square + step {
            array[square] = dest.to_mask();
        }
    }
    array
}

fn pawn_attacks(offsets: [Offset; 2]) -> [Mask; 64] {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        if matches!(square.rank(), Rank1 | Rank8) {
            continue;
        }
        array[square] =
            Mask::from_squares(offsets.into_iter().filter_map(|offset| square + offset));
    }
    array
}

static WHITE_SINGLE_ADVANCES: Lazy<[Mask; 64]> =
    Lazy::new(|| single_advances(Offset::new(0, -1)));

static WHITE_DOUBLE_ADVANCES: Lazy<[Mask; 64]> =
    Lazy::new(|| double_advances(Rank2, Offset::new(0, -2)));

static WHITE_PAWN_ATTACKS: Lazy<[Mask; 64]> =
    Lazy::new(|| pawn_attacks([Offset::new(-1, -1), Offset::new(1, -1)]));

static BLACK_SINGLE_ADVANCES: Lazy<[Mask; 64]> =
    Lazy::new(|| single_advances(Offset::new(0, 1)));

static BLACK_DOUBLE_ADVANCES: Lazy<[Mask; 64]> =
    Lazy::new(|| double_advances(Rank7, Offset::new(0, 2)));

static BLACK_PAWN_ATTACKS: Lazy<[Mask; 64]> =
    Lazy::new(|| pawn_attacks([Offset::new(-1, 1), Offset::new(1, 1)]));
