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

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::{Index, IndexMut};
use strum::IntoEnumIterator;

use super::castling::CastlingRights;
use super::material::{Color, Material, Pair, Piece};
use super::moves::LegalMove;
use super::square::{Direction, File, Mask, Rank, Square};
use super::Turn;

use Color::*;
use Piece::*;
use Rank::*;

/// Ply counter. Even values are white's turn, odd values black's.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MoveId(u16);

impl MoveId {
    pub const START: MoveId = MoveId(0);

    #[inline]
    pub fn new(move_count: u16, turn: Color) -> Self {
        match turn {
            White => Self(move_count * 2),
            Black => Self(move_count * 2 + 1),
        }
    }
    #[inline]
    pub fn turn(&self) -> Color {
        const TURNS: [Color; 2] = [White, Black];
        let index = self.value() % 2;
        TURNS[index]
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0 as usize
    }
    #[inline]
    pub fn move_count(&self) -> usize {
        self.value() / 2
    }
    #[inline]
    pub fn move_number(&self) -> usize {
        1 + self.move_count()
    }
    #[inline]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for MoveId {
    #[inline]
    fn default() -> Self {
        MoveId::START
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Squares([Option<Material>; 64]);

impl Squares {
    fn empty() -> Self {
        Self([None; 64])
    }
}

impl Index<Square> for Squares {
    type Output = Option<Material>;
    fn index(&self, index: Square) -> &Self::Output {
        &self.0[index.to_index()]
    }
}

impl IndexMut<Square> for Squares {
    fn index_mut(&mut self, index: Square) -> &mut Self::Output {
        &mut self.0[index.to_index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Masks {
    pieces: Pair<Mask>,
    kings: Mask,
    queens: Mask,
    rooks: Mask,
    bishops: Mask,
    knights: Mask,
    pawns: Mask,
}

impl From<&Squares> for Masks {
    fn from(value: &Squares) -> Self {
        let mut masks = Masks::empty();
        for square in Square::iter() {
            if let Some(material) = value[square] {
                masks.pieces[material.color()] |= square;
                match material.piece() {
                    King => masks.kings |= square,
                    Queen => masks.queens |= square,
                    Rook => masks.rooks |= square,
                    Bishop => masks.bishops |= square,
                    Knight => masks.knights |= square,
                    Pawn => masks.pawns |= square,
                }
            }
        }
        masks
    }
}

impl Masks {
    fn empty() -> Self {
        Self {
            pieces: Pair::new(Mask::empty(), Mask::empty()),
            kings: Mask::empty(),
            queens: Mask::empty(),
            rooks: Mask::empty(),
            bishops: Mask::empty(),
            knights: Mask::empty(),
            pawns: Mask::empty(),
        }
    }
}

/// Immutable snapshot of a game: piece placement, side to move, castling
/// rights, en passant target and the two move counters. Serialized as FEN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    squares: Squares,
    masks: Masks,
    castling: Pair<CastlingRights>,
    en_passant: Option<Square>,
    next_move_id: MoveId,
    moves_since_progress: u16,
}

impl Default for Position {
    fn default() -> Self {
        Self::standard()
    }
}

impl Serialize for Position {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_fen())
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let fen = String::deserialize(deserializer)?;
        Position::from_fen(&fen).map_err(serde::de::Error::custom)
    }
}

impl Position {
    /// The standard starting position.
    pub fn standard() -> Self {
        const BACK_RANK: [Piece; 8] = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        let mut position = Self::empty();
        for (file, piece) in File::iter().zip(BACK_RANK) {
            position.init_file(file, piece);
        }
        position.castling = Pair::default();
        position
    }

    /// A board with no pieces and no castling rights, white to move.
    pub(super) fn empty() -> Self {
        Self {
            squares: Squares::empty(),
            masks: Masks::empty(),
            castling: Pair::new(CastlingRights::none(White), CastlingRights::none(Black)),
            en_passant: None,
            next_move_id: MoveId::START,
            moves_since_progress: 0,
        }
    }

    fn init_file(&mut self, file: File, piece: Piece) {
        const PAWN_RANKS: Pair<Rank> = Pair::new(Rank2, Rank7);
        const BACK_RANKS: Pair<Rank> = Pair::new(Rank1, Rank8);
        for color in Color::iter() {
            let square = Square::new(file, PAWN_RANKS[color]);
            let _ = self.place(square, Material::new(color, Pawn));
            let square = Square::new(file, BACK_RANKS[color]);
            let _ = self.place(square, Material::new(color, piece));
        }
    }

    pub fn castling(&self, color: Color) -> &CastlingRights {
        &self.castling[color]
    }

    pub fn next_move_id(&self) -> MoveId {
        self.next_move_id
    }

    pub fn move_number(&self) -> usize {
        self.next_move_id.move_number()
    }

    pub fn moves_since_progress(&self) -> usize {
        self.moves_since_progress as usize
    }

    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub(super) fn set_castling(&mut self, rights: CastlingRights) {
        self.castling[rights.color()] = rights;
    }

    pub(super) fn set_en_passant_target(&mut self, square: Option<Square>) {
        self.en_passant = square;
    }

    pub(super) fn set_counters(&mut self, next_move_id: MoveId, moves_since_progress: u16) {
        self.next_move_id = next_move_id;
        self.moves_since_progress = moves_since_progress;
    }

    pub fn apply_move(&mut self, mv: LegalMove) -> MoveId {
        self.moves_since_progress = self.moves_since_progress.saturating_add(1);
        match mv {
            LegalMove::Standard(from, to) => {
                let material = self.take(from);
                let captured = self.place(to, material);
                self.en_passant = None;
                self.our_castling_mut().update(from);
                self.their_castling_mut().update(to);
                if captured.is_some() || material.piece() == Pawn {
                    self.moves_since_progress = 0;
                }
            }
            LegalMove::EnPassant(from, to) => {
                let material = self.take(from);
                let target = Square::new(to.file(), from.rank());
                let _ = self.remove(target);
                self.place(to, material);
                self.en_passant = None;
                self.moves_since_progress = 0;
            }
            LegalMove::DoubleAdvance(from, to) => {
                let target = between(from, to).iter().next();
                let material = self.take(from);
                self.place(to, material);
                self.en_passant = target;
                self.moves_since_progress = 0;
            }
            LegalMove::Promoting(from, to, promotion) => {
                let mut material = self.take(from);
                material.set_piece(promotion.into());
                self.place(to, material);
                self.their_castling_mut().update(to);
                self.en_passant = None;
                self.moves_since_progress = 0;
            }
            LegalMove::ShortCastle => {
                let rights = *self.our_castling();
                let king = self.take(rights.king_src());
                let rook = self.take(rights.oo_rook_src());
                self.place(rights.oo_king_dest(), king);
                self.place(rights.oo_rook_dest(), rook);
                self.our_castling_mut().clear();
                self.en_passant = None;
            }
            LegalMove::LongCastle => {
                let rights = *self.our_castling();
                let king = self.take(rights.king_src());
                let rook = self.take(rights.ooo_rook_src());
                self.place(rights.ooo_king_dest(), king);
                self.place(rights.ooo_rook_dest(), rook);
                self.our_castling_mut().clear();
                self.en_passant = None;
            }
        };
        let move_id = self.next_move_id;
        self.next_move_id = move_id.next();
        move_id
    }

    pub(super) fn place(&mut self, square: Square, material: Material) -> Option<Material> {
        let replaced = self.remove(square);
        self.squares[square] = Some(material);
        let mask = square.to_mask();
        self.masks.pieces[material.color()] |= mask;
        match material.piece() {
            King => self.masks.kings |= mask,
            Queen => self.masks.queens |= mask,
            Rook => self.masks.rooks |= mask,
            Bishop => self.masks.bishops |= mask,
            Knight => self.masks.knights |= mask,
            Pawn => self.masks.pawns |= mask,
        }
        replaced
    }

    fn remove(&mut self, square: Square) -> Option<Material> {
        if let Some(material) = self.squares[square] {
            self.squares[square] = None;
            let mask = !square.to_mask();
            self.masks.pieces[material.color()] &= mask;
            match material.piece() {
                King => self.masks.kings &= mask,
                Queen => self.masks.queens &= mask,
                Rook => self.masks.rooks &= mask,
                Bishop => self.masks.bishops &= mask,
                Knight => self.masks.knights &= mask,
                Pawn => self.masks.pawns &= mask,
            }
            return Some(material);
        }
        None
    }

    // Only called with the source square of a validated move.
    fn take(&mut self, square: Square) -> Material {
        self.remove(square)
            .expect("Position::apply_move - source square is vacant")
    }

    #[inline]
    pub fn our_castling(&self) -> &CastlingRights {
        &self.castling[self.turn()]
    }
    #[inline]
    fn our_castling_mut(&mut self) -> &mut CastlingRights {
        let turn = self.turn();
        &mut self.castling[turn]
    }
    #[inline]
    fn their_castling_mut(&mut self) -> &mut CastlingRights {
        let turn = self.turn();
        &mut self.castling[!turn]
    }
}

impl Turn for Position {
    #[inline]
    fn turn(&self) -> Color {
        self.next_move_id.turn()
    }
}

impl Index<Square> for Position {
    type Output = Option<Material>;
    #[inline]
    fn index(&self, index: Square) -> &Self::Output {
        &self.squares[index]
    }
}

impl AsRef<Self> for Position {
    fn as_ref(&self) -> &Self {
        self
    }
}

impl Pos for Position {}

pub trait Pos: Turn + AsRef<Position> {
    #[inline]
    fn contents(&self, square: Square) -> &Option<Material> {
        let pos: &Position = self.as_ref();
        &pos.squares[square]
    }
    #[inline]
    fn white(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.pieces[Color::White]
    }
    #[inline]
    fn black(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.pieces[Color::Black]
    }
    #[inline]
    fn kings(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.kings
    }
    #[inline]
    fn queens(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.queens
    }
    #[inline]
    fn rooks(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.rooks
    }
    #[inline]
    fn bishops(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.bishops
    }
    #[inline]
    fn pawns(&self) -> Mask {
        let pos: &Position = self.as_ref();
        pos.masks.pawns
    }
    #[inline]
    fn occupied_by(&self, color: Color) -> Mask {
        match color {
            White => self.white(),
            Black => self.black(),
        }
    }

    /// Square of the side to move's king. Positions are only built from
    /// the standard setup or from a validated FEN, so there is exactly one.
    #[inline]
    fn our_king(&self) -> Square {
        let mask = self.ours() & self.kings();
        debug_assert!(mask.len() == 1);
        mask.iter().next().expect("Pos::our_king - no king on board")
    }
    #[inline]
    fn their_line_pieces(&self) -> Mask {
        self.theirs() & self.line_pieces()
    }
    #[inline]
    fn occupied(&self) -> Mask {
        self.white() | self.black()
    }
    #[inline]
    fn ours(&self) -> Mask {
        self.occupied_by(self.turn())
    }
    #[inline]
    fn theirs(&self) -> Mask {
        self.occupied_by(!self.turn())
    }
    #[inline]
    fn horizontals(&self) -> Mask {
        self.rooks() | self.queens()
    }
    #[inline]
    fn diagonals(&self) -> Mask {
        self.bishops() | self.queens()
    }
    #[inline]
    fn line_pieces(&self) -> Mask {
        self.horizontals() | self.diagonals()
    }
}

#[inline]
pub(super) fn blocked(from: Square, to: Square) -> Mask {
    let index = from.to_index() * 64 + to.to_index();
    SQUARES_SHIELDED[index] | to.to_mask()
}

#[inline]
pub(super) fn shielded(from: Square, to: Square) -> Mask {
    let index = from.to_index() * 64 + to.to_index();
    SQUARES_SHIELDED[index]
}

#[inline]
pub(super) fn between(from: Square, to: Square) -> Mask {
    let index = from.to_index() * 64 + to.to_index();
    SQUARES_BETWEEN[index]
}

pub(super) static SQUARES_BETWEEN: Lazy<[Mask; 64 * 64]> = Lazy::new(|| {
    // Squares strictly between `start` and `end` when they share a line,
    // otherwise empty.
    fn squares_between(start: Square, end: Square) -> Mask {
        let mut mask = Mask::empty();
        if let Some(step) = (end - start).to_unit() {
            let mut next = start + step;
            while let Some(square) = next {
                if square == end {
                    break;
                }
                mask |= square.to_mask();
                next = square + step;
            }
        }
        mask
    }

    let mut array = [Mask::empty(); 64 * 64];
    let mut visited = HashSet::new();
    for start in Square::iter() {
        let start_index = start.to_index();
        for end in Square::iter() {
            if start == end {
                continue;
            }
            let end_index = end.to_index();
            let index1 = start_index * 64 + end_index;
            let index2: usize = end_index * 64 + start_index;
            if visited.insert(index1) {
                visited.insert(index2);
                if ALL_LINES[start_index].contains(end) {
                    let mask = squares_between(start, end);
                    array[index1] = mask;
                    array[index2] = mask;
                }
            }
        }
    }
    array
});

pub(super) static SQUARES_SHIELDED: Lazy<[Mask; 64 * 64]> = Lazy::new(|| {
    // Squares beyond `end` (exclusive) up to the edge of the board on the
    // line drawn from `start` through `end`.
    fn squares_shielded(start: Square, end: Square) -> Mask {
        let mut mask = Mask::empty();
        if let Some(step) = (end - start).to_unit() {
            let mut next = end + step;
            while let Some(square) = next {
                mask |= square.to_mask();
                next = square + step;
            }
        }
        mask
    }

    let mut array = [Mask::empty(); 64 * 64];
    for start in Square::iter() {
        let start_index = start.to_index();
        for end in Square::iter() {
            if start == end {
                continue;
            }
            let index = start_index * 64 + end.to_index();
            if ALL_LINES[start_index].contains(end) {
                array[index] = squares_shielded(start, end);
            }
        }
    }
    array
});

pub(super) static HORIZONTALS: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        let mask = square.file().to_mask() | square.rank().to_mask();
        array[square.to_index()] = mask;
    }
    array
});

pub(super) static DIAGONALS: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        let mut mask = square.to_mask();
        Direction::diagonals().for_each(|dir| {
            let mut next = square + dir;
            while let Some(sq) = next {
                mask |= sq.to_mask();
                next = sq + dir;
            }
        });
        array[square.to_index()] = mask;
    }
    array
});

pub(super) static ALL_LINES: Lazy<[Mask; 64]> = Lazy::new(|| {
    let mut array = [Mask::default(); 64];
    for square in Square::iter() {
        array[square] = HORIZONTALS[square] | DIAGONALS[square];
    }
    array
});

#[cfg(test)]
impl Position {
    pub fn set_contents(mut self, square: Square, value: Option<Material>) -> Self {
        self.squares[square] = value;
        self.masks = (&self.squares).into();
        self
    }
    pub fn set_en_passant(mut self, value: Option<Square>) -> Self {
        self.en_passant = value;
        self
    }
    pub fn clear_white_oo(mut self) -> Self {
        self.castling[White].clear_oo();
        self
    }
    pub fn clear_white_ooo(mut self) -> Self {
        self.castling[White].clear_ooo();
        self
    }
    pub fn set_next_move_id(mut self, value: MoveId) -> Self {
        self.next_move_id = value;
        self
    }
}
