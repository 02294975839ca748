// Copyright 2026 Tobin Edwards
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

use serde::{Deserialize, Serialize};

use super::material::{Color, Pair};
use super::position::between;
use super::square::{File, Mask, Rank, Square};

use File::*;

/// Castling rights of one side. The king starts on the e-file and the
/// rooks on the a- and h-files.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    color: Color,
    oo: bool,
    ooo: bool,
}

impl CastlingRights {
    pub fn new(color: Color, oo: bool, ooo: bool) -> Self {
        Self { color, oo, ooo }
    }
    pub fn none(color: Color) -> Self {
        Self::new(color, false, false)
    }
    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }
    #[inline]
    pub fn oo(&self) -> bool {
        self.oo
    }
    #[inline]
    pub fn ooo(&self) -> bool {
        self.ooo
    }
    #[inline]
    pub fn rank(&self) -> Rank {
        Rank::back_rank(self.color)
    }

    #[inline]
    pub fn king_src(&self) -> Square {
        Square::new(FileE, self.rank())
    }
    #[inline]
    pub fn oo_rook_src(&self) -> Square {
        Square::new(FileH, self.rank())
    }
    #[inline]
    pub fn oo_king_dest(&self) -> Square {
        Square::new(FileG, self.rank())
    }
    #[inline]
    pub fn oo_rook_dest(&self) -> Square {
        Square::new(FileF, self.rank())
    }
    #[inline]
    pub fn ooo_rook_src(&self) -> Square {
        Square::new(FileA, self.rank())
    }
    #[inline]
    pub fn ooo_king_dest(&self) -> Square {
        Square::new(FileC, self.rank())
    }
    #[inline]
    pub fn ooo_rook_dest(&self) -> Square {
        Square::new(FileD, self.rank())
    }

    /// Squares that must be vacant for O-O.
    pub fn oo_blocking_lane(&self) -> Mask {
        between(self.king_src(), self.oo_rook_src())
    }
    /// Squares the king crosses or lands on during O-O.
    pub fn oo_attacking_lane(&self) -> Mask {
        let king_dest = self.oo_king_dest();
        between(self.king_src(), king_dest) | king_dest
    }
    pub fn ooo_blocking_lane(&self) -> Mask {
        between(self.ooo_rook_src(), self.king_src())
    }
    pub fn ooo_attacking_lane(&self) -> Mask {
        let king_dest = self.ooo_king_dest();
        between(king_dest, self.king_src()) | king_dest
    }

    /// Drops whichever rights depend on a piece standing on `square`.
    /// Called with the source and destination of every move.
    pub fn update(&mut self, square: Square) {
        let king = self.king_src();
        if self.oo && (square == king || square == self.oo_rook_src()) {
            self.oo = false;
        }
        if self.ooo && (square == king || square == self.ooo_rook_src()) {
            self.ooo = false;
        }
    }
    pub fn clear(&mut self) {
        self.oo = false;
        self.ooo = false;
    }
    pub fn clear_oo(&mut self) {
        self.oo = false;
    }
    pub fn clear_ooo(&mut self) {
        self.ooo = false;
    }
}

impl Default for Pair<CastlingRights> {
    fn default() -> Self {
        Pair::new(
            CastlingRights::new(Color::White, true, true),
            CastlingRights::new(Color::Black, true, true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Square::*;

    #[test]
    fn test_rook_move_drops_one_side() {
        let mut rights = CastlingRights::new(Color::White, true, true);
        rights.update(H1);
        assert!(!rights.oo());
        assert!(rights.ooo());
        rights.update(A8);
        assert!(rights.ooo());
    }

    #[test]
    fn test_king_move_drops_both_sides() {
        let mut rights = CastlingRights::new(Color::Black, true, true);
        rights.update(E8);
        assert!(!rights.oo());
        assert!(!rights.ooo());
    }

    #[test]
    fn test_lanes() {
        let rights = CastlingRights::new(Color::White, true, true);
        assert_eq!(rights.oo_blocking_lane(), Mask::from_squares([F1, G1]));
        assert_eq!(rights.ooo_blocking_lane(), Mask::from_squares([B1, C1, D1]));
        assert_eq!(rights.ooo_attacking_lane(), Mask::from_squares([C1, D1]));
    }
}
