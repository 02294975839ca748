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

use anyhow::Result;

use super::moves::{LegalMoves, Move, MoveState, Promotion};
use super::position::Position;
use super::san::{from_san, to_san};
use super::square::{Mask, Square};

/// The narrow interface through which the rest of the crate plays chess.
///
/// Positions go in and new positions come out; nothing is mutated in
/// place, so a rejected move leaves the caller's position untouched.
pub trait Rules {
    fn initial_position(&self) -> Position;

    /// Applies the move `from` -> `to` and returns the resulting position
    /// along with the move's SAN. `promotion` is only consulted when a pawn
    /// reaches the last rank and defaults to a queen.
    fn apply(
        &self,
        position: &Position,
        from: Square,
        to: Square,
        promotion: Option<Promotion>,
    ) -> Result<(Position, String)>;

    /// Replays a SAN token previously produced by `apply`.
    fn apply_san(&self, position: &Position, san: &str) -> Result<(Position, String)>;

    /// Legal target squares of the piece on `from`.
    fn destinations(&self, position: &Position, from: Square) -> Mask;

    fn is_check(&self, position: &Position) -> bool;

    fn to_position_string(&self, position: &Position) -> String {
        position.to_fen()
    }

    fn from_position_string(&self, fen: &str) -> Result<Position> {
        Ok(Position::from_fen(fen)?)
    }
}

/// Standard chess rules backed by the bitboard move generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardRules;

impl Rules for StandardRules {
    fn initial_position(&self) -> Position {
        Position::standard()
    }

    fn apply(
        &self,
        position: &Position,
        from: Square,
        to: Square,
        promotion: Option<Promotion>,
    ) -> Result<(Position, String)> {
        let state = MoveState::new(position.clone());
        let lm = state.validate_move(Move::new(from, to, promotion))?;
        let san = to_san(&state, lm);
        let mut next = position.clone();
        next.apply_move(lm);
        Ok((next, san))
    }

    fn apply_san(&self, position: &Position, san: &str) -> Result<(Position, String)> {
        let state = MoveState::new(position.clone());
        let lm = from_san(&state, san)?;
        let canonical = to_san(&state, lm);
        let mut next = position.clone();
        next.apply_move(lm);
        Ok((next, canonical))
    }

    fn destinations(&self, position: &Position, from: Square) -> Mask {
        MoveState::new(position.clone())
            .legal_moves(from)
            .destinations()
    }

    fn is_check(&self, position: &Position) -> bool {
        MoveState::new(position.clone()).is_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use Square::*;

    #[test]
    fn test_apply_returns_san_and_new_position() {
        let rules = StandardRules;
        let start = rules.initial_position();
        let (position, san) = rules.apply(&start, E2, E4, None).unwrap();
        assert_eq!(san, "e4");
        assert_eq!(position.turn(), Color::Black);
        assert_eq!(start, Position::standard());
    }

    #[test]
    fn test_illegal_move_is_rejected() {
        let rules = StandardRules;
        let start = rules.initial_position();
        let err = rules.apply(&start, E2, E5, None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MoveError>(),
            Some(&MoveError::IllegalMove { from: E2, to: E5 })
        );
        assert!(rules.apply(&start, E2, E2, None).is_err());
        assert!(rules.apply(&start, E7, E5, None).is_err());
    }

    #[test]
    fn test_promotion_hint() {
        let rules = StandardRules;
        let position = rules
            .from_position_string("4k3/1P6/8/8/8/8/8/4K3 w - - 0 1")
            .unwrap();
        let (_, san) = rules.apply(&position, B7, B8, None).unwrap();
        assert_eq!(san, "b8=Q+");
        let (next, san) = rules
            .apply(&position, B7, B8, Some(Promotion::Knight))
            .unwrap();
        assert_eq!(san, "b8=N");
        assert_eq!(next.contents(B8), &Some(Material::WN));
    }

    #[test]
    fn test_apply_san_replays_apply() {
        let rules = StandardRules;
        let start = rules.initial_position();
        let (expected, san) = rules.apply(&start, G1, F3, None).unwrap();
        let (replayed, canonical) = rules.apply_san(&start, &san).unwrap();
        assert_eq!(replayed, expected);
        assert_eq!(canonical, "Nf3");
        assert!(rules.apply_san(&start, "Nf6").is_err());
    }

    #[test]
    fn test_destinations() {
        let rules = StandardRules;
        let start = rules.initial_position();
        assert_eq!(rules.destinations(&start, G1), Mask::from_squares([F3, H3]));
        assert!(rules.destinations(&start, E4).is_empty());
        assert!(rules.destinations(&start, E7).is_empty());
    }

    #[test]
    fn test_position_strings() {
        let rules = StandardRules;
        let start = rules.initial_position();
        let fen = rules.to_position_string(&start);
        assert_eq!(rules.from_position_string(&fen).unwrap(), start);
        assert!(rules.from_position_string("not a fen").is_err());
    }
}
