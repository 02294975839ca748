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

use std::str::FromStr;

use strum::IntoEnumIterator;
use thiserror::Error;

use super::castling::CastlingRights;
use super::material::{Color, Material, Piece};
use super::moves::MoveState;
use super::position::{MoveId, Pos, Position};
use super::square::{File, Rank, Square};
use super::Turn;

use Color::*;

// Largest full move number whose ply still fits the move counter.
const MAX_FULLMOVE: u16 = 32_767;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    #[error("Expected 4 or 6 FEN fields, found {0}")]
    FieldCount(usize),
    #[error("Invalid piece placement: {0:?}")]
    Placement(String),
    #[error("Invalid side to move: {0:?}")]
    SideToMove(String),
    #[error("Invalid castling field: {0:?}")]
    Castling(String),
    #[error("Invalid en passant field: {0:?}")]
    EnPassant(String),
    #[error("Invalid move counter: {0:?}")]
    Counter(String),
    #[error("Expected exactly one {0} king")]
    KingCount(Color),
    #[error("Pawn on back rank: {0}")]
    PawnOnBackRank(Square),
    #[error("Side not to move is in check")]
    OpponentInCheck,
}

impl Position {
    /// Forsyth-Edwards notation for this position.
    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);

        for rank in Rank::iter() {
            let mut vacant = 0;
            for file in File::iter() {
                match self.contents(Square::new(file, rank)) {
                    Some(material) => {
                        if vacant > 0 {
                            fen.push_str(&vacant.to_string());
                            vacant = 0;
                        }
                        fen.push(material.to_fen_char());
                    }
                    None => vacant += 1,
                }
            }
            if vacant > 0 {
                fen.push_str(&vacant.to_string());
            }
            if rank != Rank::Rank1 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.turn() {
            White => 'w',
            Black => 'b',
        });

        fen.push(' ');
        let start = fen.len();
        for (color, rights) in [(White, self.castling(White)), (Black, self.castling(Black))] {
            let (oo, ooo) = match color {
                White => ('K', 'Q'),
                Black => ('k', 'q'),
            };
            if rights.oo() {
                fen.push(oo);
            }
            if rights.ooo() {
                fen.push(ooo);
            }
        }
        if fen.len() == start {
            fen.push('-');
        }

        fen.push(' ');
        match self.en_passant() {
            Some(square) => fen.push_str(&square.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(
            " {} {}",
            self.moves_since_progress(),
            self.move_number()
        ));
        fen
    }

    /// Parses a FEN string.
    ///
    /// Castling rights that no longer match the king and rook placement are
    /// dropped rather than rejected. The half-move clock and full move number
    /// may be omitted, in which case they default to `0 1`.
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if !(fields.len() == 4 || fields.len() == 6) {
            return Err(FenError::FieldCount(fields.len()));
        }

        let mut position = Position::empty();
        parse_placement(&mut position, fields[0])?;

        let turn = match fields[1] {
            "w" => White,
            "b" => Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        parse_castling(&mut position, fields[2])?;

        let en_passant = match fields[3] {
            "-" => None,
            name => {
                let invalid = || FenError::EnPassant(name.to_string());
                let square = Square::try_from_string(name).ok_or_else(invalid)?;
                // the target sits behind a pawn that just moved two squares
                let expected = match turn {
                    White => Rank::Rank6,
                    Black => Rank::Rank3,
                };
                if square.rank() != expected {
                    return Err(invalid());
                }
                Some(square)
            }
        };
        position.set_en_passant_target(en_passant);

        let (halfmove, fullmove) = match fields.get(4..6) {
            Some([halfmove, fullmove]) => {
                let halfmove = parse_counter(halfmove)?;
                let fullmove = parse_counter(fullmove)?.clamp(1, MAX_FULLMOVE);
                (halfmove, fullmove)
            }
            _ => (0, 1),
        };
        position.set_counters(MoveId::new(fullmove - 1, turn), halfmove);

        validate(&position)?;
        Ok(position)
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

fn parse_placement(position: &mut Position, placement: &str) -> Result<(), FenError> {
    let invalid = || FenError::Placement(placement.to_string());
    let rows: Vec<&str> = placement.split('/').collect();
    if rows.len() != 8 {
        return Err(invalid());
    }

    for (rank, row) in Rank::iter().zip(rows) {
        let mut file_index = 0;
        for c in row.chars() {
            if let Some(skip) = c.to_digit(10) {
                if skip == 0 || skip > 8 {
                    return Err(invalid());
                }
                file_index += skip as usize;
            } else {
                let material = Material::from_fen_char(c).ok_or_else(invalid)?;
                if file_index >= 8 {
                    return Err(invalid());
                }
                let square = Square::new(File::from_index(file_index), rank);
                let _ = position.place(square, material);
                file_index += 1;
            }
            if file_index > 8 {
                return Err(invalid());
            }
        }
        if file_index != 8 {
            return Err(invalid());
        }
    }
    Ok(())
}

fn parse_castling(position: &mut Position, field: &str) -> Result<(), FenError> {
    let invalid = || FenError::Castling(field.to_string());
    let mut white = CastlingRights::none(White);
    let mut black = CastlingRights::none(Black);

    if field != "-" {
        for c in field.chars() {
            match c {
                'K' => white = CastlingRights::new(White, true, white.ooo()),
                'Q' => white = CastlingRights::new(White, white.oo(), true),
                'k' => black = CastlingRights::new(Black, true, black.ooo()),
                'q' => black = CastlingRights::new(Black, black.oo(), true),
                _ => return Err(invalid()),
            }
        }
    }

    position.set_castling(sanitize(position, white));
    position.set_castling(sanitize(position, black));
    Ok(())
}

// Drops rights whose king or rook is not on its starting square.
fn sanitize(position: &Position, mut rights: CastlingRights) -> CastlingRights {
    let color = rights.color();
    let holds = |square: Square, piece: Piece| {
        *position.contents(square) == Some(Material::new(color, piece))
    };
    if !holds(rights.king_src(), Piece::King) {
        rights.clear();
    }
    if !holds(rights.oo_rook_src(), Piece::Rook) {
        rights.clear_oo();
    }
    if !holds(rights.ooo_rook_src(), Piece::Rook) {
        rights.clear_ooo();
    }
    rights
}

fn parse_counter(field: &str) -> Result<u16, FenError> {
    field
        .parse::<u16>()
        .map_err(|_| FenError::Counter(field.to_string()))
}

fn validate(position: &Position) -> Result<(), FenError> {
    for color in Color::iter() {
        if (position.kings() & position.occupied_by(color)).len() != 1 {
            return Err(FenError::KingCount(color));
        }
    }

    let back_ranks = Rank::Rank1.to_mask() | Rank::Rank8.to_mask();
    if let Some(square) = (position.pawns() & back_ranks).iter().next() {
        return Err(FenError::PawnOnBackRank(square));
    }

    // With the turn flipped, a check would be against the side that just moved.
    let mut flipped = position.clone();
    let next = position.next_move_id();
    let flipped_id = match position.turn() {
        White => MoveId::new(next.move_count() as u16, Black),
        Black => MoveId::new(next.move_count() as u16 + 1, White),
    };
    flipped.set_counters(flipped_id, position.moves_since_progress() as u16);
    flipped.set_en_passant_target(None);
    if MoveState::new(flipped).is_check() {
        return Err(FenError::OpponentInCheck);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use Square::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_standard_position_fen() {
        assert_eq!(Position::standard().to_fen(), START);
        assert_eq!(Position::from_fen(START).unwrap(), Position::standard());
    }

    #[test]
    fn test_fen_after_double_advance() {
        let mut position = Position::standard();
        position.apply_move(LegalMove::DoubleAdvance(E2, E4));
        assert_eq!(
            position.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        let parsed: Position = position.to_fen().parse().unwrap();
        assert_eq!(parsed, position);
        assert_eq!(parsed.en_passant(), Some(E3));
        assert_eq!(parsed.turn(), Color::Black);
    }

    #[test]
    fn test_counters() {
        let fen = "4k3/8/8/8/8/8/8/4K3 b - - 12 40";
        let position = Position::from_fen(fen).unwrap();
        assert_eq!(position.moves_since_progress(), 12);
        assert_eq!(position.move_number(), 40);
        assert_eq!(position.turn(), Color::Black);
        assert_eq!(position.to_fen(), fen);
    }

    #[test]
    fn test_missing_counters_default() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
        assert_eq!(position.to_fen(), "4k3/8/8/8/8/8/8/4K3 w - - 0 1");
    }

    #[test]
    fn test_castling_rights_sanitized() {
        // white's h-rook is missing, black's king has left e8
        let position =
            Position::from_fen("r2k3r/8/8/8/8/8/8/R3K3 w KQkq - 0 1").unwrap();
        assert!(!position.castling(Color::White).oo());
        assert!(position.castling(Color::White).ooo());
        assert!(!position.castling(Color::Black).oo());
        assert!(!position.castling(Color::Black).ooo());
        assert_eq!(position.to_fen(), "r2k3r/8/8/8/8/8/8/R3K3 w Q - 0 1");
    }

    #[test]
    fn test_invalid_fens() {
        let cases = [
            ("", FenError::FieldCount(0)),
            ("8/8/8/8/8/8/8/8 w - - 0", FenError::FieldCount(5)),
            (
                "rnbqkbnr/ppppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                FenError::Placement("rnbqkbnr/ppppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR".into()),
            ),
            (
                "rnbqkbnr/pppppppp/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
                FenError::Placement("rnbqkbnr/pppppppp/8/8/8/PPPPPPPP/RNBQKBNR".into()),
            ),
            ("4k3/8/8/8/8/8/8/4K3 x - - 0 1", FenError::SideToMove("x".into())),
            ("4k3/8/8/8/8/8/8/4K3 w KX - 0 1", FenError::Castling("KX".into())),
            ("4k3/8/8/8/8/8/8/4K3 w - e4 0 1", FenError::EnPassant("e4".into())),
            ("4k3/8/8/8/8/8/8/4K3 w - e3 0 1", FenError::EnPassant("e3".into())),
            ("4k3/8/8/8/8/8/8/4K3 w - - x 1", FenError::Counter("x".into())),
            ("8/8/8/8/8/8/8/4K3 w - - 0 1", FenError::KingCount(Color::Black)),
            ("4k3/8/8/8/8/8/8/4KK2 w - - 0 1", FenError::KingCount(Color::White)),
            ("P3k3/8/8/8/8/8/8/4K3 w - - 0 1", FenError::PawnOnBackRank(A8)),
            ("4k2R/8/8/8/8/8/8/4K3 w - - 0 1", FenError::OpponentInCheck),
        ];
        for (fen, expected) in cases {
            assert_eq!(Position::from_fen(fen), Err(expected), "{fen}");
        }
    }

    #[test]
    fn test_side_to_move_may_be_in_check() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/4K2r w - - 0 1").unwrap();
        assert!(MoveState::new(position).is_check());
    }
}
