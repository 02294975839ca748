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

use super::material::Piece;
use super::moves::{LegalMove, LegalMoves, MoveError, MoveState, Promotion};
use super::position::{Pos, Position};
use super::square::{File, Mask, Rank, Square};

use Piece::*;

/// Generate a SAN string for a legal move given the current board state.
pub fn to_san(state: &MoveState, lm: LegalMove) -> String {
    let mut s = match lm {
        LegalMove::ShortCastle => "O-O".to_string(),
        LegalMove::LongCastle => "O-O-O".to_string(),
        _ => format_move(state, lm),
    };
    s.push_str(check_suffix(state, lm));
    s
}

/// Parse a SAN string into a LegalMove given the current board state.
///
/// Trailing check, mate and annotation marks are ignored. A pawn move to
/// the last rank must name its promotion piece, and a token that matches
/// more than one legal move is rejected.
pub fn from_san(state: &MoveState, san: &str) -> Result<LegalMove> {
    let invalid = || MoveError::InvalidSan(san.to_string());
    let s = san.trim().trim_end_matches(['+', '#', '!', '?']);

    // Castling (accept both O and 0)
    if s == "O-O" || s == "0-0" {
        return castle(state, LegalMove::ShortCastle).ok_or_else(|| invalid().into());
    }
    if s == "O-O-O" || s == "0-0-0" {
        return castle(state, LegalMove::LongCastle).ok_or_else(|| invalid().into());
    }

    let parsed = parse_san_components(s).ok_or_else(invalid)?;

    let candidates = pieces_of(state, parsed.piece);
    let mut matched: Option<LegalMove> = None;
    for from in candidates.iter() {
        if parsed.from_file.is_some_and(|file| from.file() != file) {
            continue;
        }
        if parsed.from_rank.is_some_and(|rank| from.rank() != rank) {
            continue;
        }
        let lm = match (state.legal_moves(from).get(parsed.to), parsed.promotion) {
            (Some(LegalMove::Promoting(f, t, _)), Some(promotion)) => {
                LegalMove::Promoting(f, t, promotion)
            }
            (Some(LegalMove::Promoting(..)), None) => continue,
            (Some(_), Some(_)) => continue,
            (Some(lm), None) => lm,
            (None, _) => continue,
        };
        if matched.is_some() {
            return Err(invalid().into());
        }
        matched = Some(lm);
    }

    matched.ok_or_else(|| invalid().into())
}

fn castle(state: &MoveState, lm: LegalMove) -> Option<LegalMove> {
    let pos: &Position = state.as_ref();
    let castling = pos.our_castling();
    let dest = match lm {
        LegalMove::ShortCastle => castling.oo_king_dest(),
        _ => castling.ooo_king_dest(),
    };
    let king = state.our_king();
    (state.legal_moves(king).get(dest) == Some(lm)).then_some(lm)
}

fn pieces_of(state: &MoveState, piece: Piece) -> Mask {
    state
        .ours()
        .iter()
        .filter(|sq| state.contents(*sq).is_some_and(|m| m.piece() == piece))
        .fold(Mask::empty(), |mask, sq| mask | sq)
}

fn format_move(state: &MoveState, lm: LegalMove) -> String {
    let (from, to) = move_squares(lm);
    let piece = state
        .contents(from)
        .expect("to_san - source square is vacant")
        .piece();
    let capture = is_capture(state, lm);

    let mut s = String::new();

    if piece == Pawn {
        if capture {
            s.push(from.file().to_char());
        }
    } else {
        s.push(piece.to_char());
        disambiguate(state, piece, from, to, &mut s);
    }

    if capture {
        s.push('x');
    }

    s.push(to.file().to_char());
    s.push(to.rank().to_char());

    if let LegalMove::Promoting(_, _, promo) = lm {
        s.push('=');
        s.push_str(&promo.to_string());
    }

    s
}

fn move_squares(lm: LegalMove) -> (Square, Square) {
    match lm {
        LegalMove::Standard(from, to)
        | LegalMove::DoubleAdvance(from, to)
        | LegalMove::EnPassant(from, to)
        | LegalMove::Promoting(from, to, _) => (from, to),
        LegalMove::ShortCastle | LegalMove::LongCastle => {
            unreachable!("castling handled separately")
        }
    }
}

fn is_capture(state: &MoveState, lm: LegalMove) -> bool {
    match lm {
        LegalMove::EnPassant(_, _) => true,
        LegalMove::ShortCastle | LegalMove::LongCastle => false,
        _ => {
            let (_, to) = move_squares(lm);
            state.contents(to).is_some()
        }
    }
}

fn disambiguate(state: &MoveState, piece: Piece, from: Square, to: Square, s: &mut String) {
    let mut same_file = false;
    let mut same_rank = false;
    let mut ambiguous = false;

    for sq in pieces_of(state, piece).iter() {
        if sq == from {
            continue;
        }
        if state.legal_moves(sq).contains(to) {
            ambiguous = true;
            same_file |= sq.file() == from.file();
            same_rank |= sq.rank() == from.rank();
        }
    }

    if !ambiguous {
        return;
    }

    if !same_file {
        s.push(from.file().to_char());
    } else if !same_rank {
        s.push(from.rank().to_char());
    } else {
        s.push(from.file().to_char());
        s.push(from.rank().to_char());
    }
}

fn check_suffix(state: &MoveState, lm: LegalMove) -> &'static str {
    let pos: &Position = state.as_ref();
    let mut pos = pos.clone();
    pos.apply_move(lm);
    let next = MoveState::new(pos);
    if next.is_check() {
        if next.has_any_legal_move() {
            "+"
        } else {
            "#"
        }
    } else {
        ""
    }
}

struct ParsedSan {
    piece: Piece,
    from_file: Option<File>,
    from_rank: Option<Rank>,
    to: Square,
    promotion: Option<Promotion>,
}

fn parse_san_components(s: &str) -> Option<ParsedSan> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();

    // Promotion suffix: "=Q", "=R", "=B", "=N"
    let (chars, promotion) = if len >= 3 && chars[len - 2] == '=' {
        let promo = Piece::from_char(chars[len - 1])
            .and_then(|piece| Promotion::try_from(piece).ok())?;
        (&chars[..len - 2], Some(promo))
    } else {
        (&chars[..], None)
    };

    let len = chars.len();
    if len < 2 {
        return None;
    }

    // Destination is always the last two chars: file + rank
    let dest_file = File::try_from_char(chars[len - 2])?;
    let dest_rank = Rank::try_from_char(chars[len - 1])?;
    let to = Square::new(dest_file, dest_rank);

    // Everything before destination is: [Piece][disambiguation][x]
    let prefix = &chars[..len - 2];
    let prefix = prefix.strip_suffix(&['x']).unwrap_or(prefix);

    let (piece, disambig) = match prefix.first().and_then(|c| Piece::from_char(*c)) {
        Some(Pawn) => return None,
        Some(piece) => (piece, &prefix[1..]),
        // pawn moves carry at most a file: "e4", "exd5"
        None => (Pawn, prefix),
    };

    let (from_file, from_rank) = match disambig {
        [] => (None, None),
        [c] => match (File::try_from_char(*c), Rank::try_from_char(*c)) {
            (Some(f), _) => (Some(f), None),
            (None, Some(r)) => (None, Some(r)),
            (None, None) => return None,
        },
        [f, r] => (Some(File::try_from_char(*f)?), Some(Rank::try_from_char(*r)?)),
        _ => return None,
    };
    if piece == Pawn && from_rank.is_some() {
        return None;
    }
    if promotion.is_some() && piece != Pawn {
        return None;
    }

    Some(ParsedSan {
        piece,
        from_file,
        from_rank,
        to,
        promotion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::*;
    use Square::*;

    // ---- to_san tests ----

    #[test]
    fn test_pawn_advance() {
        let state = MoveState::default();
        assert_eq!(to_san(&state, LegalMove::DoubleAdvance(E2, E4)), "e4");
        assert_eq!(to_san(&state, LegalMove::Standard(E2, E3)), "e3");
    }

    #[test]
    fn test_pawn_capture() {
        let position = Position::default()
            .set_contents(E4, Some(Material::WP))
            .set_contents(E2, None)
            .set_contents(D5, Some(Material::BP));
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::Standard(E4, D5)), "exd5");
    }

    #[test]
    fn test_pawn_promotion() {
        // White pawn on B7 can promote to B8 (cleared) or capture A8 (black rook)
        let position = Position::default()
            .set_contents(B7, Some(Material::WP))
            .set_contents(B8, None);
        let state = MoveState::new(position);
        assert_eq!(
            to_san(&state, LegalMove::Promoting(B7, B8, Promotion::Queen)),
            "b8=Q"
        );
        assert_eq!(
            to_san(&state, LegalMove::Promoting(B7, A8, Promotion::Knight)),
            "bxa8=N"
        );
    }

    #[test]
    fn test_knight_move() {
        let state = MoveState::default();
        assert_eq!(to_san(&state, LegalMove::Standard(G1, F3)), "Nf3");
    }

    #[test]
    fn test_knight_disambiguation_by_file() {
        let position = Position::default()
            .set_contents(A3, Some(Material::WN))
            .set_contents(C3, Some(Material::WN))
            .set_contents(B1, None);
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::Standard(A3, B5)), "Nab5");
        assert_eq!(to_san(&state, LegalMove::Standard(C3, B5)), "Ncb5");
    }

    #[test]
    fn test_knight_disambiguation_by_rank() {
        // Two knights on the same file (G), both can reach E2
        let position = Position::default()
            .set_contents(G1, Some(Material::WN))
            .set_contents(G3, Some(Material::WN))
            .set_contents(E2, None);
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::Standard(G1, E2)), "N1e2");
    }

    #[test]
    fn test_castling() {
        let position = Position::default()
            .set_contents(F1, None)
            .set_contents(G1, None);
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::ShortCastle), "O-O");

        let position = Position::default()
            .set_contents(B1, None)
            .set_contents(C1, None)
            .set_contents(D1, None);
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::LongCastle), "O-O-O");
    }

    #[test]
    fn test_en_passant() {
        let position = Position::default()
            .set_en_passant(Some(D6))
            .set_contents(D5, Some(Material::BP))
            .set_contents(E5, Some(Material::WP))
            .set_contents(E2, None);
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::EnPassant(E5, D6)), "exd6");
    }

    #[test]
    fn test_check_suffix() {
        let position = Position::default()
            .set_contents(D1, None)
            .set_contents(H5, Some(Material::WQ));
        let state = MoveState::new(position);
        assert_eq!(to_san(&state, LegalMove::Standard(H5, F7)), "Qxf7+");
    }

    #[test]
    fn test_checkmate_suffix() {
        // Fool's mate: 1. f3 e5 2. g4 Qh4#
        let mut state = MoveState::default();
        state.apply_move(LegalMove::Standard(F2, F3));
        state.apply_move(LegalMove::DoubleAdvance(E7, E5));
        state.apply_move(LegalMove::DoubleAdvance(G2, G4));
        assert_eq!(to_san(&state, LegalMove::Standard(D8, H4)), "Qh4#");
    }

    // ---- from_san tests ----

    #[test]
    fn test_parse_pawn_advance() {
        let state = MoveState::default();
        assert_eq!(from_san(&state, "e4").unwrap(), LegalMove::DoubleAdvance(E2, E4));
        assert_eq!(from_san(&state, "e3").unwrap(), LegalMove::Standard(E2, E3));
    }

    #[test]
    fn test_parse_knight_move() {
        let state = MoveState::default();
        assert_eq!(from_san(&state, "Nf3").unwrap(), LegalMove::Standard(G1, F3));
        assert_eq!(from_san(&state, "Nf3!?").unwrap(), LegalMove::Standard(G1, F3));
    }

    #[test]
    fn test_parse_castling() {
        let position = Position::default()
            .set_contents(F1, None)
            .set_contents(G1, None);
        let state = MoveState::new(position);
        assert_eq!(from_san(&state, "O-O").unwrap(), LegalMove::ShortCastle);
        assert_eq!(from_san(&state, "0-0").unwrap(), LegalMove::ShortCastle);
        assert!(from_san(&state, "O-O-O").is_err());
    }

    #[test]
    fn test_parse_castling_requires_legality() {
        let state = MoveState::default();
        assert!(from_san(&state, "O-O").is_err());
    }

    #[test]
    fn test_parse_with_check_suffix() {
        let position = Position::default()
            .set_contents(D1, None)
            .set_contents(H5, Some(Material::WQ));
        let state = MoveState::new(position);
        assert_eq!(
            from_san(&state, "Qxf7+").unwrap(),
            LegalMove::Standard(H5, F7)
        );
    }

    #[test]
    fn test_parse_promotion() {
        let position = Position::default()
            .set_contents(B7, Some(Material::WP))
            .set_contents(B8, None);
        let state = MoveState::new(position);
        assert_eq!(
            from_san(&state, "b8=Q").unwrap(),
            LegalMove::Promoting(B7, B8, Promotion::Queen)
        );
        assert_eq!(
            from_san(&state, "bxa8=N").unwrap(),
            LegalMove::Promoting(B7, A8, Promotion::Knight)
        );
        assert!(from_san(&state, "b8").is_err());
        assert!(from_san(&state, "b8=K").is_err());
    }

    #[test]
    fn test_parse_invalid_san() {
        let state = MoveState::default();
        assert!(from_san(&state, "Zz9").is_err());
        assert!(from_san(&state, "").is_err());
        assert!(from_san(&state, "x").is_err());
        assert!(from_san(&state, "e5").is_err());
        assert!(from_san(&state, "e3=Q").is_err());
    }

    #[test]
    fn test_parse_disambiguation() {
        let position = Position::default()
            .set_contents(A3, Some(Material::WN))
            .set_contents(C3, Some(Material::WN))
            .set_contents(B1, None);
        let state = MoveState::new(position);
        assert_eq!(
            from_san(&state, "Nab5").unwrap(),
            LegalMove::Standard(A3, B5)
        );
        assert_eq!(
            from_san(&state, "Ncb5").unwrap(),
            LegalMove::Standard(C3, B5)
        );
        assert!(from_san(&state, "Nb5").is_err());
    }

    #[test]
    fn test_game_sequence() {
        let mut state = MoveState::default();
        let moves = vec![
            LegalMove::DoubleAdvance(E2, E4),
            LegalMove::DoubleAdvance(E7, E5),
            LegalMove::Standard(G1, F3),
            LegalMove::Standard(B8, C6),
        ];
        for lm in moves {
            let san = to_san(&state, lm);
            assert_eq!(from_san(&state, &san).unwrap(), lm, "failed for SAN: {}", san);
            state.apply_move(lm);
        }
    }
}
