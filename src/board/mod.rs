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

//! Chess rules for the study board
//!
//! The board layer knows how to play standard chess and nothing else.
//! The rest of the crate reaches it through the `Rules` trait, which
//! takes a `Position` and a candidate move and hands back a new
//! `Position` along with the move's SAN. The following features are
//! supported:
//!
//! [x] Standard chess rules (castling, en passant, promotion)
//! [x] Check evasion, absolute pins and double check
//! [x] SAN output with disambiguation and check/mate suffixes
//! [x] SAN input, including `0-0` style castling
//! [x] FEN import and export
//! [x] PGN movetext import and export (mainline only)
//! [ ] Chess960
//!
//! Some of the key abstractions include:
//!
//! * A `Square` represents the coordinates for a single square
//!   on an 8-by-8 board. The 8 rows and 8 columns on a board
//!   are represented by `Rank` (`Rank1` .. `Rank8`) and `File`
//!   ('FileA' .. 'FileH') respectively. Each square is uniquely
//!   identified by a rank and a file and is named using the letter of
//!   the file followed by the number of the rank (e.g. `A1` .. `H8`).
//!
//! * A `Mask` is a 64-bit (u64) value in which each bit maps to a
//!   square on the board. Masks are useful for efficiently representing
//!   which squares contain pawns, for instance, or which squares are
//!   legal move destinations for a piece. Masks can be combined or
//!   modified using bitwise `|`, `|=`, `&`, `&=` and `!` operators.
//!
//! * `Material` represents a piece of a specific color. A `Piece` has
//!   six variants: `King`, `Queen`, `Rook`, `Bishop`, `Knight` and `Pawn`.
//!   `Color` is either `White` or `Black`. Pawn promotion uses a separate
//!   `Promotion` type with only four variants. Convert between the two
//!   with `From<Promotion>` and `TryFrom<Piece>`.
//!
//! * A `Position` holds the state of the board, including the contents
//!   of each square, whose turn it is, castling rights, the en passant
//!   target and the move counters. The only public method that modifies
//!   a position is `apply_move`, and `Rules` never calls it on the
//!   caller's value. There is no mechanism to undo a move; earlier
//!   positions are recovered by replaying the move history.
//!
//! * `MoveState` wraps a single position and tracks which squares
//!   attack which, whether the king is in check and which pieces are
//!   pinned. It is responsible for identifying legal moves.
//!

mod castling;
mod fen;
mod material;
mod moves;
mod pgn;
mod position;
mod rules;
mod san;
mod square;

pub use castling::*;
pub use fen::*;
pub use material::*;
pub use moves::*;
pub use pgn::*;
pub use position::*;
pub use rules::*;
pub use san::*;
pub use square::*;

pub trait Turn {
    fn turn(&self) -> Color;
}
