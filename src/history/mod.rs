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

//! Linear move history with a navigation pointer
//!
//! A `MoveHistory` is an ordered list of SAN tokens together with a pointer
//! `p` in `[0, N]`. The board shows the position after the first `p` moves.
//! There is no move tree: playing a move while `p < N` discards everything
//! from index `p` onward, even when the new move repeats the old one.
//!
//! Mutation is restricted to the crate so that the `Study` controller is the
//! only way to change `(history, p)`. Everything else reads through the
//! `Review` trait.

use serde::{Deserialize, Serialize};
use tracing::debug;

mod replay;

pub use replay::*;

#[allow(clippy::len_without_is_empty)]
pub trait Review {
    fn moves(&self) -> &[String];
    fn pointer(&self) -> usize;

    #[inline]
    fn len(&self) -> usize {
        self.moves().len()
    }
    #[inline]
    fn at_start(&self) -> bool {
        self.pointer() == 0
    }
    #[inline]
    fn at_end(&self) -> bool {
        self.pointer() == self.len()
    }
    /// Index of the most recently applied move, if any.
    #[inline]
    fn active_ply(&self) -> Option<usize> {
        self.pointer().checked_sub(1)
    }
    /// The moves currently applied to the board.
    #[inline]
    fn applied(&self) -> &[String] {
        &self.moves()[..self.pointer()]
    }
    #[inline]
    fn last_move(&self) -> Option<&str> {
        self.active_ply().map(|ply| self.moves()[ply].as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveHistory {
    moves: Vec<String>,
    pointer: usize,
}

impl MoveHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `san` at the pointer, discarding any moves at or beyond it.
    /// Returns the index the move was stored at.
    pub(crate) fn append(&mut self, san: String) -> usize {
        let ply = self.pointer;
        let discarded = self.moves.len() - ply;
        self.moves.truncate(ply);
        self.moves.push(san);
        self.pointer = ply + 1;
        debug!(ply, discarded, len = self.moves.len(), "Appended move");
        ply
    }

    /// Moves the pointer without touching the moves. Targets beyond the end
    /// are clamped to the end. Returns the pointer actually set.
    pub(crate) fn truncate_and_jump(&mut self, target: usize) -> usize {
        let len = self.moves.len();
        if target > len {
            debug!(target, len, "Clamped navigation target");
        }
        self.pointer = target.min(len);
        self.pointer
    }

    pub(crate) fn reset(&mut self) {
        debug!(discarded = self.moves.len(), "Reset history");
        self.moves.clear();
        self.pointer = 0;
    }

    /// Replaces the whole line and points at its end.
    pub(crate) fn replace(&mut self, moves: Vec<String>) {
        self.pointer = moves.len();
        self.moves = moves;
        debug!(len = self.pointer, "Replaced history");
    }
}

impl Review for MoveHistory {
    #[inline]
    fn moves(&self) -> &[String] {
        &self.moves
    }
    #[inline]
    fn pointer(&self) -> usize {
        self.pointer
    }
}
