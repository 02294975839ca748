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

use crate::board::{Position, Rules};

/// The position after the first `pointer` moves of `history`, replayed from
/// the initial position. `pointer` past the end replays everything.
pub fn reconstruct<R: Rules + ?Sized>(rules: &R, history: &[String], pointer: usize) -> Result<Position> {
    let mut position = rules.initial_position();
    for san in history.iter().take(pointer) {
        (position, _) = rules.apply_san(&position, san)?;
    }
    Ok(position)
}

/// Memoized prefix chain: `get(i)` is the position after `i` moves.
///
/// Entry 0 is always the initial position. Whenever the move at index `k`
/// (or anything after it) changes, the chain must be cut back to `k + 1`
/// entries with `invalidate(k)`.
#[derive(Debug, Clone)]
pub struct PositionCache {
    positions: Vec<Position>,
}

impl PositionCache {
    pub fn new(initial: Position) -> Self {
        Self {
            positions: vec![initial],
        }
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn get(&self, ply: usize) -> Option<&Position> {
        self.positions.get(ply)
    }

    pub fn push(&mut self, position: Position) {
        self.positions.push(position);
    }

    /// Drops every position that depends on the move at index `k`.
    pub fn invalidate(&mut self, k: usize) {
        self.positions.truncate(k + 1);
    }
}
