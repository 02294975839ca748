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

//! Navigation controller
//!
//! `Study` owns the move history, its pointer and the position cache, and
//! is the only place any of them change. Every change that moves the
//! pointer or rewrites the line is published to observers as a `Snapshot`
//! before the call returns, so a board view, a move list and the pointer
//! never disagree.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{
    AnalysisCoordinator, AnalysisError, AnalysisEvent, AnalysisSlots, HttpAnalysisService, Ticket,
};
use crate::board::{
    format_movetext, parse_movetext, Color, Mask, PgnError, Position, Promotion, Rules, Square,
    StandardRules, Turn,
};
use crate::config::StudyConfig;
use crate::history::{MoveHistory, PositionCache, Review};

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Not a legal move: {from}{to}")]
    IllegalMove { from: Square, to: Square },
    #[error(transparent)]
    Pgn(#[from] PgnError),
    #[error("No analysis service configured")]
    NoAnalysis,
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Receives every published state change. Both methods default to no-ops.
pub trait StudyObserver: Send {
    fn on_snapshot(&mut self, _snapshot: &Snapshot) {}
    fn on_analysis(&mut self, _slots: &AnalysisSlots) {}
}

/// Read-only copy of everything a view needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub moves: Vec<String>,
    pub pointer: usize,
    pub fen: String,
    pub turn: Color,
    pub is_check: bool,
    pub last_move: Option<String>,
}

/// One numbered line of the move list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRow {
    pub number: usize,
    pub white: String,
    pub black: Option<String>,
    /// Which half of the row holds the most recently applied move.
    pub active: Option<Color>,
}

impl Snapshot {
    /// Pairs the moves into numbered rows, highlighting ply `pointer - 1`.
    pub fn rows(&self) -> Vec<MoveRow> {
        let active = self.pointer.checked_sub(1);
        self.moves
            .chunks(2)
            .enumerate()
            .map(|(row, pair)| {
                let active = match active {
                    Some(ply) if ply / 2 == row && ply % 2 == 0 => Some(Color::White),
                    Some(ply) if ply / 2 == row => Some(Color::Black),
                    _ => None,
                };
                MoveRow {
                    number: row + 1,
                    white: pair[0].clone(),
                    black: pair.get(1).cloned(),
                    active,
                }
            })
            .collect()
    }
}

/// Pointer movement. Every target is clamped to `[0, len]`.
pub trait Navigate: Review {
    fn jump(&mut self, target: usize);

    #[inline]
    fn go_to_start(&mut self) {
        self.jump(0);
    }
    #[inline]
    fn go_prev(&mut self) {
        if !self.at_start() {
            self.jump(self.pointer() - 1);
        }
    }
    #[inline]
    fn go_next(&mut self) {
        if !self.at_end() {
            self.jump(self.pointer() + 1);
        }
    }
    #[inline]
    fn go_to_end(&mut self) {
        self.jump(self.len());
    }
    #[inline]
    fn go_to_index(&mut self, index: usize) {
        self.jump(index);
    }
}

pub struct Study<R: Rules = StandardRules> {
    rules: R,
    history: MoveHistory,
    cache: PositionCache,
    analysis: Option<AnalysisCoordinator>,
    observers: Vec<Box<dyn StudyObserver>>,
}

impl Default for Study<StandardRules> {
    fn default() -> Self {
        Self::new(StandardRules)
    }
}

impl Study<StandardRules> {
    /// A study backed by the HTTP analysis service described by `config`.
    pub fn connect(config: &StudyConfig) -> Result<Self, StudyError> {
        let service = HttpAnalysisService::new(&config.endpoint, config.timeout())?;
        info!(endpoint = %config.endpoint, staleness = %config.staleness, "Connected study");
        let coordinator = AnalysisCoordinator::new(Arc::new(service), config.staleness);
        Ok(Self::default().with_analysis(coordinator))
    }
}

impl<R: Rules> Study<R> {
    pub fn new(rules: R) -> Self {
        let cache = PositionCache::new(rules.initial_position());
        Self {
            rules,
            history: MoveHistory::new(),
            cache,
            analysis: None,
            observers: Vec::new(),
        }
    }

    pub fn with_analysis(mut self, coordinator: AnalysisCoordinator) -> Self {
        self.analysis = Some(coordinator);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn StudyObserver>) {
        self.observers.push(observer);
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    /// The displayed position, i.e. the position after `pointer()` moves.
    pub fn position(&self) -> &Position {
        self.cache
            .get(self.history.pointer())
            .expect("Study::position - cache covers the whole history")
    }

    pub fn fen(&self) -> String {
        self.rules.to_position_string(self.position())
    }

    pub fn snapshot(&self) -> Snapshot {
        let position = self.position();
        Snapshot {
            moves: self.history.moves().to_vec(),
            pointer: self.history.pointer(),
            fen: self.rules.to_position_string(position),
            turn: position.turn(),
            is_check: self.rules.is_check(position),
            last_move: self.history.last_move().map(str::to_string),
        }
    }

    /// Legal targets of the piece on `from` in the displayed position.
    pub fn destinations(&self, from: Square) -> Mask {
        self.rules.destinations(self.position(), from)
    }

    /// Plays `from` -> `to` from the displayed position, promoting to a
    /// queen, and returns the move's SAN.
    pub fn play_move(&mut self, from: Square, to: Square) -> Result<String, StudyError> {
        self.play_move_with_promotion(from, to, Promotion::Queen)
    }

    /// Plays a move from the displayed position. Any moves after the pointer
    /// are discarded, even if the new move is the one that was there.
    /// An illegal move changes nothing.
    pub fn play_move_with_promotion(
        &mut self,
        from: Square,
        to: Square,
        promotion: Promotion,
    ) -> Result<String, StudyError> {
        let ply = self.history.pointer();
        let (next, san) = self
            .rules
            .apply(self.position(), from, to, Some(promotion))
            .map_err(|err| {
                debug!(%from, %to, error = %err, "Rejected move");
                StudyError::IllegalMove { from, to }
            })?;
        let fen = self.rules.to_position_string(&next);

        self.history.append(san.clone());
        self.cache.invalidate(ply);
        self.cache.push(next);
        info!(ply, %san, "Played move");

        self.publish();
        self.fire_best_move(fen);
        Ok(san)
    }

    /// Starts over from the initial position.
    pub fn reset(&mut self) {
        self.history.reset();
        self.cache.invalidate(0);
        info!("Reset study");
        self.publish();
    }

    /// Replaces the line with the mainline of `pgn` and jumps to its end.
    /// Nothing changes if any move fails to parse or is illegal.
    pub fn load_pgn(&mut self, pgn: &str) -> Result<(), StudyError> {
        let sans = parse_movetext(pgn)?;
        let mut position = self.rules.initial_position();
        let mut cache = PositionCache::new(position.clone());
        let mut moves = Vec::with_capacity(sans.len());

        for (ply, san) in sans.iter().enumerate() {
            let (next, canonical) = self.rules.apply_san(&position, san).map_err(|err| {
                debug!(ply, %san, error = %err, "Rejected PGN move");
                PgnError::IllegalMove {
                    ply: ply + 1,
                    san: san.clone(),
                }
            })?;
            moves.push(canonical);
            cache.push(next.clone());
            position = next;
        }

        info!(len = moves.len(), "Loaded PGN");
        self.history.replace(moves);
        self.cache = cache;
        self.publish();
        self.fire_best_move(self.rules.to_position_string(&position));
        Ok(())
    }

    /// The whole line as numbered movetext.
    pub fn pgn(&self) -> String {
        format_movetext(self.history.moves())
    }

    /// Requests a written analysis of the displayed position.
    pub fn analyze(&mut self) -> Result<Ticket, StudyError> {
        let fen = self.fen();
        let analysis = self.analysis.as_mut().ok_or(StudyError::NoAnalysis)?;
        Ok(analysis.request_analysis(fen)?)
    }

    /// Asks the coach about the displayed position, on behalf of the side
    /// to move.
    pub fn coach(&mut self, question: &str) -> Result<Ticket, StudyError> {
        let fen = self.fen();
        let turn = self.position().turn();
        let analysis = self.analysis.as_mut().ok_or(StudyError::NoAnalysis)?;
        Ok(analysis.request_coach(question.to_string(), fen, turn)?)
    }

    pub fn analysis_slots(&self) -> Option<&AnalysisSlots> {
        self.analysis.as_ref().map(|analysis| analysis.slots())
    }

    /// Applies every analysis result that has already arrived.
    pub fn poll_analysis(&mut self) -> Vec<AnalysisEvent> {
        let fen = self.fen();
        let Some(analysis) = self.analysis.as_mut() else {
            return Vec::new();
        };
        let events = analysis.poll(&fen);
        if events.iter().any(|e| matches!(e, AnalysisEvent::Applied(_))) {
            for observer in self.observers.iter_mut() {
                observer.on_analysis(analysis.slots());
            }
        }
        events
    }

    /// Waits for the next analysis result. Returns `None` when nothing is
    /// in flight.
    pub async fn next_analysis(&mut self) -> Option<AnalysisEvent> {
        let fen = self.fen();
        let analysis = self.analysis.as_mut()?;
        let event = analysis.next(&fen).await?;
        if let AnalysisEvent::Applied(_) = event {
            for observer in self.observers.iter_mut() {
                observer.on_analysis(analysis.slots());
            }
        }
        Some(event)
    }

    fn fire_best_move(&mut self, fen: String) {
        if let Some(analysis) = self.analysis.as_mut() {
            if let Err(err) = analysis.request_best_move(fen) {
                warn!(error = %err, "Best move request not sent");
            }
        }
    }

    fn publish(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for observer in self.observers.iter_mut() {
            observer.on_snapshot(&snapshot);
        }
    }
}

impl<R: Rules> Review for Study<R> {
    #[inline]
    fn moves(&self) -> &[String] {
        self.history.moves()
    }
    #[inline]
    fn pointer(&self) -> usize {
        self.history.pointer()
    }
}

impl<R: Rules> Navigate for Study<R> {
    fn jump(&mut self, target: usize) {
        let before = self.history.pointer();
        let after = self.history.truncate_and_jump(target);
        if after != before {
            debug!(from = before, to = after, "Navigated");
            self.publish();
        }
    }
}
