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

//! Fire-and-forget analysis requests
//!
//! The coordinator spawns each request onto the ambient tokio runtime and
//! never waits for it. Completions travel back over an unbounded channel
//! and only touch the result slots when the owner drains the channel with
//! `poll` or `next`, so slots change on the owner's thread and never race
//! with navigation.
//!
//! Each request kind has its own slot. Every request carries a ticket with
//! the slot's next sequence number and the FEN it was issued for, which the
//! `Staleness` policy uses to decide whether a late result is still shown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::board::Color;

mod service;

pub use service::*;

/// What to do with a result that arrives after the board has moved on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Staleness {
    /// Drop results issued for a position other than the one displayed, and
    /// results older than the one already in the slot.
    #[default]
    CurrentPosition,
    /// Always show whatever arrived last.
    LatestArrival,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RequestKind {
    BestMove,
    Analyze,
    Coach,
}

/// Identifies one outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub kind: RequestKind,
    pub seq: u64,
    pub fen: String,
}

/// Latest result of one request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot<T> {
    value: Option<T>,
    fen: Option<String>,
    issued: u64,
    applied: u64,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            value: None,
            fen: None,
            issued: 0,
            applied: 0,
        }
    }
}

impl<T> Slot<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }
    /// FEN the current value was computed for.
    pub fn fen(&self) -> Option<&str> {
        self.fen.as_deref()
    }
    /// Sequence number of the current value; 0 while empty.
    pub fn seq(&self) -> u64 {
        self.applied
    }

    fn issue(&mut self, kind: RequestKind, fen: String) -> Ticket {
        self.issued += 1;
        Ticket {
            kind,
            seq: self.issued,
            fen,
        }
    }

    fn is_stale(&self, ticket: &Ticket, current_fen: &str, staleness: Staleness) -> bool {
        match staleness {
            Staleness::LatestArrival => false,
            Staleness::CurrentPosition => ticket.fen != current_fen || ticket.seq < self.applied,
        }
    }

    fn fill(&mut self, ticket: &Ticket, value: T) {
        self.value = Some(value);
        self.fen = Some(ticket.fen.clone());
        self.applied = ticket.seq;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisSlots {
    pub best_move: Slot<String>,
    pub analysis: Slot<String>,
    pub coach: Slot<CoachReply>,
}

/// What happened to a completed request when it was drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    Applied(Ticket),
    Discarded(Ticket),
    Failed(Ticket, String),
}

impl AnalysisEvent {
    pub fn ticket(&self) -> &Ticket {
        match self {
            AnalysisEvent::Applied(ticket)
            | AnalysisEvent::Discarded(ticket)
            | AnalysisEvent::Failed(ticket, _) => ticket,
        }
    }
}

#[derive(Debug)]
enum Outcome {
    BestMove(Result<String, AnalysisError>),
    Analyze(Result<String, AnalysisError>),
    Coach(Result<CoachReply, AnalysisError>),
    Lost(AnalysisError),
}

#[derive(Debug)]
struct Completion {
    ticket: Ticket,
    outcome: Outcome,
}

pub struct AnalysisCoordinator {
    service: Arc<dyn AnalysisService>,
    staleness: Staleness,
    slots: AnalysisSlots,
    in_flight: usize,
    sender: UnboundedSender<Completion>,
    receiver: UnboundedReceiver<Completion>,
}

impl AnalysisCoordinator {
    pub fn new(service: Arc<dyn AnalysisService>, staleness: Staleness) -> Self {
        let (sender, receiver) = unbounded_channel();
        Self {
            service,
            staleness,
            slots: AnalysisSlots::default(),
            in_flight: 0,
            sender,
            receiver,
        }
    }

    pub fn slots(&self) -> &AnalysisSlots {
        &self.slots
    }

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }

    /// Requests issued but not yet drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn request_best_move(&mut self, fen: String) -> Result<Ticket, AnalysisError> {
        let handle = Handle::try_current().map_err(|_| AnalysisError::NoRuntime)?;
        let ticket = self.slots.best_move.issue(RequestKind::BestMove, fen);
        let request = PositionRequest {
            fen: ticket.fen.clone(),
        };
        let service = Arc::clone(&self.service);
        Ok(self.spawn(&handle, ticket, async move {
            Outcome::BestMove(service.best_move(request).await)
        }))
    }

    pub fn request_analysis(&mut self, fen: String) -> Result<Ticket, AnalysisError> {
        let handle = Handle::try_current().map_err(|_| AnalysisError::NoRuntime)?;
        let ticket = self.slots.analysis.issue(RequestKind::Analyze, fen);
        let request = PositionRequest {
            fen: ticket.fen.clone(),
        };
        let service = Arc::clone(&self.service);
        Ok(self.spawn(&handle, ticket, async move {
            Outcome::Analyze(service.analyze(request).await)
        }))
    }

    pub fn request_coach(
        &mut self,
        question: String,
        fen: String,
        player_color: Color,
    ) -> Result<Ticket, AnalysisError> {
        let handle = Handle::try_current().map_err(|_| AnalysisError::NoRuntime)?;
        let ticket = self.slots.coach.issue(RequestKind::Coach, fen);
        let request = CoachRequest {
            question,
            fen: ticket.fen.clone(),
            player_color,
        };
        let service = Arc::clone(&self.service);
        Ok(self.spawn(&handle, ticket, async move {
            Outcome::Coach(service.coach(request).await)
        }))
    }

    fn spawn<F>(&mut self, handle: &Handle, ticket: Ticket, request: F) -> Ticket
    where
        F: std::future::Future<Output = Outcome> + Send + 'static,
    {
        info!(kind = %ticket.kind, seq = ticket.seq, fen = %ticket.fen, "Issued analysis request");
        let sender = self.sender.clone();
        let completion_ticket = ticket.clone();
        let task = handle.spawn(request);
        handle.spawn(async move {
            // a panicked or cancelled request still reports back
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(err) => Outcome::Lost(AnalysisError::TaskLost(err.to_string())),
            };
            // the receiver lives as long as the coordinator
            let _ = sender.send(Completion {
                ticket: completion_ticket,
                outcome,
            });
        });
        self.in_flight += 1;
        ticket
    }

    /// Applies every completion that has already arrived.
    pub fn poll(&mut self, current_fen: &str) -> Vec<AnalysisEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            events.push(self.apply(completion, current_fen));
        }
        events
    }

    /// Waits for the next completion. Returns `None` when nothing is in
    /// flight.
    pub async fn next(&mut self, current_fen: &str) -> Option<AnalysisEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let completion = self.receiver.recv().await?;
        Some(self.apply(completion, current_fen))
    }

    fn apply(&mut self, completion: Completion, current_fen: &str) -> AnalysisEvent {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Completion { ticket, outcome } = completion;
        let staleness = self.staleness;

        let slots = &mut self.slots;
        let result = match outcome {
            Outcome::BestMove(result) => {
                settle(&mut slots.best_move, &ticket, result, current_fen, staleness)
            }
            Outcome::Analyze(result) => {
                settle(&mut slots.analysis, &ticket, result, current_fen, staleness)
            }
            Outcome::Coach(result) => {
                settle(&mut slots.coach, &ticket, result, current_fen, staleness)
            }
            Outcome::Lost(err) => Err(err),
        };

        match result {
            Ok(true) => {
                info!(kind = %ticket.kind, seq = ticket.seq, "Applied analysis result");
                AnalysisEvent::Applied(ticket)
            }
            Ok(false) => {
                warn!(
                    kind = %ticket.kind,
                    seq = ticket.seq,
                    fen = %ticket.fen,
                    "Discarded stale analysis result"
                );
                AnalysisEvent::Discarded(ticket)
            }
            Err(err) => {
                warn!(kind = %ticket.kind, seq = ticket.seq, error = %err, "Analysis request failed");
                AnalysisEvent::Failed(ticket, err.to_string())
            }
        }
    }
}

// Ok(true) when the slot took the value, Ok(false) when it was stale.
fn settle<T>(
    slot: &mut Slot<T>,
    ticket: &Ticket,
    result: Result<T, AnalysisError>,
    current_fen: &str,
    staleness: Staleness,
) -> Result<bool, AnalysisError> {
    let value = result?;
    if slot.is_stale(ticket, current_fen, staleness) {
        return Ok(false);
    }
    slot.fill(ticket, value);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const FEN_A: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1";
    const FEN_B: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";

    /// Answers every request with its FEN after a scripted delay. Calls past
    /// the end of the script answer immediately. Calls from `fail_from` on
    /// return a server error.
    #[derive(Default)]
    struct ScriptedService {
        delays: Mutex<VecDeque<u64>>,
        calls: AtomicUsize,
        fail_from: Option<usize>,
    }

    impl ScriptedService {
        fn with_delays(delays: &[u64]) -> Self {
            Self {
                delays: Mutex::new(delays.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn failing_after(calls: usize) -> Self {
            Self {
                fail_from: Some(calls),
                ..Self::default()
            }
        }

        async fn answer(&self, fen: &str) -> Result<String, AnalysisError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.lock().unwrap().pop_front().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.fail_from.is_some_and(|from| call >= from) {
                return Err(AnalysisError::Status(500));
            }
            Ok(format!("answer for {fen}"))
        }
    }

    #[async_trait]
    impl AnalysisService for ScriptedService {
        async fn best_move(&self, request: PositionRequest) -> Result<String, AnalysisError> {
            self.answer(&request.fen).await
        }
        async fn analyze(&self, request: PositionRequest) -> Result<String, AnalysisError> {
            self.answer(&request.fen).await
        }
        async fn coach(&self, request: CoachRequest) -> Result<CoachReply, AnalysisError> {
            let reply = self.answer(&request.fen).await?;
            Ok(CoachReply {
                reply,
                explanation: format!("{} to move: {}", request.player_color, request.question),
            })
        }
    }

    fn coordinator(service: ScriptedService, staleness: Staleness) -> AnalysisCoordinator {
        AnalysisCoordinator::new(Arc::new(service), staleness)
    }

    #[test]
    fn test_staleness_names() {
        assert_eq!(Staleness::default(), Staleness::CurrentPosition);
        assert_eq!(Staleness::LatestArrival.to_string(), "latest-arrival");
        assert_eq!(
            "current-position".parse::<Staleness>().unwrap(),
            Staleness::CurrentPosition
        );
        assert_eq!(
            serde_json::from_str::<Staleness>("\"latest-arrival\"").unwrap(),
            Staleness::LatestArrival
        );
    }

    #[test]
    fn test_request_without_runtime() {
        let mut coordinator = coordinator(ScriptedService::default(), Staleness::default());
        assert!(matches!(
            coordinator.request_best_move(FEN_A.to_string()),
            Err(AnalysisError::NoRuntime)
        ));
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_result_for_displayed_position_is_applied() {
        let mut coordinator = coordinator(ScriptedService::default(), Staleness::CurrentPosition);
        let ticket = coordinator.request_best_move(FEN_A.to_string()).unwrap();
        assert_eq!(ticket.seq, 1);
        assert_eq!(coordinator.in_flight(), 1);

        let event = coordinator.next(FEN_A).await.unwrap();
        assert_eq!(event, AnalysisEvent::Applied(ticket));
        let slot = &coordinator.slots().best_move;
        assert_eq!(slot.value().map(String::as_str), Some(format!("answer for {FEN_A}").as_str()));
        assert_eq!(slot.fen(), Some(FEN_A));
        assert_eq!(slot.seq(), 1);
        assert_eq!(coordinator.next(FEN_A).await, None);
    }

    #[tokio::test]
    async fn test_result_for_other_position_is_discarded() {
        let mut coordinator = coordinator(ScriptedService::default(), Staleness::CurrentPosition);
        let ticket = coordinator.request_analysis(FEN_A.to_string()).unwrap();

        // the user navigated to B before the answer arrived
        let event = coordinator.next(FEN_B).await.unwrap();
        assert_eq!(event, AnalysisEvent::Discarded(ticket));
        assert_eq!(coordinator.slots().analysis.value(), None);
    }

    #[tokio::test]
    async fn test_latest_arrival_applies_everything() {
        let mut coordinator = coordinator(ScriptedService::default(), Staleness::LatestArrival);
        let ticket = coordinator.request_analysis(FEN_A.to_string()).unwrap();
        let event = coordinator.next(FEN_B).await.unwrap();
        assert_eq!(event, AnalysisEvent::Applied(ticket));
        assert_eq!(coordinator.slots().analysis.fen(), Some(FEN_A));
    }

    #[tokio::test]
    async fn test_out_of_order_arrival() {
        // the first request is slow, the second fast
        let service = ScriptedService::with_delays(&[50, 0]);
        let mut coordinator = coordinator(service, Staleness::CurrentPosition);
        let first = coordinator.request_best_move(FEN_A.to_string()).unwrap();
        let second = coordinator.request_best_move(FEN_A.to_string()).unwrap();
        assert_eq!((first.seq, second.seq), (1, 2));

        assert_eq!(
            coordinator.next(FEN_A).await,
            Some(AnalysisEvent::Applied(second))
        );
        assert_eq!(
            coordinator.next(FEN_A).await,
            Some(AnalysisEvent::Discarded(first))
        );
        assert_eq!(coordinator.slots().best_move.seq(), 2);
    }

    #[tokio::test]
    async fn test_out_of_order_arrival_latest_wins() {
        let service = ScriptedService::with_delays(&[50, 0]);
        let mut coordinator = coordinator(service, Staleness::LatestArrival);
        let first = coordinator.request_best_move(FEN_A.to_string()).unwrap();
        coordinator.request_best_move(FEN_A.to_string()).unwrap();

        coordinator.next(FEN_A).await.unwrap();
        assert_eq!(
            coordinator.next(FEN_A).await,
            Some(AnalysisEvent::Applied(first))
        );
        assert_eq!(coordinator.slots().best_move.seq(), 1);
    }

    #[tokio::test]
    async fn test_slots_are_independent() {
        let mut coordinator = coordinator(ScriptedService::default(), Staleness::CurrentPosition);
        coordinator.request_best_move(FEN_A.to_string()).unwrap();
        coordinator
            .request_coach("Why?".to_string(), FEN_A.to_string(), Color::Black)
            .unwrap();
        let best = coordinator.next(FEN_A).await.unwrap();
        let coach = coordinator.next(FEN_A).await.unwrap();
        assert!(matches!(best, AnalysisEvent::Applied(_)));
        assert!(matches!(coach, AnalysisEvent::Applied(_)));

        let slots = coordinator.slots();
        assert_eq!(slots.best_move.seq(), 1);
        assert_eq!(slots.coach.seq(), 1);
        assert_eq!(slots.analysis.value(), None);
        let reply = slots.coach.value().unwrap();
        assert_eq!(reply.explanation, "black to move: Why?");
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_value() {
        let mut coordinator = coordinator(ScriptedService::failing_after(1), Staleness::CurrentPosition);
        let first = coordinator.request_best_move(FEN_A.to_string()).unwrap();
        assert_eq!(coordinator.next(FEN_A).await, Some(AnalysisEvent::Applied(first)));

        let second = coordinator.request_best_move(FEN_A.to_string()).unwrap();
        let event = coordinator.next(FEN_A).await.unwrap();
        assert_eq!(
            event,
            AnalysisEvent::Failed(second, "Analysis service returned status 500".to_string())
        );

        let slot = &coordinator.slots().best_move;
        assert_eq!(slot.value().map(String::as_str), Some(format!("answer for {FEN_A}").as_str()));
        assert_eq!(slot.fen(), Some(FEN_A));
        assert_eq!(slot.seq(), 1);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_on_empty_slot() {
        let mut coordinator = coordinator(ScriptedService::failing_after(0), Staleness::CurrentPosition);
        let ticket = coordinator.request_analysis(FEN_A.to_string()).unwrap();
        let event = coordinator.next(FEN_A).await.unwrap();
        assert!(matches!(event, AnalysisEvent::Failed(t, _) if t == ticket));
        assert_eq!(coordinator.slots().analysis.value(), None);
    }

    struct PanickingService;

    #[async_trait]
    impl AnalysisService for PanickingService {
        async fn best_move(&self, _request: PositionRequest) -> Result<String, AnalysisError> {
            panic!("engine crashed")
        }
        async fn analyze(&self, request: PositionRequest) -> Result<String, AnalysisError> {
            Ok(request.fen)
        }
        async fn coach(&self, _request: CoachRequest) -> Result<CoachReply, AnalysisError> {
            panic!("engine crashed")
        }
    }

    #[tokio::test]
    async fn test_panicked_request_still_completes() {
        let mut coordinator = AnalysisCoordinator::new(Arc::new(PanickingService), Staleness::default());
        let lost = coordinator.request_best_move(FEN_A.to_string()).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), coordinator.next(FEN_A))
            .await
            .expect("completion for a panicked request")
            .unwrap();
        assert!(matches!(event, AnalysisEvent::Failed(ticket, _) if ticket == lost));
        assert_eq!(coordinator.in_flight(), 0);
        assert_eq!(coordinator.slots().best_move.value(), None);
        assert_eq!(coordinator.next(FEN_A).await, None);

        // later requests are unaffected
        let ticket = coordinator.request_analysis(FEN_A.to_string()).unwrap();
        assert_eq!(coordinator.next(FEN_A).await, Some(AnalysisEvent::Applied(ticket)));
    }

    #[tokio::test]
    async fn test_poll_drains_without_waiting() {
        let service = ScriptedService::with_delays(&[1_000]);
        let mut coordinator = coordinator(service, Staleness::CurrentPosition);
        coordinator.request_analysis(FEN_A.to_string()).unwrap();
        assert!(coordinator.poll(FEN_A).is_empty());
        assert_eq!(coordinator.in_flight(), 1);
    }
}
