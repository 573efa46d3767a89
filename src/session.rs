//! Target selection and the per-session state machine
//!
//! A `Session` owns the active set, the current target, the streaming queue and
//! the metrics log. It never sleeps: every delay is a [`SessionTask`] put on the
//! caller's [`TimerQueue`] under this session's generation, and fired tasks
//! from any other generation are dropped on arrival.

use serde::{Deserialize, Serialize};

use crate::config::{Mode, SessionConfig};
use crate::export::{report_date, SessionSummary};
use crate::layout::{hit_test, Layout, LayoutReport, Position, Stimulus, StimulusId};
use crate::metrics::{FinalizedLog, MetricsLog};
use crate::pool::{self, StreamingQueue, Symbol};
use crate::rng::SessionRng;
use crate::timer::{Fired, TimerHandle, TimerQueue};

/// How the next target is chosen among the symbols on screen
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetPolicy {
    /// Uniform over the distinct symbols present
    Random,
    /// The oldest symbol still on screen
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
pub enum Phase {
    Idle,
    LevelLoading,
    AwaitingInput,
    Correct,
    Incorrect,
    LevelComplete,
    SessionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTask {
    SelectTarget,
    CooldownElapsed,
    PopElapsed(StimulusId),
}

/// Side effects for the host to hand to its collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Announce(String),
    Feedback(bool),
    LevelLoaded { round: u32, report: LayoutReport },
    TargetChanged(Option<Symbol>),
    Completed(Box<SessionSummary>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractOutcome {
    Ignored,
    Correct,
    Incorrect,
}

type Timers = TimerQueue<SessionTask>;

#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    layout: Layout,
    generation: u64,
    rng: SessionRng,
    session_id: u32,

    phase: Phase,
    active: Vec<Stimulus>,
    target: Option<Symbol>,
    queue: StreamingQueue,
    round: u32,
    next_id: StimulusId,
    cooldown: Option<TimerHandle>,

    started_at_ms: u64,
    target_shown_at_ms: u64,
    layout_report: LayoutReport,
    metrics: MetricsLog,
    finalized: Option<FinalizedLog>,
    summary: Option<SessionSummary>,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(config: SessionConfig, generation: u64) -> Self {
        let config = config.sanitized();
        let mut rng = SessionRng::from_option(config.seed.map(|s| s.wrapping_add(generation)));
        let session_id = rng.session_id();
        Self {
            layout: config.layout(),
            config,
            generation,
            rng,
            session_id,
            phase: Phase::Idle,
            active: Vec::new(),
            target: None,
            queue: StreamingQueue::default(),
            round: 0,
            next_id: 0,
            cooldown: None,
            started_at_ms: 0,
            target_shown_at_ms: 0,
            layout_report: LayoutReport::default(),
            metrics: MetricsLog::new(),
            finalized: None,
            summary: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active(&self) -> &[Stimulus] {
        &self.active
    }

    pub fn target(&self) -> Option<&Symbol> {
        self.target.as_ref()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Symbols still waiting to enter a streaming session
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn metrics(&self) -> &MetricsLog {
        &self.metrics
    }

    pub fn finalized(&self) -> Option<&FinalizedLog> {
        self.finalized.as_ref()
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// Placement statistics over every wave and streamed symbol so far
    pub fn layout_report(&self) -> LayoutReport {
        self.layout_report
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::SessionComplete
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed.is_finite() && speed > 0.0 {
            self.config.speed = speed;
        }
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Stimulus under an arena point, if any
    pub fn stimulus_at(&self, point: Position) -> Option<StimulusId> {
        hit_test(&self.active, &self.layout.arena, point)
    }

    pub fn start(&mut self, now_ms: u64, timers: &mut Timers) {
        if self.phase != Phase::Idle {
            log::debug!("start ignored in phase {}", self.phase);
            return;
        }
        log::info!(
            "session {} starting: {} {} ({} mode)",
            self.session_id,
            self.config.game_title,
            self.config.pool_kind,
            self.config.mode
        );
        self.started_at_ms = now_ms;
        self.round = 1;
        match self.config.mode {
            Mode::Batch => self.load_round(now_ms, timers),
            Mode::Streaming => self.load_stream(now_ms, timers),
        }
    }

    fn load_round(&mut self, now_ms: u64, timers: &mut Timers) {
        self.phase = Phase::LevelLoading;
        let symbols = pool::batch(&self.config, &mut self.rng);
        let (placed, report) = self.layout.place_batch(
            &[],
            symbols,
            self.config.placement_policy(),
            &mut self.next_id,
            &mut self.rng,
        );
        self.finish_loading(placed, report, now_ms, timers);
    }

    fn load_stream(&mut self, now_ms: u64, timers: &mut Timers) {
        self.phase = Phase::LevelLoading;
        let (opening, queue) =
            StreamingQueue::split(pool::full_sequence(&self.config), self.config.batch_size);
        self.queue = queue;
        let (placed, report) = self.layout.place_batch(
            &[],
            opening,
            self.config.placement_policy(),
            &mut self.next_id,
            &mut self.rng,
        );
        self.finish_loading(placed, report, now_ms, timers);
    }

    fn finish_loading(
        &mut self,
        placed: Vec<Stimulus>,
        report: LayoutReport,
        now_ms: u64,
        timers: &mut Timers,
    ) {
        log::info!(
            "round {}: placed {} of {} ({} dropped, {} fallback)",
            self.round,
            report.placed,
            report.requested,
            report.dropped,
            report.fallbacks
        );
        self.metrics.record_appeared(placed.len());
        self.layout_report.merge(report);
        self.active = placed;
        self.events.push(SessionEvent::LevelLoaded {
            round: self.round,
            report,
        });
        self.schedule(timers, now_ms, self.config.timings.settle_ms, SessionTask::SelectTarget);
    }

    fn schedule(
        &self,
        timers: &mut Timers,
        now_ms: u64,
        delay_ms: u64,
        task: SessionTask,
    ) -> TimerHandle {
        timers.schedule(self.generation, now_ms.saturating_add(delay_ms), task)
    }

    pub fn handle_timer(&mut self, fired: Fired<SessionTask>, now_ms: u64, timers: &mut Timers) {
        if fired.generation != self.generation {
            log::debug!(
                "dropping {:?} from generation {} (current {})",
                fired.task,
                fired.generation,
                self.generation
            );
            return;
        }
        if self.phase == Phase::SessionComplete || self.phase == Phase::Idle {
            return;
        }
        match fired.task {
            SessionTask::SelectTarget => self.select_target(now_ms, timers),
            SessionTask::CooldownElapsed => {
                self.cooldown = None;
                if self.phase == Phase::Incorrect && self.target.is_some() {
                    self.phase = Phase::AwaitingInput;
                }
            }
            SessionTask::PopElapsed(id) => self.remove_popped(id, now_ms, timers),
        }
    }

    fn select_target(&mut self, now_ms: u64, timers: &mut Timers) {
        let candidates: Vec<&Symbol> = self
            .active
            .iter()
            .filter(|s| !s.popping)
            .map(|s| &s.symbol)
            .collect();

        if candidates.is_empty() {
            if self.active.is_empty() {
                self.level_complete(now_ms, timers);
            } else {
                // pops still in flight
                self.schedule(
                    timers,
                    now_ms,
                    self.config.timings.next_target_ms,
                    SessionTask::SelectTarget,
                );
            }
            return;
        }

        let target = match self.config.target_policy() {
            TargetPolicy::Sequential => candidates[0].clone(),
            TargetPolicy::Random => {
                let mut distinct: Vec<&Symbol> = Vec::new();
                for symbol in candidates {
                    if !distinct.contains(&symbol) {
                        distinct.push(symbol);
                    }
                }
                match self.rng.choose(&distinct) {
                    Some(symbol) => (*symbol).clone(),
                    None => return,
                }
            }
        };

        log::debug!("target '{}'", target);
        self.target_shown_at_ms = now_ms;
        self.phase = Phase::AwaitingInput;
        self.events.push(SessionEvent::Announce(target.to_string()));
        self.events
            .push(SessionEvent::TargetChanged(Some(target.clone())));
        self.target = Some(target);
    }

    fn level_complete(&mut self, now_ms: u64, timers: &mut Timers) {
        self.phase = Phase::LevelComplete;
        if self.config.mode == Mode::Batch && self.round < self.config.total_rounds {
            self.round += 1;
            self.load_round(now_ms, timers);
        } else {
            self.finish(now_ms, timers);
        }
    }

    pub fn on_interact(
        &mut self,
        id: StimulusId,
        now_ms: u64,
        timers: &mut Timers,
    ) -> InteractOutcome {
        let Some(target) = self.target.clone() else {
            return InteractOutcome::Ignored;
        };
        let Some(index) = self.active.iter().position(|s| s.id == id) else {
            return InteractOutcome::Ignored;
        };
        if self.active[index].popping {
            return InteractOutcome::Ignored;
        }

        let elapsed = now_ms.saturating_sub(self.target_shown_at_ms);
        let timestamp = now_ms.saturating_sub(self.started_at_ms);
        let symbol = self.active[index].symbol.clone();

        if symbol == target {
            self.metrics.record_correct(symbol.clone(), elapsed, timestamp);
            self.target_shown_at_ms = now_ms;
            self.active[index].popping = true;
            self.phase = Phase::Correct;
            self.events.push(SessionEvent::Feedback(true));
            self.events.push(SessionEvent::Announce(symbol.to_string()));
            self.schedule(
                timers,
                now_ms,
                self.config.timings.pop_ms,
                SessionTask::PopElapsed(id),
            );
            InteractOutcome::Correct
        } else {
            log::debug!("wrong: '{}' while target is '{}'", symbol, target);
            self.metrics.record_wrong(
                symbol,
                &target,
                self.config.wrong_attribution,
                elapsed,
                timestamp,
            );
            self.phase = Phase::Incorrect;
            self.events.push(SessionEvent::Feedback(false));
            self.events.push(SessionEvent::Announce("wrong".to_string()));
            if let Some(handle) = self.cooldown.take() {
                timers.cancel(handle);
            }
            self.cooldown = Some(self.schedule(
                timers,
                now_ms,
                self.config.timings.cooldown_ms,
                SessionTask::CooldownElapsed,
            ));
            InteractOutcome::Incorrect
        }
    }

    fn remove_popped(&mut self, id: StimulusId, now_ms: u64, timers: &mut Timers) {
        let Some(index) = self.active.iter().position(|s| s.id == id) else {
            return;
        };
        self.active.remove(index);

        if self.config.mode == Mode::Streaming {
            self.stream_next();
        }

        let target_left = match &self.target {
            Some(target) => self.active.iter().any(|s| &s.symbol == target),
            None => false,
        };
        if target_left {
            if self.phase == Phase::Correct {
                self.phase = Phase::AwaitingInput;
            }
            return;
        }

        if self.target.take().is_some() {
            // between targets: stay in Correct until SelectTarget fires
            if let Some(handle) = self.cooldown.take() {
                timers.cancel(handle);
            }
            self.phase = Phase::Correct;
            self.events.push(SessionEvent::TargetChanged(None));
            self.schedule(
                timers,
                now_ms,
                self.config.timings.next_target_ms,
                SessionTask::SelectTarget,
            );
        }
    }

    /// Pull symbols off the queue until one is placed or the queue is empty
    fn stream_next(&mut self) {
        let policy = self.config.placement_policy();
        while let Some(symbol) = self.queue.next() {
            let placed = self.layout.place_one(
                &self.active,
                symbol,
                policy,
                &mut self.next_id,
                &mut self.rng,
            );
            let mut report = LayoutReport {
                requested: 1,
                ..LayoutReport::default()
            };
            match placed {
                Some(stimulus) => {
                    report.placed = 1;
                    report.fallbacks = usize::from(stimulus.fallback);
                    self.layout_report.merge(report);
                    self.metrics.record_appeared(1);
                    self.active.push(stimulus);
                    return;
                }
                None => {
                    report.dropped = 1;
                    self.layout_report.merge(report);
                }
            }
        }
    }

    fn finish(&mut self, now_ms: u64, timers: &mut Timers) {
        timers.cancel_generation(self.generation);
        self.cooldown = None;
        self.phase = Phase::SessionComplete;
        self.target = None;

        let finished = std::mem::take(&mut self.metrics).finalize();
        let duration_ms = now_ms.saturating_sub(self.started_at_ms);
        let summary = SessionSummary::new(
            &self.config,
            self.session_id,
            report_date(),
            duration_ms,
            &finished,
        );
        log::info!(
            "session {} complete: {} correct, {} wrong, {:.1}% accuracy",
            self.session_id,
            summary.results.correct,
            summary.results.wrong,
            summary.results.accuracy_pct
        );
        self.finalized = Some(finished);
        self.events
            .push(SessionEvent::Completed(Box::new(summary.clone())));
        self.summary = Some(summary);
    }

    /// Counters for the live header: (stimuli appeared, correct, wrong)
    pub fn counts(&self) -> (usize, usize, usize) {
        match &self.finalized {
            Some(log) => {
                let agg = log.aggregates();
                (agg.stimuli_appeared, agg.correct, agg.wrong)
            }
            None => (
                self.metrics.stimuli_appeared(),
                self.metrics.correct_count(),
                self.metrics.wrong_count(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{ArenaShape, PlacementPolicy};
    use crate::metrics::WrongAttribution;
    use crate::pool::PoolKind;
    use assert_matches::assert_matches;

    /// Drives a session on a manual clock
    struct Harness {
        session: Session,
        timers: Timers,
        now: u64,
    }

    impl Harness {
        fn new(config: SessionConfig) -> Self {
            let mut h = Self {
                session: Session::new(config, 1),
                timers: TimerQueue::new(),
                now: 0,
            };
            h.session.start(0, &mut h.timers);
            h
        }

        fn advance(&mut self, ms: u64) {
            let until = self.now + ms;
            while let Some(due) = self.timers.next_due() {
                if due > until {
                    break;
                }
                self.now = self.now.max(due);
                for fired in self.timers.pop_due(self.now) {
                    self.session.handle_timer(fired, self.now, &mut self.timers);
                }
            }
            self.now = until;
        }

        fn click(&mut self, id: StimulusId) -> InteractOutcome {
            self.session.on_interact(id, self.now, &mut self.timers)
        }

        fn id_of(&self, symbol: &Symbol) -> Option<StimulusId> {
            self.session
                .active()
                .iter()
                .find(|s| &s.symbol == symbol && !s.popping)
                .map(|s| s.id)
        }

        fn wrong_id(&self) -> Option<StimulusId> {
            let target = self.session.target()?;
            self.session
                .active()
                .iter()
                .find(|s| &s.symbol != target)
                .map(|s| s.id)
        }

        /// Click the target until the session completes
        fn play_out(&mut self) {
            for _ in 0..500 {
                if self.session.is_complete() {
                    return;
                }
                match self.session.target().cloned() {
                    Some(target) => {
                        if let Some(id) = self.id_of(&target) {
                            self.click(id);
                        }
                        self.advance(100);
                    }
                    None => self.advance(100),
                }
            }
        }
    }

    fn roomy(config: SessionConfig) -> SessionConfig {
        SessionConfig {
            arena_size: 2000.0,
            stimulus_radius: 20.0,
            min_gap: 2.0,
            seed: Some(11),
            ..config
        }
    }

    fn streaming_a_to_f() -> SessionConfig {
        roomy(SessionConfig {
            pool_kind: PoolKind::LettersUpper,
            mode: Mode::Streaming,
            batch_size: 4,
            arena_shape: ArenaShape::Rect,
            ..SessionConfig::default()
        })
    }

    fn symbols(session: &Session) -> Vec<String> {
        session
            .active()
            .iter()
            .map(|s| s.symbol.to_string())
            .collect()
    }

    fn assert_target_valid(session: &Session) {
        if let Some(target) = session.target() {
            assert!(
                session.active().iter().any(|s| &s.symbol == target),
                "target {} not on screen",
                target
            );
        }
    }

    #[test]
    fn settles_before_the_first_target() {
        let mut h = Harness::new(streaming_a_to_f());
        assert_eq!(h.session.phase(), Phase::LevelLoading);
        assert_eq!(h.session.target(), None);
        h.advance(299);
        assert_eq!(h.session.target(), None);
        h.advance(1);
        assert_eq!(h.session.phase(), Phase::AwaitingInput);
        assert_eq!(h.session.target(), Some(&Symbol::from("A")));
    }

    #[test]
    fn streaming_window_walks_the_alphabet() {
        let mut h = Harness::new(streaming_a_to_f());
        assert_eq!(symbols(&h.session), vec!["A", "B", "C", "D"]);
        assert_eq!(h.session.remaining(), 22);
        h.advance(300);

        for expected in ["A", "B", "C", "D"] {
            let target = h.session.target().cloned().unwrap();
            assert_eq!(target.as_str(), expected);
            let id = h.id_of(&target).unwrap();
            assert_matches!(h.click(id), InteractOutcome::Correct);
            h.advance(250);
            assert_eq!(h.session.active().len(), 4);
            h.advance(600);
        }
        assert_eq!(symbols(&h.session), vec!["E", "F", "G", "H"]);
    }

    #[test]
    fn six_symbol_stream_leaves_two_after_four_clears() {
        let mut h = Harness::new(streaming_a_to_f());
        // cut the queue down to E, F
        h.session.queue = StreamingQueue::split(vec![Symbol::from("E"), Symbol::from("F")], 0).1;
        h.advance(300);

        for _ in 0..4 {
            let target = h.session.target().cloned().unwrap();
            let id = h.id_of(&target).unwrap();
            h.click(id);
            h.advance(850);
        }

        assert_eq!(symbols(&h.session), vec!["E", "F"]);
        assert_eq!(h.session.remaining(), 0);
        assert!(!h.session.is_complete());
        assert_eq!(h.session.metrics().correct_count(), 4);
    }

    #[test]
    fn incorrect_leaves_active_set_and_target_alone() {
        let mut h = Harness::new(streaming_a_to_f());
        h.advance(300);
        let before = symbols(&h.session);
        let target = h.session.target().cloned();
        let wrong = h.wrong_id().unwrap();

        assert_matches!(h.click(wrong), InteractOutcome::Incorrect);
        assert_eq!(h.session.phase(), Phase::Incorrect);
        assert_eq!(h.session.metrics().wrong_count(), 1);
        assert_eq!(symbols(&h.session), before);
        assert_eq!(h.session.target().cloned(), target);

        h.advance(300);
        assert_eq!(h.session.phase(), Phase::AwaitingInput);
    }

    #[test]
    fn clicks_without_a_target_are_ignored() {
        let mut h = Harness::new(streaming_a_to_f());
        let id = h.session.active()[0].id;
        assert_matches!(h.click(id), InteractOutcome::Ignored);
        h.advance(300);
        assert_matches!(h.click(9999), InteractOutcome::Ignored);
        assert_eq!(h.session.metrics().entries().len(), 0);
    }

    #[test]
    fn popping_stimulus_cannot_be_hit_twice() {
        let mut h = Harness::new(streaming_a_to_f());
        h.advance(300);
        let id = h.id_of(&Symbol::from("A")).unwrap();
        assert_matches!(h.click(id), InteractOutcome::Correct);
        assert_matches!(h.click(id), InteractOutcome::Ignored);
        assert_eq!(h.session.metrics().correct_count(), 1);
    }

    #[test]
    fn reaction_time_spans_wrong_attempts() {
        let mut h = Harness::new(streaming_a_to_f());
        h.advance(300);
        h.advance(400);
        let wrong = h.wrong_id().unwrap();
        h.click(wrong);
        h.advance(500);
        let id = h.id_of(&Symbol::from("A")).unwrap();
        h.click(id);

        let entries = h.session.metrics().entries();
        assert_eq!(entries[0].reaction_time_ms, 400);
        assert_eq!(entries[1].reaction_time_ms, 900);
        assert!(entries[1].is_correct);
    }

    #[test]
    fn duplicates_all_clear_before_target_moves() {
        let cfg = roomy(SessionConfig {
            pool_kind: PoolKind::Colors,
            color_level: crate::pool::ColorLevel::Beginner,
            batch_size: 8,
            ..SessionConfig::default()
        });
        let mut h = Harness::new(cfg);
        h.advance(300);
        let target = h.session.target().cloned().unwrap();
        let copies = h
            .session
            .active()
            .iter()
            .filter(|s| s.symbol == target)
            .count();
        assert_eq!(copies, 2);

        let first = h.id_of(&target).unwrap();
        h.click(first);
        h.advance(250);
        assert_eq!(h.session.target(), Some(&target));
        assert_eq!(h.session.phase(), Phase::AwaitingInput);

        let second = h.id_of(&target).unwrap();
        assert_matches!(h.click(second), InteractOutcome::Correct);
        h.advance(250);
        assert_eq!(h.session.target(), None);
        assert_target_valid(&h.session);
    }

    #[test]
    fn streaming_completes_with_every_symbol_cleared() {
        let mut h = Harness::new(streaming_a_to_f());
        h.advance(300);
        h.play_out();
        assert!(h.session.is_complete());

        let agg = h.session.finalized().unwrap().aggregates();
        assert_eq!(agg.correct, 26);
        assert_eq!(agg.stimuli_appeared, 26);
        assert_eq!(agg.accuracy_pct, 100.0);
        assert!(h.timers.is_empty());
    }

    #[test]
    fn batch_rounds_then_completes() {
        let cfg = roomy(SessionConfig {
            pool_kind: PoolKind::Numbers,
            range_min: 0,
            range_max: 9,
            batch_size: 10,
            total_rounds: 2,
            ..SessionConfig::default()
        });
        let mut h = Harness::new(cfg);
        h.advance(300);
        assert_eq!(h.session.round(), 1);
        h.play_out();

        assert!(h.session.is_complete());
        assert_eq!(h.session.round(), 2);
        let summary = h.session.summary().unwrap();
        assert_eq!(summary.results.stimuli, 20);
        assert_eq!(summary.results.correct, 20);
        assert_eq!(summary.settings.range, "0–9");

        let events = h.session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::Completed(_))));
        let loads = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::LevelLoaded { .. }))
            .count();
        assert_eq!(loads, 2);
    }

    #[test]
    fn conservation_holds_mid_session() {
        let cfg = roomy(SessionConfig {
            pool_kind: PoolKind::LettersUpper,
            batch_size: 12,
            ..SessionConfig::default()
        });
        let mut h = Harness::new(cfg);
        h.advance(300);
        for _ in 0..5 {
            if let Some(target) = h.session.target().cloned() {
                let id = h.id_of(&target).unwrap();
                h.click(id);
            }
            h.advance(900);
            assert_target_valid(&h.session);
        }
        let appeared = h.session.metrics().stimuli_appeared();
        let correct = h.session.metrics().correct_count();
        assert_eq!(appeared, correct + h.session.active().len());
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut h = Harness::new(streaming_a_to_f());
        h.advance(300);
        let target = h.session.target().cloned();
        let stale = Fired {
            generation: 0,
            due_ms: 0,
            task: SessionTask::SelectTarget,
        };
        h.session.handle_timer(stale, h.now, &mut h.timers);
        assert_eq!(h.session.target().cloned(), target);

        let id = h.id_of(&Symbol::from("A")).unwrap();
        h.click(id);
        let stale_pop = Fired {
            generation: 7,
            due_ms: 0,
            task: SessionTask::PopElapsed(id),
        };
        h.session.handle_timer(stale_pop, h.now, &mut h.timers);
        assert_eq!(h.session.active().len(), 4);
    }

    #[test]
    fn expected_attribution_counts_against_target() {
        let cfg = SessionConfig {
            wrong_attribution: WrongAttribution::Expected,
            ..streaming_a_to_f()
        };
        let mut h = Harness::new(cfg);
        h.advance(300);
        let wrong = h.wrong_id().unwrap();
        h.click(wrong);
        let rows = h.session.metrics().per_symbol();
        assert_eq!(rows[0].symbol, Symbol::from("A"));
        assert_eq!(rows[0].wrong, 1);
    }

    #[test]
    fn dropped_stimuli_do_not_count_as_appeared() {
        let cfg = SessionConfig {
            arena_size: 100.0,
            stimulus_radius: 20.0,
            min_gap: 5.0,
            batch_size: 12,
            placement: Some(PlacementPolicy::Drop),
            seed: Some(5),
            ..SessionConfig::default()
        };
        let h = Harness::new(cfg);
        let report = h.session.layout_report();
        assert!(report.dropped > 0);
        assert_eq!(h.session.metrics().stimuli_appeared(), report.placed);
        assert_eq!(h.session.active().len(), report.placed);
    }

    #[test]
    fn random_policy_targets_only_symbols_present() {
        let cfg = roomy(SessionConfig {
            pool_kind: PoolKind::LettersLower,
            batch_size: 6,
            total_rounds: 3,
            ..SessionConfig::default()
        });
        let mut h = Harness::new(cfg);
        for _ in 0..200 {
            assert_target_valid(&h.session);
            if let Some(target) = h.session.target().cloned() {
                if let Some(id) = h.id_of(&target) {
                    h.click(id);
                }
            }
            h.advance(200);
        }
        assert!(h.session.is_complete());
    }

    #[test]
    fn scheduling_near_the_clock_limit_saturates() {
        let cfg = SessionConfig {
            timings: crate::config::Timings {
                settle_ms: u64::MAX,
                ..Default::default()
            },
            ..streaming_a_to_f()
        };
        let mut session = Session::new(cfg, 0);
        assert_eq!(session.config().timings.settle_ms, 300);

        let mut timers = TimerQueue::new();
        session.start(u64::MAX - 10, &mut timers);
        assert_eq!(timers.next_due(), Some(u64::MAX));
        for fired in timers.pop_due(u64::MAX) {
            session.handle_timer(fired, u64::MAX, &mut timers);
        }
        assert_eq!(session.target(), Some(&Symbol::from("A")));
    }

    #[test]
    fn cleared_target_stays_correct_through_cooldown() {
        let mut h = Harness::new(streaming_a_to_f());
        h.advance(300);
        let a = h.id_of(&Symbol::from("A")).unwrap();
        assert_matches!(h.click(a), InteractOutcome::Correct);
        h.advance(100);
        let wrong = h.wrong_id().unwrap();
        assert_matches!(h.click(wrong), InteractOutcome::Incorrect);
        assert_eq!(h.session.phase(), Phase::Incorrect);

        // pop lands inside the cooldown
        h.advance(150);
        assert_eq!(h.session.target(), None);
        assert_eq!(h.session.phase(), Phase::Correct);
        h.advance(200);
        assert_eq!(h.session.phase(), Phase::Correct);

        h.advance(400);
        assert_eq!(h.session.phase(), Phase::AwaitingInput);
        assert_eq!(h.session.target(), Some(&Symbol::from("B")));
    }

    fn cramped_stream() -> SessionConfig {
        // at most one stimulus fits: centres within a 30px square, 50px apart
        SessionConfig {
            mode: Mode::Streaming,
            arena_shape: ArenaShape::Rect,
            arena_size: 60.0,
            stimulus_radius: 15.0,
            min_gap: 20.0,
            placement_attempts: 20,
            placement: Some(PlacementPolicy::Drop),
            seed: Some(2),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn streaming_drop_skips_to_a_symbol_that_fits() {
        let mut h = Harness::new(SessionConfig {
            batch_size: 2,
            ..cramped_stream()
        });
        assert_eq!(symbols(&h.session), vec!["A"]);
        assert_eq!(h.session.layout_report().dropped, 1);
        assert_eq!(h.session.remaining(), 24);

        h.advance(300);
        let a = h.id_of(&Symbol::from("A")).unwrap();
        h.click(a);
        h.advance(250);
        assert_eq!(symbols(&h.session), vec!["C"]);
        assert_eq!(h.session.remaining(), 23);
        assert_eq!(h.session.metrics().stimuli_appeared(), 2);
    }

    #[test]
    fn streaming_drop_keeps_pulling_while_blocked() {
        let mut h = Harness::new(SessionConfig {
            batch_size: 1,
            ..cramped_stream()
        });
        h.session.active.push(Stimulus {
            id: 999,
            symbol: Symbol::from("#"),
            position: Position::centre(),
            radius: 1000.0,
            fallback: false,
            popping: true,
        });

        h.advance(300);
        let a = h.id_of(&Symbol::from("A")).unwrap();
        h.click(a);
        h.advance(250);

        assert_eq!(h.session.remaining(), 0);
        assert_eq!(h.session.layout_report().dropped, 25);
        assert_eq!(h.session.metrics().stimuli_appeared(), 1);
        assert_eq!(symbols(&h.session), vec!["#"]);
    }
}
