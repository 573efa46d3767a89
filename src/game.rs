//! The host a front end talks to
//!
//! `Game` owns the timer queue and the current `Session`, and is the only place
//! the session generation changes. Reset and quit bump the generation and
//! cancel the old generation's timers, so a superseded session can never be
//! touched by a late callback.

use crate::config::SessionConfig;
use crate::export::SessionSummary;
use crate::layout::{Position, StimulusId};
use crate::session::{InteractOutcome, Session, SessionEvent, SessionTask};
use crate::timer::TimerQueue;

/// Speech output; fire and forget
pub trait Announcer {
    fn announce(&mut self, text: &str);
}

/// Correct/incorrect sound or signal
pub trait FeedbackSink {
    fn play_feedback(&mut self, is_correct: bool);
}

/// Receives the finished session
pub trait ReportSink {
    fn on_summary(&mut self, summary: &SessionSummary);
}

/// Collaborator that swallows every call
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Announcer for Silent {
    fn announce(&mut self, _text: &str) {}
}

impl FeedbackSink for Silent {
    fn play_feedback(&mut self, _is_correct: bool) {}
}

impl ReportSink for Silent {
    fn on_summary(&mut self, _summary: &SessionSummary) {}
}

pub struct Collaborators {
    pub announcer: Box<dyn Announcer>,
    pub feedback: Box<dyn FeedbackSink>,
    pub report: Box<dyn ReportSink>,
}

impl Collaborators {
    pub fn silent() -> Self {
        Self {
            announcer: Box::new(Silent),
            feedback: Box::new(Silent),
            report: Box::new(Silent),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::silent()
    }
}

pub struct Game {
    config: SessionConfig,
    generation: u64,
    timers: TimerQueue<SessionTask>,
    session: Session,
    collaborators: Collaborators,
}

impl Game {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
        let config = config.sanitized();
        Self {
            session: Session::new(config.clone(), 0),
            config,
            generation: 0,
            timers: TimerQueue::new(),
            collaborators,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// When the next timer is due, so a caller can sleep until then
    pub fn next_due(&self) -> Option<u64> {
        self.timers.next_due()
    }

    pub fn start(&mut self, now_ms: u64) {
        self.session.start(now_ms, &mut self.timers);
        self.dispatch();
    }

    pub fn interact(&mut self, id: StimulusId, now_ms: u64) -> InteractOutcome {
        let outcome = self.session.on_interact(id, now_ms, &mut self.timers);
        self.dispatch();
        outcome
    }

    /// Hit-test `point` and interact with whatever is there
    pub fn interact_at(&mut self, point: Position, now_ms: u64) -> InteractOutcome {
        match self.session.stimulus_at(point) {
            Some(id) => self.interact(id, now_ms),
            None => InteractOutcome::Ignored,
        }
    }

    /// Fire every timer due by `now_ms`
    pub fn tick(&mut self, now_ms: u64) {
        for fired in self.timers.pop_due(now_ms) {
            self.session.handle_timer(fired, now_ms, &mut self.timers);
        }
        self.dispatch();
    }

    /// Throw the current session away and start a fresh one
    pub fn reset(&mut self, now_ms: u64) {
        self.replace_session();
        log::info!("reset to generation {}", self.generation);
        self.start(now_ms);
    }

    /// Abandon the session without a report and go back to idle
    pub fn quit(&mut self) {
        self.replace_session();
        log::info!("quit; idle at generation {}", self.generation);
    }

    fn replace_session(&mut self) {
        let cancelled = self.timers.cancel_generation(self.generation);
        log::debug!(
            "cancelled {} timers of generation {}",
            cancelled,
            self.generation
        );
        self.generation += 1;
        let speed = self.session.config().speed;
        self.session = Session::new(self.config.clone(), self.generation);
        self.session.set_speed(speed);
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.session.set_speed(speed);
    }

    fn dispatch(&mut self) {
        for event in self.session.drain_events() {
            match event {
                SessionEvent::Announce(text) => self.collaborators.announcer.announce(&text),
                SessionEvent::Feedback(ok) => self.collaborators.feedback.play_feedback(ok),
                SessionEvent::Completed(summary) => self.collaborators.report.on_summary(&summary),
                SessionEvent::LevelLoaded { .. } | SessionEvent::TargetChanged(_) => {}
            }
        }
    }
}
