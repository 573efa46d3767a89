//! Stimulus placement inside the arena
//!
//! Positions are arena-relative percentages (0 to 100 on both axes, centre at
//! 50,50). Radii, gaps and padding are pixels; `Arena::size_px` converts
//! between the two so overlap checks happen in pixel space even when the
//! arena is drawn at a different scale.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::pool::Symbol;
use crate::rng::SessionRng;

pub type StimulusId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn centre() -> Self {
        Self { x: 50.0, y: 50.0 }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArenaShape {
    #[default]
    Circle,
    Rect,
}

/// The square region stimuli are placed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub shape: ArenaShape,
    pub size_px: f64,
    pub padding_px: f64,
}

impl Arena {
    pub fn new(shape: ArenaShape, size_px: f64, padding_px: f64) -> Self {
        Self {
            shape,
            size_px,
            padding_px,
        }
    }

    /// Pixels per percentage point
    pub fn scale(&self) -> f64 {
        self.size_px / 100.0
    }

    pub fn distance_px(&self, a: Position, b: Position) -> f64 {
        let dx = (a.x - b.x) * self.scale();
        let dy = (a.y - b.y) * self.scale();
        (dx * dx + dy * dy).sqrt()
    }

    /// Draw one position uniformly over the usable area for a stimulus of
    /// `radius_px`, without looking at other stimuli.
    pub fn sample(&self, radius_px: f64, rng: &mut SessionRng) -> Position {
        match self.shape {
            ArenaShape::Circle => {
                let angle = rng.unit() * TAU;
                let max_r = (self.size_px / 2.0 - radius_px - self.padding_px).max(0.0);
                // sqrt keeps the areal density uniform
                let r = rng.unit().sqrt() * max_r;
                Position::new(
                    50.0 + r * angle.cos() / self.scale(),
                    50.0 + r * angle.sin() / self.scale(),
                )
            }
            ArenaShape::Rect => {
                let inset = ((radius_px + self.padding_px) / self.scale()).min(50.0);
                Position::new(
                    rng.range_f64(inset, 100.0 - inset),
                    rng.range_f64(inset, 100.0 - inset),
                )
            }
        }
    }

    /// Whether a stimulus of `radius_px` centred at `pos` lies inside the arena
    pub fn contains(&self, pos: Position, radius_px: f64) -> bool {
        let eps = 1e-9;
        match self.shape {
            ArenaShape::Circle => {
                self.distance_px(pos, Position::centre()) + radius_px
                    <= self.size_px / 2.0 + eps
            }
            ArenaShape::Rect => {
                let r = radius_px / self.scale();
                pos.x - r >= -eps
                    && pos.y - r >= -eps
                    && pos.x + r <= 100.0 + eps
                    && pos.y + r <= 100.0 + eps
            }
        }
    }
}

/// A symbol placed in the arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub id: StimulusId,
    pub symbol: Symbol,
    pub position: Position,
    pub radius: f64,
    /// Position came from the unchecked fallback draw
    pub fallback: bool,
    /// Correctly selected, waiting for the pop delay before removal
    pub popping: bool,
}

/// No candidate position cleared every existing stimulus within the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementFailure {
    pub attempts: u32,
}

/// What to do with a stimulus that could not be placed without overlap
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
pub enum PlacementPolicy {
    /// Leave it out; the wave shrinks by one
    Drop,
    /// Put it at an unchecked random position
    Fallback,
}

/// Whether two stimuli keep at least `min_gap_px` between their edges
pub fn clear_of(arena: &Arena, a: &Stimulus, b: &Stimulus, min_gap_px: f64) -> bool {
    arena.distance_px(a.position, b.position) >= a.radius + b.radius + min_gap_px
}

/// Rejection-sample a position for a new stimulus of `radius_px`.
///
/// Draws at most `attempts` candidates and accepts the first whose centre is
/// at least `r_a + r_b + min_gap_px` away from every existing centre.
pub fn place_stimulus(
    existing: &[Stimulus],
    arena: &Arena,
    radius_px: f64,
    min_gap_px: f64,
    attempts: u32,
    rng: &mut SessionRng,
) -> Result<Position, PlacementFailure> {
    for _ in 0..attempts {
        let candidate = arena.sample(radius_px, rng);
        let clear = existing.iter().all(|s| {
            arena.distance_px(s.position, candidate) >= s.radius + radius_px + min_gap_px
        });
        if clear {
            return Ok(candidate);
        }
    }
    Err(PlacementFailure { attempts })
}

/// Topmost stimulus containing `point` (arena percentages, unrotated)
pub fn hit_test(stimuli: &[Stimulus], arena: &Arena, point: Position) -> Option<StimulusId> {
    stimuli
        .iter()
        .rev()
        .find(|s| arena.distance_px(s.position, point) <= s.radius)
        .map(|s| s.id)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub requested: usize,
    pub placed: usize,
    pub dropped: usize,
    pub fallbacks: usize,
}

impl LayoutReport {
    pub fn merge(&mut self, other: LayoutReport) {
        self.requested += other.requested;
        self.placed += other.placed;
        self.dropped += other.dropped;
        self.fallbacks += other.fallbacks;
    }
}

/// Placement parameters for one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub arena: Arena,
    pub radius_px: f64,
    pub min_gap_px: f64,
    pub attempts: u32,
}

impl Layout {
    /// Place one symbol next to `existing`, applying `policy` on failure.
    /// `next_id` is only consumed when a stimulus is produced.
    pub fn place_one(
        &self,
        existing: &[Stimulus],
        symbol: Symbol,
        policy: PlacementPolicy,
        next_id: &mut StimulusId,
        rng: &mut SessionRng,
    ) -> Option<Stimulus> {
        let (position, fallback) = match place_stimulus(
            existing,
            &self.arena,
            self.radius_px,
            self.min_gap_px,
            self.attempts,
            rng,
        ) {
            Ok(pos) => (pos, false),
            Err(failure) => match policy {
                PlacementPolicy::Drop => {
                    log::warn!(
                        "dropping '{}': no free position after {} attempts",
                        symbol,
                        failure.attempts
                    );
                    return None;
                }
                PlacementPolicy::Fallback => {
                    log::warn!(
                        "'{}' placed without overlap check after {} attempts",
                        symbol,
                        failure.attempts
                    );
                    (self.arena.sample(self.radius_px, rng), true)
                }
            },
        };

        let id = *next_id;
        *next_id += 1;
        log::debug!(
            "placed #{} '{}' at ({:.1}, {:.1})",
            id,
            symbol,
            position.x,
            position.y
        );
        Some(Stimulus {
            id,
            symbol,
            position,
            radius: self.radius_px,
            fallback,
            popping: false,
        })
    }

    /// Lay out a whole wave. Each placed stimulus is checked against
    /// `existing` and against the ones placed before it in this call.
    pub fn place_batch(
        &self,
        existing: &[Stimulus],
        symbols: Vec<Symbol>,
        policy: PlacementPolicy,
        next_id: &mut StimulusId,
        rng: &mut SessionRng,
    ) -> (Vec<Stimulus>, LayoutReport) {
        let mut report = LayoutReport {
            requested: symbols.len(),
            ..LayoutReport::default()
        };
        let mut all: Vec<Stimulus> = existing.to_vec();
        let mut placed = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            match self.place_one(&all, symbol, policy, next_id, rng) {
                Some(stimulus) => {
                    if stimulus.fallback {
                        report.fallbacks += 1;
                    }
                    report.placed += 1;
                    all.push(stimulus.clone());
                    placed.push(stimulus);
                }
                None => report.dropped += 1,
            }
        }

        (placed, report)
    }
}
