//! Therapies, their games and each game's variants
//!
//! Every variant is a configuration preset for the one engine; nothing here
//! changes behaviour beyond what `SessionConfig` can express.

use crate::config::{Mode, SessionConfig};
use crate::layout::{ArenaShape, PlacementPolicy};
use crate::metrics::WrongAttribution;
use crate::pool::{ColorLevel, PoolKind};

#[derive(Debug, Clone, Copy)]
pub struct Variant {
    pub id: &'static str,
    pub title: &'static str,
    preset: fn() -> SessionConfig,
}

impl Variant {
    pub fn config(&self) -> SessionConfig {
        (self.preset)()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GameEntry {
    pub id: &'static str,
    pub title: &'static str,
    pub variants: &'static [Variant],
}

#[derive(Debug, Clone, Copy)]
pub struct Therapy {
    pub id: &'static str,
    pub title: &'static str,
    pub games: &'static [GameEntry],
}

fn wheel(game_title: &str, pool_kind: PoolKind) -> SessionConfig {
    SessionConfig {
        game_title: game_title.to_string(),
        pool_kind,
        mode: Mode::Batch,
        arena_shape: ArenaShape::Circle,
        arena_size: 600.0,
        stimulus_radius: 28.5,
        placement: Some(PlacementPolicy::Drop),
        ..SessionConfig::default()
    }
}

fn capital_wheel() -> SessionConfig {
    SessionConfig {
        batch_size: 12,
        total_rounds: 1,
        placement_attempts: 80,
        ..wheel("Capital Wheel", PoolKind::LettersUpper)
    }
}

fn small_wheel() -> SessionConfig {
    SessionConfig {
        batch_size: 12,
        total_rounds: 1,
        placement_attempts: 80,
        ..wheel("Small Letter Wheel", PoolKind::LettersLower)
    }
}

fn numeric_wheel() -> SessionConfig {
    SessionConfig {
        range_min: 0,
        range_max: 9,
        batch_size: 10,
        total_rounds: 2,
        placement_attempts: 80,
        ..wheel("Numeric Wheel", PoolKind::Numbers)
    }
}

fn color_wheel() -> SessionConfig {
    SessionConfig {
        color_level: ColorLevel::Intermediate,
        batch_size: 10,
        total_rounds: 2,
        placement_attempts: 150,
        min_gap: 5.0,
        ..wheel("Color Discriminant", PoolKind::Colors)
    }
}

fn sorting(game_title: &str, pool_kind: PoolKind, initial: usize) -> SessionConfig {
    SessionConfig {
        game_title: game_title.to_string(),
        pool_kind,
        mode: Mode::Streaming,
        batch_size: initial,
        arena_shape: ArenaShape::Rect,
        arena_size: 700.0,
        arena_padding: 10.0,
        stimulus_radius: 40.0,
        min_gap: 10.0,
        placement_attempts: 50,
        placement: Some(PlacementPolicy::Fallback),
        ..SessionConfig::default()
    }
}

fn uppercase_sorting() -> SessionConfig {
    SessionConfig {
        wrong_attribution: WrongAttribution::Expected,
        ..sorting("Uppercase Sorting", PoolKind::LettersUpper, 4)
    }
}

fn lowercase_sorting() -> SessionConfig {
    sorting("Lowercase Sorting", PoolKind::LettersLower, 6)
}

const WHEEL_VARIANTS: &[Variant] = &[
    Variant {
        id: "capital",
        title: "Capital Letters",
        preset: capital_wheel,
    },
    Variant {
        id: "small",
        title: "Small Letters",
        preset: small_wheel,
    },
    Variant {
        id: "numbers",
        title: "Numbers",
        preset: numeric_wheel,
    },
    Variant {
        id: "colors",
        title: "Colors",
        preset: color_wheel,
    },
];

const SORTING_VARIANTS: &[Variant] = &[
    Variant {
        id: "uppercase",
        title: "Uppercase A-Z",
        preset: uppercase_sorting,
    },
    Variant {
        id: "lowercase",
        title: "Lowercase a-z",
        preset: lowercase_sorting,
    },
];

const VISION_GAMES: &[GameEntry] = &[
    GameEntry {
        id: "wheel",
        title: "Rotating Wheel",
        variants: WHEEL_VARIANTS,
    },
    GameEntry {
        id: "sorting",
        title: "Alphabet Sorting",
        variants: SORTING_VARIANTS,
    },
];

pub const THERAPIES: &[Therapy] = &[Therapy {
    id: "vision",
    title: "Vision Therapy",
    games: VISION_GAMES,
}];

pub const DEFAULT_VARIANT: &str = "vision/wheel/capital";

pub fn find(therapy: &str, game: &str, variant: &str) -> Option<&'static Variant> {
    THERAPIES
        .iter()
        .find(|t| t.id == therapy)?
        .games
        .iter()
        .find(|g| g.id == game)?
        .variants
        .iter()
        .find(|v| v.id == variant)
}

/// Look up `"therapy/game/variant"`
pub fn find_variant(path: &str) -> Option<&'static Variant> {
    let mut parts = path.trim().split('/');
    let (therapy, game, variant) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    find(therapy, game, variant)
}

/// Every variant with its full path, in catalog order
pub fn paths() -> Vec<(String, &'static Variant)> {
    THERAPIES
        .iter()
        .flat_map(|t| {
            t.games.iter().flat_map(move |g| {
                g.variants
                    .iter()
                    .map(move |v| (format!("{}/{}/{}", t.id, g.id, v.id), v))
            })
        })
        .collect()
}
