//! Symbol pools: which letters, digits or colours appear, and in what order
//!
//! Batch mode draws a whole wave per round; streaming mode walks the full
//! sequence through a fixed-size window (see [`StreamingQueue`]).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::config::SessionConfig;
use crate::rng::SessionRng;

/// An opaque display value: a letter, a digit string or a colour name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol(s)
    }
}

impl From<char> for Symbol {
    fn from(c: char) -> Self {
        Symbol(c.to_string())
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
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PoolKind {
    #[default]
    LettersUpper,
    LettersLower,
    Numbers,
    Colors,
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
pub enum ColorLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

const BEGINNER: &[&str] = &["Red", "Blue", "Yellow", "Green"];
const INTERMEDIATE: &[&str] = &["Red", "Blue", "Yellow", "Green", "Orange", "Purple"];
const ADVANCED: &[&str] = &[
    "Red", "Blue", "Yellow", "Green", "Orange", "Purple", "Pink", "White",
];

impl ColorLevel {
    pub fn palette(&self) -> &'static [&'static str] {
        match self {
            ColorLevel::Beginner => BEGINNER,
            ColorLevel::Intermediate => INTERMEDIATE,
            ColorLevel::Advanced => ADVANCED,
        }
    }
}

/// RGB for a palette colour name
pub fn color_rgb(name: &str) -> Option<(u8, u8, u8)> {
    match name {
        "Red" => Some((0xFF, 0x00, 0x00)),
        "Blue" => Some((0x00, 0x00, 0xFF)),
        "Yellow" => Some((0xFF, 0xFF, 0x00)),
        "Green" => Some((0x00, 0xFF, 0x00)),
        "Orange" => Some((0xFF, 0xA5, 0x00)),
        "Purple" => Some((0x80, 0x00, 0x80)),
        "Pink" => Some((0xFF, 0xC0, 0xCB)),
        "White" => Some((0xFF, 0xFF, 0xFF)),
        _ => None,
    }
}

fn letters(kind: PoolKind) -> impl Iterator<Item = char> {
    let (start, end) = if kind == PoolKind::LettersLower {
        ('a', 'z')
    } else {
        ('A', 'Z')
    };
    start..=end
}

/// The whole pool in sequence order
pub fn full_sequence(config: &SessionConfig) -> Vec<Symbol> {
    match config.pool_kind {
        PoolKind::LettersUpper | PoolKind::LettersLower => {
            letters(config.pool_kind).map(Symbol::from).collect()
        }
        PoolKind::Numbers => (config.range_min..=config.range_max)
            .map(|n| Symbol::from(n.to_string()))
            .collect(),
        PoolKind::Colors => config
            .color_level
            .palette()
            .iter()
            .map(|c| Symbol::from(*c))
            .collect(),
    }
}

/// Up to `count` numbers from `[min, max]`, each used at most twice.
///
/// Every value is used once before any value is used a second time. When all
/// values have hit the cap the pool stops short of `count`.
pub fn generate_number_pool(min: i64, max: i64, count: usize, rng: &mut SessionRng) -> Vec<Symbol> {
    let (min, max) = if max < min { (max, min) } else { (min, max) };
    let values: Vec<i64> = (min..=max).collect();
    let mut uses = vec![0u8; values.len()];
    let mut eligible: Vec<usize> = Vec::new();
    let mut pool = Vec::with_capacity(count);

    while pool.len() < count {
        if eligible.is_empty() {
            eligible = (0..values.len()).filter(|&i| uses[i] < 2).collect();
            if eligible.is_empty() {
                log::warn!(
                    "number range {}..={} exhausted after {} of {} values",
                    min,
                    max,
                    pool.len(),
                    count
                );
                break;
            }
            rng.shuffle(&mut eligible);
        }
        if let Some(i) = eligible.pop() {
            uses[i] += 1;
            pool.push(Symbol::from(values[i].to_string()));
        }
    }

    rng.shuffle(&mut pool);
    pool
}

/// `count` colours cycling through the level palette, shuffled
pub fn generate_color_pool(level: ColorLevel, count: usize, rng: &mut SessionRng) -> Vec<Symbol> {
    let palette = level.palette();
    let mut pool: Vec<Symbol> = (0..count)
        .map(|i| Symbol::from(palette[i % palette.len()]))
        .collect();
    rng.shuffle(&mut pool);
    pool
}

/// `count` letters drawn uniformly with replacement
pub fn generate_letter_batch(kind: PoolKind, count: usize, rng: &mut SessionRng) -> Vec<Symbol> {
    let alphabet: Vec<char> = letters(kind).collect();
    (0..count)
        .filter_map(|_| rng.choose(&alphabet).copied().map(Symbol::from))
        .collect()
}

/// One batch-mode wave for the configured pool
pub fn batch(config: &SessionConfig, rng: &mut SessionRng) -> Vec<Symbol> {
    match config.pool_kind {
        PoolKind::LettersUpper | PoolKind::LettersLower => {
            generate_letter_batch(config.pool_kind, config.batch_size, rng)
        }
        PoolKind::Numbers => {
            generate_number_pool(config.range_min, config.range_max, config.batch_size, rng)
        }
        PoolKind::Colors => generate_color_pool(config.color_level, config.batch_size, rng),
    }
}

/// Symbols waiting to enter a streaming session, front first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamingQueue {
    remaining: VecDeque<Symbol>,
}

impl StreamingQueue {
    /// Split `sequence` into the opening window and the queue behind it
    pub fn split(sequence: Vec<Symbol>, initial: usize) -> (Vec<Symbol>, Self) {
        let mut remaining: VecDeque<Symbol> = sequence.into();
        let take = initial.min(remaining.len());
        let opening: Vec<Symbol> = remaining.drain(..take).collect();
        (opening, Self { remaining })
    }

    pub fn next(&mut self) -> Option<Symbol> {
        self.remaining.pop_front()
    }

    pub fn peek(&self) -> Option<&Symbol> {
        self.remaining.front()
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::collections::HashMap;

    fn counts(pool: &[Symbol]) -> HashMap<String, usize> {
        pool.iter().map(|s| s.to_string()).counts()
    }

    #[test]
    fn digits_batch_of_ten_uses_each_once() {
        let mut rng = SessionRng::seeded(1);
        let pool = generate_number_pool(0, 9, 10, &mut rng);
        assert_eq!(pool.len(), 10);
        let c = counts(&pool);
        assert_eq!(c.len(), 10);
        assert!(c.values().all(|&n| n == 1));
    }

    #[test]
    fn doubles_only_after_every_value_used() {
        for seed in 0..20 {
            let mut rng = SessionRng::seeded(seed);
            let pool = generate_number_pool(0, 9, 14, &mut rng);
            assert_eq!(pool.len(), 14);
            let c = counts(&pool);
            assert!(c.values().all(|&n| n <= 2));
            // a doubled digit implies no digit is missing
            assert_eq!(c.len(), 10);
            assert_eq!(c.values().filter(|&&n| n == 2).count(), 4);
        }
    }

    #[test]
    fn small_range_truncates() {
        let mut rng = SessionRng::seeded(2);
        let pool = generate_number_pool(3, 5, 10, &mut rng);
        assert_eq!(pool.len(), 6);
        assert!(counts(&pool).values().all(|&n| n == 2));
    }

    #[test]
    fn reversed_range_is_swapped() {
        let mut rng = SessionRng::seeded(2);
        let pool = generate_number_pool(9, 0, 5, &mut rng);
        assert_eq!(pool.len(), 5);
        assert!(pool
            .iter()
            .all(|s| (0..=9).contains(&s.as_str().parse::<i64>().unwrap())));
    }

    #[test]
    fn color_pool_is_even() {
        let mut rng = SessionRng::seeded(4);
        let pool = generate_color_pool(ColorLevel::Intermediate, 10, &mut rng);
        assert_eq!(pool.len(), 10);
        let c = counts(&pool);
        assert_eq!(c.len(), 6);
        assert!(c.values().all(|&n| n == 1 || n == 2));
    }

    #[test]
    fn palettes_grow_with_level() {
        assert_eq!(ColorLevel::Beginner.palette().len(), 4);
        assert_eq!(ColorLevel::Intermediate.palette().len(), 6);
        assert_eq!(ColorLevel::Advanced.palette().len(), 8);
        for name in ColorLevel::Advanced.palette() {
            assert!(color_rgb(name).is_some());
        }
    }

    #[test]
    fn letter_batch_respects_case() {
        let mut rng = SessionRng::seeded(8);
        let upper = generate_letter_batch(PoolKind::LettersUpper, 12, &mut rng);
        assert_eq!(upper.len(), 12);
        assert!(upper
            .iter()
            .all(|s| s.as_str().chars().all(|c| c.is_ascii_uppercase())));
        let lower = generate_letter_batch(PoolKind::LettersLower, 12, &mut rng);
        assert!(lower
            .iter()
            .all(|s| s.as_str().chars().all(|c| c.is_ascii_lowercase())));
    }

    #[test]
    fn full_sequence_for_each_kind() {
        let mut config = SessionConfig::default();
        config.pool_kind = PoolKind::LettersLower;
        let seq = full_sequence(&config);
        assert_eq!(seq.len(), 26);
        assert_eq!(seq[0], Symbol::from("a"));

        config.pool_kind = PoolKind::Numbers;
        config.range_min = 2;
        config.range_max = 5;
        let seq = full_sequence(&config);
        assert_eq!(
            seq.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            vec!["2", "3", "4", "5"]
        );

        config.pool_kind = PoolKind::Colors;
        config.color_level = ColorLevel::Beginner;
        assert_eq!(full_sequence(&config).len(), 4);
    }

    #[test]
    fn streaming_split_keeps_order() {
        let seq: Vec<Symbol> = "ABCDEF".chars().map(Symbol::from).collect();
        let (opening, mut queue) = StreamingQueue::split(seq, 4);
        assert_eq!(opening, "ABCD".chars().map(Symbol::from).collect::<Vec<_>>());
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.peek(), Some(&Symbol::from("E")));
        assert_eq!(queue.next(), Some(Symbol::from("E")));
        assert_eq!(queue.next(), Some(Symbol::from("F")));
        assert!(queue.is_empty());
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn streaming_split_shorter_than_window() {
        let seq: Vec<Symbol> = "AB".chars().map(Symbol::from).collect();
        let (opening, queue) = StreamingQueue::split(seq, 4);
        assert_eq!(opening.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn pool_kind_display_matches_config_names() {
        assert_eq!(PoolKind::LettersUpper.to_string(), "letters-upper");
        assert_eq!(PoolKind::Colors.to_string(), "colors");
        assert_eq!(ColorLevel::Advanced.to_string(), "Advanced");
    }
}
