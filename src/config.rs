use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::{Arena, ArenaShape, Layout, PlacementPolicy};
use crate::metrics::WrongAttribution;
use crate::pool::{ColorLevel, PoolKind};
use crate::session::TargetPolicy;

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
pub enum Mode {
    /// Whole waves, replaced once cleared
    #[default]
    Batch,
    /// Fixed window walking the pool in order
    Streaming,
}

/// Named delays of the target loop, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub settle_ms: u64,
    pub pop_ms: u64,
    pub cooldown_ms: u64,
    pub next_target_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            settle_ms: 300,
            pop_ms: 250,
            cooldown_ms: 300,
            next_target_ms: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub game_title: String,
    pub patient: String,
    pub pool_kind: PoolKind,
    pub range_min: i64,
    pub range_max: i64,
    pub color_level: ColorLevel,
    /// Wave size in batch mode, window size in streaming mode
    pub batch_size: usize,
    pub mode: Mode,
    pub total_rounds: u32,
    pub arena_shape: ArenaShape,
    pub arena_size: f64,
    pub arena_padding: f64,
    pub stimulus_radius: f64,
    pub min_gap: f64,
    pub placement_attempts: u32,
    /// Defaults to drop for batch mode and fallback for streaming mode
    pub placement: Option<PlacementPolicy>,
    /// Defaults to random for batch mode and sequential for streaming mode
    pub target_policy: Option<TargetPolicy>,
    pub wrong_attribution: WrongAttribution,
    pub speed: f64,
    pub timings: Timings,
    pub seed: Option<u64>,
}

const MAX_BATCH: usize = 200;
const MAX_RANGE_SPAN: i64 = 1000;
const MAX_ATTEMPTS: u32 = 10_000;
/// Longest delay any timing may ask for
pub const MAX_DELAY_MS: u64 = 60_000;

impl Timings {
    /// Delays above `MAX_DELAY_MS` fall back to their defaults
    pub fn sanitized(self) -> Self {
        let d = Timings::default();
        let bounded = |v: u64, default: u64| {
            if v > MAX_DELAY_MS {
                log::warn!("delay {v} ms over {MAX_DELAY_MS} ms, using {default} ms");
                default
            } else {
                v
            }
        };
        Self {
            settle_ms: bounded(self.settle_ms, d.settle_ms),
            pop_ms: bounded(self.pop_ms, d.pop_ms),
            cooldown_ms: bounded(self.cooldown_ms, d.cooldown_ms),
            next_target_ms: bounded(self.next_target_ms, d.next_target_ms),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            game_title: "Rotating Wheel".to_string(),
            patient: "Demo Patient".to_string(),
            pool_kind: PoolKind::LettersUpper,
            range_min: 0,
            range_max: 9,
            color_level: ColorLevel::Intermediate,
            batch_size: 10,
            mode: Mode::Batch,
            total_rounds: 1,
            arena_shape: ArenaShape::Circle,
            arena_size: 600.0,
            arena_padding: 0.0,
            stimulus_radius: 28.5,
            min_gap: 5.0,
            placement_attempts: 80,
            placement: None,
            target_policy: None,
            wrong_attribution: WrongAttribution::Clicked,
            speed: 1.0,
            timings: Timings::default(),
            seed: None,
        }
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

impl SessionConfig {
    /// Replace malformed values with documented defaults so a session can
    /// always start
    pub fn sanitized(mut self) -> Self {
        let d = SessionConfig::default();

        if self.batch_size == 0 {
            log::warn!("batch size 0, using {}", d.batch_size);
            self.batch_size = d.batch_size;
        }
        self.batch_size = self.batch_size.min(MAX_BATCH);
        if self.range_max < self.range_min {
            log::warn!(
                "range {}..={} reversed, swapping",
                self.range_min,
                self.range_max
            );
            std::mem::swap(&mut self.range_min, &mut self.range_max);
        }
        if self.range_max.saturating_sub(self.range_min) >= MAX_RANGE_SPAN {
            self.range_max = self.range_min.saturating_add(MAX_RANGE_SPAN - 1);
        }
        if self.total_rounds == 0 {
            self.total_rounds = 1;
        }
        if !positive(self.arena_size) {
            log::warn!("arena size {} invalid, using {}", self.arena_size, d.arena_size);
            self.arena_size = d.arena_size;
        }
        if !positive(self.stimulus_radius) {
            self.stimulus_radius = d.stimulus_radius.min(self.arena_size / 4.0);
        }
        if self.stimulus_radius > self.arena_size / 4.0 {
            log::warn!(
                "stimulus radius {} too large for arena {}, clamping",
                self.stimulus_radius,
                self.arena_size
            );
            self.stimulus_radius = self.arena_size / 4.0;
        }
        if !(self.min_gap.is_finite() && self.min_gap >= 0.0) {
            self.min_gap = 0.0;
        }
        if !(self.arena_padding.is_finite() && self.arena_padding >= 0.0) {
            self.arena_padding = 0.0;
        }
        self.arena_padding = self
            .arena_padding
            .min(self.arena_size / 2.0 - self.stimulus_radius);
        if self.placement_attempts == 0 {
            self.placement_attempts = d.placement_attempts;
        }
        self.placement_attempts = self.placement_attempts.min(MAX_ATTEMPTS);
        if !positive(self.speed) {
            self.speed = 1.0;
        }
        self.timings = self.timings.sanitized();
        if self.patient.trim().is_empty() {
            self.patient = "Anonymous".to_string();
        }
        self
    }

    pub fn placement_policy(&self) -> PlacementPolicy {
        self.placement.unwrap_or(match self.mode {
            Mode::Batch => PlacementPolicy::Drop,
            Mode::Streaming => PlacementPolicy::Fallback,
        })
    }

    pub fn target_policy(&self) -> TargetPolicy {
        self.target_policy.unwrap_or(match self.mode {
            Mode::Batch => TargetPolicy::Random,
            Mode::Streaming => TargetPolicy::Sequential,
        })
    }

    pub fn layout(&self) -> Layout {
        Layout {
            arena: Arena::new(self.arena_shape, self.arena_size, self.arena_padding),
            radius_px: self.stimulus_radius,
            min_gap_px: self.min_gap,
            attempts: self.placement_attempts,
        }
    }

    /// "0–9" for numbers, the palette for colours, the alphabet otherwise
    pub fn range_label(&self) -> String {
        match self.pool_kind {
            PoolKind::LettersUpper => "A–Z".to_string(),
            PoolKind::LettersLower => "a–z".to_string(),
            PoolKind::Numbers => format!("{}–{}", self.range_min, self.range_max),
            PoolKind::Colors => self.color_level.palette().join("; "),
        }
    }

    pub fn speed_label(&self) -> String {
        format!("{}x", self.speed)
    }
}

pub trait ConfigStore {
    fn load(&self) -> SessionConfig;
    fn save(&self, cfg: &SessionConfig) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "popwheel") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("popwheel_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> SessionConfig {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<SessionConfig>(&bytes) {
                Ok(cfg) => return cfg.sanitized(),
                Err(e) => log::warn!("ignoring unreadable config {}: {}", self.path.display(), e),
            }
        }
        SessionConfig::default()
    }

    fn save(&self, cfg: &SessionConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
