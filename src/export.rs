//! Session reports: a nested document for JSON and a flat row for CSV
//!
//! Both projections come from the same `SessionSummary`, which is built once
//! from the finalized metrics log and the session configuration.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Mode, SessionConfig};
use crate::layout::ArenaShape;
use crate::metrics::{FinalizedLog, MetricsEntry, SymbolBreakdown};
use crate::pool::{ColorLevel, PoolKind, Symbol};
use crate::util::round_to;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("could not write report: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Who played, when, and which game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: u32,
    pub patient: String,
    pub date: String,
    pub game: String,
}

/// The configuration the results were produced under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub mode: Mode,
    pub pool_kind: PoolKind,
    pub range: String,
    /// Only set for colour pools
    pub color_level: Option<ColorLevel>,
    pub colors_used: Vec<String>,
    pub arena_shape: ArenaShape,
    pub arena_size: f64,
    pub speed: String,
    pub total_rounds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub stimuli: usize,
    pub duration_secs: f64,
    pub clicks: usize,
    pub correct: usize,
    pub wrong: usize,
    /// Percent, one decimal
    pub accuracy_pct: f64,
    /// Seconds, two decimals
    pub avg_reaction_secs: f64,
    pub avg_reaction_ms: f64,
    pub reaction_std_dev_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub info: SessionInfo,
    pub settings: SessionSettings,
    pub results: SessionResults,
    pub per_symbol: Vec<SymbolBreakdown>,
    pub entries: Vec<MetricsEntry>,
}

/// One CSV row. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    #[serde(rename = "Patient")]
    pub patient: String,
    #[serde(rename = "SessionID")]
    pub session_id: u32,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Game")]
    pub game: String,
    #[serde(rename = "Mode")]
    pub mode: String,
    #[serde(rename = "Range")]
    pub range: String,
    #[serde(rename = "Level")]
    pub level: String,
    #[serde(rename = "ColorsUsed")]
    pub colors_used: String,
    #[serde(rename = "ArenaShape")]
    pub arena_shape: String,
    #[serde(rename = "ArenaSize")]
    pub arena_size: f64,
    #[serde(rename = "Stimuli")]
    pub stimuli: usize,
    #[serde(rename = "Speed")]
    pub speed: String,
    #[serde(rename = "Duration")]
    pub duration: String,
    #[serde(rename = "Clicks")]
    pub clicks: usize,
    #[serde(rename = "Correct")]
    pub correct: usize,
    #[serde(rename = "Wrong")]
    pub wrong: usize,
    #[serde(rename = "Accuracy")]
    pub accuracy: String,
    #[serde(rename = "AvgReaction")]
    pub avg_reaction: String,
}

/// One CSV row per recorded attempt, keyed by the session columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    #[serde(rename = "Patient")]
    pub patient: String,
    #[serde(rename = "SessionID")]
    pub session_id: u32,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Game")]
    pub game: String,
    /// 1-based position in the log
    #[serde(rename = "Attempt")]
    pub attempt: usize,
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "AttributedTo")]
    pub attributed_to: String,
    #[serde(rename = "IsCorrect")]
    pub is_correct: bool,
    #[serde(rename = "ReactionTimeMs")]
    pub reaction_time_ms: u64,
    #[serde(rename = "TimestampMs")]
    pub timestamp_ms: u64,
}

impl AttemptRecord {
    pub fn entry(&self) -> MetricsEntry {
        MetricsEntry {
            symbol: Symbol::from(self.symbol.as_str()),
            attributed_to: Symbol::from(self.attributed_to.as_str()),
            is_correct: self.is_correct,
            reaction_time_ms: self.reaction_time_ms,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

fn csv_string<S: Serialize>(rows: impl IntoIterator<Item = S>) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(std::io::Error::new(e.error().kind(), e.to_string())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_csv_rows<S: Serialize, P: AsRef<Path>>(
    path: P,
    rows: impl IntoIterator<Item = S>,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Report date in the "18 October 2026" form
pub fn report_date() -> String {
    chrono::Local::now().format("%d %B %Y").to_string()
}

impl SessionSummary {
    pub fn new(
        config: &SessionConfig,
        session_id: u32,
        date: String,
        duration_ms: u64,
        log: &FinalizedLog,
    ) -> Self {
        let agg = log.aggregates();
        let is_colors = config.pool_kind == PoolKind::Colors;

        Self {
            info: SessionInfo {
                session_id,
                patient: config.patient.clone(),
                date,
                game: config.game_title.clone(),
            },
            settings: SessionSettings {
                mode: config.mode,
                pool_kind: config.pool_kind,
                range: if is_colors {
                    String::new()
                } else {
                    config.range_label()
                },
                color_level: is_colors.then_some(config.color_level),
                colors_used: if is_colors {
                    config
                        .color_level
                        .palette()
                        .iter()
                        .map(|c| c.to_string())
                        .collect()
                } else {
                    Vec::new()
                },
                arena_shape: config.arena_shape,
                arena_size: config.arena_size,
                speed: config.speed_label(),
                total_rounds: config.total_rounds,
            },
            results: SessionResults {
                stimuli: agg.stimuli_appeared,
                duration_secs: round_to(duration_ms as f64 / 1000.0, 1),
                clicks: agg.clicks,
                correct: agg.correct,
                wrong: agg.wrong,
                accuracy_pct: round_to(agg.accuracy_pct, 1),
                avg_reaction_secs: round_to(agg.avg_reaction_ms / 1000.0, 2),
                avg_reaction_ms: agg.avg_reaction_ms,
                reaction_std_dev_ms: agg.reaction_std_dev_ms,
            },
            per_symbol: log.per_symbol(),
            entries: log.entries().to_vec(),
        }
    }

    pub fn flat(&self) -> FlatRecord {
        let s = &self.settings;
        let r = &self.results;
        FlatRecord {
            patient: self.info.patient.clone(),
            session_id: self.info.session_id,
            date: self.info.date.clone(),
            game: self.info.game.clone(),
            mode: s.mode.to_string(),
            range: s.range.clone(),
            level: s.color_level.map(|l| l.to_string()).unwrap_or_default(),
            colors_used: s.colors_used.join("; "),
            arena_shape: s.arena_shape.to_string(),
            arena_size: s.arena_size,
            stimuli: r.stimuli,
            speed: s.speed.clone(),
            duration: format!("{:.1}", r.duration_secs),
            clicks: r.clicks,
            correct: r.correct,
            wrong: r.wrong,
            accuracy: format!("{:.1}", r.accuracy_pct),
            avg_reaction: format!("{:.2}", r.avg_reaction_secs),
        }
    }

    /// The metrics log as flat rows, in recording order
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| AttemptRecord {
                patient: self.info.patient.clone(),
                session_id: self.info.session_id,
                date: self.info.date.clone(),
                game: self.info.game.clone(),
                attempt: i + 1,
                symbol: e.symbol.to_string(),
                attributed_to: e.attributed_to.to_string(),
                is_correct: e.is_correct,
                reaction_time_ms: e.reaction_time_ms,
                timestamp_ms: e.timestamp_ms,
            })
            .collect()
    }

    pub fn csv_file_name(&self) -> String {
        format!("session_{}_results.csv", self.info.session_id)
    }

    pub fn attempts_csv_file_name(&self) -> String {
        format!("session_{}_attempts.csv", self.info.session_id)
    }

    pub fn json_file_name(&self) -> String {
        format!("session_{}_results.json", self.info.session_id)
    }

    /// Header line plus one record
    pub fn to_csv_string(&self) -> Result<String, ExportError> {
        csv_string([self.flat()])
    }

    /// Header line plus one record per attempt; empty when nothing was clicked
    pub fn to_attempts_csv_string(&self) -> Result<String, ExportError> {
        csv_string(self.attempts())
    }

    pub fn to_json_string(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        write_csv_rows(path, [self.flat()])
    }

    pub fn write_attempts_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        write_csv_rows(path, self.attempts())
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ExportError> {
        let mut file = File::create(path)?;
        serde_json::to_writer_pretty(&mut file, self)?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Write the CSV report into `dir` under its default name
    pub fn export_csv_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.csv_file_name());
        self.write_csv(&path)?;
        log::info!("wrote {}", path.display());
        Ok(path)
    }

    /// Write the per-attempt CSV into `dir` under its default name
    pub fn export_attempts_csv_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.attempts_csv_file_name());
        self.write_attempts_csv(&path)?;
        log::info!("wrote {}", path.display());
        Ok(path)
    }

    /// Write the JSON report into `dir` under its default name
    pub fn export_json_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(self.json_file_name());
        self.write_json(&path)?;
        log::info!("wrote {}", path.display());
        Ok(path)
    }
}
