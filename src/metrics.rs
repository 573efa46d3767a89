//! Per-attempt telemetry for a session
//!
//! The log is append-only while the session runs. Aggregates are derived on
//! every call and never cached, so a finalized log always reports the same
//! numbers.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::pool::Symbol;
use crate::util::{mean, std_dev};

/// Which symbol a wrong attempt is counted against
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
pub enum WrongAttribution {
    /// The symbol on the stimulus that was selected
    #[default]
    Clicked,
    /// The target that should have been selected
    Expected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsEntry {
    /// Symbol on the selected stimulus
    pub symbol: Symbol,
    /// Symbol the attempt is counted against in the breakdown
    pub attributed_to: Symbol,
    pub is_correct: bool,
    /// Time since the target was shown (or since the last correct hit)
    pub reaction_time_ms: u64,
    /// Milliseconds since session start
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub stimuli_appeared: usize,
    pub correct: usize,
    pub wrong: usize,
    pub clicks: usize,
    pub accuracy_pct: f64,
    pub avg_reaction_ms: f64,
    pub reaction_std_dev_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolBreakdown {
    pub symbol: Symbol,
    pub correct: usize,
    pub wrong: usize,
    pub mean_reaction_ms: Option<f64>,
}

fn correct_reactions(entries: &[MetricsEntry]) -> Vec<f64> {
    entries
        .iter()
        .filter(|e| e.is_correct)
        .map(|e| e.reaction_time_ms as f64)
        .collect()
}

fn aggregates_of(entries: &[MetricsEntry], stimuli_appeared: usize) -> Aggregates {
    let reactions = correct_reactions(entries);
    let correct = reactions.len();
    let clicks = entries.len();
    let accuracy_pct = if stimuli_appeared > 0 {
        100.0 * correct as f64 / stimuli_appeared as f64
    } else {
        0.0
    };

    Aggregates {
        stimuli_appeared,
        correct,
        wrong: clicks - correct,
        clicks,
        accuracy_pct,
        avg_reaction_ms: mean(&reactions).unwrap_or(0.0),
        reaction_std_dev_ms: std_dev(&reactions).unwrap_or(0.0),
    }
}

fn breakdown_of(entries: &[MetricsEntry]) -> Vec<SymbolBreakdown> {
    entries
        .iter()
        .map(|e| &e.attributed_to)
        .unique()
        .map(|symbol| {
            let mine = entries
                .iter()
                .filter(|e| &e.attributed_to == symbol)
                .collect::<Vec<_>>();
            let reactions = mine
                .iter()
                .filter(|e| e.is_correct)
                .map(|e| e.reaction_time_ms as f64)
                .collect::<Vec<_>>();
            SymbolBreakdown {
                symbol: symbol.clone(),
                correct: reactions.len(),
                wrong: mine.len() - reactions.len(),
                mean_reaction_ms: mean(&reactions),
            }
        })
        .collect()
}

/// Append-only log owned by a running session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsLog {
    entries: Vec<MetricsEntry>,
    stimuli_appeared: usize,
}

impl MetricsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_appeared(&mut self, count: usize) {
        self.stimuli_appeared += count;
    }

    pub fn record_correct(&mut self, symbol: Symbol, reaction_time_ms: u64, timestamp_ms: u64) {
        self.entries.push(MetricsEntry {
            attributed_to: symbol.clone(),
            symbol,
            is_correct: true,
            reaction_time_ms,
            timestamp_ms,
        });
    }

    pub fn record_wrong(
        &mut self,
        clicked: Symbol,
        expected: &Symbol,
        attribution: WrongAttribution,
        reaction_time_ms: u64,
        timestamp_ms: u64,
    ) {
        let attributed_to = match attribution {
            WrongAttribution::Clicked => clicked.clone(),
            WrongAttribution::Expected => expected.clone(),
        };
        self.entries.push(MetricsEntry {
            symbol: clicked,
            attributed_to,
            is_correct: false,
            reaction_time_ms,
            timestamp_ms,
        });
    }

    pub fn entries(&self) -> &[MetricsEntry] {
        &self.entries
    }

    pub fn stimuli_appeared(&self) -> usize {
        self.stimuli_appeared
    }

    pub fn correct_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_correct).count()
    }

    pub fn wrong_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_correct).count()
    }

    pub fn aggregates(&self) -> Aggregates {
        aggregates_of(&self.entries, self.stimuli_appeared)
    }

    pub fn per_symbol(&self) -> Vec<SymbolBreakdown> {
        breakdown_of(&self.entries)
    }

    /// Close the log for writes
    pub fn finalize(self) -> FinalizedLog {
        FinalizedLog { inner: self }
    }
}

/// A closed log; read access only
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedLog {
    inner: MetricsLog,
}

impl FinalizedLog {
    pub fn entries(&self) -> &[MetricsEntry] {
        self.inner.entries()
    }

    pub fn stimuli_appeared(&self) -> usize {
        self.inner.stimuli_appeared()
    }

    pub fn aggregates(&self) -> Aggregates {
        self.inner.aggregates()
    }

    pub fn per_symbol(&self) -> Vec<SymbolBreakdown> {
        self.inner.per_symbol()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::from(s)
    }

    #[test]
    fn empty_log_reports_zeroes() {
        let log = MetricsLog::new();
        let agg = log.aggregates();
        assert_eq!(agg.accuracy_pct, 0.0);
        assert_eq!(agg.avg_reaction_ms, 0.0);
        assert_eq!(agg.reaction_std_dev_ms, 0.0);
        assert_eq!(agg.clicks, 0);
        assert!(log.per_symbol().is_empty());
    }

    #[test]
    fn accuracy_uses_stimuli_appeared() {
        let mut log = MetricsLog::new();
        log.record_appeared(4);
        log.record_correct(sym("A"), 100, 500);
        log.record_correct(sym("B"), 300, 900);
        log.record_wrong(sym("C"), &sym("D"), WrongAttribution::Clicked, 50, 950);

        let agg = log.aggregates();
        assert_eq!(agg.correct, 2);
        assert_eq!(agg.wrong, 1);
        assert_eq!(agg.clicks, 3);
        assert_eq!(agg.accuracy_pct, 50.0);
        // wrong attempts never enter the reaction average
        assert_eq!(agg.avg_reaction_ms, 200.0);
        assert_eq!(agg.reaction_std_dev_ms, 100.0);
    }

    #[test]
    fn wrong_attribution_policies() {
        let mut clicked = MetricsLog::new();
        clicked.record_wrong(sym("X"), &sym("A"), WrongAttribution::Clicked, 0, 10);
        assert_eq!(clicked.per_symbol()[0].symbol, sym("X"));

        let mut expected = MetricsLog::new();
        expected.record_wrong(sym("X"), &sym("A"), WrongAttribution::Expected, 0, 10);
        let row = &expected.per_symbol()[0];
        assert_eq!(row.symbol, sym("A"));
        assert_eq!(row.wrong, 1);
        assert_eq!(row.mean_reaction_ms, None);
        assert_eq!(expected.entries()[0].symbol, sym("X"));
    }

    #[test]
    fn per_symbol_groups_in_first_seen_order() {
        let mut log = MetricsLog::new();
        log.record_wrong(sym("B"), &sym("A"), WrongAttribution::Expected, 10, 1);
        log.record_correct(sym("A"), 400, 2);
        log.record_correct(sym("B"), 100, 3);
        log.record_wrong(sym("C"), &sym("B"), WrongAttribution::Expected, 10, 4);
        log.record_correct(sym("A"), 200, 5);

        let rows = log.per_symbol();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, sym("A"));
        assert_eq!(rows[0].correct, 2);
        assert_eq!(rows[0].wrong, 1);
        assert_eq!(rows[0].mean_reaction_ms, Some(300.0));
        assert_eq!(rows[1].symbol, sym("B"));
        assert_eq!(rows[1].wrong, 1);
        assert_eq!(rows[1].mean_reaction_ms, Some(100.0));
    }

    #[test]
    fn finalized_aggregates_are_stable() {
        let mut log = MetricsLog::new();
        log.record_appeared(3);
        log.record_correct(sym("1"), 250, 100);
        log.record_wrong(sym("2"), &sym("3"), WrongAttribution::Clicked, 80, 200);
        let done = log.finalize();
        assert_eq!(done.aggregates(), done.aggregates());
        assert_eq!(done.per_symbol(), done.per_symbol());
        assert_eq!(done.entries().len(), 2);
        assert_eq!(done.stimuli_appeared(), 3);
    }
}
