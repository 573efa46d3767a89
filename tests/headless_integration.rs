use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use popwheel::catalog;
use popwheel::config::SessionConfig;
use popwheel::export::{AttemptRecord, FlatRecord, SessionSummary};
use popwheel::game::{Collaborators, Game};
use popwheel::layout::Position;
use popwheel::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use popwheel::session::InteractOutcome;

const STEP_MS: u64 = 100;

fn click(column: u16, row: u16) -> AppEvent {
    AppEvent::Mouse(MouseEvent {
        kind: MouseEventKind::Down(MouseButton::Left),
        column,
        row,
        modifiers: KeyModifiers::NONE,
    })
}

/// Mouse cells stand in for arena percentages here
fn cell_to_arena(mouse: &MouseEvent) -> Position {
    Position::new(mouse.column as f64, mouse.row as f64)
}

/// Drive a game through Runner/TestEventSource: every tick advances the
/// clock, and whenever a target is up a click on it is queued.
fn play_headless(config: SessionConfig, max_steps: u32) -> Game {
    let mut game = Game::new(config, Collaborators::silent());
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(1)),
    );

    let mut now = 0;
    game.start(now);

    for _ in 0..max_steps {
        match runner.step() {
            AppEvent::Tick => {
                now += STEP_MS;
                game.tick(now);
                let session = game.session();
                let target = session
                    .target()
                    .and_then(|t| session.active().iter().find(|s| &s.symbol == t && !s.popping));
                if let Some(stimulus) = target {
                    let (x, y) = (stimulus.position.x.round(), stimulus.position.y.round());
                    if session.stimulus_at(Position::new(x, y)) == Some(stimulus.id) {
                        tx.send(click(x as u16, y as u16)).unwrap();
                    } else {
                        // overlapping fallback placement, select by id instead
                        let id = stimulus.id;
                        game.interact(id, now);
                    }
                }
            }
            AppEvent::Mouse(mouse) => {
                let outcome = game.interact_at(cell_to_arena(&mouse), now);
                assert_ne!(outcome, InteractOutcome::Incorrect);
            }
            AppEvent::Key(_) | AppEvent::Resize => {}
        }
        if game.session().is_complete() {
            break;
        }
    }
    game
}

#[test]
fn headless_sorting_stream_completes() {
    let config = SessionConfig {
        seed: Some(21),
        ..catalog::find_variant("vision/sorting/uppercase")
            .unwrap()
            .config()
    };
    let game = play_headless(config, 5_000);

    let session = game.session();
    assert!(session.is_complete(), "stream should run out");
    let summary = session.summary().unwrap();
    assert_eq!(summary.results.stimuli, 26);
    assert_eq!(summary.results.correct, 26);
    assert_eq!(summary.results.wrong, 0);
    assert_eq!(summary.results.accuracy_pct, 100.0);

    // sequential targeting walks the alphabet
    let order: String = summary
        .entries
        .iter()
        .map(|e| e.symbol.to_string())
        .collect();
    assert_eq!(order, "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
}

#[test]
fn headless_wheel_batches_complete() {
    let config = SessionConfig {
        seed: Some(5),
        ..catalog::find_variant("vision/wheel/numbers").unwrap().config()
    };
    let game = play_headless(config, 5_000);

    let summary = game.session().summary().unwrap();
    assert_eq!(summary.settings.total_rounds, 2);
    assert_eq!(summary.results.correct, summary.results.stimuli);
    assert!(summary.results.stimuli > 0 && summary.results.stimuli <= 20);
}

#[test]
fn headless_reset_discards_running_session() {
    let config = SessionConfig {
        seed: Some(3),
        batch_size: 4,
        ..SessionConfig::default()
    };
    let mut game = Game::new(config, Collaborators::silent());
    game.start(0);
    game.tick(1_000);
    assert!(game.session().target().is_some());

    game.reset(1_000);
    assert_eq!(game.generation(), 1);
    let (appeared, correct, wrong) = game.session().counts();
    assert!(appeared > 0);
    assert_eq!((correct, wrong), (0, 0));
    assert!(game.session().target().is_none());
    game.tick(2_000);
    assert!(game.session().target().is_some());
}

#[test]
fn export_round_trip_through_files() {
    let config = SessionConfig {
        seed: Some(11),
        patient: "Sam".to_string(),
        batch_size: 5,
        ..SessionConfig::default()
    };
    let game = play_headless(config, 5_000);
    let summary = game.session().summary().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let csv_path = summary.export_csv_to(dir.path()).unwrap();
    let json_path = summary.export_json_to(dir.path()).unwrap();
    assert_eq!(
        csv_path.file_name().unwrap().to_string_lossy(),
        format!("session_{}_results.csv", summary.info.session_id)
    );

    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let rows: Vec<FlatRecord> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].patient, "Sam");
    assert_eq!(rows[0].correct, summary.results.correct);
    assert_eq!(rows[0], summary.flat());

    let attempts_path = summary.export_attempts_csv_to(dir.path()).unwrap();
    let mut reader = csv::Reader::from_path(&attempts_path).unwrap();
    let entries: Vec<_> = reader
        .deserialize::<AttemptRecord>()
        .map(|r| r.unwrap().entry())
        .collect();
    assert_eq!(entries, summary.entries);

    let text = std::fs::read_to_string(&json_path).unwrap();
    let back: SessionSummary = serde_json::from_str(&text).unwrap();
    assert_eq!(back.info, summary.info);
    assert_eq!(back.entries, summary.entries);
}
