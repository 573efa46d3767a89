mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser};
use itertools::Itertools;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::Rect,
    Terminal,
};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin, Write},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use popwheel::{
    catalog,
    config::{ConfigStore, FileConfigStore, Mode, SessionConfig},
    export::SessionSummary,
    game::{Announcer, Collaborators, FeedbackSink, Game, ReportSink},
    layout::ArenaShape,
    pool::{ColorLevel, PoolKind},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
};

use crate::ui::arena::{screen_to_arena, WheelSpin};

const TICK_RATE_MS: u64 = 50;
const SPEEDS: [f64; 4] = [0.5, 1.0, 1.5, 2.0];

/// find-the-target bubble exercises for vision therapy, in the terminal
#[derive(Parser, Debug, Clone, Default)]
#[clap(
    version,
    about,
    long_about = "Bubble-popping therapy exercises: find the announced letter, number or colour among non-overlapping bubbles on a spinning wheel or a sorting board. Every attempt is timed and the session can be exported as CSV or JSON."
)]
pub struct Cli {
    /// preset to play, as therapy/game/variant (see --list)
    #[clap(short = 'v', long)]
    variant: Option<String>,

    /// symbols to show
    #[clap(long, value_enum)]
    pool: Option<PoolKind>,

    /// lowest number for the numbers pool
    #[clap(long, allow_negative_numbers = true)]
    range_min: Option<i64>,

    /// highest number for the numbers pool
    #[clap(long, allow_negative_numbers = true)]
    range_max: Option<i64>,

    /// palette size for the colours pool
    #[clap(long, value_enum)]
    color_level: Option<ColorLevel>,

    /// bubbles per wave, or the opening window in streaming mode
    #[clap(short = 'b', long)]
    batch_size: Option<usize>,

    /// batch waves or an ordered stream
    #[clap(short = 'm', long, value_enum)]
    mode: Option<Mode>,

    /// number of waves in batch mode
    #[clap(short = 'r', long)]
    rounds: Option<u32>,

    /// arena shape
    #[clap(long, value_enum)]
    arena: Option<ArenaShape>,

    /// arena size in pixels
    #[clap(long)]
    arena_size: Option<f64>,

    /// bubble radius in pixels
    #[clap(long)]
    radius: Option<f64>,

    /// minimum gap between bubbles in pixels
    #[clap(long)]
    min_gap: Option<f64>,

    /// patient label for the report
    #[clap(short = 'p', long)]
    patient: Option<String>,

    /// seed for a reproducible layout and target order
    #[clap(long)]
    seed: Option<u64>,

    /// directory the CSV/JSON reports are written to
    #[clap(short = 'o', long)]
    export_dir: Option<PathBuf>,

    /// settings file to read (and write with --save-config)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// store the resolved settings as the new defaults
    #[clap(long)]
    save_config: bool,

    /// print the available presets and exit
    #[clap(long)]
    list: bool,

    /// write log output to this file
    #[clap(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Stored settings (or a preset), then every flag given on the command line
    fn resolve_config(&self, store: &dyn ConfigStore) -> Result<SessionConfig, String> {
        let stored = store.load();
        let mut cfg = match &self.variant {
            Some(path) => {
                let variant = catalog::find_variant(path)
                    .ok_or_else(|| format!("unknown variant '{path}' (see --list)"))?;
                SessionConfig {
                    patient: stored.patient.clone(),
                    ..variant.config()
                }
            }
            None => stored,
        };

        if let Some(pool) = self.pool {
            cfg.pool_kind = pool;
        }
        if let Some(min) = self.range_min {
            cfg.range_min = min;
        }
        if let Some(max) = self.range_max {
            cfg.range_max = max;
        }
        if let Some(level) = self.color_level {
            cfg.color_level = level;
        }
        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode;
        }
        if let Some(rounds) = self.rounds {
            cfg.total_rounds = rounds;
        }
        if let Some(shape) = self.arena {
            cfg.arena_shape = shape;
        }
        if let Some(size) = self.arena_size {
            cfg.arena_size = size;
        }
        if let Some(radius) = self.radius {
            cfg.stimulus_radius = radius;
        }
        if let Some(gap) = self.min_gap {
            cfg.min_gap = gap;
        }
        if let Some(patient) = &self.patient {
            cfg.patient = patient.clone();
        }
        if self.seed.is_some() {
            cfg.seed = self.seed;
        }

        Ok(cfg.sanitized())
    }
}

fn print_catalog() {
    for therapy in catalog::THERAPIES {
        println!("{}", therapy.title);
        for game in therapy.games {
            println!("  {}", game.title);
            for variant in game.variants {
                let path = format!("{}/{}/{}", therapy.id, game.id, variant.id);
                println!("    {:<28} {}", path, variant.title);
            }
        }
    }
}

fn init_logging(path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    // the terminal belongs to the TUI, so logs only go to a file
    if let Some(path) = path {
        let file = File::create(path)?;
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    }
    Ok(())
}

/// Speech stand-in: announcements go to the log
struct LogAnnouncer;

impl Announcer for LogAnnouncer {
    fn announce(&mut self, text: &str) {
        log::info!("announce: {}", text.to_lowercase());
    }
}

/// Rings the terminal bell on a wrong attempt
struct BellFeedback;

impl FeedbackSink for BellFeedback {
    fn play_feedback(&mut self, is_correct: bool) {
        if !is_correct {
            let mut out = io::stdout();
            if out.write_all(b"\x07").and_then(|_| out.flush()).is_err() {
                log::debug!("could not ring bell");
            }
        }
    }
}

struct LogReport;

impl ReportSink for LogReport {
    fn on_summary(&mut self, summary: &SessionSummary) {
        log::info!(
            "session {} for {}: {} stimuli, {:.1}% accuracy, {:.2}s average reaction",
            summary.info.session_id,
            summary.info.patient,
            summary.results.stimuli,
            summary.results.accuracy_pct,
            summary.results.avg_reaction_secs
        );
    }
}

fn terminal_collaborators() -> Collaborators {
    Collaborators {
        announcer: Box::new(LogAnnouncer),
        feedback: Box::new(BellFeedback),
        report: Box::new(LogReport),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Playing,
    Results,
    SymbolStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortBy {
    Order,
    Symbol,
    Wrong,
    Reaction,
}

#[derive(Debug)]
pub struct SymbolStatsState {
    pub scroll_offset: usize,
    pub sort_by: SortBy,
    pub sort_ascending: bool,
}

impl Default for SymbolStatsState {
    fn default() -> Self {
        Self {
            scroll_offset: 0,
            sort_by: SortBy::Order,
            sort_ascending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExportKind {
    Csv,
    Json,
}

pub struct App {
    pub game: Game,
    pub state: AppState,
    pub spin: WheelSpin,
    pub stats_state: SymbolStatsState,
    pub status: Option<String>,
    pub export_dir: PathBuf,
    /// Milliseconds since the app started; the game's clock
    pub clock_ms: u64,
}

impl App {
    pub fn new(config: SessionConfig, export_dir: PathBuf, collaborators: Collaborators) -> Self {
        let spin = WheelSpin {
            speed: config.speed,
            ..WheelSpin::default()
        };
        let mut game = Game::new(config, collaborators);
        game.start(0);

        Self {
            game,
            state: AppState::Playing,
            spin,
            stats_state: SymbolStatsState::default(),
            status: None,
            export_dir,
            clock_ms: 0,
        }
    }

    pub fn on_tick(&mut self, now_ms: u64) {
        let elapsed = now_ms.saturating_sub(self.clock_ms);
        self.clock_ms = self.clock_ms.max(now_ms);
        self.spin.advance(elapsed);
        self.game.tick(self.clock_ms);
        self.check_finished();
    }

    fn check_finished(&mut self) {
        if self.state == AppState::Playing && self.game.session().is_complete() {
            self.state = AppState::Results;
        }
    }

    /// A click at terminal cell (`column`, `row`) in a frame of size `area`
    pub fn on_click(&mut self, column: u16, row: u16, area: Rect) {
        if self.state != AppState::Playing {
            return;
        }
        let angle = match self.game.config().arena_shape {
            ArenaShape::Circle => self.spin.angle_deg,
            ArenaShape::Rect => 0.0,
        };
        if let Some(point) = screen_to_arena(ui::arena_inner(area), column, row, angle) {
            let outcome = self.game.interact_at(point, self.clock_ms);
            log::debug!("click at ({:.1}, {:.1}): {:?}", point.x, point.y, outcome);
        }
        self.check_finished();
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.spin.speed = speed;
        self.game.set_speed(speed);
    }

    pub fn reset(&mut self) {
        self.game.reset(self.clock_ms);
        self.state = AppState::Playing;
        self.status = None;
        self.stats_state = SymbolStatsState::default();
    }

    fn export(&mut self, kind: ExportKind) {
        let Some(summary) = self.game.session().summary() else {
            return;
        };
        let result = match kind {
            ExportKind::Csv => summary.export_csv_to(&self.export_dir).and_then(|totals| {
                let attempts = summary.export_attempts_csv_to(&self.export_dir)?;
                Ok(vec![totals, attempts])
            }),
            ExportKind::Json => summary.export_json_to(&self.export_dir).map(|path| vec![path]),
        };
        self.status = Some(match result {
            Ok(paths) => format!(
                "saved {}",
                paths.iter().map(|p| p.display().to_string()).join(", ")
            ),
            Err(e) => {
                log::warn!("{kind:?} export failed: {e}");
                format!("export failed: {e}")
            }
        });
    }

    /// Returns true when the app should exit
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        if key.code == KeyCode::Esc
            || key.code == KeyCode::Char('q')
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return true;
        }

        match self.state {
            AppState::Playing => match key.code {
                KeyCode::Char(' ') => self.spin.toggle_pause(),
                KeyCode::Char(c @ '1'..='4') => {
                    let idx = c as usize - '1' as usize;
                    self.set_speed(SPEEDS[idx]);
                }
                KeyCode::Char('r') => self.reset(),
                KeyCode::Char('s') => self.state = AppState::SymbolStats,
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('c') => self.export(ExportKind::Csv),
                KeyCode::Char('j') => self.export(ExportKind::Json),
                KeyCode::Char('s') => self.state = AppState::SymbolStats,
                KeyCode::Char('r') => self.reset(),
                _ => {}
            },
            AppState::SymbolStats => match key.code {
                KeyCode::Char('b') | KeyCode::Char('s') | KeyCode::Backspace => {
                    self.state = if self.game.session().is_complete() {
                        AppState::Results
                    } else {
                        AppState::Playing
                    };
                }
                KeyCode::Char('r') => self.reset(),
                KeyCode::Up => {
                    self.stats_state.scroll_offset = self.stats_state.scroll_offset.saturating_sub(1);
                }
                KeyCode::Down => {
                    // clamped when rendering
                    self.stats_state.scroll_offset += 1;
                }
                KeyCode::Char('1') => self.sort_stats(SortBy::Order),
                KeyCode::Char('2') => self.sort_stats(SortBy::Symbol),
                KeyCode::Char('3') => self.sort_stats(SortBy::Wrong),
                KeyCode::Char('4') => self.sort_stats(SortBy::Reaction),
                KeyCode::Char(' ') => {
                    self.stats_state.sort_ascending = !self.stats_state.sort_ascending;
                    self.stats_state.scroll_offset = 0;
                }
                _ => {}
            },
        }
        false
    }

    fn sort_stats(&mut self, sort_by: SortBy) {
        self.stats_state.sort_by = sort_by;
        self.stats_state.scroll_offset = 0;
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list {
        print_catalog();
        return Ok(());
    }

    init_logging(cli.log_file.as_deref())?;

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = match cli.resolve_config(&store) {
        Ok(config) => config,
        Err(msg) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::InvalidValue, msg).exit();
        }
    };
    if cli.save_config {
        store.save(&config)?;
        log::info!("saved settings to {}", store.path().display());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let export_dir = cli.export_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, export_dir, terminal_collaborators());
    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let started = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(app, f))?;

        let event = runner.step();
        let now = started.elapsed().as_millis() as u64;

        match event {
            AppEvent::Tick | AppEvent::Resize => {}
            AppEvent::Mouse(mouse) => {
                let size = terminal.size()?;
                app.on_tick(now);
                app.on_click(mouse.column, mouse.row, Rect::new(0, 0, size.width, size.height));
            }
            AppEvent::Key(key) => {
                if app.on_key(key) {
                    break;
                }
            }
        }
        app.on_tick(now);
    }

    Ok(())
}
