pub mod arena;
pub mod charting;
pub mod symbol_stats;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use popwheel::pool::PoolKind;
use popwheel::session::Phase;

use crate::{ui::arena::ArenaView, App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Split the playing screen into header, arena region and footer
fn playing_chunks(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

/// The arena's outer rect (border included) for a given frame area
pub fn arena_rect(area: Rect) -> Rect {
    arena::square_in(playing_chunks(area)[1])
}

/// The cells stimuli are drawn in; clicks are mapped against this
pub fn arena_inner(area: Rect) -> Rect {
    Block::default().borders(Borders::ALL).inner(arena_rect(area))
}

/// Draw whichever screen the app is on. The stats table may clamp the
/// scroll offset, hence `&mut App`.
pub fn draw(app: &mut App, f: &mut Frame) {
    match app.state {
        AppState::Playing | AppState::Results => f.render_widget(&*app, f.area()),
        AppState::SymbolStats => symbol_stats::render_symbol_stats(app, f),
    }
}

/// Pad `text` on both sides so it sits centred in `width` columns
fn centred(text: &str, width: u16) -> String {
    let pad = (width as usize).saturating_sub(text.width()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let session = self.game.session();

        if !session.is_complete() {
            let [header_area, _, footer_area] = playing_chunks(area);
            let config = session.config();
            let (appeared, correct, wrong) = session.counts();

            let target_text = match (session.phase(), session.target()) {
                (Phase::Idle, _) => "Press (r) to start".to_string(),
                (_, Some(target)) if config.pool_kind == PoolKind::Colors => {
                    format!("Find the {} bubble", target)
                }
                (_, Some(target)) => format!("Find: {}", target),
                (Phase::LevelLoading, None) => "Get ready…".to_string(),
                (_, None) => "…".to_string(),
            };
            let target_style = match session.phase() {
                Phase::Correct => bold_style.fg(Color::Green),
                Phase::Incorrect => bold_style.fg(Color::Red),
                _ => bold_style.fg(Color::Yellow),
            };

            let rounds = if config.mode == popwheel::config::Mode::Batch {
                format!("Round {}/{}", session.round().max(1), config.total_rounds)
            } else {
                format!("{} waiting", session.remaining())
            };
            let stats_line = format!(
                "{}   ✓ {}   ✗ {}   stimuli {}   {}{}",
                rounds,
                correct,
                wrong,
                appeared,
                config.speed_label(),
                if self.spin.paused { " (paused)" } else { "" },
            );

            Paragraph::new(vec![
                Line::from(Span::styled(target_text, target_style)),
                Line::from(Span::styled(stats_line, dim_style)),
            ])
            .alignment(Alignment::Center)
            .render(header_area, buf);

            ArenaView {
                shape: config.arena_shape,
                pool: config.pool_kind,
                scale: session.layout().arena.scale(),
                stimuli: session.active(),
                target: session.target(),
                spin: self.spin,
                reveal_target: false,
            }
            .render(arena_rect(area), buf);

            let footer = self.status.clone().unwrap_or_else(|| {
                "(click) select  (space) pause  (1-4) speed  (r)eset  (esc)ape".to_string()
            });
            Paragraph::new(Span::styled(centred(&footer, footer_area.width), italic_style))
                .render(footer_area, buf);
            return;
        }

        let Some(summary) = session.summary() else {
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(1),    // chart
                Constraint::Length(1), // stats
                Constraint::Length(3), // session info box
                Constraint::Length(1), // status
                Constraint::Length(1), // legend
            ])
            .split(area);

        let points = session
            .finalized()
            .map(|log| charting::reaction_points(log.entries()))
            .unwrap_or_default();
        let (overall_duration, slowest) =
            charting::compute_chart_params(&points, summary.results.duration_secs);

        let datasets = vec![Dataset::default()
            .marker(ratatui::symbols::Marker::Braille)
            .style(Style::default().fg(Color::Magenta))
            .graph_type(GraphType::Scatter)
            .data(&points)];

        let chart = Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title("seconds")
                    .bounds([0.0, overall_duration])
                    .labels(vec![
                        Span::styled("0", bold_style),
                        Span::styled(charting::format_label(overall_duration), bold_style),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .title("ms")
                    .bounds([0.0, slowest.max(1.0)])
                    .labels(vec![
                        Span::styled("0", bold_style),
                        Span::styled(charting::format_label(slowest), bold_style),
                    ]),
            );
        chart.render(chunks[0], buf);

        let r = &summary.results;
        Paragraph::new(Span::styled(
            format!(
                "{:.1}% acc   {:.2}s avg   {} correct   {} wrong   {} clicks   {:.1}s",
                r.accuracy_pct, r.avg_reaction_secs, r.correct, r.wrong, r.clicks, r.duration_secs
            ),
            bold_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        let flat = summary.flat();
        let detail = if flat.colors_used.is_empty() {
            flat.range.clone()
        } else {
            format!("{} ({})", flat.level, flat.colors_used)
        };
        Paragraph::new(format!(
            "{} | Session {} | {}\n{} | {} | {} stimuli | {}",
            flat.patient, flat.session_id, flat.date, flat.game, detail, flat.stimuli, flat.speed
        ))
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

        if let Some(status) = &self.status {
            Paragraph::new(Span::styled(status.clone(), Style::default().fg(Color::Cyan)))
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
        }

        Paragraph::new(Span::styled(
            "(c)sv / (j)son / (s)tats / (r)estart / (esc)ape",
            italic_style,
        ))
        .render(chunks[4], buf);
    }
}
