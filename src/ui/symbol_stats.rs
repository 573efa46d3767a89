use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use popwheel::metrics::SymbolBreakdown;

use crate::{App, SortBy};

/// Pure presenter for a single symbol row
pub fn present_row(data: &SymbolBreakdown) -> Row<'static> {
    let attempts = data.correct + data.wrong;
    let miss_rate = if attempts > 0 {
        100.0 * data.wrong as f64 / attempts as f64
    } else {
        0.0
    };

    let time_display = data
        .mean_reaction_ms
        .map(|ms| format!("{ms:.0}"))
        .unwrap_or_else(|| "—".to_string());

    let time_color = match data.mean_reaction_ms {
        Some(ms) if ms < 1500.0 => Color::Green,
        Some(ms) if ms < 3000.0 => Color::Yellow,
        Some(_) => Color::Red,
        None => Color::Gray,
    };

    let wrong_color = if data.wrong == 0 {
        Color::Green
    } else if miss_rate < 34.0 {
        Color::Yellow
    } else {
        Color::Red
    };

    Row::new(vec![
        Cell::from(data.symbol.to_string()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(data.correct.to_string()),
        Cell::from(data.wrong.to_string()).style(Style::default().fg(wrong_color)),
        Cell::from(format!("{miss_rate:.1}")).style(Style::default().fg(wrong_color)),
        Cell::from(time_display).style(Style::default().fg(time_color)),
    ])
}

/// Sort rows in place; first appearance order is kept for ties
pub fn sort_rows(rows: &mut [SymbolBreakdown], sort_by: &SortBy, ascending: bool) {
    rows.sort_by(|a, b| {
        let cmp = match sort_by {
            SortBy::Order => std::cmp::Ordering::Equal,
            SortBy::Symbol => a.symbol.cmp(&b.symbol),
            SortBy::Wrong => a.wrong.cmp(&b.wrong),
            SortBy::Reaction => a
                .mean_reaction_ms
                .unwrap_or(f64::MAX)
                .partial_cmp(&b.mean_reaction_ms.unwrap_or(f64::MAX))
                .unwrap_or(std::cmp::Ordering::Equal),
        };
        if ascending {
            cmp
        } else {
            cmp.reverse()
        }
    });
}

/// Render the per-symbol statistics screen
pub fn render_symbol_stats(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Stats table
            Constraint::Length(3), // Instructions
        ])
        .split(area);

    let sort_direction = if app.stats_state.sort_ascending {
        "↑"
    } else {
        "↓"
    };
    let sort_by_text = match app.stats_state.sort_by {
        SortBy::Order => "Order",
        SortBy::Symbol => "Symbol",
        SortBy::Wrong => "Wrong",
        SortBy::Reaction => "Reaction",
    };
    let title = Paragraph::new(format!(
        "Per-Symbol Results (Sort: {sort_by_text} {sort_direction})"
    ))
    .block(Block::default().borders(Borders::ALL).title("Stats"))
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )
    .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let mut rows = match app.game.session().finalized() {
        Some(log) => log.per_symbol(),
        None => app.game.session().metrics().per_symbol(),
    };

    if rows.is_empty() {
        let no_data = Paragraph::new("No attempts recorded yet.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(no_data, chunks[1]);
    } else {
        sort_rows(
            &mut rows,
            &app.stats_state.sort_by,
            app.stats_state.sort_ascending,
        );

        let table_height = chunks[1].height.saturating_sub(3) as usize; // borders + header
        let max_scroll = rows.len().saturating_sub(table_height);
        if app.stats_state.scroll_offset > max_scroll {
            app.stats_state.scroll_offset = max_scroll;
        }

        let header = Row::new(vec![
            Cell::from("Symbol"),
            Cell::from("Correct"),
            Cell::from("Wrong"),
            Cell::from("Miss (%)"),
            Cell::from("Mean RT (ms)"),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let visible_rows: Vec<Row> = rows
            .iter()
            .skip(app.stats_state.scroll_offset)
            .take(table_height)
            .map(present_row)
            .collect();

        let widths = [
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Min(12),
        ];

        let table = Table::new(visible_rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Symbols"))
            .column_spacing(2);

        f.render_widget(table, chunks[1]);
    }

    let instructions = Paragraph::new(
        "(↑/↓) scroll  (1-4) sort  (space) direction  (b/backspace) back  (r) new session  (esc) quit",
    )
    .alignment(Alignment::Center)
    .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(instructions, chunks[2]);
}
