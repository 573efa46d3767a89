use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Circle, Rectangle},
        Block, Borders, Widget,
    },
};

use popwheel::layout::{ArenaShape, Position, Stimulus};
use popwheel::pool::{color_rgb, PoolKind, Symbol};

/// Seconds per full turn at 1x
const TURN_SECS: f64 = 25.0;

/// Cosmetic rotation of a circular arena. Stimulus positions never move;
/// only the drawing and the click mapping are rotated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSpin {
    pub angle_deg: f64,
    pub speed: f64,
    pub paused: bool,
}

impl Default for WheelSpin {
    fn default() -> Self {
        Self {
            angle_deg: 0.0,
            speed: 1.0,
            paused: false,
        }
    }
}

impl WheelSpin {
    pub fn advance(&mut self, elapsed_ms: u64) {
        if self.paused {
            return;
        }
        let degrees = 360.0 / TURN_SECS * self.speed * elapsed_ms as f64 / 1000.0;
        self.angle_deg = (self.angle_deg + degrees) % 360.0;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }
}

/// Rotate an arena point around the centre, clockwise on screen
pub fn rotate(pos: Position, angle_deg: f64) -> Position {
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let dx = pos.x - 50.0;
    let dy = pos.y - 50.0;
    Position::new(50.0 + dx * cos - dy * sin, 50.0 + dx * sin + dy * cos)
}

/// Largest area with roughly square proportions (cells are about twice as
/// tall as they are wide), centred in `area`
pub fn square_in(area: Rect) -> Rect {
    let height = area.height.min(area.width / 2);
    let width = height * 2;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Map a terminal cell inside the arena's inner area back to unrotated arena
/// coordinates
pub fn screen_to_arena(inner: Rect, column: u16, row: u16, angle_deg: f64) -> Option<Position> {
    if inner.width == 0
        || inner.height == 0
        || column < inner.x
        || row < inner.y
        || column >= inner.x + inner.width
        || row >= inner.y + inner.height
    {
        return None;
    }
    let x = (column - inner.x) as f64 + 0.5;
    let y = (row - inner.y) as f64 + 0.5;
    let on_screen = Position::new(
        x / inner.width as f64 * 100.0,
        y / inner.height as f64 * 100.0,
    );
    Some(rotate(on_screen, -angle_deg))
}

fn stimulus_color(pool: PoolKind, symbol: &Symbol, is_target: bool) -> Color {
    if pool == PoolKind::Colors {
        if let Some((r, g, b)) = color_rgb(symbol.as_str()) {
            return Color::Rgb(r, g, b);
        }
    }
    if is_target {
        Color::Yellow
    } else {
        Color::Cyan
    }
}

/// Canvas drawing of the arena and its stimuli
pub struct ArenaView<'a> {
    pub shape: ArenaShape,
    pub pool: PoolKind,
    pub scale: f64,
    pub stimuli: &'a [Stimulus],
    pub target: Option<&'a Symbol>,
    pub spin: WheelSpin,
    pub reveal_target: bool,
}

impl Widget for ArenaView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let angle = match self.shape {
            ArenaShape::Circle => self.spin.angle_deg,
            ArenaShape::Rect => 0.0,
        };

        Canvas::default()
            .block(Block::default().borders(Borders::ALL))
            .marker(Marker::Braille)
            .x_bounds([0.0, 100.0])
            .y_bounds([0.0, 100.0])
            .paint(|ctx| {
                match self.shape {
                    ArenaShape::Circle => ctx.draw(&Circle {
                        x: 50.0,
                        y: 50.0,
                        radius: 50.0,
                        color: Color::DarkGray,
                    }),
                    ArenaShape::Rect => ctx.draw(&Rectangle {
                        x: 0.0,
                        y: 0.0,
                        width: 100.0,
                        height: 100.0,
                        color: Color::DarkGray,
                    }),
                }
                ctx.layer();

                for stimulus in self.stimuli {
                    let p = rotate(stimulus.position, angle);
                    let is_target = self.reveal_target && self.target == Some(&stimulus.symbol);
                    let color = stimulus_color(self.pool, &stimulus.symbol, is_target);
                    // canvas y grows upwards
                    let (x, y) = (p.x, 100.0 - p.y);
                    ctx.draw(&Circle {
                        x,
                        y,
                        radius: stimulus.radius / self.scale,
                        color: if stimulus.popping {
                            Color::DarkGray
                        } else {
                            color
                        },
                    });

                    let mut style = Style::default().fg(color).add_modifier(Modifier::BOLD);
                    if stimulus.popping {
                        style = style.add_modifier(Modifier::DIM | Modifier::CROSSED_OUT);
                    }
                    let label = if self.pool == PoolKind::Colors {
                        "██".to_string()
                    } else {
                        stimulus.symbol.to_string()
                    };
                    ctx.print(x, y, Span::styled(label, style));
                }
            })
            .render(area, buf);
    }
}
