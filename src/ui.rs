use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Stage, KEY_GRID};
use crate::boss::BOSS_PHASES;
use crate::engine::Phase;
use crate::session::MAX_LIVES;

const HORIZONTAL_MARGIN: u16 = 3;
const GRID_COLUMNS: usize = 5;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.game_over.is_some() {
            render_game_over(self, area, buf);
        } else {
            render_board(self, area, buf);
        }
    }
}

fn render_board(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints(
            [
                Constraint::Length(1), // status line
                Constraint::Length(1), // heat gauge
                Constraint::Min(5),    // stage
                Constraint::Length(6), // tap grid
                Constraint::Length(1), // help
            ]
            .as_ref(),
        )
        .split(area);

    render_status(app, chunks[0], buf);
    render_heat(app, chunks[1], buf);
    render_stage(app, chunks[2], buf);
    render_grid(app, chunks[3], buf);
    render_help(app, chunks[4], buf);
}

fn render_status(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.engine.session();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let hearts: String = (0..MAX_LIVES)
        .map(|i| if i < session.lives { "❤ " } else { "🖤 " })
        .collect();

    let mut spans = vec![Span::raw(hearts), Span::raw("  ")];

    if let Some(phase) = app.engine.boss_phase() {
        spans.push(Span::styled(
            format!("BOSS {}/{}", phase + 1, BOSS_PHASES),
            bold.fg(Color::Red),
        ));
    } else {
        spans.push(Span::styled(format!("LEVEL {}", session.level), bold));
    }

    spans.push(Span::raw("  "));
    spans.push(Span::styled(format!("SCORE {}", session.score), bold));

    if session.combo > 1 {
        spans.push(Span::styled(
            format!("  x{} combo", session.combo),
            Style::default().fg(Color::Yellow),
        ));
    }

    if app.engine.phase() == Phase::Accepting {
        let remaining = app.engine.remaining_seconds();
        let timer_style = if remaining <= 3 {
            bold.fg(Color::Red)
        } else {
            bold.fg(Color::Cyan)
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("⏱ {remaining}"), timer_style));
    }

    if let Some(config) = app.engine.current_config() {
        spans.push(Span::styled(
            format!("  [{} · {}]", config.movement, config.effect),
            Style::default().add_modifier(Modifier::DIM),
        ));
    }

    if app.engine.is_paused() {
        spans.push(Span::styled(
            "  PAUSED",
            bold.fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK),
        ));
    }

    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn render_heat(app: &App, area: Rect, buf: &mut Buffer) {
    let session = app.engine.session();
    let (label, style) = match session.frenzy_remaining(app.now) {
        Some(left) => (
            format!("FRENZY {}s · DOUBLE POINTS", left.as_secs() + 1),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        ),
        None => (
            format!("heat {:>3.0}%", session.heat * 100.0),
            Style::default().fg(Color::Red),
        ),
    };

    Gauge::default()
        .gauge_style(style)
        .ratio(session.heat.clamp(0.0, 1.0))
        .label(label)
        .render(area, buf);
}

fn render_stage(app: &App, area: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line> = vec![Line::default()];

    if let Some(banner) = &app.banner {
        lines.push(Line::from(Span::styled(
            banner.clone(),
            bold.fg(Color::Yellow),
        )));
        lines.push(Line::default());
    }

    match &app.stage {
        Stage::Countdown(text) => {
            let color = if text == "GO!" {
                Color::Green
            } else {
                Color::Yellow
            };
            lines.push(Line::from(Span::styled(text.clone(), bold.fg(color))));
        }
        Stage::Symbol(symbol) => {
            lines.push(Line::from(Span::styled(symbol.clone(), bold)));
        }
        Stage::Empty => {
            if app.engine.phase() == Phase::Accepting {
                if let Some(round) = app.engine.round() {
                    // Filled/open dots track progress through the sequence.
                    let dots: String = (0..round.target.len())
                        .map(|i| if i < round.taps.len() { "● " } else { "○ " })
                        .collect();
                    lines.push(Line::from(Span::styled(dots, bold.fg(Color::Cyan))));
                    if let Some(points) = app.last_points {
                        lines.push(Line::from(Span::styled(
                            format!("+{points}"),
                            Style::default().fg(Color::Green),
                        )));
                    }
                }
            }
        }
    }

    if let Some(marks) = &app.marks {
        let spans: Vec<Span> = marks
            .iter()
            .map(|&ok| {
                if ok {
                    Span::styled("✓ ", bold.fg(Color::Green))
                } else {
                    Span::styled("✗ ", bold.fg(Color::Red))
                }
            })
            .collect();
        lines.push(Line::default());
        lines.push(Line::from(spans));
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_grid(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(round) = app.engine.round() else {
        return;
    };
    let active = app.engine.phase() == Phase::Accepting;
    let key_style = if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    let symbol_style = if active {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };

    let keys: Vec<char> = KEY_GRID.chars().collect();
    let mut lines: Vec<Line> = Vec::new();
    for row in &round.active_pool.iter().enumerate().chunks(GRID_COLUMNS) {
        let mut spans = Vec::new();
        for (index, symbol) in row {
            spans.push(Span::styled(format!("{} ", keys[index]), key_style));
            // Emoji widths vary; pad to keep the columns straight.
            let pad = 3usize.saturating_sub(symbol.width());
            spans.push(Span::styled(
                format!("{}{} ", symbol, " ".repeat(pad)),
                symbol_style,
            ));
        }
        lines.push(Line::from(spans));
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(area, buf);
}

fn render_help(app: &App, area: Rect, buf: &mut Buffer) {
    let help = if app.engine.phase() == Phase::Accepting {
        "tap with the keys above · space pause · esc quit"
    } else {
        "space pause · esc quit"
    };
    Paragraph::new(Span::styled(
        help,
        Style::default().add_modifier(Modifier::DIM),
    ))
    .alignment(Alignment::Center)
    .render(area, buf);
}

fn render_game_over(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(view) = app.game_over else {
        return;
    };
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let progress = app.engine.progress();

    let row = |label: &str, value: u32| {
        Line::from(vec![
            Span::styled(format!("{label:<18}"), dim),
            Span::raw(format!("{value:>8}")),
        ])
    };

    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled("THE END!", bold.fg(Color::Yellow))),
        Line::default(),
        Line::from(Span::styled(format!("SCORE  {}", view.score), bold)),
    ];

    if view.new_high_score {
        lines.push(Line::from(Span::styled(
            "NEW HIGH SCORE!",
            bold.fg(Color::Green),
        )));
    } else {
        lines.push(Line::from(Span::styled(
            format!("best {}", progress.high_score),
            dim,
        )));
    }

    lines.push(Line::default());
    lines.push(row("tap streak", view.breakdown.tap_streak));
    lines.push(row("level bonus", view.breakdown.level_base));
    lines.push(row("speed bonus", view.breakdown.speed_bonus));
    lines.push(row("boss bonus", view.breakdown.boss_bonus));
    lines.push(row("frenzy bonus", view.breakdown.frenzy_bonus));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        format!("🪙 {} coins banked", progress.coins),
        Style::default().fg(Color::Yellow),
    )));
    lines.push(Line::default());
    lines.push(Line::from(Span::styled("(r)etry · (esc)ape", dim)));

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}
