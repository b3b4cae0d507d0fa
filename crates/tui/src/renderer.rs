use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::Receiver;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Paragraph},
};
use stracy_core::transport::{ChannelTransport, PumpStatus};
use stracy_core::views::{TimelineStyle, render_timeline};
use stracy_core::virtualize::ScrollVisibility;
use stracy_core::{DefaultArgumentRenderer, IngestionSession, LiveTimeline, TimelineConfig};
use stracy_protocol::{RenderCommand, StreamMessage, ThemeToken, Viewport};

type Live = LiveTimeline<ChannelTransport, ScrollVisibility, DefaultArgumentRenderer>;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const HORIZONTAL_STEP: f64 = 8.0;
const WHEEL_STEP: u64 = 3;

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::Background => Color::Black,
        ThemeToken::LaneHeaderBackground => Color::DarkGray,
        ThemeToken::LaneHeaderText => Color::White,
        ThemeToken::LaneBorder => Color::DarkGray,
        ThemeToken::BucketBackground => Color::Black,
        ThemeToken::BucketBorder => Color::Rgb(40, 40, 40),
        ThemeToken::TimeLabel => Color::Cyan,
        ThemeToken::TimeLabelPending => Color::DarkGray,
        ThemeToken::SyscallName => Color::White,
        ThemeToken::SyscallFailed => Color::LightRed,
    }
}

/// Scroll state of the terminal view. Units are terminal rows/columns,
/// which is also the layout unit under the terminal preset.
#[derive(Debug, Clone, Copy)]
struct ViewState {
    scroll_y: u64,
    scroll_x: f64,
    /// Stick to the newest bucket while the stream is live.
    follow: bool,
    /// Rows available for bucket rows (below the header, above the status bar).
    body_rows: u64,
}

impl ViewState {
    fn scroll_by(&mut self, delta: i64) {
        self.follow = false;
        self.scroll_y = self.scroll_y.saturating_add_signed(delta);
    }
}

pub fn run(config: TimelineConfig, messages: Receiver<StreamMessage>, batch: usize) -> Result<()> {
    let style = TimelineStyle::terminal(&config);
    let visibility = ScrollVisibility::from_config(&config);
    let renderer = DefaultArgumentRenderer::new(config.max_arg_len);
    let session = IngestionSession::new(config, visibility, renderer);
    let mut live = LiveTimeline::new(ChannelTransport::new(messages), session);

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut live, &style, batch);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let stats = live.session().stats();
    log::info!(
        "{} events shown, {} malformed, {} out of order",
        stats.ingested,
        stats.malformed,
        stats.out_of_order
    );
    live.teardown();
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    live: &mut Live,
    style: &TimelineStyle,
    batch: usize,
) -> Result<()> {
    let mut view = ViewState {
        scroll_y: 0,
        scroll_x: 0.0,
        follow: true,
        body_rows: 0,
    };
    let mut finished = false;

    loop {
        let now = Instant::now();
        if !finished {
            finished = live.tick(now, batch) == PumpStatus::Done;
        }

        let size = terminal.size()?;
        let view_height = f64::from(size.height.saturating_sub(1));
        view.body_rows = (view_height - style.header_height).max(0.0) as u64;
        let total = live.session().layout().total_height();
        let max_scroll = total.saturating_sub(view.body_rows);
        if view.follow {
            view.scroll_y = max_scroll;
            live.session_mut()
                .visibility_mut()
                .jump_to(view.scroll_y, view.body_rows);
        } else {
            view.scroll_y = view.scroll_y.min(max_scroll);
            live.session_mut()
                .visibility_mut()
                .sample(view.scroll_y, view.body_rows, now);
        }
        live.session_mut().refresh_visibility(now);

        let viewport = Viewport::new(
            view.scroll_x,
            view.scroll_y as f64,
            f64::from(size.width),
            view_height,
        );
        let commands = render_timeline(live.session(), &viewport, style);
        let status = status_line(live, &view, finished);
        terminal.draw(|frame| draw(frame, &commands, style, &status))?;

        if !event::poll(FRAME_INTERVAL)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Up | KeyCode::Char('k') => view.scroll_by(-1),
                KeyCode::Down | KeyCode::Char('j') => view.scroll_by(1),
                KeyCode::PageUp => view.scroll_by(-(view.body_rows as i64)),
                KeyCode::PageDown => view.scroll_by(view.body_rows as i64),
                KeyCode::Home | KeyCode::Char('g') => {
                    view.follow = false;
                    view.scroll_y = 0;
                }
                KeyCode::End | KeyCode::Char('G') | KeyCode::Char('f') => view.follow = true,
                KeyCode::Left | KeyCode::Char('h') => {
                    view.scroll_x = (view.scroll_x - HORIZONTAL_STEP).max(0.0);
                }
                KeyCode::Right | KeyCode::Char('l') => view.scroll_x += HORIZONTAL_STEP,
                _ => {}
            },
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollDown => view.scroll_by(WHEEL_STEP as i64),
                MouseEventKind::ScrollUp => view.scroll_by(-(WHEEL_STEP as i64)),
                _ => {}
            },
            Event::Resize(..) => live.session_mut().visibility_mut().invalidate(),
            _ => {}
        }
    }
    Ok(())
}

fn status_line(live: &Live, view: &ViewState, finished: bool) -> String {
    let session = live.session();
    let stats = session.stats();
    let state = if finished {
        "finished"
    } else if view.follow {
        "following"
    } else {
        "live"
    };
    let dropped = stats.malformed + stats.out_of_order;
    format!(
        " stracy | {} events | {} processes | {} buckets | {} dropped | {state} | ↑↓ scroll  ←→ pan  End follow  q quit ",
        stats.ingested,
        session.lanes().len(),
        session.buckets().len(),
        dropped,
    )
}

fn draw(frame: &mut Frame, commands: &[RenderCommand], style: &TimelineStyle, status: &str) {
    let area = frame.area();
    let body = Rect::new(0, 0, area.width, area.height.saturating_sub(1));
    frame.render_widget(
        Block::default().style(Style::default().bg(theme_to_color(ThemeToken::Background))),
        body,
    );

    let buf = frame.buffer_mut();
    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                color,
                border_color,
                label,
                bucket,
            } => {
                if bucket.is_some() {
                    // bucket rows only show their bottom border as a separator
                    if let Some(border) = border_color {
                        let y = rect.bottom() - 1.0;
                        let line = "─".repeat(rect.w.max(0.0) as usize);
                        put_text(buf, body, rect.x, y, &line, theme_to_color(*border), None, (rect.x, rect.x + rect.w));
                    }
                    continue;
                }
                let bg = theme_to_color(*color);
                let blank = " ".repeat(rect.w.max(0.0) as usize);
                let clip = (style.gutter_width, rect.x + rect.w);
                put_text(buf, body, rect.x, rect.y, &blank, bg, Some(bg), clip);
                if let Some(label) = label {
                    let fg = theme_to_color(ThemeToken::LaneHeaderText);
                    put_text(buf, body, rect.x + 1.0, rect.y, label, fg, Some(bg), clip);
                }
            }
            RenderCommand::DrawText {
                position,
                text,
                color,
                ..
            } => {
                let clip = if position.x < style.gutter_width {
                    (0.0, style.gutter_width - 1.0)
                } else {
                    (style.gutter_width, position.x + style.column_width - 1.0)
                };
                put_text(buf, body, position.x, position.y, text, theme_to_color(*color), None, clip);
            }
            RenderCommand::BeginGroup { .. } | RenderCommand::EndGroup => {}
        }
    }

    let status_area = Rect::new(0, area.height.saturating_sub(1), area.width, 1);
    let status_bar = Paragraph::new(status.to_string())
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    frame.render_widget(status_bar, status_area);
}

/// Write `text` starting at viewport coordinates `(x, y)`, keeping only the
/// characters whose column falls in `clip` and inside `area`.
#[allow(clippy::too_many_arguments)]
fn put_text(
    buf: &mut Buffer,
    area: Rect,
    x: f64,
    y: f64,
    text: &str,
    fg: Color,
    bg: Option<Color>,
    clip: (f64, f64),
) {
    if y < 0.0 || y >= f64::from(area.height) {
        return;
    }
    let row = area.y + y as u16;
    let (lo, hi) = (clip.0.max(0.0), clip.1.min(f64::from(area.width)));
    for (i, ch) in text.chars().enumerate() {
        let col = x + i as f64;
        if col < lo {
            continue;
        }
        if col >= hi {
            break;
        }
        let cell = &mut buf[(area.x + col as u16, row)];
        cell.set_char(ch).set_fg(fg);
        if let Some(bg) = bg {
            cell.set_bg(bg);
        }
    }
}
