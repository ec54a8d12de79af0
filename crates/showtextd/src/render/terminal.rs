//! Full-screen terminal renderer.
//!
//! Takes over the attached terminal (raw mode, alternate screen, hidden
//! cursor) and draws each text white-on-black, centered both ways.

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Paragraph, Wrap},
    Terminal,
};
use tracing::{debug, warn};

use super::{RenderError, Renderer, RendererEvent};

/// Renderer drawing on the process's terminal.
pub struct TerminalRenderer {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl TerminalRenderer {
    /// Initializes the terminal for full-screen drawing.
    ///
    /// Fails when stdout is not a usable terminal.
    pub fn new() -> Result<Self, RenderError> {
        enable_raw_mode().map_err(|e| RenderError::Init(e.to_string()))?;

        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(RenderError::Init(e.to_string()));
        }

        let mut terminal = match Terminal::new(CrosstermBackend::new(stdout)) {
            Ok(t) => t,
            Err(e) => {
                let _ = disable_raw_mode();
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                return Err(RenderError::Init(e.to_string()));
            }
        };

        if let Err(e) = terminal.hide_cursor() {
            debug!(error = %e, "Failed to hide cursor");
        }

        let mut renderer = Self {
            terminal,
            restored: false,
        };
        renderer.clear().map_err(|e| RenderError::Init(e.to_string()))?;
        Ok(renderer)
    }

    fn restore(&mut self) -> Result<(), RenderError> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;

        disable_raw_mode().map_err(|e| RenderError::Restore(e.to_string()))?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)
            .map_err(|e| RenderError::Restore(e.to_string()))?;
        self.terminal
            .show_cursor()
            .map_err(|e| RenderError::Restore(e.to_string()))
    }
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        self.terminal
            .draw(|frame| {
                let area = frame.area();
                frame.render_widget(background(), area);

                let text_area = centered(area, text);
                let paragraph = Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .style(
                        Style::default()
                            .fg(Color::White)
                            .bg(Color::Black)
                            .add_modifier(Modifier::BOLD),
                    );
                frame.render_widget(paragraph, text_area);
            })
            .map(|_| ())
            .map_err(|e| RenderError::Frame(e.to_string()))
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.terminal
            .draw(|frame| frame.render_widget(background(), frame.area()))
            .map(|_| ())
            .map_err(|e| RenderError::Frame(e.to_string()))
    }

    fn poll_events(&mut self) -> Vec<RendererEvent> {
        let mut events = Vec::new();
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to poll terminal events");
                    break;
                }
            }

            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    let quit = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                        || (key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL));
                    if quit {
                        debug!(key = ?key.code, "Quit key pressed");
                        events.push(RendererEvent::Quit);
                    }
                }
                Ok(Event::Resize(width, height)) => {
                    // ratatui resizes its buffers on the next draw
                    debug!(width, height, "Terminal resized");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Failed to read terminal event");
                    break;
                }
            }
        }
        events
    }

    fn shutdown(&mut self) -> Result<(), RenderError> {
        self.restore()
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(error = %e, "Terminal left in an inconsistent state; run `reset`");
        }
    }
}

fn background() -> Block<'static> {
    Block::default().style(Style::default().bg(Color::Black))
}

/// Returns the band of `area` holding `text`, vertically centered.
fn centered(area: Rect, text: &str) -> Rect {
    let width = usize::from(area.width.max(1));
    let lines: usize = text
        .lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum();
    let height = u16::try_from(lines.max(1))
        .unwrap_or(u16::MAX)
        .min(area.height);

    let [_, band, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(height),
        Constraint::Fill(1),
    ])
    .areas(area);
    band
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_single_line() {
        let area = Rect::new(0, 0, 40, 11);
        let band = centered(area, "hello");
        assert_eq!(band.height, 1);
        assert_eq!(band.y, 5);
        assert_eq!(band.width, 40);
    }

    #[test]
    fn test_centered_wraps_long_text() {
        let area = Rect::new(0, 0, 10, 10);
        let band = centered(area, &"x".repeat(25));
        assert_eq!(band.height, 3);
    }

    #[test]
    fn test_centered_never_exceeds_area() {
        let area = Rect::new(0, 0, 2, 3);
        let band = centered(area, &"x".repeat(100));
        assert_eq!(band.height, 3);
        assert_eq!(band.y, 0);
    }
}
