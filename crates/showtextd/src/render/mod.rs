//! Renderer collaborator - puts text on the shared screen.
//!
//! The scheduler only ever asks a renderer to show a text or to blank the
//! screen. Both calls are blocking and synchronous; failures are reported
//! to the caller, which logs them and keeps running.
//!
//! - `TerminalRenderer` draws full-screen on the attached terminal
//! - `HeadlessRenderer` only logs frames, for devices without a display

mod headless;
mod terminal;

pub use headless::HeadlessRenderer;
pub use terminal::TerminalRenderer;

use thiserror::Error;

/// Input coming from the renderer's own event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererEvent {
    /// The display layer asked the daemon to quit.
    Quit,
}

/// A display surface the scheduler can drive.
pub trait Renderer {
    /// Shows `text` on screen, replacing whatever was there.
    fn render(&mut self, text: &str) -> Result<(), RenderError>;

    /// Blanks the screen.
    fn clear(&mut self) -> Result<(), RenderError>;

    /// Drains pending input events without blocking.
    fn poll_events(&mut self) -> Vec<RendererEvent> {
        Vec::new()
    }

    /// Releases the display surface.
    fn shutdown(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        (**self).render(text)
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        (**self).clear()
    }

    fn poll_events(&mut self) -> Vec<RendererEvent> {
        (**self).poll_events()
    }

    fn shutdown(&mut self) -> Result<(), RenderError> {
        (**self).shutdown()
    }
}

/// Errors reported by a renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The display surface could not be set up (fatal at startup).
    #[error("Failed to initialize display: {0}")]
    Init(String),

    /// A single frame could not be produced.
    #[error("Failed to draw frame: {0}")]
    Frame(String),

    /// The display surface could not be restored on shutdown.
    #[error("Failed to restore display: {0}")]
    Restore(String),
}
