//! Renderer that records frames in the log instead of drawing them.

use tracing::info;

use super::{RenderError, Renderer};

/// Logs every frame; keeps the last shown text.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    current: Option<String>,
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the text that would currently be on screen.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns the number of frames drawn so far, blanks included.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for HeadlessRenderer {
    fn render(&mut self, text: &str) -> Result<(), RenderError> {
        self.frames += 1;
        self.current = Some(text.to_string());
        info!(frame = self.frames, text = %text, "Frame rendered");
        Ok(())
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.frames += 1;
        self.current = None;
        info!(frame = self.frames, "Screen cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_tracks_current_frame() {
        let mut renderer = HeadlessRenderer::new();
        assert_eq!(renderer.current(), None);

        renderer.render("Saved").unwrap();
        assert_eq!(renderer.current(), Some("Saved"));

        renderer.clear().unwrap();
        assert_eq!(renderer.current(), None);
        assert_eq!(renderer.frames(), 2);
        assert!(renderer.poll_events().is_empty());
    }
}
