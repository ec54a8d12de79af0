//! Commands a client can hand to the daemon.
//!
//! A `Command` is produced by a single client invocation and consumed
//! exactly once by the daemon. It carries no identity beyond arrival order.

use std::fmt;
use std::time::Duration;

use crate::error::{DomainError, DomainResult};

/// Longest protected display window a client may request.
pub const MAX_HOLD: Duration = Duration::from_secs(30);

// ============================================================================
// Hold
// ============================================================================

/// How long a displayed message is protected from replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Hold {
    /// No guaranteed window; the next command replaces the message.
    #[default]
    Interruptible,

    /// Must stay on screen for the full duration before anything else
    /// is applied.
    Timed(Duration),
}

impl Hold {
    /// Builds a hold from a signed second count, clamped to [`MAX_HOLD`].
    ///
    /// Zero and negative values mean "interruptible" and are not clamped.
    pub fn from_secs(secs: i64) -> Self {
        Self::from_secs_clamped(secs, MAX_HOLD)
    }

    /// Builds a hold from a signed second count, clamped to `max`.
    pub fn from_secs_clamped(secs: i64, max: Duration) -> Self {
        if secs <= 0 {
            return Hold::Interruptible;
        }
        Hold::Timed(Duration::from_secs(secs.unsigned_abs())).clamp(max)
    }

    /// Parses a decimal second count such as `"5"` or `"-1"`.
    pub fn parse(s: &str) -> DomainResult<Self> {
        let secs = s
            .trim()
            .parse::<i64>()
            .map_err(|e| DomainError::InvalidHold {
                value: s.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_secs(secs))
    }

    /// Caps a timed hold at `max`. Interruptible holds pass through.
    pub fn clamp(self, max: Duration) -> Self {
        match self {
            Hold::Timed(d) if d.is_zero() => Hold::Interruptible,
            Hold::Timed(d) => Hold::Timed(d.min(max)),
            Hold::Interruptible => Hold::Interruptible,
        }
    }

    /// Returns the hold as whole seconds; interruptible is `0`.
    pub fn as_secs(&self) -> u64 {
        match self {
            Hold::Timed(d) => d.as_secs(),
            Hold::Interruptible => 0,
        }
    }

    /// Returns true if this hold protects the display window.
    pub fn is_timed(&self) -> bool {
        matches!(self, Hold::Timed(_))
    }
}

impl fmt::Display for Hold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hold::Interruptible => write!(f, "interruptible"),
            Hold::Timed(d) => write!(f, "{}s", d.as_secs()),
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// A single request from a client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show `text` on screen.
    Display {
        /// UTF-8 text to render
        text: String,
        /// Protection window for the message
        hold: Hold,
    },

    /// Blank the screen.
    Clear,

    /// Shut the daemon down gracefully.
    Stop,
}

impl Command {
    /// Creates a display command, rejecting empty text.
    pub fn display(text: impl Into<String>, hold: Hold) -> DomainResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::EmptyText);
        }
        Ok(Command::Display { text, hold })
    }

    /// Returns a short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Display { .. } => "display",
            Command::Clear => "clear",
            Command::Stop => "stop",
        }
    }

    /// Returns true for the shutdown request.
    pub fn is_stop(&self) -> bool {
        matches!(self, Command::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_non_positive_is_interruptible() {
        assert_eq!(Hold::from_secs(0), Hold::Interruptible);
        assert_eq!(Hold::from_secs(-1), Hold::Interruptible);
        assert_eq!(Hold::from_secs(i64::MIN), Hold::Interruptible);
    }

    #[test]
    fn test_hold_clamped_to_max() {
        assert_eq!(Hold::from_secs(31), Hold::Timed(MAX_HOLD));
        assert_eq!(Hold::from_secs(i64::MAX), Hold::Timed(MAX_HOLD));
        assert_eq!(Hold::from_secs(30), Hold::Timed(Duration::from_secs(30)));
        assert_eq!(Hold::from_secs(5), Hold::Timed(Duration::from_secs(5)));
    }

    #[test]
    fn test_hold_custom_max() {
        let max = Duration::from_secs(10);
        assert_eq!(
            Hold::from_secs_clamped(20, max),
            Hold::Timed(Duration::from_secs(10))
        );
        assert_eq!(
            Hold::Timed(Duration::ZERO).clamp(max),
            Hold::Interruptible
        );
    }

    #[test]
    fn test_hold_parse() {
        assert_eq!(Hold::parse("5").ok(), Some(Hold::Timed(Duration::from_secs(5))));
        assert_eq!(Hold::parse(" -1 ").ok(), Some(Hold::Interruptible));
        assert!(matches!(
            Hold::parse("soon"),
            Err(DomainError::InvalidHold { .. })
        ));
    }

    #[test]
    fn test_display_rejects_empty_text() {
        assert_eq!(
            Command::display("   ", Hold::Interruptible),
            Err(DomainError::EmptyText)
        );
        let cmd = Command::display("hello", Hold::Interruptible).unwrap();
        assert_eq!(cmd.kind(), "display");
        assert!(!cmd.is_stop());
    }

    #[test]
    fn test_hold_display() {
        assert_eq!(Hold::Interruptible.to_string(), "interruptible");
        assert_eq!(Hold::from_secs(7).to_string(), "7s");
    }
}
