//! The daemon's current on-screen state.
//!
//! Exactly one `DisplaySession` is live at a time. It is created when text
//! is rendered and destroyed on clear, on expiry, or on shutdown.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::command::Hold;

/// Whether the live session may be replaced before it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Replaced by the next command; reverts after the idle window.
    Interruptible,
    /// Runs to completion; later commands are deferred.
    Timed,
}

/// Text currently on screen and its timing.
///
/// `expires_at == None` marks an interruptible session. A concrete
/// deadline marks a timed session that must run to completion.
#[derive(Debug, Clone)]
pub struct DisplaySession {
    text: String,
    started_at: Instant,
    expires_at: Option<Instant>,
    shown_at: DateTime<Local>,
}

impl DisplaySession {
    /// Starts a session for `text` at `now`.
    pub fn start(text: impl Into<String>, hold: Hold, now: Instant) -> Self {
        let expires_at = match hold {
            Hold::Timed(d) => Some(now + d),
            Hold::Interruptible => None,
        };
        Self {
            text: text.into(),
            started_at: now,
            expires_at,
            shown_at: Local::now(),
        }
    }

    /// Returns the displayed text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the monotonic start time.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the deadline of a timed session.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Returns the wall-clock time the text was first shown.
    pub fn shown_at(&self) -> DateTime<Local> {
        self.shown_at
    }

    /// Returns how long the text has been on screen, by the wall clock.
    pub fn shown_for(&self) -> chrono::Duration {
        Local::now().signed_duration_since(self.shown_at)
    }

    /// Returns the session kind.
    pub fn kind(&self) -> SessionKind {
        if self.expires_at.is_some() {
            SessionKind::Timed
        } else {
            SessionKind::Interruptible
        }
    }

    /// Returns true if later commands must wait for this session.
    pub fn is_timed(&self) -> bool {
        self.kind() == SessionKind::Timed
    }

    /// Returns the instant at which the session ends on its own.
    ///
    /// Interruptible sessions end once `idle_window` passes without a
    /// replacement.
    pub fn deadline(&self, idle_window: Duration) -> Instant {
        self.expires_at
            .unwrap_or_else(|| self.started_at + idle_window)
    }

    /// Returns true once the session has run its course at `now`.
    pub fn is_expired(&self, now: Instant, idle_window: Duration) -> bool {
        now >= self.deadline(idle_window)
    }

    /// Returns how long the session has left at `now`.
    pub fn remaining(&self, now: Instant, idle_window: Duration) -> Duration {
        self.deadline(idle_window).saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(3);

    #[test]
    fn test_interruptible_session_expires_after_idle_window() {
        let t0 = Instant::now();
        let session = DisplaySession::start("A", Hold::Interruptible, t0);

        assert_eq!(session.kind(), SessionKind::Interruptible);
        assert!(session.expires_at().is_none());
        assert!(!session.is_expired(t0 + Duration::from_millis(2900), IDLE));
        assert!(session.is_expired(t0 + IDLE, IDLE));
    }

    #[test]
    fn test_timed_session_ignores_idle_window() {
        let t0 = Instant::now();
        let session = DisplaySession::start("A", Hold::Timed(Duration::from_secs(5)), t0);

        assert!(session.is_timed());
        assert!(!session.is_expired(t0 + Duration::from_secs(4), IDLE));
        assert!(session.is_expired(t0 + Duration::from_secs(5), IDLE));
        assert_eq!(
            session.remaining(t0 + Duration::from_secs(2), IDLE),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_remaining_saturates() {
        let t0 = Instant::now();
        let session = DisplaySession::start("A", Hold::Interruptible, t0);
        assert_eq!(
            session.remaining(t0 + Duration::from_secs(10), IDLE),
            Duration::ZERO
        );
        assert_eq!(session.text(), "A");
        assert_eq!(session.started_at(), t0);
    }

    #[test]
    fn test_wall_clock_timestamps() {
        let before = Local::now();
        let session = DisplaySession::start("A", Hold::Interruptible, Instant::now());

        assert!(session.shown_at() >= before);
        assert!(session.shown_at() <= Local::now());
        assert!(session.shown_for() >= chrono::Duration::zero());
    }
}
