//! Display scheduler - decides what is on screen.
//!
//! The scheduler owns the single live `DisplaySession` and the single-slot
//! pending command. On every incoming command it either renders right
//! away, parks the command until the current timed session ends, or
//! drops it.
//!
//! # Policy
//!
//! ```text
//!               Display(t)                      Display(t') / Clear
//!   ┌──────┐ ───────────────▶ ┌────────────────┐ ─────────────────▶ replace / Idle
//!   │ Idle │                  │ Showing        │
//!   └──────┘ ◀─────────────── │ (interruptible)│
//!       ▲     idle window      └────────────────┘
//!       │
//!       │  expiry, no pending  ┌────────────────┐ Display(t') / Clear
//!       └───────────────────── │ Showing (timed)│ ─────────────────▶ pending slot
//!                              └────────────────┘   (last write wins)
//! ```
//!
//! Timed sessions always run their full (clamped) duration, so an
//! important message cannot be starved by a burst of ordinary ones. When a
//! timed session expires the pending command, if any, is applied at once.
//!
//! All state lives on the single daemon loop thread; nothing here locks.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the project's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Render failures are logged and leave the logical state unchanged

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use showtext_core::{Command, DisplaySession, Hold, MAX_HOLD};

use crate::render::Renderer;

/// Idle window after which an interruptible message is taken down.
pub const DEFAULT_IDLE_WINDOW: Duration = Duration::from_secs(3);

/// Timing rules for the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// How long an interruptible message stays up without a replacement
    pub idle_window: Duration,

    /// Upper bound on a timed hold
    pub max_hold: Duration,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            idle_window: DEFAULT_IDLE_WINDOW,
            max_hold: MAX_HOLD,
        }
    }
}

/// What a command or a tick did to the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Idle screen now shows `text`.
    Shown { text: String, hold: Hold },

    /// An interruptible message was replaced by `text`.
    Preempted {
        previous: String,
        text: String,
        hold: Hold,
    },

    /// A command was parked behind a timed session.
    Deferred {
        kind: &'static str,
        /// True if an older pending command was overwritten
        replaced: bool,
    },

    /// The screen was blanked on request.
    Cleared { previous: String },

    /// Nothing to do (clear while already idle).
    Unchanged,

    /// The live session ran out; `then` is the pending command's effect.
    Expired {
        text: String,
        then: Option<Box<Transition>>,
    },

    /// The renderer could not show `text`; state is unchanged.
    RenderFailed { text: String, error: String },

    /// Shutdown was requested.
    Stop,
}

/// The display state machine.
pub struct Scheduler<R> {
    renderer: R,
    policy: SchedulePolicy,
    session: Option<DisplaySession>,
    pending: Option<Command>,
}

impl<R: Renderer> Scheduler<R> {
    /// Creates an idle scheduler driving `renderer`.
    pub fn new(renderer: R, policy: SchedulePolicy) -> Self {
        Self {
            renderer,
            policy,
            session: None,
            pending: None,
        }
    }

    /// Returns the live session, if any.
    pub fn session(&self) -> Option<&DisplaySession> {
        self.session.as_ref()
    }

    /// Returns the command waiting for the current timed session to end.
    pub fn pending(&self) -> Option<&Command> {
        self.pending.as_ref()
    }

    /// Returns true when nothing is on screen.
    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    /// Returns the scheduling policy.
    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Returns the renderer.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Returns the renderer mutably (for draining its events).
    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Applies one incoming command at `now`.
    pub fn handle(&mut self, command: Command, now: Instant) -> Transition {
        if command.is_stop() {
            info!("Stop requested");
            return Transition::Stop;
        }

        if let Some(session) = self.session.as_ref().filter(|s| s.is_timed()) {
            let kind = command.kind();
            let replaced = self.pending.replace(command).is_some();
            info!(
                command = kind,
                replaced,
                remaining_ms = session.remaining(now, self.policy.idle_window).as_millis() as u64,
                "Timed display active; command deferred"
            );
            return Transition::Deferred { kind, replaced };
        }

        match command {
            Command::Display { text, hold } => self.show(text, hold, now),
            Command::Clear => self.clear(),
            Command::Stop => Transition::Stop,
        }
    }

    /// Advances timers at `now`.
    ///
    /// Returns a transition when the live session expired.
    pub fn tick(&mut self, now: Instant) -> Option<Transition> {
        if !self
            .session
            .as_ref()
            .is_some_and(|s| s.is_expired(now, self.policy.idle_window))
        {
            return None;
        }
        let expired = self.session.take()?;
        let text = expired.text().to_string();
        info!(
            text = %text,
            shown_at = %expired.shown_at().format("%H:%M:%S"),
            shown_for_ms = expired.shown_for().num_milliseconds(),
            "Display expired"
        );

        let then = match self.pending.take() {
            Some(command @ Command::Display { .. }) => {
                debug!("Applying deferred display");
                let next = self.handle(command, now);
                if matches!(next, Transition::RenderFailed { .. }) {
                    self.blank();
                }
                Some(Box::new(next))
            }
            Some(Command::Clear) => {
                debug!("Applying deferred clear");
                self.blank();
                Some(Box::new(Transition::Cleared {
                    previous: text.clone(),
                }))
            }
            Some(Command::Stop) | None => {
                self.blank();
                None
            }
        };

        Some(Transition::Expired { text, then })
    }

    /// Returns when the live session will end on its own.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session
            .as_ref()
            .map(|s| s.deadline(self.policy.idle_window))
    }

    /// Drops all state and blanks the screen before exit.
    pub fn shutdown(&mut self) {
        if let Some(pending) = self.pending.take() {
            info!(command = pending.kind(), "Discarding pending command on shutdown");
        }
        if self.session.take().is_some() {
            self.blank();
        }
        if let Err(e) = self.renderer.shutdown() {
            warn!(error = %e, "Renderer shutdown failed");
        }
    }

    fn show(&mut self, text: String, hold: Hold, now: Instant) -> Transition {
        let hold = hold.clamp(self.policy.max_hold);

        if let Err(e) = self.renderer.render(&text) {
            warn!(text = %text, error = %e, "Render failed; keeping current state");
            return Transition::RenderFailed {
                text,
                error: e.to_string(),
            };
        }

        let session = DisplaySession::start(text.clone(), hold, now);
        match self.session.replace(session) {
            Some(previous) => {
                info!(text = %text, %hold, previous = %previous.text(), "Display preempted");
                Transition::Preempted {
                    previous: previous.text().to_string(),
                    text,
                    hold,
                }
            }
            None => {
                info!(text = %text, %hold, "Display shown");
                Transition::Shown { text, hold }
            }
        }
    }

    fn clear(&mut self) -> Transition {
        match self.session.take() {
            Some(previous) => {
                self.blank();
                info!(
                    previous = %previous.text(),
                    shown_for_ms = previous.shown_for().num_milliseconds(),
                    "Display cleared"
                );
                Transition::Cleared {
                    previous: previous.text().to_string(),
                }
            }
            None => {
                debug!("Clear while idle");
                Transition::Unchanged
            }
        }
    }

    fn blank(&mut self) {
        if let Err(e) = self.renderer.clear() {
            warn!(error = %e, "Failed to clear screen");
        }
    }
}
