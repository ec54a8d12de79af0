//! The daemon's cooperative main loop.
//!
//! One iteration per poll tick, on a single task:
//!
//! 1. stop if cancellation was requested (signal, `!STOP!`, renderer quit)
//! 2. drain the command channel without blocking
//! 3. expire the live session, applying any deferred command
//! 4. drain the renderer's own input events
//!
//! A stop request only flips the cancellation token; the current tick runs
//! to completion and teardown happens after the loop, never inside a
//! signal handler.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the project's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel and render errors are logged; the loop keeps running

use std::time::Duration;

use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use showtext_protocol::decode;

use crate::channel::{ChannelError, CommandListener, CommandSource, MAX_FRAMES_PER_POLL};
use crate::config::Config;
use crate::guard::{Acquire, GuardError, InstanceGuard};
use crate::render::{RenderError, Renderer, RendererEvent};
use crate::scheduler::{Scheduler, Transition};

/// Default loop tick.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A client sent the stop sentinel.
    StopCommand,
    /// The renderer's input layer asked to quit.
    RendererQuit,
    /// The cancellation token was triggered from outside (signal).
    Cancelled,
}

/// Guard and channel, ready for a daemon to run.
#[derive(Debug)]
pub enum Prepared {
    Ready {
        guard: InstanceGuard,
        listener: CommandListener,
    },
    AlreadyRunning {
        pid: Option<u32>,
    },
}

/// Becomes the single instance and opens the command channel.
///
/// The channel is only touched after the guard is held, so a losing
/// instance never disturbs the running daemon's socket.
pub fn prepare(config: &Config) -> Result<Prepared, DaemonError> {
    let mut guard = match InstanceGuard::acquire(&config.lock_path)? {
        Acquire::Acquired(guard) => guard,
        Acquire::AlreadyRunning { pid } => return Ok(Prepared::AlreadyRunning { pid }),
    };
    guard.record_pid()?;

    let listener = CommandListener::bind_with_buffer(&config.socket_path, config.read_buffer_size)?;
    guard.register_artifact(listener.socket_path());

    info!(
        lock = %guard.lock_path().display(),
        socket = %listener.socket_path().display(),
        "Singleton guard acquired"
    );
    Ok(Prepared::Ready { guard, listener })
}

/// The display daemon.
pub struct Daemon<R, C = CommandListener> {
    scheduler: Scheduler<R>,
    channel: C,
    cancel_token: CancellationToken,
    poll_interval: Duration,
    stop_reason: Option<ShutdownReason>,
}

impl<R: Renderer, C: CommandSource> Daemon<R, C> {
    /// Creates a daemon reading `channel` and driving `scheduler`.
    pub fn new(
        scheduler: Scheduler<R>,
        channel: C,
        cancel_token: CancellationToken,
        poll_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            channel,
            cancel_token,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            stop_reason: None,
        }
    }

    /// Returns the scheduler.
    pub fn scheduler(&self) -> &Scheduler<R> {
        &self.scheduler
    }

    /// Runs until cancelled, then tears the screen down.
    ///
    /// Returns the reason the loop ended.
    pub async fn run(mut self) -> ShutdownReason {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            idle_window_ms = self.scheduler.policy().idle_window.as_millis() as u64,
            "Display daemon running"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {}
                _ = ticker.tick() => {}
            }

            if self.cancel_token.is_cancelled() {
                break self.stop_reason.unwrap_or(ShutdownReason::Cancelled);
            }

            self.run_tick(Instant::now().into_std());
        };

        self.scheduler.shutdown();
        info!(?reason, "Display daemon stopped");
        reason
    }

    /// Performs one loop iteration at `now`.
    fn run_tick(&mut self, now: std::time::Instant) {
        self.poll_channel(now);

        if let Some(transition) = self.scheduler.tick(now) {
            debug!(?transition, "Session timer fired");
        }

        for event in self.scheduler.renderer_mut().poll_events() {
            match event {
                RendererEvent::Quit => {
                    info!("Renderer requested quit");
                    self.request_stop(ShutdownReason::RendererQuit);
                }
            }
        }
    }

    /// Drains the channel until it is empty, a stop arrives, or the tick's
    /// time budget cannot cover another blocking receive.
    fn poll_channel(&mut self, now: std::time::Instant) {
        let started = std::time::Instant::now();
        let receive_timeout = self.channel.receive_timeout();

        for received in 0..MAX_FRAMES_PER_POLL {
            if self.stop_reason.is_some() {
                break;
            }
            if received > 0 && started.elapsed() + receive_timeout > self.poll_interval {
                debug!(received, "Tick budget spent; leaving frames for the next tick");
                break;
            }

            let frame = match self.channel.try_receive() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Command channel poll failed");
                    break;
                }
            };

            let command = match decode(&frame) {
                Ok(command) => command,
                Err(e) => {
                    debug!(error = %e, bytes = frame.len(), "Discarding malformed frame");
                    continue;
                }
            };

            debug!(command = command.kind(), "Command received");
            if self.scheduler.handle(command, now) == Transition::Stop {
                self.request_stop(ShutdownReason::StopCommand);
            }
        }
    }

    fn request_stop(&mut self, reason: ShutdownReason) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason);
        }
        self.cancel_token.cancel();
    }
}

/// Errors that can occur while starting the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Renderer or font setup failed.
    #[error("Startup failed: {0}")]
    Startup(#[from] RenderError),
}
