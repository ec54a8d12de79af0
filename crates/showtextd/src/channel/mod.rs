//! Command channel - named, ordered delivery from clients to the daemon.
//!
//! The channel is a Unix socket at a well-known path. Clients are
//! short-lived: connect, write one frame, close. The daemon is the single
//! reader and polls the socket without blocking once per loop tick, so
//! channel polling interleaves with countdowns and renderer events on one
//! thread.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  connect/write/close  ┌─────────────────┐
//! │ CommandSender│──────────────────────▶│ CommandListener │
//! │ (per client) │                       │ (daemon, 1 only)│
//! └──────────────┘                       └────────┬────────┘
//!                                                 │ try_receive()
//!                                                 ▼
//!                                            raw frame bytes
//! ```
//!
//! The daemon loop only sees the `CommandSource` trait, so the concrete
//! transport can change without touching the scheduler.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the project's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Per-connection read errors are logged and the frame is dropped

mod client;

pub use client::{send_command, wait_for_removal, CommandSender};

use std::io::{self, Read};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use showtext_protocol::DEFAULT_READ_BUFFER_SIZE;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/showtext.sock";

/// How long the daemon waits for an accepted client to finish writing.
pub const FRAME_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Upper bound on frames taken from the channel in one loop tick.
pub const MAX_FRAMES_PER_POLL: usize = 16;

/// Source of raw command frames, polled without blocking.
pub trait CommandSource {
    /// Returns the next frame if a client has delivered one.
    ///
    /// `None` also covers a client whose frame was discarded.
    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError>;

    /// Longest a single `try_receive` may block.
    fn receive_timeout(&self) -> Duration {
        Duration::ZERO
    }
}

/// Read end of the command channel, owned by the daemon.
///
/// Removes its socket file when dropped.
#[derive(Debug)]
pub struct CommandListener {
    listener: UnixListener,
    socket_path: PathBuf,
    read_buffer_size: usize,
}

impl CommandListener {
    /// Creates the channel at `socket_path` and opens it for non-blocking reads.
    ///
    /// A leftover socket file is removed first; callers must already hold
    /// the singleton guard.
    pub fn bind(socket_path: impl Into<PathBuf>) -> Result<Self, ChannelError> {
        Self::bind_with_buffer(socket_path, DEFAULT_READ_BUFFER_SIZE)
    }

    /// Like `bind`, with a custom read buffer size.
    ///
    /// Frames longer than the buffer are truncated.
    pub fn bind_with_buffer(
        socket_path: impl Into<PathBuf>,
        read_buffer_size: usize,
    ) -> Result<Self, ChannelError> {
        let socket_path = socket_path.into();
        let setup_err = |e: io::Error| ChannelError::Setup {
            path: socket_path.clone(),
            source: e,
        };

        if socket_path.exists() {
            std::fs::remove_file(&socket_path).map_err(setup_err)?;
            debug!(socket = %socket_path.display(), "Removed stale socket");
        }

        if let Some(parent) = socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_err)?;
            }
        }

        let listener = UnixListener::bind(&socket_path).map_err(setup_err)?;
        listener.set_nonblocking(true).map_err(setup_err)?;

        info!(socket = %socket_path.display(), "Command channel open");

        Ok(Self {
            listener,
            socket_path,
            read_buffer_size: read_buffer_size.max(1),
        })
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Reads one frame from an accepted client connection.
    fn read_frame(&self, stream: UnixStream) -> io::Result<Vec<u8>> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(FRAME_READ_TIMEOUT))?;

        // One extra byte tells us whether the frame was cut short
        let limit = self.read_buffer_size;
        let mut frame = Vec::with_capacity(limit + 1);
        // A writer that never closes has not finished its frame; the
        // timeout error drops whatever arrived
        (&stream).take(limit as u64 + 1).read_to_end(&mut frame)?;

        if frame.len() > limit {
            warn!(limit, "Frame exceeds read buffer; truncating");
            frame.truncate(limit);
        }
        Ok(frame)
    }
}

impl CommandSource for CommandListener {
    fn receive_timeout(&self) -> Duration {
        FRAME_READ_TIMEOUT
    }

    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, ChannelError> {
        let stream = match self.listener.accept() {
            Ok((stream, _addr)) => stream,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(ChannelError::Accept(e)),
        };

        match self.read_frame(stream) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                debug!("Discarding unterminated frame");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to read from client");
                Ok(None)
            }
        }
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => debug!(socket = %self.socket_path.display(), "Removed socket"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                socket = %self.socket_path.display(),
                error = %e,
                "Failed to remove socket file"
            ),
        }
    }
}

/// Errors that can occur on the command channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No daemon is listening at the channel path.
    #[error("No server running at {path}")]
    Unavailable { path: PathBuf },

    #[error("Failed to setup channel at {path}: {source}")]
    Setup { path: PathBuf, source: io::Error },

    #[error("Failed to accept client: {0}")]
    Accept(io::Error),

    #[error("Failed to send command: {0}")]
    Send(io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_try_receive_empty_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut listener = CommandListener::bind(dir.path().join("s.sock")).unwrap();
        assert!(listener.try_receive().unwrap().is_none());
    }

    #[test]
    fn test_receive_frames_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        let mut listener = CommandListener::bind(&path).unwrap();

        for frame in [&b"0 first"[..], &b"0 second"[..]] {
            let mut stream = UnixStream::connect(&path).unwrap();
            stream.write_all(frame).unwrap();
        }

        assert_eq!(listener.try_receive().unwrap(), Some(b"0 first".to_vec()));
        assert_eq!(listener.try_receive().unwrap(), Some(b"0 second".to_vec()));
        assert_eq!(listener.try_receive().unwrap(), None);
    }

    #[test]
    fn test_long_frame_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        let mut listener = CommandListener::bind_with_buffer(&path, 8).unwrap();

        let mut stream = UnixStream::connect(&path).unwrap();
        stream.write_all(b"0 0123456789").unwrap();
        drop(stream);

        assert_eq!(listener.try_receive().unwrap(), Some(b"0 012345".to_vec()));
    }

    #[test]
    fn test_unterminated_frame_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        let mut listener = CommandListener::bind(&path).unwrap();

        // Writer stays connected after a partial frame
        let mut open = UnixStream::connect(&path).unwrap();
        open.write_all(b"0 Hel").unwrap();

        let started = std::time::Instant::now();
        assert_eq!(listener.try_receive().unwrap(), None);
        assert!(started.elapsed() < FRAME_READ_TIMEOUT * 4);

        let mut stream = UnixStream::connect(&path).unwrap();
        stream.write_all(b"0 Hello").unwrap();
        drop(stream);
        assert_eq!(listener.try_receive().unwrap(), Some(b"0 Hello".to_vec()));
        drop(open);
    }

    #[test]
    fn test_overflowing_frame_from_open_writer_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        let mut listener = CommandListener::bind_with_buffer(&path, 8).unwrap();

        let mut open = UnixStream::connect(&path).unwrap();
        open.write_all(b"0 0123456789").unwrap();

        assert_eq!(listener.try_receive().unwrap(), Some(b"0 012345".to_vec()));
        drop(open);
    }

    #[test]
    fn test_bind_replaces_stale_socket_and_drop_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.sock");
        std::fs::write(&path, b"stale").unwrap();

        let listener = CommandListener::bind(&path).unwrap();
        assert!(path.exists());
        assert_eq!(listener.socket_path(), path.as_path());

        drop(listener);
        assert!(!path.exists());
    }
}
