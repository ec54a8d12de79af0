//! Write end of the command channel, used by client invocations.

use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use showtext_core::Command;
use showtext_protocol::encode;

use super::ChannelError;

/// Write timeout for a single frame.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// A connected, one-shot write end.
#[derive(Debug)]
pub struct CommandSender {
    stream: UnixStream,
    socket_path: PathBuf,
}

impl CommandSender {
    /// Opens the channel for writing.
    ///
    /// Returns `ChannelError::Unavailable` when no daemon is listening.
    pub fn connect(socket_path: impl Into<PathBuf>) -> Result<Self, ChannelError> {
        let socket_path = socket_path.into();
        let stream = UnixStream::connect(&socket_path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => {
                ChannelError::Unavailable {
                    path: socket_path.clone(),
                }
            }
            _ => ChannelError::Send(e),
        })?;
        stream
            .set_write_timeout(Some(WRITE_TIMEOUT))
            .map_err(ChannelError::Send)?;

        Ok(Self {
            stream,
            socket_path,
        })
    }

    /// Writes one command and closes the connection.
    pub fn send(mut self, command: &Command) -> Result<(), ChannelError> {
        let frame = encode(command);
        self.stream.write_all(&frame).map_err(ChannelError::Send)?;
        self.stream.flush().map_err(ChannelError::Send)?;
        // The daemon reads until EOF
        let _ = self.stream.shutdown(Shutdown::Write);

        debug!(
            socket = %self.socket_path.display(),
            command = command.kind(),
            bytes = frame.len(),
            "Command sent"
        );
        Ok(())
    }
}

/// Connects, sends `command`, and disconnects.
pub fn send_command(socket_path: impl Into<PathBuf>, command: &Command) -> Result<(), ChannelError> {
    CommandSender::connect(socket_path)?.send(command)
}

/// Waits until `path` no longer exists, polling every `interval`.
///
/// Returns false if it is still present after `timeout`.
pub fn wait_for_removal(path: &Path, timeout: Duration, interval: Duration) -> bool {
    let start = Instant::now();
    while path.exists() {
        if start.elapsed() >= timeout {
            return false;
        }
        thread::sleep(interval);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use showtext_core::Hold;

    #[test]
    fn test_connect_without_daemon_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sock");

        let err = send_command(&path, &Command::Stop).unwrap_err();
        assert!(matches!(err, ChannelError::Unavailable { .. }));
        assert!(err.to_string().contains("No server running"));
    }

    #[test]
    fn test_stale_socket_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        // Bound then dropped without unlinking: nobody is listening
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());

        let cmd = Command::display("hi", Hold::Interruptible).unwrap();
        let err = send_command(&path, &cmd).unwrap_err();
        assert!(matches!(err, ChannelError::Unavailable { .. }));
    }

    #[test]
    fn test_wait_for_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");
        assert!(wait_for_removal(&path, Duration::ZERO, Duration::from_millis(1)));

        std::fs::write(&path, b"").unwrap();
        assert!(!wait_for_removal(
            &path,
            Duration::from_millis(20),
            Duration::from_millis(5)
        ));
    }
}
