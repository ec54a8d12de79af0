//! Frame encoding and decoding.
//!
//! One frame is written per client connection:
//!
//! ```text
//! !STOP!              shut the daemon down
//! !CLEAR!             blank the screen
//! <hold> <text>       show text; hold is a signed second count
//! ```
//!
//! Sentinels are matched on exact bytes before any other interpretation,
//! so a display text can never be mistaken for a control request.
//! Frames longer than the daemon's read buffer are truncated, not rejected.

use showtext_core::{Command, DomainError, Hold};
use thiserror::Error;

/// Sentinel payload requesting graceful shutdown.
pub const STOP_SENTINEL: &[u8] = b"!STOP!";

/// Sentinel payload requesting a blank screen.
pub const CLEAR_SENTINEL: &[u8] = b"!CLEAR!";

/// Default size of the daemon's per-connection read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Errors produced while decoding a frame.
///
/// Every variant means the frame is malformed and is discarded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty frame")]
    Empty,

    #[error("Frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("Frame has no hold prefix")]
    MissingHold,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Encodes a command into a single frame.
pub fn encode(command: &Command) -> Vec<u8> {
    let mut frame = match command {
        Command::Stop => STOP_SENTINEL.to_vec(),
        Command::Clear => CLEAR_SENTINEL.to_vec(),
        Command::Display { text, hold } => format!("{} {}", hold.as_secs(), text).into_bytes(),
    };
    frame.push(b'\n');
    frame
}

/// Decodes a frame received from a client.
pub fn decode(frame: &[u8]) -> Result<Command, FrameError> {
    let body = strip_terminator(frame);

    if body == STOP_SENTINEL {
        return Ok(Command::Stop);
    }
    if body == CLEAR_SENTINEL {
        return Ok(Command::Clear);
    }
    if body.is_empty() {
        return Err(FrameError::Empty);
    }

    let text = match std::str::from_utf8(body) {
        Ok(s) => s,
        // A truncated frame may end in the middle of a character
        Err(e) if e.error_len().is_none() => body
            .get(..e.valid_up_to())
            .and_then(|b| std::str::from_utf8(b).ok())
            .ok_or(FrameError::InvalidUtf8)?,
        Err(_) => return Err(FrameError::InvalidUtf8),
    };

    let (hold, text) = text.split_once(' ').ok_or(FrameError::MissingHold)?;
    let hold = Hold::parse(hold)?;
    Ok(Command::display(text, hold)?)
}

/// Cuts `frame` down to at most `limit` bytes.
pub fn truncate(frame: &[u8], limit: usize) -> &[u8] {
    frame.get(..limit).unwrap_or(frame)
}

fn strip_terminator(frame: &[u8]) -> &[u8] {
    let frame = frame.strip_suffix(b"\n").unwrap_or(frame);
    frame.strip_suffix(b"\r").unwrap_or(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sentinels() {
        assert_eq!(decode(b"!STOP!"), Ok(Command::Stop));
        assert_eq!(decode(b"!STOP!\n"), Ok(Command::Stop));
        assert_eq!(decode(b"!CLEAR!\n"), Ok(Command::Clear));
        assert_eq!(encode(&Command::Stop), b"!STOP!\n".to_vec());
    }

    #[test]
    fn test_sentinel_requires_exact_match() {
        // Text that merely contains the sentinel is display text
        let cmd = decode(b"0 !STOP!").unwrap();
        assert_eq!(
            cmd,
            Command::Display {
                text: "!STOP!".to_string(),
                hold: Hold::Interruptible
            }
        );
        assert!(matches!(
            decode(b" !STOP!"),
            Err(FrameError::Domain(DomainError::InvalidHold { .. }))
        ));
    }

    #[test]
    fn test_decode_display() {
        let cmd = decode(b"5 Saving game...\n").unwrap();
        assert_eq!(
            cmd,
            Command::Display {
                text: "Saving game...".to_string(),
                hold: Hold::Timed(Duration::from_secs(5))
            }
        );
    }

    #[test]
    fn test_decode_clamps_hold() {
        let cmd = decode(b"120 alert").unwrap();
        assert!(matches!(
            cmd,
            Command::Display { hold: Hold::Timed(d), .. } if d == Duration::from_secs(30)
        ));
        let cmd = decode(b"-1 normal").unwrap();
        assert!(matches!(cmd, Command::Display { hold: Hold::Interruptible, .. }));
    }

    #[test]
    fn test_encode_display() {
        let cmd = Command::display("Battery low", Hold::from_secs(10)).unwrap();
        assert_eq!(encode(&cmd), b"10 Battery low\n".to_vec());
        let cmd = Command::display("Volume 5", Hold::Interruptible).unwrap();
        assert_eq!(decode(&encode(&cmd)), Ok(cmd));
    }

    #[test]
    fn test_malformed_frames() {
        assert_eq!(decode(b""), Err(FrameError::Empty));
        assert_eq!(decode(b"\n"), Err(FrameError::Empty));
        assert_eq!(decode(b"hello"), Err(FrameError::MissingHold));
        assert_eq!(decode(&[0x30, 0x20, 0xff, 0xfe]), Err(FrameError::InvalidUtf8));
        assert_eq!(decode(b"3 "), Err(FrameError::Domain(DomainError::EmptyText)));
    }

    #[test]
    fn test_truncated_multibyte_tail_is_dropped() {
        // "0 héllo" cut inside the two-byte 'é'
        let frame = "0 héllo".as_bytes();
        let cut = truncate(frame, 4);
        let cmd = decode(cut).unwrap();
        assert!(matches!(cmd, Command::Display { ref text, .. } if text == "h"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate(b"0 abcdef", 4), b"0 ab");
        assert_eq!(truncate(b"0 ab", 1024), b"0 ab");
    }
}
