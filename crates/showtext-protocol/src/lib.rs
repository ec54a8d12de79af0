//! showtext Protocol - Wire frame for daemon communication
//!
//! This crate provides the frame format used by short-lived client
//! invocations to hand a single command to the daemon.

pub mod frame;

pub use frame::{
    decode, encode, truncate, FrameError, CLEAR_SENTINEL, DEFAULT_READ_BUFFER_SIZE,
    STOP_SENTINEL,
};
