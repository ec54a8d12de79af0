//! showtext Core - Shared types for the on-screen text announcer
//!
//! This crate provides the core domain types shared between
//! the daemon (showtextd) and the command-line client.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod command;
pub mod error;
pub mod session;

// Re-exports for convenience
pub use command::{Command, Hold, MAX_HOLD};
pub use error::{DomainError, DomainResult};
pub use session::{DisplaySession, SessionKind};
