//! showtext Daemon - singleton guard, command channel and display scheduler
//!
//! This crate provides the core infrastructure for the showtext daemon:
//! - `guard` - Singleton guard so only one daemon owns the screen
//! - `channel` - Unix socket command channel (daemon read end, client write end)
//! - `scheduler` - Display state machine (interruptible vs. timed messages)
//! - `render` - Renderer collaborator (terminal or headless)
//! - `daemon` - Cooperative single-task main loop
//! - `config` - TOML configuration with environment overrides
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐        ┌─────────────────────────────────────────────┐
//! │ client       │ frame  │                 showtext daemon             │
//! │ (showtext …) │───────▶│  CommandListener ──▶ Scheduler ──▶ Renderer │
//! └──────────────┘        │        ▲                 ▲                  │
//!                         │        └──── Daemon loop ┘ (100ms tick)     │
//!                         │  InstanceGuard (flock, held for lifetime)   │
//!                         └─────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Per-command failures are logged and never stop the daemon

pub mod channel;
pub mod config;
pub mod daemon;
pub mod guard;
pub mod render;
pub mod scheduler;
