//! showtext - on-screen text announcer
//!
//! One binary is both the display daemon and its client. The daemon owns
//! the screen; every other invocation hands it a single command and exits.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground, blocks until stopped)
//! showtext start
//!
//! # Start the daemon in the background, logging frames only
//! showtext start -d
//!
//! # Show a message; the next message replaces it
//! showtext "Volume 7"
//!
//! # Show a message for 5 seconds; later messages wait for it
//! showtext -t 5 "Battery low"
//!
//! # Blank the screen / stop the daemon / check on it
//! showtext clear
//! showtext stop
//! showtext status
//!
//! # Custom socket path and debug logging
//! SHOWTEXT_SOCKET=/run/showtext.sock RUST_LOG=showtextd=debug showtext start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown (screen blanked, socket removed, lock released)

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use showtext_core::{Command, Hold};
use showtextd::channel::{send_command, wait_for_removal, ChannelError};
use showtextd::config::{Config, RendererKind};
use showtextd::daemon::{prepare, Daemon, DaemonError, Prepared, ShutdownReason};
use showtextd::guard::{InstanceGuard, InstanceStatus};
use showtextd::render::{HeadlessRenderer, Renderer, TerminalRenderer};
use showtextd::scheduler::Scheduler;

/// How long `stop` waits for the daemon to remove its socket.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the daemon to exit.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// showtext - show transient text messages on the device screen
#[derive(Parser, Debug)]
#[command(name = "showtext", version, about)]
struct Args {
    #[command(subcommand)]
    action: Option<Action>,

    /// Protect the message for this many seconds (max 30; 0 or less = interruptible)
    #[arg(short = 't', long = "time", value_name = "SECONDS", allow_negative_numbers = true)]
    time: Option<i64>,

    /// Text to display
    #[arg(value_name = "TEXT")]
    text: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Start the display daemon
    Start {
        /// Run as a background daemon (fork to background, headless)
        #[arg(short = 'd', long)]
        daemon: bool,

        /// Log frames instead of drawing on the terminal
        #[arg(long)]
        headless: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Blank the screen
    Clear,
    /// Show daemon status
    Status,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match args.action {
        Some(Action::Start { daemon, headless }) => start(config, daemon, headless),
        Some(Action::Stop) => stop(&config),
        Some(Action::Clear) => send(&config, &Command::Clear),
        Some(Action::Status) => status(&config),
        None => {
            let text = args.text.join(" ");
            if text.is_empty() {
                Args::command().print_help()?;
                println!();
                return Ok(());
            }

            init_client_logging();

            // A literal `clear` text always blanks the screen
            let command = if text == "clear" {
                Command::Clear
            } else {
                let hold = args
                    .time
                    .map(|secs| Hold::from_secs_clamped(secs, config.policy().max_hold))
                    .unwrap_or_default();
                Command::display(text, hold)?
            };
            send(&config, &command)
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Sends one command; exits 1 when no daemon is reachable.
fn send(config: &Config, command: &Command) -> Result<()> {
    match send_command(&config.socket_path, command) {
        Ok(()) => Ok(()),
        Err(ChannelError::Unavailable { path }) => {
            eprintln!("showtext server is not running ({})", path.display());
            eprintln!("Use 'showtext start' to start it.");
            process::exit(1);
        }
        Err(e) => Err(e).context("Failed to send command"),
    }
}

fn stop(config: &Config) -> Result<()> {
    match send_command(&config.socket_path, &Command::Stop) {
        Ok(()) => {
            println!("Stopping showtext server...");
            if wait_for_removal(&config.socket_path, STOP_TIMEOUT, STOP_POLL_INTERVAL) {
                println!("Server stopped.");
                Ok(())
            } else {
                eprintln!("Server did not stop within {} seconds.", STOP_TIMEOUT.as_secs());
                process::exit(1);
            }
        }
        Err(ChannelError::Unavailable { .. }) => {
            eprintln!("showtext server is not running.");
            process::exit(1);
        }
        Err(e) => Err(e).context("Failed to send stop command"),
    }
}

fn status(config: &Config) -> Result<()> {
    match InstanceGuard::probe(&config.lock_path)? {
        InstanceStatus::Running { pid } => {
            match pid {
                Some(pid) => println!("showtext server is running (PID {})", pid),
                None => println!("showtext server is running"),
            }
            if config.socket_path.exists() {
                println!("Socket: {}", config.socket_path.display());
            }
            Ok(())
        }
        InstanceStatus::NotRunning => {
            println!("showtext server is not running.");
            process::exit(1);
        }
    }
}

fn init_client_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Daemon
// ============================================================================

fn start(mut config: Config, background: bool, headless: bool) -> Result<()> {
    if let InstanceStatus::Running { pid } = InstanceGuard::probe(&config.lock_path)? {
        report_already_running(pid);
    }

    if headless || background {
        config.renderer = RendererKind::Headless;
    }

    if background {
        // Daemonize before starting the tokio runtime
        daemonize(&config.log_path)?;
    }

    init_daemon_logging(&config.log_path)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "showtext daemon starting"
    );

    let (mut guard, listener) = match prepare(&config) {
        Ok(Prepared::Ready { guard, listener }) => (guard, listener),
        Ok(Prepared::AlreadyRunning { pid }) => {
            info!(?pid, "Another instance won the guard");
            report_already_running(pid);
        }
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    let renderer: Box<dyn Renderer> = match build_renderer(config.renderer) {
        Ok(renderer) => renderer,
        Err(e) => {
            error!(error = %e, "Startup failed");
            // Guard and listener drop here, removing the socket
            return Err(e.into());
        }
    };

    let scheduler = Scheduler::new(renderer, config.policy());
    let cancel_token = CancellationToken::new();
    let daemon = Daemon::new(
        scheduler,
        listener,
        cancel_token.clone(),
        config.poll_interval(),
    );

    let reason = run_daemon(daemon, cancel_token);

    guard.release();
    info!(?reason, "showtext daemon exited");
    Ok(())
}

fn report_already_running(pid: Option<u32>) -> ! {
    match pid {
        Some(pid) => eprintln!("showtext server already running (PID {})", pid),
        None => eprintln!("showtext server already running"),
    }
    process::exit(1);
}

fn build_renderer(kind: RendererKind) -> Result<Box<dyn Renderer>, DaemonError> {
    let renderer: Box<dyn Renderer> = match kind {
        RendererKind::Terminal => Box::new(TerminalRenderer::new()?),
        RendererKind::Headless => Box::new(HeadlessRenderer::new()),
    };
    Ok(renderer)
}

/// Runs the daemon loop (async entry point).
#[tokio::main(flavor = "current_thread")]
async fn run_daemon(
    daemon: Daemon<Box<dyn Renderer>>,
    cancel_token: CancellationToken,
) -> ShutdownReason {
    // Signal handlers only flip the token; cleanup runs after the loop
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        cancel_token.cancel();
    });

    daemon.run().await
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    Ok(())
}

/// Initializes timestamped logging to the append-only log file.
///
/// Falls back to stderr if the file cannot be opened.
fn init_daemon_logging(log_path: &Path) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("showtextd=info".parse()?)
        .add_directive("showtext_core=info".parse()?)
        .add_directive("showtext_protocol=info".parse()?);

    match open_log_file(log_path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            warn!(path = %log_path.display(), error = %e, "Failed to open log file; logging to stderr");
        }
    }
    Ok(())
}

fn open_log_file(log_path: &Path) -> Result<File> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .context("Failed to open log file")
}

/// Daemonizes the current process.
fn daemonize(log_path: &Path) -> Result<()> {
    use daemonize::Daemonize;

    let stdout = open_log_file(log_path)?;
    let stderr = open_log_file(log_path)?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}
