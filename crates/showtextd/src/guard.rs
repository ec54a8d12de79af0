//! Singleton guard - ensures exactly one daemon runs per host.
//!
//! The guard holds a non-blocking exclusive `flock` on a well-known lock
//! file for the lifetime of the daemon. The OS drops the lock when the
//! process exits or crashes, so a stale lock file never blocks a restart.
//!
//! Transport artifacts (the channel's socket path) are registered with the
//! guard and removed on release, on every exit path.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the project's panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Lock failures are returned as `GuardError`; contention is a normal outcome

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Default lock file path
pub const DEFAULT_LOCK_PATH: &str = "/tmp/showtext.lock";

/// Outcome of trying to become the single daemon instance.
#[derive(Debug)]
pub enum Acquire {
    /// This process now owns the guard.
    Acquired(InstanceGuard),

    /// Another live process holds the guard.
    AlreadyRunning {
        /// PID recorded by the holder, if readable
        pid: Option<u32>,
    },
}

/// Whether some process currently holds the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Running { pid: Option<u32> },
    NotRunning,
}

/// Exclusive lock token bound to the lock file.
///
/// Released on drop; `release` may also be called explicitly and is
/// idempotent.
#[derive(Debug)]
pub struct InstanceGuard {
    lock_path: PathBuf,
    file: Option<File>,
    artifacts: Vec<PathBuf>,
}

impl InstanceGuard {
    /// Attempts a non-blocking exclusive lock on `lock_path`.
    ///
    /// Returns `Acquire::AlreadyRunning` when another process holds it.
    pub fn acquire(lock_path: impl Into<PathBuf>) -> Result<Acquire, GuardError> {
        let lock_path = lock_path.into();

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| GuardError::Open {
                    path: lock_path.clone(),
                    source: e,
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| GuardError::Open {
                path: lock_path.clone(),
                source: e,
            })?;

        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                let pid = read_holder_pid(&lock_path);
                debug!(lock = %lock_path.display(), ?pid, "Guard held by another process");
                return Ok(Acquire::AlreadyRunning { pid });
            }
            return Err(GuardError::Lock {
                path: lock_path,
                source: err,
            });
        }

        debug!(lock = %lock_path.display(), "Guard acquired");
        Ok(Acquire::Acquired(InstanceGuard {
            lock_path,
            file: Some(file),
            artifacts: Vec::new(),
        }))
    }

    /// Reports whether a daemon currently holds the guard at `lock_path`.
    ///
    /// Briefly takes the lock if it is free.
    pub fn probe(lock_path: impl Into<PathBuf>) -> Result<InstanceStatus, GuardError> {
        match Self::acquire(lock_path)? {
            Acquire::Acquired(mut guard) => {
                guard.release();
                Ok(InstanceStatus::NotRunning)
            }
            Acquire::AlreadyRunning { pid } => Ok(InstanceStatus::Running { pid }),
        }
    }

    /// Writes the current PID into the lock file.
    pub fn record_pid(&mut self) -> Result<(), GuardError> {
        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        write_pid(file).map_err(|e| GuardError::Open {
            path: self.lock_path.clone(),
            source: e,
        })
    }

    /// Registers a path to delete when the guard is released.
    pub fn register_artifact(&mut self, path: impl Into<PathBuf>) {
        self.artifacts.push(path.into());
    }

    /// Returns the lock file path.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Returns true until the guard is released.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Removes registered artifacts and drops the lock.
    pub fn release(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };

        for artifact in self.artifacts.drain(..) {
            match fs::remove_file(&artifact) {
                Ok(()) => debug!(path = %artifact.display(), "Removed artifact"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %artifact.display(), error = %e, "Failed to remove artifact"),
            }
        }

        // Clear the recorded PID so readers never see a stale holder
        if let Err(e) = file.set_len(0) {
            debug!(error = %e, "Failed to clear lock file");
        }

        // SAFETY: the descriptor is owned by `file`, which is dropped right after.
        unsafe {
            libc::flock(file.as_raw_fd(), libc::LOCK_UN);
        }
        drop(file);

        info!(lock = %self.lock_path.display(), "Guard released");
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.release();
    }
}

fn write_pid(file: &mut File) -> io::Result<()> {
    file.set_len(0)?;
    file.rewind()?;
    write!(file, "{}", process::id())?;
    file.flush()
}

/// Reads the PID recorded in the lock file, if any.
pub fn read_holder_pid(lock_path: &Path) -> Option<u32> {
    fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}

/// Errors that can occur while taking the guard.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Failed to open lock file {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to lock {path}: {source}")]
    Lock { path: PathBuf, source: io::Error },
}
