//! Run lock: at most one task-loop driver per repository.
//!
//! Non-blocking exclusive `flock` on `.agent/runner.lock`. The file also holds
//! the owner's PID so the refusal message can name it.

use crate::error::{ForemanError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

/// A held run lock, released on drop.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
}

impl RunLock {
    /// Acquire the lock or fail with [`ForemanError::AlreadyRunning`].
    pub fn try_acquire(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                let mut f = file;
                f.set_len(0)?;
                write!(f, "{}", std::process::id())?;
                tracing::debug!(path = %lock_path.display(), "run lock acquired");
                Ok(RunLock { _file: f })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                Err(ForemanError::AlreadyRunning(read_pid(lock_path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn read_pid(lock_path: &Path) -> Option<u32> {
    std::fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}
