//! Filesystem helpers for the state files under `.agent/` and `.coo/`.

use crate::error::Result;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `data` via a sibling tempfile and rename, so readers
/// never observe a half-written metrics or warm-up file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(data)?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    Ok(std::fs::create_dir_all(path)?)
}

/// Seed `path` with `data` unless something is already there. Returns whether
/// it wrote.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data).map(|()| true)
}

/// Append to a log file, creating it and its directory on first use.
pub fn append_text(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?
        .write_all(text.as_bytes())?;
    Ok(())
}

/// Make sure `root/.gitignore` has a line equal to `entry`.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<()> {
    let path = root.join(".gitignore");
    let current = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if current.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }
    let mut addition = String::new();
    if !current.is_empty() && !current.ends_with('\n') {
        addition.push('\n');
    }
    addition.push_str(entry);
    addition.push('\n');
    append_text(&path, &addition)
}

/// Exclusive advisory lock on a sidecar file, released on drop.
///
/// Guards read-modify-write cycles on shared state files so concurrent
/// foreman processes serialize instead of interleaving.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
}

impl FileLock {
    /// Block until the lock is held.
    pub fn exclusive(lock_path: &Path) -> Result<Self> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_file_lands_in_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".coo/agent/state/warmup-day.txt");
        atomic_write(&path, b"3\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3\n");
        atomic_write(&path, b"4\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "4\n");
    }

    #[test]
    fn progress_appends_accumulate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".agent/claude-progress.txt");
        append_text(&path, "## first\n").unwrap();
        append_text(&path, "## second\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "## first\n## second\n");
    }

    #[test]
    fn seeding_leaves_user_edits_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        assert!(write_if_missing(&path, b"base_branch: main\n").unwrap());
        std::fs::write(&path, b"base_branch: develop\n").unwrap();
        assert!(!write_if_missing(&path, b"base_branch: main\n").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "base_branch: develop\n");
    }

    #[test]
    fn gitignore_gains_lock_entry_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();
        ensure_gitignore_entry(dir.path(), ".agent/runner.lock").unwrap();
        ensure_gitignore_entry(dir.path(), ".agent/runner.lock").unwrap();
        let text = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(text, "target\n.agent/runner.lock\n");
    }

    #[test]
    fn gitignore_created_when_absent() {
        let dir = TempDir::new().unwrap();
        ensure_gitignore_entry(dir.path(), ".agent/metrics.lock").unwrap();
        let text = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(text, ".agent/metrics.lock\n");
    }

    #[test]
    fn file_lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.lock");
        {
            let _held = FileLock::exclusive(&path).unwrap();
        }
        let _again = FileLock::exclusive(&path).unwrap();
    }
}
