// ABOUTME: Rollout lock to prevent concurrent rollouts of the same service on a host.
// ABOUTME: Atomic file creation with lock info stored under $XDG_STATE_HOME/rollwatch/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::RolloutError;
use crate::types::{RevisionId, ServiceName};

/// State directory below $HOME when XDG_STATE_HOME is unset.
const STATE_DIR: &str = ".local/state/rollwatch";

/// Information about who holds a rollout lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    pub service: String,
    /// Revision being rolled out.
    pub revision: String,
}

impl LockInfo {
    pub fn new(service: &ServiceName, revision: &RevisionId) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            service: service.to_string(),
            revision: revision.to_string(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }
}

/// Directory holding lock files: `$XDG_STATE_HOME/rollwatch`, falling back
/// to `$HOME/.local/state/rollwatch`.
pub fn state_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("rollwatch"));
    }
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(|home| PathBuf::from(home).join(STATE_DIR))
}

/// A held rollout lock that releases on drop.
#[derive(Debug)]
pub struct RolloutLock {
    path: PathBuf,
    released: bool,
}

impl RolloutLock {
    /// Acquire the lock for `service` in the default state directory.
    pub fn acquire(
        service: &ServiceName,
        revision: &RevisionId,
        force: bool,
    ) -> Result<Self, RolloutError> {
        let dir = state_dir().ok_or_else(|| {
            RolloutError::lock_error("neither XDG_STATE_HOME nor HOME is set")
        })?;
        Self::acquire_in(&dir, service, revision, force)
    }

    /// Acquire the lock for `service` in `dir`.
    ///
    /// Creation uses `create_new`, so two processes can never both win.
    /// Stale locks (over an hour old) and unreadable lock files are broken
    /// with a warning; `force` breaks any lock.
    pub fn acquire_in(
        dir: &Path,
        service: &ServiceName,
        revision: &RevisionId,
        force: bool,
    ) -> Result<Self, RolloutError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            RolloutError::lock_error(format!(
                "failed to create state directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let path = dir.join(format!("{service}.lock"));
        let info = LockInfo::new(service, revision);
        let json = serde_json::to_string(&info)
            .map_err(|e| RolloutError::lock_error(format!("failed to serialize lock: {}", e)))?;

        match try_create(&path, &json) {
            Ok(()) => return Ok(Self::held(path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(RolloutError::lock_error(format!(
                    "failed to create {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        if let Some(existing) = check_existing_lock(&path, force) {
            return Err(RolloutError::lock_held(
                existing.holder,
                existing.pid,
                existing.started_at,
            ));
        }

        tracing::debug!("removing stale/forced lock at {}", path.display());
        if let Err(e) = std::fs::remove_file(&path)
            && e.kind() != ErrorKind::NotFound
        {
            return Err(RolloutError::lock_error(format!(
                "failed to break lock {}: {}",
                path.display(),
                e
            )));
        }

        try_create(&path, &json).map_err(|_| {
            RolloutError::lock_error("lock acquired by another process during break")
        })?;
        Ok(Self::held(path))
    }

    fn held(path: PathBuf) -> Self {
        tracing::debug!(path = %path.display(), "rollout lock acquired");
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, reporting failure to remove the file.
    pub fn release(mut self) -> Result<(), RolloutError> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RolloutError::lock_error(format!(
                "failed to remove {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

impl Drop for RolloutLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

fn try_create(path: &Path, json: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()
}

/// Returns the holder when the existing lock must be respected, or None
/// when it may be broken (stale, forced, or corrupted).
fn check_existing_lock(path: &Path, force: bool) -> Option<LockInfo> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => {
            tracing::warn!("Lock info unreadable, breaking lock");
            return None;
        }
    };

    match serde_json::from_str::<LockInfo>(&content) {
        Ok(existing) if force => {
            tracing::warn!(
                "Breaking lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            );
            None
        }
        Ok(existing) if existing.is_stale() => {
            tracing::warn!(
                "Auto-breaking stale lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            );
            None
        }
        Ok(existing) => Some(existing),
        Err(_) => {
            tracing::warn!("Lock info corrupted, breaking lock");
            None
        }
    }
}
