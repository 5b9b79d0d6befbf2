//! Session file management for Telegram accounts
//!
//! Provides:
//! - Deterministic per-phone session file naming
//! - Removal of session artifacts (forces re-authentication)
//! - File-based session locking to prevent parallel use of one session

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::config::{Config, SESSION_FILE_PREFIX};
use crate::error::{Error, Result};

/// Where session artifacts for each phone number live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    dir: PathBuf,
    prefix: String,
}

impl Default for SessionPaths {
    fn default() -> Self {
        Self::new(".", SESSION_FILE_PREFIX)
    }
}

impl SessionPaths {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.session_dir, &config.session_prefix)
    }

    fn base_name(&self, phone: &str) -> String {
        format!("{}{}", self.prefix, phone)
    }

    /// Session database for a phone number.
    pub fn session_file(&self, phone: &str) -> PathBuf {
        self.dir.join(format!("{}.session", self.base_name(phone)))
    }

    /// Journal left next to the session database by SQLite.
    pub fn journal_file(&self, phone: &str) -> PathBuf {
        self.dir
            .join(format!("{}.session-journal", self.base_name(phone)))
    }

    pub fn lock_file(&self, phone: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", self.base_name(phone)))
    }

    pub fn exists(&self, phone: &str) -> bool {
        self.session_file(phone).exists()
    }

    /// Delete the session and its journal. Returns true if anything was removed.
    pub fn remove(&self, phone: &str) -> Result<bool> {
        let mut removed = false;
        for path in [self.session_file(phone), self.journal_file(phone)] {
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed session artifact");
                    removed = true;
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(Error::IoError(err)),
            }
        }
        Ok(removed)
    }
}

/// Session lock guard that ensures exclusive access to one account's session.
pub struct SessionLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl SessionLock {
    /// Acquire an exclusive lock at `path`.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                lock_file: Some(lock_file),
            }),
            Err(_) => {
                eprintln!(
                    r#"
⚠️  ERROR: this Telegram session is already used by another process!

One session cannot be shared between running senders.
Wait for the other process to finish and try again.
"#
                );
                Err(Error::SessionLocked)
            }
        }
    }

    /// Acquire the lock for a phone number's session.
    pub fn for_phone(paths: &SessionPaths, phone: &str) -> Result<Self> {
        Self::acquire(paths.lock_file(phone))
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = file.unlock();
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fail with a readable hint when no session exists for the phone yet.
pub fn check_session_exists(paths: &SessionPaths, phone: &str) -> Result<()> {
    let session_file = paths.session_file(phone);

    if !session_file.exists() {
        eprintln!(
            r#"
⚠️  ERROR: session file '{}' not found!

To create it run:
    group_sender login {}
"#,
            session_file.display(),
            phone
        );
        return Err(Error::SessionNotFound(session_file.display().to_string()));
    }

    Ok(())
}
