//! Session backup of the game's mutable config file.
//!
//! Effects may rewrite parts of the user's config during a session. A copy
//! is taken at session start and put back at clean shutdown, so commands
//! issued during the session never permanently alter user state. If a
//! backup from a crashed session is found at startup it is restored first.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

const BACKUP_SUFFIX: &str = "havoc-bak";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("config file does not exist: {path:?}")]
    Missing { path: PathBuf },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug)]
pub struct SessionBackup {
    original: PathBuf,
    backup: PathBuf,
}

impl SessionBackup {
    /// Take the session backup. If a stale backup from an unclean shutdown
    /// exists, restore it over the config first (self-heal), then back up
    /// the healed file.
    pub fn begin(path: &Path) -> Result<Self, BackupError> {
        let backup = backup_path(path);

        if backup.exists() {
            warn!(config = ?path, "stale session backup found, restoring previous user config");
            copy(&backup, path)?;
        }

        if !path.exists() {
            return Err(BackupError::Missing {
                path: path.to_path_buf(),
            });
        }

        copy(path, &backup)?;
        info!(config = ?path, backup = ?backup, "session config backup created");
        Ok(Self {
            original: path.to_path_buf(),
            backup,
        })
    }

    /// Restore the user's config and delete the backup. Consumes the guard;
    /// the session is over.
    pub fn finish(self) -> Result<(), BackupError> {
        copy(&self.backup, &self.original)?;
        fs::remove_file(&self.backup).map_err(|e| BackupError::Io {
            path: self.backup.clone(),
            source: e,
        })?;
        info!(config = ?self.original, "session config restored");
        Ok(())
    }

    pub fn backup_file(&self) -> &Path {
        &self.backup
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

fn copy(from: &Path, to: &Path) -> Result<(), BackupError> {
    fs::copy(from, to).map(|_| ()).map_err(|e| BackupError::Io {
        path: from.to_path_buf(),
        source: e,
    })
}
