//! Temporary key-binding remaps with durable restore.
//!
//! An effect may remap a single input binding for its duration. The original
//! command is snapshotted lazily from the game on first remap and written to
//! a durable backup file, so the binding can be put back even if the process
//! restarts mid-effect. Remapping a binding that is already remapped is an
//! error; restoring one that is not remapped is benign.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::console::{ConsoleError, GameConsole};

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("binding for {key:?} is already remapped")]
    AlreadyRemapped { key: String },

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("backup file {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Serialized form of the durable backup: key -> original command.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BindingBackup {
    #[serde(default)]
    originals: HashMap<String, String>,
}

pub struct CommandBindings {
    console: Arc<dyn GameConsole>,
    backup_path: PathBuf,
    originals: Mutex<HashMap<String, String>>,
}

impl CommandBindings {
    pub fn new(console: Arc<dyn GameConsole>, backup_path: PathBuf) -> Self {
        Self {
            console,
            backup_path,
            originals: Mutex::new(HashMap::new()),
        }
    }

    /// Restore any remaps left over by a previous unclean shutdown.
    /// Returns how many bindings were put back.
    pub fn recover(&self) -> Result<usize, BindingError> {
        if !self.backup_path.exists() {
            return Ok(0);
        }
        let text = fs::read_to_string(&self.backup_path).map_err(|e| BindingError::Io {
            path: self.backup_path.clone(),
            source: e,
        })?;
        let stale: BindingBackup = toml::from_str(&text).map_err(|e| BindingError::Corrupt {
            path: self.backup_path.clone(),
            source: e,
        })?;

        let count = stale.originals.len();
        for (key, original) in &stale.originals {
            warn!(key = %key, "restoring binding left over from previous session");
            self.bind(key, original)?;
        }
        fs::remove_file(&self.backup_path).map_err(|e| BindingError::Io {
            path: self.backup_path.clone(),
            source: e,
        })?;
        Ok(count)
    }

    /// Temporarily point `key` at `command`, snapshotting the original first.
    pub fn remap(&self, key: &str, command: &str) -> Result<(), BindingError> {
        let mut originals = self.lock();
        if originals.contains_key(key) {
            return Err(BindingError::AlreadyRemapped {
                key: key.to_string(),
            });
        }

        let response = self.console.run_command(&format!("bind {key}"))?;
        let original = parse_bound_command(&response).unwrap_or_default();

        originals.insert(key.to_string(), original);
        self.write_backup(&originals)?;
        drop(originals);

        self.bind(key, command)?;
        info!(key = %key, command = %command, "binding remapped");
        Ok(())
    }

    /// Put the original command back. A key that was never remapped is a
    /// benign no-op.
    pub fn restore(&self, key: &str) -> Result<(), BindingError> {
        let mut originals = self.lock();
        let Some(original) = originals.remove(key) else {
            debug!(key = %key, "restore of a binding that is not remapped, ignoring");
            return Ok(());
        };
        self.write_backup(&originals)?;
        drop(originals);

        self.bind(key, &original)?;
        info!(key = %key, "binding restored");
        Ok(())
    }

    /// Restore every outstanding remap. Used at shutdown.
    pub fn restore_all(&self) -> Result<(), BindingError> {
        let keys: Vec<String> = self.lock().keys().cloned().collect();
        for key in keys {
            self.restore(&key)?;
        }
        Ok(())
    }

    pub fn is_remapped(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn bind(&self, key: &str, command: &str) -> Result<(), ConsoleError> {
        self.console
            .run_command(&format!("bind {key} \"{command}\""))
            .map(|_| ())
    }

    fn write_backup(&self, originals: &HashMap<String, String>) -> Result<(), BindingError> {
        if originals.is_empty() {
            if self.backup_path.exists() {
                fs::remove_file(&self.backup_path).map_err(|e| BindingError::Io {
                    path: self.backup_path.clone(),
                    source: e,
                })?;
            }
            return Ok(());
        }
        let backup = BindingBackup {
            originals: originals.clone(),
        };
        let text = toml::to_string_pretty(&backup).unwrap_or_default();
        fs::write(&self.backup_path, text).map_err(|e| BindingError::Io {
            path: self.backup_path.clone(),
            source: e,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.originals.lock().expect("bindings lock poisoned")
    }
}

/// Parse the game's `bind <key>` echo, e.g. `"w" = "+forward"`.
/// Falls back to the trimmed raw response for transports that already
/// normalize to the bare command.
fn parse_bound_command(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if let Some((_, rhs)) = trimmed.split_once('=') {
        let rhs = rhs.trim();
        return Some(rhs.trim_matches('"').to_string());
    }
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.trim_matches('"').to_string())
    }
}
