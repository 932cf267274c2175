//! Console log tailing.
//!
//! The game appends to its console log; nothing in the backlog matters, so
//! the watcher seeks to the end on open and only classifies new lines. Open
//! failures are retried a bounded number of times with a fixed backoff, then
//! the watcher gives up for good — status checks that depend on the kill
//! feed (challenges) observe that through `is_live`.

pub mod matchers;

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{trace, warn};

use havoc_types::EngineSettings;

use crate::events::EventBus;
use matchers::LineMatchers;

/// Poll interval while the log has no new data.
const IDLE_WAIT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid line matcher pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("could not open console log {path:?} after {attempts} attempts")]
    GaveUp { path: PathBuf, attempts: u32 },

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub struct LogWatcher {
    live: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl LogWatcher {
    /// Spawn the tail loop. Returns immediately; `is_live` flips true once
    /// the log is open and false when the watcher exits or gives up.
    pub fn spawn(
        path: PathBuf,
        settings: &EngineSettings,
        bus: Arc<EventBus>,
    ) -> Result<Self, WatchError> {
        let matchers = LineMatchers::new()?;
        let live = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let attempts = settings.log_open_attempts;
        let backoff = Duration::from_secs(settings.log_open_backoff_secs);
        let task_live = Arc::clone(&live);
        let task_stop = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            match open_with_retry(&path, attempts, backoff).await {
                Ok(file) => {
                    task_live.store(true, Ordering::SeqCst);
                    tail(file, &path, matchers, bus, &task_stop).await;
                    task_live.store(false, Ordering::SeqCst);
                }
                Err(e) => {
                    // Permanent: challenges and other feed consumers stay
                    // unavailable for the rest of the session.
                    warn!(error = %e, "giving up on console log, kill feed disabled");
                }
            }
        });

        Ok(Self { live, stop, handle })
    }

    /// Whether the kill feed is currently delivering events.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.await;
    }
}

async fn open_with_retry(
    path: &PathBuf,
    attempts: u32,
    backoff: Duration,
) -> Result<File, WatchError> {
    for attempt in 1..=attempts.max(1) {
        match File::open(path).await {
            Ok(file) => return Ok(file),
            Err(e) => {
                warn!(
                    path = ?path,
                    attempt,
                    attempts,
                    error = %e,
                    "console log not available yet"
                );
                if attempt < attempts {
                    sleep(backoff).await;
                }
            }
        }
    }
    Err(WatchError::GaveUp {
        path: path.clone(),
        attempts,
    })
}

async fn tail(
    mut file: File,
    path: &PathBuf,
    matchers: LineMatchers,
    bus: Arc<EventBus>,
    stop: &AtomicBool,
) {
    // Only new lines matter.
    if let Err(e) = file.seek(SeekFrom::End(0)).await {
        warn!(path = ?path, error = %e, "could not seek console log");
        return;
    }

    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::new();

    while !stop.load(Ordering::Relaxed) {
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => sleep(IDLE_WAIT).await,
            Ok(_) => {
                // A read without a trailing newline is a partially written
                // line; keep accumulating until the game finishes it.
                if buf.last() != Some(&b'\n') {
                    sleep(IDLE_WAIT).await;
                    continue;
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                match matchers.classify(line) {
                    Some(event) => bus.publish(&event),
                    None => trace!(line, "unmatched console line"),
                }
                buf.clear();
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "console log read failed, stopping watcher");
                break;
            }
        }
    }
}
