//! Session assembly.
//!
//! Wires the cache, bus, watcher and dispatcher together for one game
//! session, owns the background tasks, and guarantees teardown order:
//! running effects are stopped, remapped bindings restored, and the user's
//! config put back before anything is dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use havoc_types::{EffectSpec, EngineSettings};

use crate::console::GameConsole;
use crate::context::EngineContext;
use crate::dispatch::{EffectDispatcher, Responder};
use crate::effects::EffectBehavior;
use crate::events::EventBus;
use crate::log_watch::{LogWatcher, WatchError};
use crate::state::backup::BackupError;
use crate::state::{CommandBindings, SessionBackup, StateCache};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

pub struct Engine {
    dispatcher: Arc<EffectDispatcher>,
    bindings: Arc<CommandBindings>,
    watcher: LogWatcher,
    backup: Option<SessionBackup>,
    stop: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    ctx: EngineContext,
}

impl Engine {
    /// Bring up a session: self-heal any leftovers from a crashed run,
    /// back up the user's config, and start the polling/tail/tick loops.
    pub fn start(
        console: Arc<dyn GameConsole>,
        responder: Arc<dyn Responder>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let bus = Arc::new(EventBus::new());
        let cache = Arc::new(StateCache::new(Arc::clone(&console), &settings));
        cache.subscribe_events(&bus);

        let backup = if settings.game_config_path.as_os_str().is_empty() {
            None
        } else {
            Some(SessionBackup::begin(&settings.game_config_path)?)
        };

        let bindings = Arc::new(CommandBindings::new(
            Arc::clone(&console),
            bindings_backup_path(),
        ));
        if let Err(e) = bindings.recover() {
            warn!(error = %e, "could not recover stale binding remaps");
        }

        let watcher = LogWatcher::spawn(settings.log_path.clone(), &settings, Arc::clone(&bus))?;

        let ctx = EngineContext::new(console, bus, Arc::clone(&cache), settings);
        let dispatcher = Arc::new(EffectDispatcher::new(ctx.clone(), responder));

        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = cache.spawn_polling(Arc::clone(&stop));
        tasks.extend(dispatcher.spawn_ticks(Arc::clone(&stop)));

        info!("engine session started");
        Ok(Self {
            dispatcher,
            bindings,
            watcher,
            backup,
            stop,
            tasks,
            ctx,
        })
    }

    pub fn register(&self, spec: EffectSpec, behavior: EffectBehavior) {
        self.dispatcher.register(spec, behavior);
    }

    pub fn dispatcher(&self) -> &Arc<EffectDispatcher> {
        &self.dispatcher
    }

    pub fn bindings(&self) -> &Arc<CommandBindings> {
        &self.bindings
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Whether the kill feed is delivering events.
    pub fn feed_live(&self) -> bool {
        self.watcher.is_live()
    }

    /// Tear the session down. Stops every running effect and restores all
    /// user-visible state before releasing anything.
    pub async fn shutdown(self) {
        self.dispatcher.shutdown();
        if let Err(e) = self.bindings.restore_all() {
            warn!(error = %e, "could not restore remapped bindings");
        }

        self.stop.store(true, Ordering::SeqCst);
        // The loops only sleep between ticks; aborting here is safe.
        for task in self.tasks {
            task.abort();
        }
        self.watcher.shutdown().await;

        if let Some(backup) = self.backup {
            if let Err(e) = backup.finish() {
                warn!(error = %e, "could not restore the session config backup");
            }
        }
        info!("engine session closed");
    }
}

fn bindings_backup_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    let dir = base.join("havoc");
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(dir = ?dir, error = %e, "could not create config directory");
    }
    dir.join("bindings-backup.toml")
}
