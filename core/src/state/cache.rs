//! Polling/caching proxy over the remote console.
//!
//! Owns the table of tracked console variables and refreshes it on two
//! cadences: a safe ~1 s cycle for general status and a fast ~100 ms cycle
//! for motion-derived values only. Last-known-good values are retained per
//! variable policy, and "what is true right now" booleans are derived on
//! read, never stored.
//!
//! Poll responses are unreliable: they can be garbage, time out, or vanish
//! mid-session. A failed cycle degrades to a much longer retry interval and
//! only the first occurrence of a repeated identical failure is logged.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use regex::Regex;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use havoc_types::{Condition, EngineSettings, RespawnSettings};

use crate::console::{ConsoleError, GameConsole};
use crate::events::{EventBus, GameEvent, PlayerClass, SubscriptionHandle};

/// Numeric responses must match this; anything else keeps the previous value.
static NUMERIC_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d*\.?\d+f?$").expect("numeric literal pattern"));

/// Positional report the game gives when no camera exists, i.e. no map is
/// loaded. A real position never sits exactly at the origin.
static NO_CAMERA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^setpos 0(\.0+)? 0(\.0+)? 0(\.0+)?").expect("no-camera pattern")
});

/// Variable tracked under the user's player name.
pub const VAR_USER_NAME: &str = "name";

/// Variable tracked under the camera position report.
pub const VAR_POSITION: &str = "position";

/// What happens to a cached value at the start of each poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Reset to unknown every cycle, so staleness is visible.
    Clearable,
    /// Retained across a failed or garbage poll. Avoids flicker at the cost
    /// of hiding staleness.
    Sticky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollRate {
    /// ~1 s cadence for general status.
    Safe,
    /// ~100 ms cadence, motion-derived signals only.
    Fast,
}

#[derive(Debug, Clone)]
struct TrackedVar {
    command: String,
    retention: Retention,
    rate: PollRate,
    numeric: bool,
    value: Option<String>,
}

/// Event-sourced life state, with the timer heuristic as fallback.
#[derive(Debug, Default)]
struct AliveState {
    dead_since: Option<Instant>,
    spawned_class: Option<PlayerClass>,
    selected_class: Option<PlayerClass>,
}

#[derive(Default)]
struct CacheInner {
    vars: HashMap<String, TrackedVar>,
    alive: AliveState,
    /// Memo of the last poll failure message, so prolonged outages log once.
    last_error: Option<String>,
}

pub struct StateCache {
    console: Arc<dyn GameConsole>,
    respawn: RespawnSettings,
    safe_tick: Duration,
    fast_tick: Duration,
    error_backoff: Duration,
    inner: Mutex<CacheInner>,
}

impl StateCache {
    pub fn new(console: Arc<dyn GameConsole>, settings: &EngineSettings) -> Self {
        let cache = Self {
            console,
            respawn: settings.respawn,
            safe_tick: Duration::from_millis(settings.safe_tick_ms),
            fast_tick: Duration::from_millis(settings.fast_tick_ms),
            error_backoff: Duration::from_secs(settings.error_backoff_secs),
            inner: Mutex::new(CacheInner::default()),
        };
        // The two variables every derived boolean needs.
        cache.track(VAR_USER_NAME, "name", Retention::Sticky, PollRate::Safe, false);
        cache.track(VAR_POSITION, "getpos", Retention::Clearable, PollRate::Fast, false);
        cache
    }

    /// Register a variable for polling. Re-registering a name replaces its
    /// policy and drops the cached value.
    pub fn track(
        &self,
        name: &str,
        command: &str,
        retention: Retention,
        rate: PollRate,
        numeric: bool,
    ) {
        let mut inner = self.lock();
        inner.vars.insert(
            name.to_string(),
            TrackedVar {
                command: command.to_string(),
                retention,
                rate,
                numeric,
                value: None,
            },
        );
    }

    /// Last-known value of a tracked variable, if any.
    pub fn value(&self, name: &str) -> Option<String> {
        self.lock().vars.get(name).and_then(|v| v.value.clone())
    }

    /// One poll cycle at the given cadence, under the cache lock:
    /// clear the clearables, then re-query everything at this rate.
    ///
    /// A transport error aborts the cycle (clearables stay unknown, which is
    /// the point) and is logged only on its first consecutive occurrence.
    pub fn poll(&self, rate: PollRate) -> Result<(), ConsoleError> {
        let mut inner = self.lock();

        for var in inner.vars.values_mut() {
            if var.rate == rate && var.retention == Retention::Clearable {
                var.value = None;
            }
        }

        let names: Vec<String> = inner
            .vars
            .iter()
            .filter(|(_, v)| v.rate == rate)
            .map(|(name, _)| name.clone())
            .collect();

        for name in names {
            let command = inner.vars[&name].command.clone();
            let response = match self.console.run_command(&command) {
                Ok(text) => text,
                Err(e) => {
                    let message = e.to_string();
                    if inner.last_error.as_deref() != Some(&message) {
                        warn!(command = %command, error = %message, "poll cycle failed, backing off");
                        inner.last_error = Some(message);
                    }
                    return Err(e);
                }
            };

            let value = response.trim();
            let var = inner
                .vars
                .get_mut(&name)
                .filter(|v| !v.numeric || NUMERIC_LITERAL.is_match(value));
            match var {
                Some(var) => var.value = Some(value.to_string()),
                None => trace!(variable = %name, value, "discarding non-numeric response"),
            }
        }

        if inner.last_error.take().is_some() {
            info!("poll cycle recovered, resuming normal cadence");
        }
        Ok(())
    }

    // --- Derived booleans (computed, never stored) ---

    /// The game process is reachable: purely a transport question.
    pub fn is_game_open(&self) -> bool {
        self.console.is_connected()
    }

    /// A map is loaded iff the last positional report exists and is not the
    /// all-zero "no camera" pattern.
    pub fn is_map_loaded(&self) -> bool {
        let inner = self.lock();
        inner
            .vars
            .get(VAR_POSITION)
            .and_then(|v| v.value.as_deref())
            .is_some_and(|pos| !NO_CAMERA.is_match(pos))
    }

    pub fn is_user_alive(&self) -> bool {
        self.is_user_alive_at(Instant::now())
    }

    pub(crate) fn is_user_alive_at(&self, now: Instant) -> bool {
        let inner = self.lock();
        match inner.alive.dead_since {
            Some(dead_at) => {
                // No explicit spawn since the death. Once a class selection
                // is known, assume a respawn after the estimated window
                // (death cam plus 1.5 average respawn waves). Explicitly
                // approximate; see RespawnSettings.
                inner.alive.selected_class.is_some()
                    && now.duration_since(dead_at)
                        >= Duration::from_secs_f32(self.respawn.window_secs())
            }
            None => inner.alive.spawned_class.is_some(),
        }
    }

    /// The class the user last spawned as.
    pub fn user_class(&self) -> Option<PlayerClass> {
        self.lock().alive.spawned_class
    }

    pub fn user_name(&self) -> Option<String> {
        self.value(VAR_USER_NAME)
    }

    /// Evaluate an effect gate against the current inferred state.
    pub fn condition_met(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Always => true,
            Condition::GameOpen => self.is_game_open(),
            Condition::MapLoaded => self.is_game_open() && self.is_map_loaded(),
            Condition::Alive => {
                self.is_game_open() && self.is_map_loaded() && self.is_user_alive()
            }
            Condition::ClassIs { class } => {
                self.is_game_open()
                    && self.is_map_loaded()
                    && self.is_user_alive()
                    && self.user_class().is_some_and(|c| c.token() == class)
            }
        }
    }

    // --- Event-sourced transitions ---

    pub fn handle_event(&self, event: &GameEvent) {
        self.handle_event_at(event, Instant::now());
    }

    pub(crate) fn handle_event_at(&self, event: &GameEvent, now: Instant) {
        let mut inner = self.lock();
        match event {
            GameEvent::PlayerKilled { victim, .. } if Self::is_user(&inner, victim) => {
                debug!(victim = %victim, "user death observed");
                inner.alive.dead_since = Some(now);
            }
            GameEvent::PlayerSuicided { player, .. } | GameEvent::PlayerDied { player, .. }
                if Self::is_user(&inner, player) =>
            {
                debug!(player = %player, "user death observed");
                inner.alive.dead_since = Some(now);
            }
            GameEvent::ClassChanged { class, .. } => {
                // Spawning is the committed transition: alive again.
                inner.alive.spawned_class = Some(*class);
                inner.alive.selected_class = Some(*class);
                inner.alive.dead_since = None;
            }
            GameEvent::ClassSelected { class, .. } => {
                inner.alive.selected_class = Some(*class);
            }
            GameEvent::MapChanged { map, .. } => {
                debug!(map = %map, "map change, clearing death state");
                inner.alive.dead_since = None;
            }
            _ => {}
        }
    }

    fn is_user(inner: &CacheInner, player: &str) -> bool {
        inner
            .vars
            .get(VAR_USER_NAME)
            .and_then(|v| v.value.as_deref())
            .is_some_and(|name| name == player)
    }

    /// Route bus events into this cache. Returns the handle so the caller
    /// can detach at shutdown.
    pub fn subscribe_events(self: &Arc<Self>, bus: &EventBus) -> SubscriptionHandle {
        let cache = Arc::clone(self);
        bus.subscribe(move |event| cache.handle_event(event))
    }

    /// Spawn the two polling loops. Each self-reschedules after its cycle
    /// completes (never overlapping), widens to the error backoff on
    /// failure and narrows back on the next success.
    pub fn spawn_polling(self: &Arc<Self>, stop: Arc<AtomicBool>) -> Vec<JoinHandle<()>> {
        vec![
            self.spawn_poll_loop(PollRate::Safe, self.safe_tick, Arc::clone(&stop)),
            self.spawn_poll_loop(PollRate::Fast, self.fast_tick, stop),
        ]
    }

    fn spawn_poll_loop(
        self: &Arc<Self>,
        rate: PollRate,
        normal: Duration,
        stop: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let backoff = self.error_backoff;
        tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                // Console calls block up to their timeout; keep the cycle
                // off the async workers.
                let worker = Arc::clone(&cache);
                let ok = tokio::task::spawn_blocking(move || worker.poll(rate).is_ok())
                    .await
                    .unwrap_or(false);
                tokio::time::sleep(if ok { normal } else { backoff }).await;
            }
        })
    }

    // --- Internal ---

    /// Record an observed value directly, bypassing a poll. Used by tests
    /// and by engine-internal enrichment.
    pub(crate) fn observe(&self, name: &str, value: &str) {
        if let Some(var) = self.lock().vars.get_mut(name) {
            var.value = Some(value.to_string());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().expect("state cache lock poisoned")
    }
}
