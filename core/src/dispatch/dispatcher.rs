//! The dispatcher: registry, admission rules, periodic passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use havoc_types::{EffectSpec, EffectStatus};

use super::request::DispatchRequest;
use super::responder::{EffectReport, Responder};
use crate::context::EngineContext;
use crate::effects::{Effect, EffectBehavior, EffectError, EffectSignal};

#[derive(Default)]
struct Registry {
    effects: HashMap<String, Effect>,
    /// Last (selectable, listed) pair per effect, so listing refreshes only
    /// notify on change instead of flooding the responder every tick.
    listings: HashMap<String, (bool, bool)>,
}

pub struct EffectDispatcher {
    ctx: EngineContext,
    responder: Arc<dyn Responder>,
    inner: Mutex<Registry>,
}

impl EffectDispatcher {
    pub fn new(ctx: EngineContext, responder: Arc<dyn Responder>) -> Self {
        Self {
            ctx,
            responder,
            inner: Mutex::new(Registry::default()),
        }
    }

    /// Add an effect to the registry. A second registration under the same
    /// id replaces the first (and its listing memo).
    pub fn register(&self, spec: EffectSpec, behavior: EffectBehavior) {
        let mut reg = self.lock();
        let id = spec.id.clone();
        reg.listings.remove(&id);
        reg.effects.insert(id, Effect::new(spec, behavior));
    }

    pub fn effect_count(&self) -> usize {
        self.lock().effects.len()
    }

    /// Availability probe for the protocol adapter's test query.
    pub fn is_ready(&self) -> bool {
        self.ctx.state.is_game_open() && self.ctx.state.is_map_loaded()
    }

    // --- Admission ---

    pub fn apply(&self, request: &DispatchRequest) {
        self.apply_at(Instant::now(), request);
    }

    /// Admission rules, in order: unknown id, exact duplicate, mutex
    /// conflict, selectability, then start. Duplicate and mutex rejections
    /// are temporary (caller retries after the reported wait); a
    /// selectability rejection needs caller-side state changes first, which
    /// is why it is checked last.
    pub fn apply_at(&self, now: Instant, request: &DispatchRequest) {
        let mut reg = self.lock();
        let id = request.effect_id.as_str();

        let Some(effect) = reg.effects.get(id) else {
            self.responder.report(id, EffectReport::NotAppliedUnavailable);
            return;
        };

        if !effect.is_closed() {
            let wait = effect.remaining();
            self.responder.report(id, EffectReport::NotAppliedWait(wait));
            return;
        }

        let groups = effect.spec().mutex.clone();
        let blocker_wait = reg
            .effects
            .values()
            .filter(|other| other.id() != id && !other.is_closed())
            .filter(|other| other.spec().mutex.iter().any(|g| groups.contains(g)))
            .map(|other| other.remaining())
            .max();
        if let Some(wait) = blocker_wait {
            self.responder.report(id, EffectReport::NotAppliedWait(wait));
            return;
        }

        if !self.ctx.state.condition_met(&effect.spec().selectable_when) {
            self.responder.report(id, EffectReport::NotAppliedRetry);
            return;
        }

        let Some(effect) = reg.effects.get_mut(id) else {
            return;
        };
        match effect.start_at(now, &self.ctx, request.clone()) {
            Err(EffectError::NotVerified) => {
                warn!(effect = %id, "effect applied but verification saw no change");
                self.responder.report(id, EffectReport::NotVerified);
            }
            Err(e) => {
                warn!(effect = %id, error = %e, "effect start failed");
                self.responder
                    .report(id, EffectReport::NotAppliedFailed(e.to_string()));
            }
            Ok(()) => {
                let duration = effect.duration();
                if duration.is_zero() {
                    self.responder.report(id, EffectReport::AppliedInstant);
                } else {
                    self.responder.report(id, EffectReport::AppliedFor(duration));
                }
            }
        }
    }

    // --- Early stop ---

    pub fn stop_early(&self, request: &DispatchRequest) {
        self.stop_early_at(Instant::now(), request);
    }

    /// Stop one effect, or every running effect when the request carries
    /// the empty-id sentinel. Stopping something unknown or already
    /// finished is benign: logged, not reported as an error.
    pub fn stop_early_at(&self, now: Instant, request: &DispatchRequest) {
        if request.is_stop_all() {
            self.stop_all_at(now);
            return;
        }

        let mut reg = self.lock();
        let id = request.effect_id.as_str();
        match reg.effects.get_mut(id) {
            None => {
                warn!(effect = %id, "stop requested for unknown effect, ignoring");
            }
            Some(effect) if effect.is_closed() => {
                debug!(effect = %id, "stop requested for idle effect, ignoring");
            }
            Some(effect) => {
                if let Err(e) = effect.stop_at(now, &self.ctx) {
                    warn!(effect = %id, error = %e, "stop action failed");
                }
                self.responder.report(id, EffectReport::DurationFinished);
            }
        }
    }

    fn stop_all_at(&self, now: Instant) {
        let mut reg = self.lock();
        for effect in reg.effects.values_mut() {
            if effect.is_closed() {
                continue;
            }
            let id = effect.id().to_string();
            if let Err(e) = effect.stop_at(now, &self.ctx) {
                warn!(effect = %id, error = %e, "stop action failed");
            }
            self.responder.report(&id, EffectReport::DurationFinished);
        }
    }

    // --- Periodic passes ---

    /// Tick ordinary timed effects. Returns false if any effect errored
    /// (the caller widens its interval); errors never abort the pass.
    pub fn update_unclosed_duration_effects(&self) -> bool {
        self.update_pass(Instant::now(), false)
    }

    /// Tick animated effects on the fast cadence.
    pub fn update_fast_animation_effects(&self) -> bool {
        self.update_pass(Instant::now(), true)
    }

    pub(crate) fn update_pass(&self, now: Instant, animated: bool) -> bool {
        let mut reg = self.lock();
        let responder = &self.responder;
        let mut all_ok = true;

        for effect in reg
            .effects
            .values_mut()
            .filter(|e| e.spec().is_update_animation == animated)
        {
            if effect.is_closed() {
                continue;
            }
            let id = effect.id().to_string();
            let mut sink = |signal: EffectSignal| {
                let report = match signal {
                    EffectSignal::Paused(remaining) => EffectReport::DurationPaused(remaining),
                    EffectSignal::Resumed(remaining) => EffectReport::DurationResumed(remaining),
                    EffectSignal::Closing => EffectReport::DurationFinished,
                };
                responder.report(&id, report);
            };
            if let Err(e) = effect.update_at(now, &self.ctx, &mut sink) {
                warn!(effect = %id, error = %e, "effect update failed");
                all_ok = false;
            }
        }
        all_ok
    }

    /// Recompute (selectable, listed) per effect and notify only on change.
    pub fn refresh_effect_listings(&self) {
        let mut reg = self.lock();
        let mut changes: Vec<(String, bool, bool)> = Vec::new();

        for effect in reg.effects.values() {
            let spec = effect.spec();
            let listed = self.ctx.state.condition_met(&spec.listed_when);
            let selectable = self.ctx.state.condition_met(&spec.selectable_when);
            changes.push((spec.id.clone(), selectable, listed));
        }

        for (id, selectable, listed) in changes {
            let prev = reg.listings.get(&id).copied();
            if prev.map(|p| p.0) != Some(selectable) {
                self.responder.set_selectable(&id, selectable);
            }
            if prev.map(|p| p.1) != Some(listed) {
                self.responder.set_listed(&id, listed);
            }
            reg.listings.insert(id, (selectable, listed));
        }
    }

    /// Pure snapshot of every effect's external state. Safe to call
    /// concurrently with updates.
    pub fn effects_status(&self) -> Vec<EffectStatus> {
        let reg = self.lock();
        reg.effects
            .values()
            .map(|effect| {
                let spec = effect.spec();
                EffectStatus {
                    id: spec.id.clone(),
                    listed: self.ctx.state.condition_met(&spec.listed_when),
                    selectable: self.ctx.state.condition_met(&spec.selectable_when),
                    running: !effect.is_closed(),
                    remaining_secs: if effect.is_closed() {
                        0.0
                    } else {
                        effect.remaining().as_secs_f32()
                    },
                }
            })
            .collect()
    }

    // --- Loops & shutdown ---

    /// Spawn the safe and fast tick loops. Each self-reschedules after its
    /// pass completes, widening to the error backoff when a pass reported
    /// an error and narrowing back on the next clean pass.
    pub fn spawn_ticks(self: &Arc<Self>, stop: Arc<AtomicBool>) -> Vec<JoinHandle<()>> {
        let settings = &self.ctx.settings;
        let safe = Duration::from_millis(settings.safe_tick_ms);
        let fast = Duration::from_millis(settings.fast_tick_ms);
        let backoff = Duration::from_secs(settings.error_backoff_secs);

        let dispatcher = Arc::clone(self);
        let stop_safe = Arc::clone(&stop);
        let safe_loop = tokio::spawn(async move {
            while !stop_safe.load(Ordering::Relaxed) {
                // Effect actions run console commands that block up to
                // their timeout; keep the pass off the async workers.
                let worker = Arc::clone(&dispatcher);
                let ok = tokio::task::spawn_blocking(move || {
                    let ok = worker.update_unclosed_duration_effects();
                    worker.refresh_effect_listings();
                    ok
                })
                .await
                .unwrap_or(false);
                tokio::time::sleep(if ok { safe } else { backoff }).await;
            }
        });

        let dispatcher = Arc::clone(self);
        let fast_loop = tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                let worker = Arc::clone(&dispatcher);
                let ok = tokio::task::spawn_blocking(move || worker.update_fast_animation_effects())
                    .await
                    .unwrap_or(false);
                tokio::time::sleep(if ok { fast } else { backoff }).await;
            }
        });

        vec![safe_loop, fast_loop]
    }

    /// Stop every running effect. Called before resources are released so
    /// no remote-side state is orphaned.
    pub fn shutdown(&self) {
        info!("dispatcher shutting down, stopping running effects");
        self.stop_all_at(Instant::now());
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().expect("dispatcher lock poisoned")
    }
}
