//! The per-effect state machine.
//!
//! Idle (`closed`) → Active on `start` → Paused/Active oscillation while
//! running, governed by the spec's `active_when` gate → Idle on `stop`,
//! explicit or duration-complete. Elapsed time is credited only while
//! unpaused, so a 60 s effect interrupted for 5 s finishes after 65 s of
//! wall clock.

use std::time::{Duration, Instant};

use havoc_types::EffectSpec;

use super::behavior::{EffectBehavior, TickOutcome};
use super::EffectError;
use crate::context::EngineContext;
use crate::dispatch::DispatchRequest;

/// Nudge applied when an effect would otherwise sit exactly at its duration
/// while paused. Guarantees one final unpaused update before closing.
pub const PAUSE_EPSILON: Duration = Duration::from_millis(50);

/// Lifecycle notifications surfaced during `update`/`stop`, consumed by the
/// dispatcher and translated into outbound reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSignal {
    Paused(Duration),
    Resumed(Duration),
    /// Fired while `current_request` is still set, so observers can read
    /// the request during closing.
    Closing,
}

pub struct Effect {
    spec: EffectSpec,
    behavior: EffectBehavior,
    duration: Duration,
    elapsed: Duration,
    paused: bool,
    last_tick: Instant,
    current: Option<DispatchRequest>,
}

impl Effect {
    pub fn new(spec: EffectSpec, behavior: EffectBehavior) -> Self {
        Self {
            spec,
            behavior,
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            paused: false,
            last_tick: Instant::now(),
            current: None,
        }
    }

    // --- Accessors ---

    pub fn spec(&self) -> &EffectSpec {
        &self.spec
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn is_closed(&self) -> bool {
        self.current.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.paused && !self.is_closed()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed)
    }

    pub fn current_request(&self) -> Option<&DispatchRequest> {
        self.current.as_ref()
    }

    // --- Transitions ---

    pub fn start(&mut self, ctx: &EngineContext, request: DispatchRequest) -> Result<(), EffectError> {
        self.start_at(Instant::now(), ctx, request)
    }

    /// Begin running. Resolves the duration from the request, falling back
    /// to the spec default. Zero duration means the effect applies and
    /// completes synchronously (never ticked, stays closed). An `Instant`
    /// behavior is always zero-duration; a requested override cannot turn
    /// it into a do-nothing timer that holds its mutex groups.
    ///
    /// On error the effect does not transition to Active; the caller turns
    /// the error into a failure report.
    pub fn start_at(
        &mut self,
        now: Instant,
        ctx: &EngineContext,
        request: DispatchRequest,
    ) -> Result<(), EffectError> {
        if !self.is_closed() {
            return Err(EffectError::AlreadyRunning);
        }

        self.duration = match self.behavior {
            EffectBehavior::Instant { .. } => Duration::ZERO,
            _ => request
                .requested_duration
                .unwrap_or_else(|| Duration::from_secs_f32(self.spec.duration_secs.max(0.0))),
        };
        self.elapsed = Duration::ZERO;
        self.paused = false;
        self.last_tick = now;

        self.run_start(ctx, &request)?;

        if self.duration.is_zero() {
            // Instantaneous: apply and complete in one transition.
            let result = self.run_stop(ctx, &request);
            self.current = None;
            return result;
        }

        self.current = Some(request);
        Ok(())
    }

    pub fn update(
        &mut self,
        ctx: &EngineContext,
        sink: &mut dyn FnMut(EffectSignal),
    ) -> Result<(), EffectError> {
        self.update_at(Instant::now(), ctx, sink)
    }

    /// One tick. No-op when idle.
    ///
    /// While the availability gate fails, elapsed time is not credited and
    /// a single `Paused` signal fires; if elapsed had already reached the
    /// duration it is nudged back so the closing update is guaranteed to
    /// happen unpaused. On the first available tick after a pause,
    /// `Resumed` fires and the tick credits nothing: the interval since the
    /// last tick was spent unavailable, so crediting it would advance the
    /// clock across the pause.
    pub fn update_at(
        &mut self,
        now: Instant,
        ctx: &EngineContext,
        sink: &mut dyn FnMut(EffectSignal),
    ) -> Result<(), EffectError> {
        let Some(request) = self.current.clone() else {
            return Ok(());
        };

        let mut delta = now.duration_since(self.last_tick);
        self.last_tick = now;

        if !ctx.state.condition_met(&self.spec.active_when) {
            if !self.paused {
                self.paused = true;
                if self.elapsed >= self.duration {
                    self.elapsed = self.duration.saturating_sub(PAUSE_EPSILON);
                }
                sink(EffectSignal::Paused(self.remaining()));
            }
            return Ok(());
        }

        if self.paused {
            self.paused = false;
            sink(EffectSignal::Resumed(self.remaining()));
            delta = Duration::ZERO;
        }

        self.elapsed = (self.elapsed + delta).min(self.duration);

        let mut closing = self.elapsed >= self.duration;
        if !closing {
            match self.run_tick(ctx, &request, delta)? {
                TickOutcome::Continue => {}
                TickOutcome::FinishEarly => closing = true,
            }
        }

        if closing {
            let result = self.run_stop(ctx, &request);
            sink(EffectSignal::Closing);
            self.current = None;
            return result;
        }
        Ok(())
    }

    pub fn stop(&mut self, ctx: &EngineContext) -> Result<(), EffectError> {
        self.stop_at(Instant::now(), ctx)
    }

    /// Explicit stop. Idempotent: stopping an idle effect does nothing.
    pub fn stop_at(&mut self, now: Instant, ctx: &EngineContext) -> Result<(), EffectError> {
        let Some(request) = self.current.clone() else {
            return Ok(());
        };

        if !self.paused {
            let delta = now.duration_since(self.last_tick);
            self.elapsed = (self.elapsed + delta).min(self.duration);
        }
        self.last_tick = now;

        let result = self.run_stop(ctx, &request);
        self.current = None;
        self.paused = false;
        result
    }

    // --- Behavior plumbing ---

    fn run_start(&mut self, ctx: &EngineContext, request: &DispatchRequest) -> Result<(), EffectError> {
        match &mut self.behavior {
            EffectBehavior::Instant { apply, verify } => {
                apply(ctx, request)?;
                if let Some(verify) = verify {
                    if !verify(ctx, request)? {
                        return Err(EffectError::NotVerified);
                    }
                }
                Ok(())
            }
            EffectBehavior::SetVariable { restore, value } => {
                let value = value.clone();
                restore.apply(ctx, &value)
            }
            EffectBehavior::Timed { on_start, .. } => on_start(ctx, request),
            EffectBehavior::Animated { .. } => Ok(()),
        }
    }

    fn run_tick(
        &mut self,
        ctx: &EngineContext,
        request: &DispatchRequest,
        delta: Duration,
    ) -> Result<TickOutcome, EffectError> {
        match &self.behavior {
            EffectBehavior::Timed {
                on_tick: Some(tick),
                ..
            } => tick(ctx, request, delta),
            EffectBehavior::Animated { frame, .. } => frame(ctx, request, delta),
            _ => Ok(TickOutcome::Continue),
        }
    }

    fn run_stop(&mut self, ctx: &EngineContext, request: &DispatchRequest) -> Result<(), EffectError> {
        match &mut self.behavior {
            EffectBehavior::Instant { .. } => Ok(()),
            EffectBehavior::SetVariable { restore, .. } => restore.restore(ctx),
            EffectBehavior::Timed { on_stop, .. } => on_stop(ctx, request),
            EffectBehavior::Animated { on_stop, .. } => on_stop(ctx, request),
        }
    }
}
