//! The closed set of effect behaviors.
//!
//! Composition over inheritance: a "set a variable for a while" effect is
//! the `SetVariable` variant carrying a `VariableRestore` helper, not a
//! subclass. Per-tick functions signal completion through `TickOutcome`
//! rather than by raising.

use std::time::Duration;

use super::EffectError;
use super::restore::VariableRestore;
use crate::context::EngineContext;
use crate::dispatch::DispatchRequest;

/// What a per-tick update decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// End the effect now, before its nominal duration (e.g. a challenge
    /// goal was met). Not an error.
    FinishEarly,
}

pub type ActionFn =
    Box<dyn Fn(&EngineContext, &DispatchRequest) -> Result<(), EffectError> + Send + Sync>;

pub type TickFn = Box<
    dyn Fn(&EngineContext, &DispatchRequest, Duration) -> Result<TickOutcome, EffectError>
        + Send
        + Sync,
>;

/// Post-apply check that the command actually changed observable state.
/// `Ok(false)` means the command ran cleanly but nothing happened.
pub type VerifyFn =
    Box<dyn Fn(&EngineContext, &DispatchRequest) -> Result<bool, EffectError> + Send + Sync>;

pub enum EffectBehavior {
    /// Fire-and-forget command. Zero duration, never ticked. The game
    /// swallows commands it cannot honor without an error, so an optional
    /// verification runs right after the apply.
    Instant {
        apply: ActionFn,
        verify: Option<VerifyFn>,
    },

    /// Set a console variable for the duration, restoring the original on
    /// stop.
    SetVariable {
        restore: VariableRestore,
        value: String,
    },

    /// Arbitrary start/stop actions with an optional per-tick update.
    Timed {
        on_start: ActionFn,
        on_tick: Option<TickFn>,
        on_stop: ActionFn,
    },

    /// Visually continuous effect updated on the fast cadence.
    Animated { frame: TickFn, on_stop: ActionFn },
}

impl EffectBehavior {
    /// Convenience constructor for the common "run one command" shape.
    pub fn instant(
        apply: impl Fn(&EngineContext, &DispatchRequest) -> Result<(), EffectError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::Instant {
            apply: Box::new(apply),
            verify: None,
        }
    }

    /// Instant behavior with a post-apply verification.
    pub fn instant_verified(
        apply: impl Fn(&EngineContext, &DispatchRequest) -> Result<(), EffectError>
        + Send
        + Sync
        + 'static,
        verify: impl Fn(&EngineContext, &DispatchRequest) -> Result<bool, EffectError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::Instant {
            apply: Box::new(apply),
            verify: Some(Box::new(verify)),
        }
    }

    pub fn set_variable(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SetVariable {
            restore: VariableRestore::new(variable),
            value: value.into(),
        }
    }
}
