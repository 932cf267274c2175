//! Effect lifecycle: the per-effect state machine and its behaviors.
//!
//! An effect splits into a declarative half (`EffectSpec`, shared types
//! crate) and a behavioral half (`EffectBehavior`, a closed set of tagged
//! variants attached at registration). The `Effect` runtime drives
//! Idle → Active → Paused/Active → Idle with credited-time bookkeeping.

mod behavior;
mod effect;
mod restore;

#[cfg(test)]
mod effect_tests;

use thiserror::Error;

use crate::challenges::ChallengeError;
use crate::console::ConsoleError;

pub use behavior::{ActionFn, EffectBehavior, TickFn, TickOutcome, VerifyFn};
pub use effect::{Effect, EffectSignal, PAUSE_EPSILON};
pub use restore::VariableRestore;

#[derive(Debug, Error)]
pub enum EffectError {
    #[error("effect is already running")]
    AlreadyRunning,

    /// The command ran without a transport error but verification observed
    /// no state change.
    #[error("command ran but produced no observable change")]
    NotVerified,

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Challenge(#[from] ChallengeError),

    #[error("{0}")]
    Failed(String),
}
