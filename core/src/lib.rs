pub mod challenges;
pub mod console;
pub mod context;
pub mod dispatch;
pub mod effects;
pub mod engine;
pub mod events;
pub mod log_watch;
pub mod settings;
pub mod state;

#[cfg(test)]
pub mod test_support;

// Re-exports for convenience
pub use console::{ConsoleError, GameConsole};
pub use context::EngineContext;
pub use dispatch::{DispatchRequest, EffectDispatcher, EffectReport, Responder};
pub use effects::{Effect, EffectBehavior, TickOutcome};
pub use engine::{Engine, EngineError};
pub use events::{EventBus, GameEvent, PlayerClass};
pub use state::StateCache;
