//! Shared engine context.
//!
//! The console, event bus, state cache and settings are bundled here and
//! passed into the dispatcher and effects at construction. Nothing in the
//! engine reaches for globals.

use std::sync::Arc;

use havoc_types::EngineSettings;

use crate::console::GameConsole;
use crate::events::EventBus;
use crate::state::StateCache;

#[derive(Clone)]
pub struct EngineContext {
    pub console: Arc<dyn GameConsole>,
    pub events: Arc<EventBus>,
    pub state: Arc<StateCache>,
    pub settings: EngineSettings,
}

impl EngineContext {
    pub fn new(
        console: Arc<dyn GameConsole>,
        events: Arc<EventBus>,
        state: Arc<StateCache>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            console,
            events,
            state,
            settings,
        }
    }
}
