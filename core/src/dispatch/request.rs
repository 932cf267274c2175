//! Inbound request shape.

use std::time::Duration;

/// One inbound trigger. Created once per request by the protocol adapter
/// and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Which effect to run.
    pub effect_id: String,

    /// Duration override; the effect's spec default applies when absent.
    pub requested_duration: Option<Duration>,

    /// Opaque payload for effects that take a sub-selection.
    pub parameter: Option<String>,
}

impl DispatchRequest {
    pub fn new(effect_id: impl Into<String>) -> Self {
        Self {
            effect_id: effect_id.into(),
            requested_duration: None,
            parameter: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.requested_duration = Some(duration);
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter = Some(parameter.into());
        self
    }

    /// The empty effect id is the "stop everything" sentinel on the
    /// stop-early path.
    pub fn is_stop_all(&self) -> bool {
        self.effect_id.is_empty()
    }
}
