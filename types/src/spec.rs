//! Effect specification types.
//!
//! An `EffectSpec` is the declarative half of an effect: identity, mutex
//! groups, default duration, and the predicates that gate listing, selection
//! and pausing. The behavioral half (what the effect actually does to the
//! game) lives in the engine crate and is attached at registration time.

use serde::{Deserialize, Serialize};

/// A predicate over the inferred game state.
///
/// Used three ways per effect: whether it is listed at all, whether it can be
/// started right now, and (for timed effects) whether its clock runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "when")]
pub enum Condition {
    /// Always true.
    #[default]
    Always,

    /// The game process is reachable over the command channel.
    GameOpen,

    /// A map is loaded (the camera reports a real position).
    MapLoaded,

    /// The controlled character is alive in a loaded map.
    Alive,

    /// The controlled character is alive and playing the named class.
    ClassIs { class: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSpec {
    /// Globally unique identifier, as used by the requesting service.
    pub id: String,

    /// Display name for logs and listings.
    pub name: String,

    /// Resource-contention buckets. At most one running effect per group.
    #[serde(default)]
    pub mutex: Vec<String>,

    /// Default duration in seconds when the request carries no override.
    /// Zero means instantaneous.
    #[serde(default)]
    pub duration_secs: f32,

    /// Animated effects update on the fast dispatcher cadence.
    #[serde(default)]
    pub is_update_animation: bool,

    /// Gate for being presented as an option at all.
    #[serde(default)]
    pub listed_when: Condition,

    /// Gate for admission. Checked after duplicate and mutex rules.
    #[serde(default)]
    pub selectable_when: Condition,

    /// While false, a running timed effect is paused and credits no time.
    #[serde(default)]
    pub active_when: Condition,
}

impl EffectSpec {
    /// Minimal spec with every gate open. Callers chain field updates.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mutex: Vec::new(),
            duration_secs: 0.0,
            is_update_animation: false,
            listed_when: Condition::Always,
            selectable_when: Condition::Always,
            active_when: Condition::Always,
        }
    }

    pub fn is_instant(&self) -> bool {
        self.duration_secs <= 0.0
    }
}
