//! Status DTOs reported to embedders.

use serde::{Deserialize, Serialize};

/// Snapshot of one effect's externally visible state.
///
/// Recomputed on every refresh tick, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectStatus {
    pub id: String,
    pub listed: bool,
    pub selectable: bool,
    pub running: bool,
    /// Remaining active seconds for a running timed effect, zero otherwise.
    pub remaining_secs: f32,
}
