//! Shared configuration and status types for HAVOC.
//!
//! These types cross the boundary between the engine crate and embedding
//! applications (protocol adapters, UIs), so they are plain serde-able data
//! with no engine dependencies.

pub mod settings;
pub mod spec;
pub mod status;

pub use settings::{EngineSettings, RespawnSettings};
pub use spec::{Condition, EffectSpec};
pub use status::EffectStatus;
