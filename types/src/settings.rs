//! Engine settings.
//!
//! Every field is defaulted so a missing or partially-written config file
//! still loads. Paths default to empty and must be filled in by the
//! embedding application before the engine is started.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Append-only console log the game writes to.
    #[serde(default)]
    pub log_path: PathBuf,

    /// The game's mutable config file that session effects may touch.
    /// Backed up at session start and restored at shutdown.
    #[serde(default)]
    pub game_config_path: PathBuf,

    /// Ordinary tick cadence: effect updates, listing refresh, status polls.
    #[serde(default = "default_safe_tick_ms")]
    pub safe_tick_ms: u64,

    /// Fast cadence: animated effects and motion-derived polls only.
    #[serde(default = "default_fast_tick_ms")]
    pub fast_tick_ms: u64,

    /// Widened interval used after a poll/tick error, narrowed back on success.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// How many times to try opening the console log before giving up for good.
    #[serde(default = "default_log_open_attempts")]
    pub log_open_attempts: u32,

    /// Fixed delay between log-open attempts.
    #[serde(default = "default_log_open_backoff_secs")]
    pub log_open_backoff_secs: u64,

    #[serde(default)]
    pub respawn: RespawnSettings,
}

/// Constants for the approximate "assume respawned by now" heuristic.
///
/// The window is death-cam time plus 1.5 average respawn-wave periods. The
/// numbers are known to be approximate near class-change boundaries and are
/// deliberately configuration, not code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RespawnSettings {
    #[serde(default = "default_death_cam_secs")]
    pub death_cam_secs: f32,

    #[serde(default = "default_respawn_wave_secs")]
    pub respawn_wave_secs: f32,

    #[serde(default = "default_wave_multiplier")]
    pub wave_multiplier: f32,
}

impl RespawnSettings {
    /// Seconds after a death at which the user is assumed to be back in play.
    pub fn window_secs(&self) -> f32 {
        self.death_cam_secs + self.respawn_wave_secs * self.wave_multiplier
    }
}

impl Default for RespawnSettings {
    fn default() -> Self {
        Self {
            death_cam_secs: default_death_cam_secs(),
            respawn_wave_secs: default_respawn_wave_secs(),
            wave_multiplier: default_wave_multiplier(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_path: PathBuf::new(),
            game_config_path: PathBuf::new(),
            safe_tick_ms: default_safe_tick_ms(),
            fast_tick_ms: default_fast_tick_ms(),
            error_backoff_secs: default_error_backoff_secs(),
            log_open_attempts: default_log_open_attempts(),
            log_open_backoff_secs: default_log_open_backoff_secs(),
            respawn: RespawnSettings::default(),
        }
    }
}

fn default_safe_tick_ms() -> u64 {
    1000
}

fn default_fast_tick_ms() -> u64 {
    100
}

fn default_error_backoff_secs() -> u64 {
    15
}

fn default_log_open_attempts() -> u32 {
    5
}

fn default_log_open_backoff_secs() -> u64 {
    2
}

fn default_death_cam_secs() -> f32 {
    8.0
}

fn default_respawn_wave_secs() -> f32 {
    10.0
}

fn default_wave_multiplier() -> f32 {
    1.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_loads_with_defaults() {
        let settings: EngineSettings = toml::from_str("").unwrap();
        assert_eq!(settings.safe_tick_ms, 1000);
        assert_eq!(settings.fast_tick_ms, 100);
        assert_eq!(settings.error_backoff_secs, 15);
        assert_eq!(settings.respawn.window_secs(), 23.0);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings: EngineSettings = toml::from_str(
            r#"
            safe_tick_ms = 500

            [respawn]
            death_cam_secs = 6.0
            "#,
        )
        .unwrap();
        assert_eq!(settings.safe_tick_ms, 500);
        assert_eq!(settings.fast_tick_ms, 100);
        assert_eq!(settings.respawn.death_cam_secs, 6.0);
        assert_eq!(settings.respawn.respawn_wave_secs, 10.0);
    }
}
