//! Ordered console-line matchers.
//!
//! First match wins, so order is significant: the engine-injected marker
//! lines must be checked before the kill/death patterns, which are loose
//! enough to match arbitrary chat. Unmatched lines are dropped by the
//! caller.
//!
//! The markers are emitted by config the engine itself installs: every
//! per-class config echoes `class_spawn`, so a committed class change is
//! observable even though the game never logs one.

use chrono::{Local, NaiveDateTime};
use regex::Regex;

use crate::events::{GameEvent, PlayerClass};

/// Prefix of every engine-injected marker line.
pub const MARKER_PREFIX: &str = "[havoc]";

/// The line a per-class config must echo on spawn.
pub fn class_spawn_marker(class: PlayerClass) -> String {
    format!("{MARKER_PREFIX} class_spawn {}", class.token())
}

/// The line the class menu hook echoes on selection.
pub fn class_pick_marker(class: PlayerClass) -> String {
    format!("{MARKER_PREFIX} class_pick {}", class.token())
}

pub struct LineMatchers {
    class_spawn: Regex,
    class_pick: Regex,
    map_changed: Regex,
    suicided: Regex,
    died: Regex,
    killed: Regex,
}

impl LineMatchers {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            class_spawn: Regex::new(r"^\[havoc\] class_spawn (\w+)$")?,
            class_pick: Regex::new(r"^\[havoc\] class_pick (\w+)$")?,
            map_changed: Regex::new(r"^Map: (\S+)$")?,
            suicided: Regex::new(r"^(.+) suicided\.$")?,
            died: Regex::new(r"^(.+) died\.$")?,
            killed: Regex::new(r"^(.+) killed (.+) with (\S+)\.( \(crit\))?$")?,
        })
    }

    /// Classify one log line against the ordered matcher list.
    pub fn classify(&self, line: &str) -> Option<GameEvent> {
        self.classify_at(line, Local::now().naive_local())
    }

    pub fn classify_at(&self, line: &str, timestamp: NaiveDateTime) -> Option<GameEvent> {
        if let Some(caps) = self.class_spawn.captures(line) {
            let class = PlayerClass::from_token(&caps[1])?;
            return Some(GameEvent::ClassChanged { class, timestamp });
        }
        if let Some(caps) = self.class_pick.captures(line) {
            let class = PlayerClass::from_token(&caps[1])?;
            return Some(GameEvent::ClassSelected { class, timestamp });
        }
        if let Some(caps) = self.map_changed.captures(line) {
            return Some(GameEvent::MapChanged {
                map: caps[1].to_string(),
                timestamp,
            });
        }
        if let Some(caps) = self.suicided.captures(line) {
            return Some(GameEvent::PlayerSuicided {
                player: caps[1].to_string(),
                timestamp,
            });
        }
        if let Some(caps) = self.died.captures(line) {
            return Some(GameEvent::PlayerDied {
                player: caps[1].to_string(),
                timestamp,
            });
        }
        if let Some(caps) = self.killed.captures(line) {
            return Some(GameEvent::PlayerKilled {
                killer: caps[1].to_string(),
                victim: caps[2].to_string(),
                weapon: caps[3].to_string(),
                crit: caps.get(4).is_some(),
                timestamp,
            });
        }
        None
    }
}
