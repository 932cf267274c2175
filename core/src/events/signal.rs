//! Domain events inferred from the game's console log.
//!
//! These represent "interesting things that happened" at a higher level
//! than raw log lines. Raised by the log watcher, consumed by the state
//! cache and challenge trackers through the event bus.

use chrono::NaiveDateTime;

/// The nine playable classes, as they appear in console tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerClass {
    Scout,
    Soldier,
    Pyro,
    Demoman,
    Heavy,
    Engineer,
    Medic,
    Sniper,
    Spy,
}

impl PlayerClass {
    /// Parse a console token. Accepts the `heavyweapons` alias the game
    /// uses in class config filenames.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "scout" => Some(Self::Scout),
            "soldier" => Some(Self::Soldier),
            "pyro" => Some(Self::Pyro),
            "demoman" => Some(Self::Demoman),
            "heavy" | "heavyweapons" => Some(Self::Heavy),
            "engineer" => Some(Self::Engineer),
            "medic" => Some(Self::Medic),
            "sniper" => Some(Self::Sniper),
            "spy" => Some(Self::Spy),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Scout => "scout",
            Self::Soldier => "soldier",
            Self::Pyro => "pyro",
            Self::Demoman => "demoman",
            Self::Heavy => "heavy",
            Self::Engineer => "engineer",
            Self::Medic => "medic",
            Self::Sniper => "sniper",
            Self::Spy => "spy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// Someone got a kill. `crit` marks a critical final blow.
    PlayerKilled {
        victim: String,
        killer: String,
        weapon: String,
        crit: bool,
        timestamp: NaiveDateTime,
    },

    /// A player killed themselves.
    PlayerSuicided {
        player: String,
        timestamp: NaiveDateTime,
    },

    /// A player died with no credited killer (fall damage, environment).
    PlayerDied {
        player: String,
        timestamp: NaiveDateTime,
    },

    /// The user spawned as a class (committed change).
    ClassChanged {
        class: PlayerClass,
        timestamp: NaiveDateTime,
    },

    /// The user picked a class in the menu but has not spawned yet.
    ClassSelected {
        class: PlayerClass,
        timestamp: NaiveDateTime,
    },

    /// A new map finished loading.
    MapChanged {
        map: String,
        timestamp: NaiveDateTime,
    },
}
