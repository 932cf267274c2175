//! Goal counters that let a running effect end early.
//!
//! A tracker subscribes to kill/death events when its effect starts and
//! detaches when the effect stops or the goal completes, whichever comes
//! first. Effects consume `is_completed` from their per-tick update and
//! signal `FinishEarly` through the normal early-finish path.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::events::{EventBus, GameEvent, SubscriptionHandle};

#[derive(Debug, Error)]
pub enum ChallengeError {
    /// The console log watcher is not delivering events, so a goal could
    /// never complete. Reported as a distinguished "not applied" failure.
    #[error("kill feed is not available (console log watcher not running)")]
    LogNotAvailable,
}

/// What the tracker counts toward its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeGoal {
    /// Kills scored by the user.
    Kills(u32),

    /// Critical kills scored by the user.
    CritKills(u32),

    /// User deaths (including suicides and unassisted deaths).
    Deaths(u32),

    /// Consecutive kills without dying; the count resets on the user's own
    /// death.
    KillStreak(u32),
}

impl ChallengeGoal {
    fn target(&self) -> u32 {
        match self {
            Self::Kills(n) | Self::CritKills(n) | Self::Deaths(n) | Self::KillStreak(n) => *n,
        }
    }
}

#[derive(Debug)]
struct CounterState {
    goal: ChallengeGoal,
    user: String,
    count: u32,
    completed: bool,
}

impl CounterState {
    fn observe(&mut self, event: &GameEvent) {
        if self.completed {
            return;
        }
        match (self.goal, event) {
            (ChallengeGoal::Kills(_), GameEvent::PlayerKilled { killer, victim, .. })
                if killer == &self.user && victim != &self.user =>
            {
                self.count += 1;
            }
            (
                ChallengeGoal::CritKills(_),
                GameEvent::PlayerKilled {
                    killer,
                    victim,
                    crit: true,
                    ..
                },
            ) if killer == &self.user && victim != &self.user => {
                self.count += 1;
            }
            (ChallengeGoal::Deaths(_), _) if Self::is_user_death(&self.user, event) => {
                self.count += 1;
            }
            (ChallengeGoal::KillStreak(_), _) if Self::is_user_death(&self.user, event) => {
                debug!(user = %self.user, "kill streak reset on death");
                self.count = 0;
            }
            (ChallengeGoal::KillStreak(_), GameEvent::PlayerKilled { killer, victim, .. })
                if killer == &self.user && victim != &self.user =>
            {
                self.count += 1;
            }
            _ => {}
        }
        if self.count >= self.goal.target() {
            self.completed = true;
        }
    }

    fn is_user_death(user: &str, event: &GameEvent) -> bool {
        match event {
            GameEvent::PlayerKilled { victim, .. } => victim == user,
            GameEvent::PlayerSuicided { player, .. } | GameEvent::PlayerDied { player, .. } => {
                player == user
            }
            _ => false,
        }
    }
}

pub struct ChallengeTracker {
    bus: Arc<EventBus>,
    handle: Option<SubscriptionHandle>,
    state: Arc<Mutex<CounterState>>,
}

impl ChallengeTracker {
    /// Subscribe to the kill feed. Fails if the log watcher is not live at
    /// subscribe time, so the requesting effect is rejected rather than
    /// running with a goal that can never complete.
    pub fn start(
        bus: Arc<EventBus>,
        feed_live: bool,
        goal: ChallengeGoal,
        user: impl Into<String>,
    ) -> Result<Self, ChallengeError> {
        if !feed_live {
            return Err(ChallengeError::LogNotAvailable);
        }

        let state = Arc::new(Mutex::new(CounterState {
            goal,
            user: user.into(),
            count: 0,
            completed: false,
        }));
        let observer = Arc::clone(&state);
        let handle = bus.subscribe(move |event| {
            observer.lock().expect("challenge lock poisoned").observe(event);
        });

        Ok(Self {
            bus,
            handle: Some(handle),
            state,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().expect("challenge lock poisoned").completed
    }

    pub fn count(&self) -> u32 {
        self.state.lock().expect("challenge lock poisoned").count
    }

    /// Detach from the bus. Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.bus.unsubscribe(handle);
        }
    }
}

impl Drop for ChallengeTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
