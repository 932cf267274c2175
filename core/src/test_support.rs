//! Shared fixtures for engine tests: a scriptable console and a recording
//! responder.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::console::{ConsoleError, GameConsole};
use crate::dispatch::{EffectReport, Responder};

#[derive(Default)]
pub struct MockConsole {
    disconnected: AtomicBool,
    inner: Mutex<MockInner>,
}

#[derive(Default)]
struct MockInner {
    responses: HashMap<String, String>,
    fail_message: Option<String>,
    history: Vec<String>,
}

impl MockConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub the response for an exact command string.
    pub fn stub_response(&self, command: &str, response: &str) {
        self.lock()
            .responses
            .insert(command.to_string(), response.to_string());
    }

    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Make every subsequent command fail with a transport error.
    pub fn fail_with(&self, message: &str) {
        self.lock().fail_message = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        self.lock().fail_message = None;
    }

    pub fn ran_command(&self, command: &str) -> bool {
        self.lock().history.iter().any(|c| c == command)
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().expect("mock console lock")
    }
}

impl GameConsole for MockConsole {
    fn run_command(&self, command: &str) -> Result<String, ConsoleError> {
        let mut inner = self.lock();
        if let Some(message) = &inner.fail_message {
            return Err(ConsoleError::Transport {
                message: message.clone(),
            });
        }
        inner.history.push(command.to_string());
        Ok(inner.responses.get(command).cloned().unwrap_or_default())
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }
}

/// Captures every outbound notification for assertions.
#[derive(Default)]
pub struct RecordingResponder {
    reports: Mutex<Vec<(String, EffectReport)>>,
    listings: Mutex<Vec<(String, &'static str, bool)>>,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, EffectReport)> {
        self.reports.lock().expect("responder lock").clone()
    }

    pub fn reports_for(&self, effect_id: &str) -> Vec<EffectReport> {
        self.reports()
            .into_iter()
            .filter(|(id, _)| id == effect_id)
            .map(|(_, report)| report)
            .collect()
    }

    pub fn listing_changes(&self) -> Vec<(String, &'static str, bool)> {
        self.listings.lock().expect("responder lock").clone()
    }

    pub fn clear(&self) {
        self.reports.lock().expect("responder lock").clear();
        self.listings.lock().expect("responder lock").clear();
    }
}

impl Responder for RecordingResponder {
    fn report(&self, effect_id: &str, report: EffectReport) {
        self.reports
            .lock()
            .expect("responder lock")
            .push((effect_id.to_string(), report));
    }

    fn set_listed(&self, effect_id: &str, listed: bool) {
        self.listings
            .lock()
            .expect("responder lock")
            .push((effect_id.to_string(), "listed", listed));
    }

    fn set_selectable(&self, effect_id: &str, selectable: bool) {
        self.listings
            .lock()
            .expect("responder lock")
            .push((effect_id.to_string(), "selectable", selectable));
    }
}
