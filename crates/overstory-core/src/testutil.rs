//! In-process fakes for the watchdog's injected collaborators, shared
//! across `watchdog`, `notifier`, and `coordinator` test modules (§9
//! "Dependency injection": multiplexer, triage, nudge, event store, and
//! failure recorder are contract boundaries parameterized so each
//! component is testable without touching a real multiplexer or child
//! process).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::TmuxError;
use crate::failure::FailureRecorder;
use crate::tmux::Multiplexer;
use crate::watchdog::{TriageDecision, TriageFn};

#[derive(Default)]
pub struct FakeMultiplexer {
    pub alive: Mutex<HashMap<String, bool>>,
    pub sent_keys: Mutex<Vec<(String, String)>>,
    pub killed: Mutex<Vec<String>>,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_alive(&self, name: &str, alive: bool) {
        self.alive.lock().unwrap().insert(name.to_string(), alive);
    }
}

impl Multiplexer for FakeMultiplexer {
    fn is_session_alive(&self, name: &str) -> Result<bool, TmuxError> {
        Ok(*self.alive.lock().unwrap().get(name).unwrap_or(&false))
    }

    fn send_keys(&self, name: &str, text: &str) -> Result<(), TmuxError> {
        self.sent_keys
            .lock()
            .unwrap()
            .push((name.to_string(), text.to_string()));
        Ok(())
    }

    fn kill_session(&self, name: &str, _grace: Duration) -> Result<(), TmuxError> {
        self.killed.lock().unwrap().push(name.to_string());
        self.alive.lock().unwrap().insert(name.to_string(), false);
        Ok(())
    }

    fn capture_pane_content(&self, _name: &str, _lines: u32) -> Result<Option<String>, TmuxError> {
        Ok(None)
    }
}

#[derive(Default)]
pub struct FakeFailureRecorder {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FailureRecorder for FakeFailureRecorder {
    fn record(&self, agent_name: &str, reason: &str) {
        self.calls
            .lock()
            .unwrap()
            .push((agent_name.to_string(), reason.to_string()));
    }
}

/// Builds a fixed-answer triage stub for tests.
pub fn fixed_triage(decision: TriageDecision) -> TriageFn {
    Box::new(move |_agent, _root, _last_activity| decision)
}
