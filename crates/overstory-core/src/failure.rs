//! Failure recorder (C11).
//!
//! Fire-and-forget learning notes to the knowledge base ("mulch") when an
//! agent is terminated. Failures here are swallowed at a single
//! well-defined boundary (§9 "Exceptions for control flow"), never
//! mid-function, and never propagate into the watchdog tick.

use tracing::warn;

/// Contract boundary for knowledge-base recording, so the watchdog can be
/// tested against an in-memory fake (§9 "Dependency injection").
pub trait FailureRecorder: Send + Sync {
    fn record(&self, agent_name: &str, reason: &str);
}

/// Shells out to `mulch record` best-effort.
#[derive(Debug, Default, Clone, Copy)]
pub struct KnowledgeBaseFailureRecorder;

impl FailureRecorder for KnowledgeBaseFailureRecorder {
    fn record(&self, agent_name: &str, reason: &str) {
        let output = std::process::Command::new("mulch")
            .args([
                "record",
                "agent-failure",
                "--type",
                "termination",
                "--description",
                reason,
            ])
            .env("OVERSTORY_AGENT_NAME", agent_name)
            .output();

        if let Err(err) = output {
            warn!(
                event = "core.failure.record_failed",
                agent_name = agent_name,
                error = %err,
                "knowledge-base recording failed; swallowing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::FakeFailureRecorder;

    use super::*;

    #[test]
    fn test_fake_recorder_captures_calls() {
        let recorder = FakeFailureRecorder::default();
        recorder.record("scout-1", "ZFC: Process terminated");
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "scout-1");
    }
}
