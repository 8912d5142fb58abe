//! Run-complete notifier (C12).
//!
//! Detects when every non-persistent worker in a run has reached
//! `completed`, nudges the coordinator once per run, and records an event.

use std::path::Path;

use serde_json::json;
use tracing::debug;

use crate::events::{Event, EventLevel, EventStore};
use crate::sessions::store::SessionStore;
use crate::sessions::types::{Capability, SessionState};
use crate::tmux::Multiplexer;

/// Builds the phase-aware nudge message and returns it alongside the phase
/// label recorded on the completion event.
fn build_message(run_id: &str, worker_count: usize, capabilities: &[Capability]) -> (String, String) {
    let unique: std::collections::BTreeSet<&'static str> =
        capabilities.iter().map(|c| c.as_str()).collect();

    if let [only] = unique.iter().copied().collect::<Vec<_>>()[..] {
        let phase = match only {
            "scout" => "Ready for next phase",
            "builder" | "lead" => "Ready for merge/cleanup",
            "reviewer" => "Reviews done",
            "merger" => "Merges done",
            _ => "Ready for next steps",
        };
        (
            format!("[WATCHDOG] All {worker_count} {only}(s) in run {run_id} have completed. {phase}."),
            phase.to_string(),
        )
    } else {
        let joined = unique.into_iter().collect::<Vec<_>>().join(", ");
        (
            format!(
                "[WATCHDOG] All {worker_count} worker(s) in run {run_id} have completed ({joined}). Ready for next steps."
            ),
            "Ready for next steps".to_string(),
        )
    }
}

/// Runs the run-completion check for `run_id`, if any. No-op when the run
/// is unknown, empty after filtering persistent capabilities, not fully
/// completed, or already notified (per the dedup marker).
pub fn check_run_complete(
    store: &SessionStore,
    event_store: &EventStore,
    multiplexer: &dyn Multiplexer,
    run_id: &str,
    marker_path: &Path,
) {
    let rows: Vec<_> = store
        .get_by_run(run_id)
        .into_iter()
        .filter(|s| !s.capability.is_persistent())
        .collect();

    if rows.is_empty() || rows.iter().any(|s| s.state != SessionState::Completed) {
        return;
    }

    if let Ok(existing) = std::fs::read_to_string(marker_path)
        && existing.trim() == run_id
    {
        return;
    }

    let capabilities: Vec<Capability> = rows.iter().map(|s| s.capability).collect();
    let (message, phase) = build_message(run_id, rows.len(), &capabilities);

    if let Some(coordinator) = store
        .get_all()
        .into_iter()
        .find(|s| s.capability == Capability::Coordinator)
    {
        if let Err(err) = multiplexer.send_keys(&coordinator.tmux_session, &message) {
            debug!(
                event = "core.notifier.nudge_failed",
                run_id = run_id,
                error = %err,
                "coordinator nudge failed; swallowing"
            );
        }
    }

    let completed_agents: Vec<&str> = rows.iter().map(|s| s.agent_name.as_str()).collect();
    let sorted_capabilities: std::collections::BTreeSet<&'static str> =
        capabilities.iter().map(|c| c.as_str()).collect();
    let _ = event_store.append(
        &Event::new("coordinator", "run_complete", EventLevel::Info)
            .with_run_id(run_id)
            .with_data(json!({
                "workerCount": rows.len(),
                "completedAgents": completed_agents,
                "capabilities": sorted_capabilities.into_iter().collect::<Vec<_>>(),
                "phase": phase,
            })),
    );

    if let Some(parent) = marker_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(marker_path, run_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::types::AgentSession;
    use crate::testutil::FakeMultiplexer;

    fn completed_session(agent_name: &str, run_id: &str, capability: Capability) -> AgentSession {
        let mut session = AgentSession::new(
            agent_name,
            capability,
            None,
            0,
            format!("/proj/.overstory/worktrees/{agent_name}"),
            format!("overstory/{agent_name}/task"),
            "task",
            format!("overstory-{agent_name}"),
            Some(run_id.to_string()),
        );
        session.state = SessionState::Completed;
        session
    }

    #[test]
    fn test_all_completed_scouts_nudges_coordinator_and_records_event() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut coordinator = AgentSession::new(
            "coordinator",
            Capability::Coordinator,
            None,
            0,
            "/proj",
            "overstory/coordinator/main",
            "",
            "overstory-coordinator",
            None,
        );
        coordinator.state = SessionState::Working;
        store.upsert(coordinator).unwrap();
        for name in ["scout-1", "scout-2", "scout-3"] {
            store
                .upsert(completed_session(name, "r1", Capability::Scout))
                .unwrap();
        }

        let event_store = EventStore::open(dir.path().join("events.db"));
        let multiplexer = FakeMultiplexer::new();
        let marker = dir.path().join("run-complete-notified.txt");

        check_run_complete(&store, &event_store, &multiplexer, "r1", &marker);

        let sent = multiplexer.sent_keys.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].1,
            "[WATCHDOG] All 3 scout(s) in run r1 have completed. Ready for next phase."
        );
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "r1");

        let events = event_store.query_by_run("r1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "run_complete");
    }

    #[test]
    fn test_second_tick_with_no_changes_sends_no_additional_nudge() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut coordinator = AgentSession::new(
            "coordinator",
            Capability::Coordinator,
            None,
            0,
            "/proj",
            "overstory/coordinator/main",
            "",
            "overstory-coordinator",
            None,
        );
        coordinator.state = SessionState::Working;
        store.upsert(coordinator).unwrap();
        store
            .upsert(completed_session("scout-1", "r1", Capability::Scout))
            .unwrap();

        let event_store = EventStore::open(dir.path().join("events.db"));
        let multiplexer = FakeMultiplexer::new();
        let marker = dir.path().join("run-complete-notified.txt");

        check_run_complete(&store, &event_store, &multiplexer, "r1", &marker);
        check_run_complete(&store, &event_store, &multiplexer, "r1", &marker);

        assert_eq!(multiplexer.sent_keys.lock().unwrap().len(), 1);
        assert_eq!(event_store.query_by_run("r1").unwrap().len(), 1);
    }

    #[test]
    fn test_mixed_capabilities_produce_comma_joined_sentence() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut coordinator = AgentSession::new(
            "coordinator",
            Capability::Coordinator,
            None,
            0,
            "/proj",
            "overstory/coordinator/main",
            "",
            "overstory-coordinator",
            None,
        );
        coordinator.state = SessionState::Working;
        store.upsert(coordinator).unwrap();
        store
            .upsert(completed_session("builder-1", "r1", Capability::Builder))
            .unwrap();
        store
            .upsert(completed_session("reviewer-1", "r1", Capability::Reviewer))
            .unwrap();

        let event_store = EventStore::open(dir.path().join("events.db"));
        let multiplexer = FakeMultiplexer::new();
        let marker = dir.path().join("run-complete-notified.txt");

        check_run_complete(&store, &event_store, &multiplexer, "r1", &marker);

        let sent = multiplexer.sent_keys.lock().unwrap();
        assert!(sent[0].1.contains("builder, reviewer"));
        assert!(sent[0].1.contains("Ready for next steps"));
    }

    #[test]
    fn test_incomplete_worker_blocks_notification() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        store
            .upsert(completed_session("scout-1", "r1", Capability::Scout))
            .unwrap();
        let mut still_working = AgentSession::new(
            "scout-2",
            Capability::Scout,
            None,
            0,
            "/proj/.overstory/worktrees/scout-2",
            "overstory/scout-2/task",
            "task",
            "overstory-scout-2",
            Some("r1".to_string()),
        );
        still_working.state = SessionState::Working;
        store.upsert(still_working).unwrap();

        let event_store = EventStore::open(dir.path().join("events.db"));
        let multiplexer = FakeMultiplexer::new();
        let marker = dir.path().join("run-complete-notified.txt");

        check_run_complete(&store, &event_store, &multiplexer, "r1", &marker);

        assert!(multiplexer.sent_keys.lock().unwrap().is_empty());
        assert!(!marker.exists());
    }

    #[test]
    fn test_persistent_capabilities_are_excluded_from_the_completion_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        store
            .upsert(completed_session("monitor-1", "r1", Capability::Monitor))
            .unwrap();

        let event_store = EventStore::open(dir.path().join("events.db"));
        let multiplexer = FakeMultiplexer::new();
        let marker = dir.path().join("run-complete-notified.txt");

        check_run_complete(&store, &event_store, &multiplexer, "r1", &marker);
        assert!(multiplexer.sent_keys.lock().unwrap().is_empty());
        assert!(!marker.exists());
    }
}
