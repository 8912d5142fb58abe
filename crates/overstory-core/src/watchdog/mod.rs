//! Watchdog daemon (C8).
//!
//! Runs each tick: enumerate sessions → health-evaluate → apply state
//! transitions → execute escalation actions → write back → detect run
//! completion. The long-running loop is a plain OS thread with
//! `std::thread::sleep` between ticks — no async runtime, since a
//! sequential tick has no concurrent I/O to overlap: this daemon owns no
//! PTYs and serves no concurrent IPC clients.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, warn};

use crate::config::WatchdogThresholds;
use crate::errors::WatchdogError;
use crate::events::{Event, EventLevel, EventStore};
use crate::failure::FailureRecorder;
use crate::health;
use crate::notifier;
use crate::sessions::store::SessionStore;
use crate::sessions::types::{Action, SessionState};
use crate::tmux::Multiplexer;

/// Outcome of the level-2 triage step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageDecision {
    Retry,
    Terminate,
    Extend,
}

/// External triage function: `{agent, root, last_activity} -> decision`.
pub type TriageFn = Box<dyn Fn(&str, &Path, DateTime<Utc>) -> TriageDecision + Send + Sync>;

/// Injected collaborators for one tick (§9 "Dependency injection").
pub struct WatchdogDeps<'a> {
    pub multiplexer: &'a dyn Multiplexer,
    pub failure_recorder: &'a dyn FailureRecorder,
    pub event_store: &'a EventStore,
    pub triage_enabled: bool,
    pub triage: Option<&'a TriageFn>,
    pub repo_root: &'a Path,
}

/// Summary of one tick, for tests and CLI reporting.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub sessions_processed: usize,
    pub terminated: Vec<String>,
    pub escalated: Vec<String>,
}

fn record_event(event_store: &EventStore, event: Event) {
    if let Err(err) = event_store.append(&event) {
        warn!(event = "core.watchdog.event_log_failed", error = %err);
    }
}

/// Executes one watchdog tick against every non-completed session in
/// `store`. `run_id` is the content of the current-run marker file, if any.
pub fn run_tick(
    store: &mut SessionStore,
    deps: &WatchdogDeps,
    thresholds: &WatchdogThresholds,
    now: DateTime<Utc>,
    run_id: Option<&str>,
    run_marker_path: &Path,
) -> TickReport {
    let mut report = TickReport::default();

    let agent_names: Vec<String> = store
        .get_all()
        .into_iter()
        .filter(|s| s.state != SessionState::Completed)
        .map(|s| s.agent_name.clone())
        .collect();

    for agent_name in agent_names {
        report.sessions_processed += 1;
        if let Err(err) = process_one_session(store, deps, thresholds, now, &agent_name, &mut report)
        {
            error!(
                event = "core.watchdog.session_processing_error",
                agent_name = %agent_name,
                error = %err,
                "swallowing per-session error to keep the tick alive"
            );
        }
    }

    if let Some(run_id) = run_id {
        notifier::check_run_complete(
            store,
            deps.event_store,
            deps.multiplexer,
            run_id,
            run_marker_path,
        );
    }

    report
}

fn process_one_session(
    store: &mut SessionStore,
    deps: &WatchdogDeps,
    thresholds: &WatchdogThresholds,
    now: DateTime<Utc>,
    agent_name: &str,
    report: &mut TickReport,
) -> Result<(), WatchdogError> {
    let session = store
        .get_by_agent(agent_name)
        .ok_or_else(|| WatchdogError::AgentError {
            agent_name: agent_name.to_string(),
            message: "session vanished mid-tick".to_string(),
        })?
        .clone();

    let tmux_alive = deps
        .multiplexer
        .is_session_alive(&session.tmux_session)
        .unwrap_or(false);
    let pid_alive = session.pid.map(crate::tmux::is_process_alive);

    let check = health::evaluate(&session, tmux_alive, pid_alive, now, thresholds);
    let next_state = health::transition_state(session.state, &check);
    if next_state != session.state {
        store.update_state(agent_name, next_state)?;
    }

    match check.action {
        Action::Terminate => {
            let reason = check
                .reconciliation_note
                .clone()
                .unwrap_or_else(|| "ZFC: Process terminated".to_string());
            deps.failure_recorder.record(agent_name, &reason);
            if tmux_alive {
                let _ = deps.multiplexer.kill_session(&session.tmux_session, Duration::from_secs(5));
            }
            store.update_state(agent_name, SessionState::Zombie)?;
            store.update_escalation(agent_name, 0, None)?;
            report.terminated.push(agent_name.to_string());
        }
        Action::Investigate => {}
        Action::Escalate => {
            escalate(store, deps, thresholds, now, agent_name, &session)?;
            report.escalated.push(agent_name.to_string());
        }
        Action::None => {
            if session.stalled_since.is_some() {
                store.update_escalation(agent_name, 0, None)?;
            }
        }
    }

    Ok(())
}

fn escalate(
    store: &mut SessionStore,
    deps: &WatchdogDeps,
    thresholds: &WatchdogThresholds,
    now: DateTime<Utc>,
    agent_name: &str,
    session: &crate::sessions::types::AgentSession,
) -> Result<(), WatchdogError> {
    let stalled_since = session.stalled_since.unwrap_or(now);
    if session.stalled_since.is_none() {
        store.update_escalation(agent_name, 0, Some(stalled_since))?;
    }

    let elapsed_ms = now
        .signed_duration_since(stalled_since)
        .num_milliseconds()
        .max(0) as u64;
    let expected_level =
        (elapsed_ms / thresholds.nudge_interval_ms.max(1)).min(3) as u8;
    let current_level = store
        .get_by_agent(agent_name)
        .map(|s| s.escalation_level)
        .unwrap_or(0);
    if expected_level != current_level {
        store.update_escalation(agent_name, expected_level, Some(stalled_since))?;
    }

    match expected_level {
        0 => {
            record_event(
                deps.event_store,
                Event::new(agent_name, "escalation_warn", EventLevel::Warn)
                    .with_data(json!({"level": 0})),
            );
        }
        1 => {
            let message = format!(
                "[WATCHDOG] Agent \"{agent_name}\" appears stalled. Please check your current task…"
            );
            let delivery_ok = deps
                .multiplexer
                .send_keys(&session.tmux_session, &message)
                .is_ok();
            record_event(
                deps.event_store,
                Event::new(agent_name, "escalation_nudge", EventLevel::Warn)
                    .with_data(json!({"level": 1, "delivered": delivery_ok})),
            );
        }
        2 => {
            if !deps.triage_enabled {
                // no-op; time advances to level 3 on its own.
            } else if let Some(triage) = deps.triage {
                let decision = triage(agent_name, deps.repo_root, session.last_activity);
                match decision {
                    TriageDecision::Terminate => {
                        deps.failure_recorder.record(
                            agent_name,
                            "progressive escalation: triage recommended termination",
                        );
                        if deps
                            .multiplexer
                            .is_session_alive(&session.tmux_session)
                            .unwrap_or(false)
                        {
                            let _ = deps
                                .multiplexer
                                .kill_session(&session.tmux_session, Duration::from_secs(5));
                        }
                        store.update_state(agent_name, SessionState::Zombie)?;
                        store.update_escalation(agent_name, 0, None)?;
                    }
                    TriageDecision::Retry => {
                        let _ = deps.multiplexer.send_keys(
                            &session.tmux_session,
                            "[WATCHDOG] Attempting recovery; please resume your task.",
                        );
                    }
                    TriageDecision::Extend => {}
                }
            }
        }
        3 => {
            deps.failure_recorder
                .record(agent_name, "progressive escalation reached terminal level");
            if deps
                .multiplexer
                .is_session_alive(&session.tmux_session)
                .unwrap_or(false)
            {
                let _ = deps
                    .multiplexer
                    .kill_session(&session.tmux_session, Duration::from_secs(5));
            }
            store.update_state(agent_name, SessionState::Zombie)?;
            store.update_escalation(agent_name, 0, None)?;
        }
        _ => unreachable!("expected_level is clamped to 0..=3"),
    }

    Ok(())
}

/// A long-running watchdog loop. `stop()` is cooperative: the in-flight
/// tick completes before the loop exits (§5 "Cancellation").
pub struct WatchdogHandle {
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl WatchdogHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawns the tick loop on a plain OS thread. `tick` is called with the
/// current timestamp on every iteration; the first tick runs immediately.
pub fn spawn_loop<F>(tick_interval: Duration, mut tick: F) -> WatchdogHandle
where
    F: FnMut(DateTime<Utc>) + Send + 'static,
{
    let stop_flag = Arc::new(AtomicBool::new(false));
    let loop_stop_flag = Arc::clone(&stop_flag);

    let thread = std::thread::spawn(move || {
        loop {
            if loop_stop_flag.load(Ordering::SeqCst) {
                break;
            }
            tick(Utc::now());
            if loop_stop_flag.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(tick_interval);
        }
    });

    WatchdogHandle {
        stop_flag,
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::types::{AgentSession, Capability};
    use crate::testutil::{fixed_triage, FakeFailureRecorder, FakeMultiplexer};
    use chrono::Duration as ChronoDuration;

    fn thresholds() -> WatchdogThresholds {
        WatchdogThresholds {
            stale_ms: 30_000,
            zombie_ms: 120_000,
            nudge_interval_ms: 60_000,
            tick_interval_ms: 15_000,
        }
    }

    fn deps<'a>(
        multiplexer: &'a FakeMultiplexer,
        failure_recorder: &'a FakeFailureRecorder,
        event_store: &'a EventStore,
        repo_root: &'a Path,
    ) -> WatchdogDeps<'a> {
        WatchdogDeps {
            multiplexer,
            failure_recorder,
            event_store,
            triage_enabled: false,
            triage: None,
            repo_root,
        }
    }

    #[test]
    fn test_empty_sessions_table_tick_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let multiplexer = FakeMultiplexer::new();
        let failure_recorder = FakeFailureRecorder::default();
        let event_store = EventStore::open(dir.path().join("events.db"));
        let deps = deps(&multiplexer, &failure_recorder, &event_store, dir.path());

        let report = run_tick(
            &mut store,
            &deps,
            &thresholds(),
            Utc::now(),
            None,
            &dir.path().join("run-complete-notified.txt"),
        );
        assert_eq!(report.sessions_processed, 0);
    }

    #[test]
    fn test_zombie_reconciliation_when_tmux_session_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut session = AgentSession::new(
            "dead",
            Capability::Builder,
            None,
            0,
            "/proj/.overstory/worktrees/dead",
            "overstory/dead/task",
            "task",
            "overstory-dead",
            None,
        );
        session.state = SessionState::Working;
        store.upsert(session).unwrap();

        let multiplexer = FakeMultiplexer::new();
        // tmux reports the session absent (default: not present in map)
        let failure_recorder = FakeFailureRecorder::default();
        let event_store = EventStore::open(dir.path().join("events.db"));
        let watchdog_deps = deps(&multiplexer, &failure_recorder, &event_store, dir.path());

        let report = run_tick(
            &mut store,
            &watchdog_deps,
            &thresholds(),
            Utc::now(),
            None,
            &dir.path().join("run-complete-notified.txt"),
        );

        assert_eq!(report.terminated, vec!["dead".to_string()]);
        assert_eq!(store.get_by_agent("dead").unwrap().state, SessionState::Zombie);
        assert!(multiplexer.killed.lock().unwrap().is_empty(), "session already gone, no kill_session call expected");
        let calls = failure_recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("ZFC") || calls[0].1.contains("Process terminated"));
    }

    #[test]
    fn test_completed_session_is_skipped_regardless_of_liveness() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut session = AgentSession::new(
            "done",
            Capability::Scout,
            None,
            0,
            "/proj/.overstory/worktrees/done",
            "overstory/done/task",
            "task",
            "overstory-done",
            None,
        );
        session.state = SessionState::Completed;
        store.upsert(session).unwrap();

        let multiplexer = FakeMultiplexer::new();
        let failure_recorder = FakeFailureRecorder::default();
        let event_store = EventStore::open(dir.path().join("events.db"));
        let watchdog_deps = deps(&multiplexer, &failure_recorder, &event_store, dir.path());

        let report = run_tick(
            &mut store,
            &watchdog_deps,
            &thresholds(),
            Utc::now(),
            None,
            &dir.path().join("run-complete-notified.txt"),
        );

        assert_eq!(report.sessions_processed, 0);
        assert_eq!(store.get_by_agent("done").unwrap().state, SessionState::Completed);
    }

    #[test]
    fn test_stale_then_nudge_then_terminate_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut session = AgentSession::new(
            "slow",
            Capability::Builder,
            None,
            0,
            "/proj/.overstory/worktrees/slow",
            "overstory/slow/task",
            "task",
            "overstory-slow",
            None,
        );
        session.state = SessionState::Working;
        session.last_activity = Utc::now() - ChronoDuration::seconds(60);
        store.upsert(session).unwrap();

        let multiplexer = FakeMultiplexer::new();
        multiplexer.set_alive("overstory-slow", true);
        let failure_recorder = FakeFailureRecorder::default();
        let event_store = EventStore::open(dir.path().join("events.db"));

        // Tick 1: stale -> escalate, level 0 (warn).
        {
            let watchdog_deps = deps(&multiplexer, &failure_recorder, &event_store, dir.path());
            run_tick(
                &mut store,
                &watchdog_deps,
                &thresholds(),
                Utc::now(),
                None,
                &dir.path().join("marker.txt"),
            );
        }
        assert_eq!(store.get_by_agent("slow").unwrap().state, SessionState::Stalled);
        assert_eq!(store.get_by_agent("slow").unwrap().escalation_level, 0);

        // Advance stalled_since to 70s ago before tick 2: expect level 1, nudge sent.
        store
            .update_escalation("slow", 0, Some(Utc::now() - ChronoDuration::seconds(70)))
            .unwrap();
        {
            let watchdog_deps = deps(&multiplexer, &failure_recorder, &event_store, dir.path());
            run_tick(
                &mut store,
                &watchdog_deps,
                &thresholds(),
                Utc::now(),
                None,
                &dir.path().join("marker.txt"),
            );
        }
        assert_eq!(store.get_by_agent("slow").unwrap().escalation_level, 1);
        let sent = multiplexer.sent_keys.lock().unwrap().clone();
        assert!(sent.iter().any(|(name, text)| name == "overstory-slow" && text.contains("WATCHDOG")));

        // Advance to 130s ago with triage enabled returning terminate: expect zombie + kill.
        store
            .update_escalation("slow", 1, Some(Utc::now() - ChronoDuration::seconds(130)))
            .unwrap();
        {
            let triage = fixed_triage(TriageDecision::Terminate);
            let watchdog_deps = WatchdogDeps {
                multiplexer: &multiplexer,
                failure_recorder: &failure_recorder,
                event_store: &event_store,
                triage_enabled: true,
                triage: Some(&triage),
                repo_root: dir.path(),
            };
            run_tick(
                &mut store,
                &watchdog_deps,
                &thresholds(),
                Utc::now(),
                None,
                &dir.path().join("marker.txt"),
            );
        }
        assert_eq!(store.get_by_agent("slow").unwrap().state, SessionState::Zombie);
        assert!(multiplexer.killed.lock().unwrap().contains(&"overstory-slow".to_string()));
    }

    #[test]
    fn test_post_tick_state_never_regresses_except_investigate_holds() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::open(dir.path().join("sessions.db")).unwrap();
        let mut session = AgentSession::new(
            "a",
            Capability::Scout,
            None,
            0,
            "/proj/.overstory/worktrees/a",
            "overstory/a/task",
            "task",
            "overstory-a",
            None,
        );
        session.state = SessionState::Zombie;
        store.upsert(session).unwrap();

        let multiplexer = FakeMultiplexer::new();
        multiplexer.set_alive("overstory-a", true);
        let failure_recorder = FakeFailureRecorder::default();
        let event_store = EventStore::open(dir.path().join("events.db"));
        let watchdog_deps = deps(&multiplexer, &failure_recorder, &event_store, dir.path());

        run_tick(
            &mut store,
            &watchdog_deps,
            &thresholds(),
            Utc::now(),
            None,
            &dir.path().join("marker.txt"),
        );

        // tmux alive + recorded zombie -> investigate -> holds state exactly.
        assert_eq!(store.get_by_agent("a").unwrap().state, SessionState::Zombie);
    }
}
