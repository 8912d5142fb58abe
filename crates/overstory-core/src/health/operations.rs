//! Pure health evaluation — the Zero-False-Crash (ZFC) decision cascade.
//!
//! `evaluate` takes no I/O: it is a pure function of a session record, the
//! observed multiplexer liveness, and the configured thresholds. This keeps
//! the evaluator unit-testable without mocks, per the design note that
//! persistence must stay a separate step.

use chrono::{DateTime, Utc};

use crate::config::WatchdogThresholds;
use crate::sessions::types::{Action, AgentSession, HealthCheck, SessionState};

/// Runs the ordered decision cascade (first match wins) against `session`.
///
/// `tmux_alive` and `pid_alive` are observed externally (C1) and passed in;
/// `now` is passed in rather than read from the clock so the function stays
/// pure and deterministic under test.
pub fn evaluate(
    session: &AgentSession,
    tmux_alive: bool,
    pid_alive: Option<bool>,
    now: DateTime<Utc>,
    thresholds: &WatchdogThresholds,
) -> HealthCheck {
    let base = |state: SessionState, action: Action, note: Option<String>| HealthCheck {
        agent_name: session.agent_name.clone(),
        timestamp: now,
        tmux_alive,
        pid_alive,
        process_alive: pid_alive,
        last_activity: session.last_activity,
        state,
        action,
        reconciliation_note: note,
    };

    // 1. Completed is terminal.
    if session.state == SessionState::Completed {
        return base(SessionState::Completed, Action::None, None);
    }

    // 2. Multiplexer absent overrides everything else (ZFC).
    if !tmux_alive {
        let note = matches!(session.state, SessionState::Working | SessionState::Booting)
            .then(|| {
                format!(
                    "observable state overrode recorded state '{}': multiplexer session absent",
                    recorded_state_label(session.state)
                )
            });
        return base(SessionState::Zombie, Action::Terminate, note);
    }

    // 3. Multiplexer alive but the record already says zombie: investigate, don't auto-kill.
    if session.state == SessionState::Zombie {
        return base(
            SessionState::Zombie,
            Action::Investigate,
            Some(
                "multiplexer session is alive despite recorded zombie state; holding for manual investigation"
                    .to_string(),
            ),
        );
    }

    // 4. Pane shell alive but the agent process inside it has exited.
    if pid_alive == Some(false) {
        return base(
            SessionState::Zombie,
            Action::Terminate,
            Some("pane shell survived, agent process exited".to_string()),
        );
    }

    let elapsed_ms = now
        .signed_duration_since(session.last_activity)
        .num_milliseconds()
        .max(0) as u64;

    // 5. Long silence past the zombie threshold.
    if elapsed_ms > thresholds.zombie_ms {
        return base(SessionState::Zombie, Action::Terminate, None);
    }

    // 6. Silence past the stale threshold: escalate.
    if elapsed_ms > thresholds.stale_ms {
        return base(SessionState::Stalled, Action::Escalate, None);
    }

    // 7 & 8. Recovering from boot, or steady-state working: both resolve to
    // working/none.
    base(SessionState::Working, Action::None, None)
}

fn recorded_state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Booting => "booting",
        SessionState::Working => "working",
        SessionState::Stalled => "stalled",
        SessionState::Zombie => "zombie",
        SessionState::Completed => "completed",
    }
}

/// Advances `current` to `check.state` only if it is strictly higher in the
/// ordering, except `Action::Investigate` which always holds the current
/// state exactly. This is the sole state-advancement pathway (§4.5).
pub fn transition_state(current: SessionState, check: &HealthCheck) -> SessionState {
    if check.action == Action::Investigate {
        return current;
    }
    if check.state > current {
        check.state
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::types::Capability;
    use chrono::Duration;

    fn thresholds() -> WatchdogThresholds {
        WatchdogThresholds {
            stale_ms: 30_000,
            zombie_ms: 120_000,
            nudge_interval_ms: 60_000,
            tick_interval_ms: 15_000,
        }
    }

    fn session_in_state(state: SessionState, last_activity_ago_ms: i64) -> AgentSession {
        let now = Utc::now();
        let mut session = AgentSession::new(
            "agent",
            Capability::Builder,
            None,
            0,
            "/proj/.overstory/worktrees/agent",
            "overstory/agent/task-1",
            "task-1",
            "overstory-agent",
            None,
        );
        session.state = state;
        session.last_activity = now - Duration::milliseconds(last_activity_ago_ms);
        session
    }

    #[test]
    fn test_completed_always_wins_regardless_of_liveness() {
        let session = session_in_state(SessionState::Completed, 999_999);
        let check = evaluate(&session, false, Some(false), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Completed);
        assert_eq!(check.action, Action::None);
    }

    #[test]
    fn test_tmux_dead_forces_zombie_regardless_of_other_inputs() {
        let session = session_in_state(SessionState::Working, 0);
        let check = evaluate(&session, false, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Zombie);
        assert_eq!(check.action, Action::Terminate);
        assert!(check.reconciliation_note.is_some());
    }

    #[test]
    fn test_tmux_dead_from_booting_also_attaches_note() {
        let session = session_in_state(SessionState::Booting, 0);
        let check = evaluate(&session, false, None, Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Zombie);
        assert!(check.reconciliation_note.as_ref().unwrap().contains("booting"));
    }

    #[test]
    fn test_tmux_dead_from_stalled_has_no_reconciliation_note() {
        let session = session_in_state(SessionState::Stalled, 0);
        let check = evaluate(&session, false, None, Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Zombie);
        assert!(check.reconciliation_note.is_none());
    }

    #[test]
    fn test_recorded_zombie_with_live_tmux_investigates_not_terminates() {
        let session = session_in_state(SessionState::Zombie, 0);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Zombie);
        assert_eq!(check.action, Action::Investigate);
    }

    #[test]
    fn test_pid_dead_terminates_with_specific_note() {
        let session = session_in_state(SessionState::Working, 0);
        let check = evaluate(&session, true, Some(false), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Zombie);
        assert_eq!(check.action, Action::Terminate);
        assert_eq!(
            check.reconciliation_note.as_deref(),
            Some("pane shell survived, agent process exited")
        );
    }

    #[test]
    fn test_silence_past_zombie_threshold_terminates() {
        let session = session_in_state(SessionState::Working, 130_000);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Zombie);
        assert_eq!(check.action, Action::Terminate);
    }

    #[test]
    fn test_silence_past_stale_threshold_escalates() {
        let session = session_in_state(SessionState::Working, 60_000);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Stalled);
        assert_eq!(check.action, Action::Escalate);
    }

    #[test]
    fn test_recent_activity_resolves_to_working_none() {
        let session = session_in_state(SessionState::Booting, 100);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Working);
        assert_eq!(check.action, Action::None);
    }

    #[test]
    fn test_stale_threshold_is_exclusive_boundary() {
        let session = session_in_state(SessionState::Working, 30_000);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.state, SessionState::Working);
    }

    #[test]
    fn test_zombie_state_iff_action_terminate_or_investigate() {
        for (state, tmux_alive, pid_alive, elapsed) in [
            (SessionState::Working, false, Some(true), 0),
            (SessionState::Zombie, true, Some(true), 0),
            (SessionState::Working, true, Some(false), 0),
            (SessionState::Working, true, Some(true), 130_000),
        ] {
            let session = session_in_state(state, elapsed);
            let check = evaluate(&session, tmux_alive, pid_alive, Utc::now(), &thresholds());
            let is_zombie = check.state == SessionState::Zombie;
            let is_terminate_or_investigate =
                matches!(check.action, Action::Terminate | Action::Investigate);
            assert_eq!(is_zombie, is_terminate_or_investigate);
        }
    }

    #[test]
    fn test_investigate_action_iff_tmux_alive_and_prestate_zombie() {
        let session = session_in_state(SessionState::Zombie, 0);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_eq!(check.action, Action::Investigate);

        let session = session_in_state(SessionState::Working, 0);
        let check = evaluate(&session, true, Some(true), Utc::now(), &thresholds());
        assert_ne!(check.action, Action::Investigate);
    }

    #[test]
    fn test_transition_state_advances_forward_only() {
        let check = HealthCheck {
            agent_name: "a".to_string(),
            timestamp: Utc::now(),
            tmux_alive: true,
            pid_alive: Some(true),
            process_alive: Some(true),
            last_activity: Utc::now(),
            state: SessionState::Stalled,
            action: Action::Escalate,
            reconciliation_note: None,
        };
        assert_eq!(
            transition_state(SessionState::Working, &check),
            SessionState::Stalled
        );
    }

    #[test]
    fn test_transition_state_investigate_holds_current_exactly() {
        let check = HealthCheck {
            agent_name: "a".to_string(),
            timestamp: Utc::now(),
            tmux_alive: true,
            pid_alive: Some(true),
            process_alive: Some(true),
            last_activity: Utc::now(),
            state: SessionState::Zombie,
            action: Action::Investigate,
            reconciliation_note: None,
        };
        assert_eq!(
            transition_state(SessionState::Zombie, &check),
            SessionState::Zombie
        );
    }

    #[test]
    fn test_transition_state_is_idempotent_when_check_state_not_higher() {
        let check = HealthCheck {
            agent_name: "a".to_string(),
            timestamp: Utc::now(),
            tmux_alive: true,
            pid_alive: Some(true),
            process_alive: Some(true),
            last_activity: Utc::now(),
            state: SessionState::Working,
            action: Action::None,
            reconciliation_note: None,
        };
        assert_eq!(
            transition_state(SessionState::Stalled, &check),
            SessionState::Stalled
        );
    }
}
