//! The agent session record and its supporting enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The declared role an agent plays. Determines guard composition (C6) and
/// overlay sections (C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Coordinator,
    Supervisor,
    Lead,
    Builder,
    Merger,
    Scout,
    Reviewer,
    Monitor,
}

impl Capability {
    /// Persistent capabilities are excluded from run-completion accounting (C12).
    pub fn is_persistent(self) -> bool {
        matches!(self, Capability::Coordinator | Capability::Monitor)
    }

    /// Read-only capabilities receive full Write/Edit/NotebookEdit blocks and
    /// a Bash file guard instead of a path-boundary guard (C6).
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Capability::Scout
                | Capability::Reviewer
                | Capability::Lead
                | Capability::Coordinator
                | Capability::Supervisor
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Coordinator => "coordinator",
            Capability::Supervisor => "supervisor",
            Capability::Lead => "lead",
            Capability::Builder => "builder",
            Capability::Merger => "merger",
            Capability::Scout => "scout",
            Capability::Reviewer => "reviewer",
            Capability::Monitor => "monitor",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent lifecycle state.
///
/// `state` advances monotonically by the ordering `Booting < Working <
/// Stalled < Zombie`. `Completed` is a terminal case handled outside that
/// ordering: `booting < working < completed` and `booting < working <
/// stalled < zombie` are not jointly total, so `Completed` is never
/// compared via `Ord` — callers check for it explicitly before evaluating
/// or transitioning a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Booting,
    Working,
    Stalled,
    Zombie,
    Completed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed)
    }

    /// Whether `self` is reachable from `current` under the forward-only
    /// ordering, ignoring the `Completed` special case (callers gate on
    /// `is_terminal` separately; see [`crate::health::transition_state`]).
    pub fn advances_from(self, current: SessionState) -> bool {
        self > current
    }
}

/// Action a health check directs the watchdog to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    None,
    Escalate,
    Investigate,
    Terminate,
}

/// The durable per-agent record. Keyed by `agent_name` (unique).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: String,
    pub agent_name: String,
    pub capability: Capability,
    pub parent_agent: Option<String>,
    #[serde(default)]
    pub depth: u32,
    pub worktree_path: String,
    pub branch_name: String,
    #[serde(default)]
    pub bead_id: String,
    pub tmux_session: String,
    pub pid: Option<u32>,
    pub state: SessionState,
    #[serde(default)]
    pub escalation_level: u8,
    #[serde(default)]
    pub stalled_since: Option<DateTime<Utc>>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub run_id: Option<String>,
}

impl AgentSession {
    /// Constructs a freshly-booted session record.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_name: impl Into<String>,
        capability: Capability,
        parent_agent: Option<String>,
        depth: u32,
        worktree_path: impl Into<String>,
        branch_name: impl Into<String>,
        bead_id: impl Into<String>,
        tmux_session: impl Into<String>,
        run_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_name: agent_name.into(),
            capability,
            parent_agent,
            depth,
            worktree_path: worktree_path.into(),
            branch_name: branch_name.into(),
            bead_id: bead_id.into(),
            tmux_session: tmux_session.into(),
            pid: None,
            state: SessionState::Booting,
            escalation_level: 0,
            stalled_since: None,
            started_at: now,
            last_activity: now,
            run_id,
        }
    }
}

/// Ephemeral result of the health evaluator (C5). Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub tmux_alive: bool,
    pub pid_alive: Option<bool>,
    pub process_alive: Option<bool>,
    pub last_activity: DateTime<Utc>,
    pub state: SessionState,
    pub action: Action,
    pub reconciliation_note: Option<String>,
}
