//! Per-session telemetry and token snapshots (`metrics.db`).
//!
//! These tables are persisted with write paths plus a per-run read path,
//! built on the same append-only JSONL shape as
//! [`crate::events`] (C4) since a metrics row and an event row share the
//! same durability requirement: appended once, never mutated in place.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{append_line, read_lines};

/// One row per (agent, task) run, recorded once the agent exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub agent_name: String,
    pub run_id: Option<String>,
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_estimate_usd: f64,
    pub model: String,
    pub merge_result: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A point-in-time token usage reading, keyed by (agent, timestamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub agent_name: String,
    pub timestamp: DateTime<Utc>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum MetricsRow {
    Session(SessionMetrics),
    TokenSnapshot(TokenSnapshot),
}

/// Append-only metrics store.
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record_session_metrics(&self, metrics: SessionMetrics) -> Result<(), std::io::Error> {
        append_line(&self.path, &MetricsRow::Session(metrics))
    }

    pub fn record_token_snapshot(&self, snapshot: TokenSnapshot) -> Result<(), std::io::Error> {
        append_line(&self.path, &MetricsRow::TokenSnapshot(snapshot))
    }

    /// All session-metrics rows for a given run id.
    pub fn metrics_for_run(&self, run_id: &str) -> Result<Vec<SessionMetrics>, std::io::Error> {
        let rows: Vec<MetricsRow> = read_lines(&self.path)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                MetricsRow::Session(m) if m.run_id.as_deref() == Some(run_id) => Some(m),
                _ => None,
            })
            .collect())
    }

    /// All token snapshots recorded for a given agent.
    pub fn token_snapshots_for_agent(
        &self,
        agent_name: &str,
    ) -> Result<Vec<TokenSnapshot>, std::io::Error> {
        let rows: Vec<MetricsRow> = read_lines(&self.path)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                MetricsRow::TokenSnapshot(s) if s.agent_name == agent_name => Some(s),
                _ => None,
            })
            .collect())
    }
}
