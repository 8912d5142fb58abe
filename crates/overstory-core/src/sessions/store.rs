//! Single-file durable session store, keyed by `agent_name`.
//!
//! `sessions.db` is one JSON document under the project's `.overstory/`
//! layout — a map keyed by agent name. Writes go through an atomic
//! serialize → write `.tmp` → rename sequence so a rename is the only
//! mutation ever applied to the visible path and concurrent readers always
//! see either the pre- or post-write snapshot, never a torn one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::errors::SessionStoreError;
use crate::sessions::types::{AgentSession, SessionState};

/// Durable key-value store over `AgentSession` rows.
///
/// Holds an in-memory snapshot loaded at `open` time; every mutating method
/// writes the whole document back atomically before returning. This keeps
/// the "readers never see a torn write" invariant (§5) without a database
/// engine, at the cost of loading the whole table into memory — acceptable
/// at the scale this system runs at (tens of concurrent agents).
pub struct SessionStore {
    path: PathBuf,
    sessions: BTreeMap<String, AgentSession>,
}

impl SessionStore {
    /// Opens (creating if absent) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let path = path.into();
        let sessions = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(SessionStoreError::Io(err)),
        };
        Ok(Self { path, sessions })
    }

    /// Inserts or replaces the row for `session.agent_name`.
    pub fn upsert(&mut self, session: AgentSession) -> Result<(), SessionStoreError> {
        self.sessions.insert(session.agent_name.clone(), session);
        self.flush()
    }

    /// Returns every row, in key (agent-name) order.
    pub fn get_all(&self) -> Vec<&AgentSession> {
        self.sessions.values().collect()
    }

    /// Returns a single row by agent name.
    pub fn get_by_agent(&self, agent_name: &str) -> Option<&AgentSession> {
        self.sessions.get(agent_name)
    }

    /// Returns every row sharing `run_id`.
    pub fn get_by_run(&self, run_id: &str) -> Vec<&AgentSession> {
        self.sessions
            .values()
            .filter(|s| s.run_id.as_deref() == Some(run_id))
            .collect()
    }

    /// Writes a new `state`. Only the watchdog should call this (§5).
    pub fn update_state(
        &mut self,
        agent_name: &str,
        state: SessionState,
    ) -> Result<(), SessionStoreError> {
        let session = self
            .sessions
            .get_mut(agent_name)
            .ok_or_else(|| SessionStoreError::NotFound {
                agent_name: agent_name.to_string(),
            })?;
        session.state = state;
        self.flush()
    }

    /// Writes escalation bookkeeping. Only the watchdog should call this (§5).
    pub fn update_escalation(
        &mut self,
        agent_name: &str,
        level: u8,
        stalled_since: Option<DateTime<Utc>>,
    ) -> Result<(), SessionStoreError> {
        let session = self
            .sessions
            .get_mut(agent_name)
            .ok_or_else(|| SessionStoreError::NotFound {
                agent_name: agent_name.to_string(),
            })?;
        session.escalation_level = level;
        session.stalled_since = stalled_since;
        self.flush()
    }

    /// Records observed activity. Hooks may call this but must never
    /// regress `state` (§5) — this method does not touch it.
    pub fn record_activity(
        &mut self,
        agent_name: &str,
        last_activity: DateTime<Utc>,
        pid: Option<u32>,
    ) -> Result<(), SessionStoreError> {
        let session = self
            .sessions
            .get_mut(agent_name)
            .ok_or_else(|| SessionStoreError::NotFound {
                agent_name: agent_name.to_string(),
            })?;
        session.last_activity = last_activity;
        if pid.is_some() {
            session.pid = pid;
        }
        self.flush()
    }

    /// Removes a row outright (explicit purge, not part of normal lifecycle).
    pub fn purge(&mut self, agent_name: &str) -> Result<(), SessionStoreError> {
        self.sessions.remove(agent_name);
        self.flush()
    }

    /// Flushes the in-memory snapshot to disk, atomically.
    fn flush(&self) -> Result<(), SessionStoreError> {
        write_atomic(&self.path, &self.sessions)
    }

    /// Closes the store. Not reused after this call; gives callers an
    /// explicit point to scope store lifetime around a tick.
    pub fn close(self) {}
}

fn write_atomic(
    path: &Path,
    sessions: &BTreeMap<String, AgentSession>,
) -> Result<(), SessionStoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(sessions)?;
    let temp_path = path.with_extension("db.tmp");
    if let Err(err) = std::fs::write(&temp_path, &json) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(SessionStoreError::Io(err));
    }
    if let Err(err) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(SessionStoreError::Io(err));
    }
    Ok(())
}
