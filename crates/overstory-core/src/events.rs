//! Append-only event log (C4).
//!
//! One JSON object per line (`events.db`), opened in append mode for writes
//! and scanned linearly for reads — a single streaming file rather than
//! one-file-per-record, since events have no natural per-record filename.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity attached to an event, mirroring the levels the watchdog and
/// hooks log at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single append-only log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: Option<String>,
    pub agent_name: String,
    pub session_id: Option<String>,
    pub event_type: String,
    pub tool_name: Option<String>,
    pub tool_args: Option<Value>,
    pub tool_duration_ms: Option<u64>,
    pub level: EventLevel,
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(agent_name: impl Into<String>, event_type: impl Into<String>, level: EventLevel) -> Self {
        Self {
            run_id: None,
            agent_name: agent_name.into(),
            session_id: None,
            event_type: event_type.into(),
            tool_name: None,
            tool_args: None,
            tool_duration_ms: None,
            level,
            data: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Per-tool aggregate returned by [`EventStore::get_tool_stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStats {
    pub tool_name: String,
    pub count: u64,
    pub average_duration_ms: f64,
    pub error_count: u64,
}

/// Append-only event log handle.
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends `event` as one JSON line. Failures are the caller's to
    /// swallow (the watchdog treats event logging as fire-and-forget).
    pub fn append(&self, event: &Event) -> Result<(), std::io::Error> {
        append_line(&self.path, event)
    }

    fn read_all(&self) -> Result<Vec<Event>, std::io::Error> {
        read_lines(&self.path)
    }

    pub fn query_by_agent(&self, agent_name: &str) -> Result<Vec<Event>, std::io::Error> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.agent_name == agent_name)
            .collect())
    }

    pub fn query_by_run(&self, run_id: &str) -> Result<Vec<Event>, std::io::Error> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.run_id.as_deref() == Some(run_id))
            .collect())
    }

    /// Per-tool aggregates, optionally scoped to one agent.
    pub fn get_tool_stats(&self, agent_name: Option<&str>) -> Result<Vec<ToolStats>, std::io::Error> {
        let events = self.read_all()?;
        let mut by_tool: std::collections::BTreeMap<String, (u64, u64, u64)> =
            std::collections::BTreeMap::new();
        for event in events {
            if let Some(filter) = agent_name
                && event.agent_name != filter
            {
                continue;
            }
            let Some(tool_name) = event.tool_name else {
                continue;
            };
            let entry = by_tool.entry(tool_name).or_insert((0, 0, 0));
            entry.0 += 1;
            entry.1 += event.tool_duration_ms.unwrap_or(0);
            if event.level == EventLevel::Error {
                entry.2 += 1;
            }
        }
        Ok(by_tool
            .into_iter()
            .map(|(tool_name, (count, total_duration_ms, error_count))| ToolStats {
                tool_name,
                count,
                average_duration_ms: if count == 0 {
                    0.0
                } else {
                    total_duration_ms as f64 / count as f64
                },
                error_count,
            })
            .collect())
    }

    /// Bulk purge — the only deletion path the event store supports.
    pub fn purge(&self) -> Result<(), std::io::Error> {
        std::fs::write(&self.path, "")
    }
}

/// Appends any serializable row as one JSON line, creating the parent
/// directory and the file as needed. Shared by [`EventStore`] and
/// [`crate::metrics::MetricsStore`] — both are append-only JSONL logs.
pub(crate) fn append_line<T: Serialize>(path: &Path, row: &T) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(row)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writeln!(file, "{line}")
}

/// Reads and deserializes every line of a JSONL log. Lines that fail to
/// deserialize are skipped rather than aborting the whole read, so one
/// corrupt record does not hide the rest of the log.
pub(crate) fn read_lines<T: for<'de> Deserialize<'de>>(
    path: &Path,
) -> Result<Vec<T>, std::io::Error> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let reader = BufReader::new(file);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(row) = serde_json::from_str(&line) {
            rows.push(row);
        }
    }
    Ok(rows)
}
