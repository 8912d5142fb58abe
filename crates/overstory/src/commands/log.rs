//! `overstory log` (C4) — the hook-invoked event-logging entry point.

use std::io::Read;
use std::path::Path;

use tracing::{info, warn};

use overstory_core::events::{Event, EventLevel, EventStore};
use overstory_core::paths::OverstoryPaths;
use overstory_core::sessions::SessionStore;

use crate::cli::LogPhase;

use super::CommandResult;

/// Shape hooks pipe in on stdin. Fields beyond `event_type` are all optional
/// so `SessionStart`/`Stop` can post a bare `{}`.
#[derive(Debug, serde::Deserialize, Default)]
struct StdinBody {
    run_id: Option<String>,
    session_id: Option<String>,
    tool_name: Option<String>,
    tool_args: Option<serde_json::Value>,
    tool_duration_ms: Option<u64>,
    level: Option<String>,
    data: Option<serde_json::Value>,
}

fn event_type_for(phase: LogPhase) -> &'static str {
    match phase {
        LogPhase::ToolStart => "tool_start",
        LogPhase::ToolEnd => "tool_end",
        LogPhase::SessionEnd => "session_end",
    }
}

fn level_from_str(level: Option<&str>) -> EventLevel {
    match level {
        Some("debug") => EventLevel::Debug,
        Some("warn") => EventLevel::Warn,
        Some("error") => EventLevel::Error,
        _ => EventLevel::Info,
    }
}

pub fn run(repo_root: &Path, phase: LogPhase, agent: &str, read_stdin: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let store = EventStore::open(paths.events_db());

    let body = if read_stdin {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        if raw.trim().is_empty() {
            StdinBody::default()
        } else {
            serde_json::from_str(&raw)?
        }
    } else {
        StdinBody::default()
    };

    let mut event = Event::new(agent, event_type_for(phase), level_from_str(body.level.as_deref()));
    event.run_id = body.run_id;
    event.session_id = body.session_id;
    event.tool_name = body.tool_name;
    event.tool_args = body.tool_args;
    event.tool_duration_ms = body.tool_duration_ms;
    event.data = body.data;

    info!(event = "cli.log.recorded", agent = agent, phase = event_type_for(phase));
    store.append(&event)?;

    // Every logged lifecycle point is live evidence the agent is running;
    // refresh last_activity so the watchdog's stale/zombie cascade (§4.5)
    // sees it. pid is left untouched here since a hook has no reliable way
    // to observe the session's own pane pid.
    let mut sessions = SessionStore::open(paths.sessions_db())?;
    if let Err(err) = sessions.record_activity(agent, chrono::Utc::now(), None) {
        warn!(event = "cli.log.activity_record_failed", agent = agent, error = %err);
    }
    sessions.close();

    Ok(())
}
