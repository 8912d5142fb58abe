//! `overstory prime` — stable command shape for the knowledge-base priming
//! hook. The knowledge base itself is an external collaborator (§1); this
//! only records the request so it shows up in the event log.

use std::path::Path;

use tracing::info;

use overstory_core::events::{Event, EventLevel, EventStore};
use overstory_core::paths::OverstoryPaths;

use super::CommandResult;

pub fn run(repo_root: &Path, agent: &str, compact: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let store = EventStore::open(paths.events_db());

    info!(event = "cli.prime.requested", agent = agent, compact = compact);
    let event = Event::new(agent, "prime_requested", EventLevel::Info)
        .with_data(serde_json::json!({"compact": compact}));
    store.append(&event)?;
    Ok(())
}
