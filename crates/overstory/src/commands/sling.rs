//! `overstory sling` — composes worktree creation, tmux session creation,
//! hook deployment, and session-store registration into one spawn
//! operation (C2, C3, C6).

use std::path::Path;

use tracing::info;

use overstory_core::guards;
use overstory_core::paths::OverstoryPaths;
use overstory_core::sessions::{AgentSession, Capability, SessionStore};
use overstory_core::tmux;
use overstory_core::worktree;

use super::CommandResult;

#[allow(clippy::too_many_arguments)]
pub fn run(
    repo_root: &Path,
    name: &str,
    task: &str,
    capability: Capability,
    parent: Option<String>,
    depth: u32,
    base_branch: &str,
    run_id: Option<String>,
) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);

    info!(
        event = "cli.sling.started",
        agent = name,
        task = task,
        capability = %capability,
        parent = parent.as_deref().unwrap_or(""),
        depth = depth
    );

    let created = worktree::create_worktree(repo_root, &paths.worktrees_dir(), name, base_branch, task)?;

    let tmux_session = format!("overstory-{name}");
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string());
    let pid = tmux::create_session(&tmux_session, &created.path, &shell, &[])?;

    guards::deploy_hooks(&created.path, name, capability)?;

    let mut store = SessionStore::open(paths.sessions_db())?;
    let mut session = AgentSession::new(
        name,
        capability,
        parent,
        depth,
        created.path.to_string_lossy().to_string(),
        created.branch.clone(),
        task,
        tmux_session.clone(),
        run_id,
    );
    session.pid = Some(pid);
    store.upsert(session)?;

    println!(
        "slung {name} ({capability}) into {} on branch {} (tmux session {tmux_session}, pid {pid})",
        created.path.display(),
        created.branch
    );
    Ok(())
}
