//! `overstory deploy-hooks` (C6).

use std::path::{Path, PathBuf};

use tracing::info;

use overstory_core::guards;
use overstory_core::paths::OverstoryPaths;
use overstory_core::sessions::types::Capability;

use super::CommandResult;

pub fn run(repo_root: &Path, agent: &str, capability: Capability, worktree: Option<PathBuf>) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let worktree_path = worktree.unwrap_or_else(|| paths.worktree_for_agent(agent));

    info!(
        event = "cli.deploy_hooks.started",
        agent = agent,
        capability = %capability,
        worktree = %worktree_path.display()
    );

    guards::deploy_hooks(&worktree_path, agent, capability)?;

    println!(
        "deployed hooks for {agent} ({capability}) to {}",
        worktree_path.join(".claude/settings.local.json").display()
    );
    Ok(())
}
