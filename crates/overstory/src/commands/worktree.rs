//! `overstory worktree {create,list,clean}` (C2, C10).

use std::path::Path;

use tracing::info;

use overstory_core::housekeeper::{self, CleanSelector};
use overstory_core::paths::OverstoryPaths;
use overstory_core::sessions::SessionStore;
use overstory_core::worktree;

use crate::cli::CleanSelectorArg;

use super::CommandResult;

pub fn create(repo_root: &Path, agent: &str, bead: &str, base_branch: &str) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    info!(event = "cli.worktree.create_started", agent = agent, bead = bead);

    let created = worktree::create_worktree(repo_root, &paths.worktrees_dir(), agent, base_branch, bead)?;

    println!("created worktree {} on branch {}", created.path.display(), created.branch);
    Ok(())
}

pub fn list(repo_root: &Path, json: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let store = SessionStore::open(paths.sessions_db())?;
    let entries = housekeeper::list(repo_root, &store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("no worktrees found");
    } else {
        for entry in &entries {
            println!(
                "{:<20} {:<12} {:<30} {}",
                entry.agent, entry.state, entry.branch, entry.path
            );
        }
    }
    Ok(())
}

pub fn clean(repo_root: &Path, selector: CleanSelectorArg, force: bool, json: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let mut store = SessionStore::open(paths.sessions_db())?;

    let selector = match selector {
        CleanSelectorArg::Default => CleanSelector::CompletedAndZombie,
        CleanSelectorArg::Completed => CleanSelector::Completed,
        CleanSelectorArg::All => CleanSelector::All,
    };

    let report = housekeeper::clean(repo_root, &mut store, selector, force)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "cleaned {} failed {} skipped {} pruned {}",
            report.cleaned.len(),
            report.failed.len(),
            report.skipped.len(),
            report.pruned.len()
        );
    }
    Ok(())
}
