//! Worktree housekeeper (C10): `list` and `clean` over agent worktrees,
//! cross-referenced against session rows.

use serde::Serialize;

use crate::errors::{SessionStoreError, WorktreeError};
use crate::sessions::store::SessionStore;
use crate::sessions::types::SessionState;
use crate::worktree::{self, RemoveOptions};

/// One decorated row for `list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorktreeListingEntry {
    pub path: String,
    pub branch: String,
    pub agent: String,
    pub state: String,
    pub bead_id: String,
}

/// Selector for `clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanSelector {
    CompletedAndZombie,
    Completed,
    All,
}

impl CleanSelector {
    fn matches(self, state: SessionState) -> bool {
        match self {
            CleanSelector::CompletedAndZombie => {
                matches!(state, SessionState::Completed | SessionState::Zombie)
            }
            CleanSelector::Completed => state == SessionState::Completed,
            CleanSelector::All => true,
        }
    }
}

/// Report returned by `clean`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanReport {
    pub cleaned: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
    pub pruned: Vec<String>,
}

/// Cross-references `worktree::list_worktrees` against `store`'s rows.
/// Entries with no matching session row render `"?"`.
pub fn list(
    repo_root: &std::path::Path,
    store: &SessionStore,
) -> Result<Vec<WorktreeListingEntry>, WorktreeError> {
    let worktrees = worktree::list_worktrees(repo_root)?;
    let mut entries = Vec::new();
    for wt in worktrees {
        let session = store
            .get_all()
            .into_iter()
            .find(|s| s.worktree_path == wt.path.to_string_lossy());
        entries.push(WorktreeListingEntry {
            path: wt.path.to_string_lossy().to_string(),
            branch: wt.branch.clone(),
            agent: session
                .map(|s| s.agent_name.clone())
                .unwrap_or_else(|| "?".to_string()),
            state: session
                .map(|s| format!("{:?}", s.state).to_lowercase())
                .unwrap_or_else(|| "?".to_string()),
            bead_id: session
                .map(|s| s.bead_id.clone())
                .unwrap_or_else(|| "?".to_string()),
        });
    }
    Ok(entries)
}

/// Removes worktrees matching `selector`, refusing unmerged branches unless
/// `force`, then prunes session rows whose worktree path no longer exists.
pub fn clean(
    repo_root: &std::path::Path,
    store: &mut SessionStore,
    selector: CleanSelector,
    force: bool,
) -> Result<CleanReport, SessionStoreError> {
    let mut report = CleanReport::default();

    let agent_names: Vec<String> = store
        .get_all()
        .into_iter()
        .filter(|s| selector.matches(s.state))
        .map(|s| s.agent_name.clone())
        .collect();

    for agent_name in agent_names {
        let Some(session) = store.get_by_agent(&agent_name) else {
            continue;
        };
        let path = std::path::PathBuf::from(&session.worktree_path);
        if !path.exists() {
            continue;
        }

        let unmerged_and_not_forced = !force
            && worktree::is_branch_merged(repo_root, &session.branch_name, "main")
                .map(|merged| !merged)
                .unwrap_or(false);
        if unmerged_and_not_forced {
            report.skipped.push(agent_name);
            continue;
        }

        match worktree::remove_worktree(
            repo_root,
            &path,
            RemoveOptions {
                force: true,
                force_branch: force,
            },
        ) {
            Ok(()) => report.cleaned.push(agent_name),
            Err(_) => report.failed.push(agent_name),
        }
    }

    for session in store.get_all() {
        let path = std::path::PathBuf::from(&session.worktree_path);
        if !path.exists() {
            report.pruned.push(session.agent_name.clone());
        }
    }
    for agent_name in &report.pruned {
        store.purge(agent_name)?;
    }

    Ok(report)
}
