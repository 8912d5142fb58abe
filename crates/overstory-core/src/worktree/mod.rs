//! Worktree manager (C2).
//!
//! Worktree listing goes through `git2::Repository::worktrees`, branch
//! ancestor checks through `merge_base`, and removal refuses to delete the
//! main checkout (the `.git`-is-a-directory guard) with prune-then-rmdir
//! sequencing and a best-effort branch delete. `git2` covers every
//! operation here; no fetch/push requiring CLI auth inheritance appears in
//! this component.

use std::path::{Path, PathBuf};

use git2::{BranchType, Repository};
use tracing::{info, warn};

use crate::errors::WorktreeError;

/// Result of [`create_worktree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWorktree {
    pub path: PathBuf,
    pub branch: String,
}

/// A registered worktree entry as reported by `list_worktrees`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeListing {
    pub path: PathBuf,
    pub branch: String,
    pub head: String,
}

/// Options controlling [`remove_worktree`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    pub force: bool,
    pub force_branch: bool,
}

/// Branch name of shape `overstory/<agent>/<bead>`.
pub fn branch_name(agent_name: &str, bead_id: &str) -> String {
    format!("overstory/{agent_name}/{bead_id}")
}

/// Creates an isolated worktree at `base_dir/agent_name` on a fresh branch
/// cut from `base_branch`. Not idempotent: a second call with identical
/// inputs fails because the worktree path (and branch) already exist.
pub fn create_worktree(
    repo_root: &Path,
    base_dir: &Path,
    agent_name: &str,
    base_branch: &str,
    bead_id: &str,
) -> Result<CreatedWorktree, WorktreeError> {
    let path = base_dir.join(agent_name);
    let branch = branch_name(agent_name, bead_id);

    if path.exists() {
        return Err(WorktreeError::AlreadyExists {
            path,
            branch,
        });
    }

    info!(
        event = "core.worktree.create_started",
        agent_name = agent_name,
        branch = %branch,
        path = %path.display()
    );

    let repo = Repository::open(repo_root)?;
    let base_commit = repo
        .find_branch(base_branch, BranchType::Local)
        .map_err(WorktreeError::Git2)?
        .get()
        .peel_to_commit()
        .map_err(WorktreeError::Git2)?;

    if repo.find_branch(&branch, BranchType::Local).is_ok() {
        return Err(WorktreeError::AlreadyExists { path, branch });
    }
    repo.branch(&branch, &base_commit, false)?;

    let reference = repo
        .find_branch(&branch, BranchType::Local)
        .map_err(WorktreeError::Git2)?
        .into_reference();

    let mut opts = git2::WorktreeAddOptions::new();
    opts.reference(Some(&reference));
    repo.worktree(agent_name, &path, Some(&opts))
        .map_err(|e| WorktreeError::GitOperationFailed {
            path: path.clone(),
            branch: branch.clone(),
            message: e.to_string(),
        })?;

    info!(
        event = "core.worktree.create_completed",
        agent_name = agent_name,
        branch = %branch
    );

    Ok(CreatedWorktree { path, branch })
}

/// Lists every registered worktree. Strips `refs/heads/` off branch refs.
/// A `repo_root` that is not a git repository fails.
pub fn list_worktrees(repo_root: &Path) -> Result<Vec<WorktreeListing>, WorktreeError> {
    let repo = Repository::discover(repo_root)?;
    let worktree_names = repo.worktrees()?;

    let mut listings = Vec::new();
    for name in worktree_names.iter().flatten() {
        let worktree = match repo.find_worktree(name) {
            Ok(w) => w,
            Err(e) => {
                warn!(
                    event = "core.worktree.list_entry_skipped",
                    worktree_name = name,
                    error = %e
                );
                continue;
            }
        };
        let wt_path = worktree.path().to_path_buf();
        let wt_repo = match Repository::open(&wt_path) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    event = "core.worktree.list_entry_skipped",
                    worktree_name = name,
                    error = %e
                );
                continue;
            }
        };
        let head = wt_repo.head().ok();
        let branch = head
            .as_ref()
            .and_then(|h| h.name())
            .map(|n| n.trim_start_matches("refs/heads/").to_string())
            .unwrap_or_default();
        let head_oid = head
            .as_ref()
            .and_then(|h| h.target())
            .map(|oid| oid.to_string())
            .unwrap_or_default();

        listings.push(WorktreeListing {
            path: wt_path,
            branch,
            head: head_oid,
        });
    }
    Ok(listings)
}

/// True iff `branch`'s tip is an ancestor of `target`.
pub fn is_branch_merged(
    repo_root: &Path,
    branch: &str,
    target: &str,
) -> Result<bool, WorktreeError> {
    let repo = Repository::open(repo_root)?;
    let branch_oid = repo
        .find_branch(branch, BranchType::Local)
        .map_err(WorktreeError::Git2)?
        .get()
        .peel_to_commit()
        .map_err(WorktreeError::Git2)?
        .id();
    let target_oid = repo
        .find_branch(target, BranchType::Local)
        .map_err(WorktreeError::Git2)?
        .get()
        .peel_to_commit()
        .map_err(WorktreeError::Git2)?
        .id();

    if branch_oid == target_oid {
        return Ok(true);
    }
    Ok(repo.graph_descendant_of(target_oid, branch_oid)?)
}

/// Refuses to remove a path that is a main git repository checkout — a main
/// checkout has a `.git` directory, a worktree has a `.git` file pointing
/// back at `<main>/.git/worktrees/<name>/`.
fn assert_not_main_repo(path: &Path) -> Result<(), WorktreeError> {
    if path.join(".git").is_dir() {
        return Err(WorktreeError::RefusingMainRepo {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// Discovers the branch from the worktree listing, removes the worktree
/// (optionally with `force`), then attempts to delete the branch against the
/// main checkout's current branch: `force_branch=false` refuses (leaves
/// intact) an unmerged branch, `force_branch=true` deletes unconditionally.
/// Branch deletion is best-effort beyond that gate and its failure is
/// swallowed (§4.2, §7).
pub fn remove_worktree(
    repo_root: &Path,
    path: &Path,
    options: RemoveOptions,
) -> Result<(), WorktreeError> {
    assert_not_main_repo(path)?;

    let repo = Repository::discover(repo_root)?;
    let listings = list_worktrees(repo_root)?;
    let branch = listings
        .iter()
        .find(|w| w.path == path)
        .map(|w| w.branch.clone())
        .ok_or_else(|| WorktreeError::NotFound {
            path: path.to_path_buf(),
        })?;

    let worktree_names = repo.worktrees()?;
    let mut removed = false;
    for name in worktree_names.iter().flatten() {
        let Ok(worktree) = repo.find_worktree(name) else {
            continue;
        };
        if worktree.path() != path {
            continue;
        }
        if !options.force && worktree.is_locked().is_ok_and(|l| l.is_locked()) {
            return Err(WorktreeError::GitOperationFailed {
                path: path.to_path_buf(),
                branch: branch.clone(),
                message: "worktree is locked; pass force to override".to_string(),
            });
        }
        worktree.prune(None)?;
        removed = true;
        break;
    }
    if !removed {
        return Err(WorktreeError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if path.exists() {
        std::fs::remove_dir_all(path)?;
    }

    info!(
        event = "core.worktree.remove_completed",
        path = %path.display(),
        branch = %branch
    );

    if let Ok(git_branch) = repo.find_branch(&branch, BranchType::Local) {
        let mut git_branch = git_branch;
        if options.force_branch {
            if let Err(e) = git_branch.delete() {
                warn!(
                    event = "core.worktree.branch_delete_failed",
                    branch = %branch,
                    error = %e,
                    "best-effort forced branch delete failed"
                );
            }
        } else {
            let target_branch = repo
                .head()
                .ok()
                .and_then(|head| head.shorthand().map(str::to_string));
            let merged = target_branch
                .as_deref()
                .map(|target| is_branch_merged(repo_root, &branch, target).unwrap_or(false))
                .unwrap_or(false);
            if merged {
                if let Err(e) = git_branch.delete() {
                    warn!(
                        event = "core.worktree.branch_delete_failed",
                        branch = %branch,
                        error = %e,
                        "best-effort branch delete failed"
                    );
                }
            } else {
                info!(
                    event = "core.worktree.branch_delete_skipped_unmerged",
                    branch = %branch,
                    "leaving unmerged branch intact; pass force_branch to delete anyway"
                );
            }
        }
    }

    Ok(())
}
