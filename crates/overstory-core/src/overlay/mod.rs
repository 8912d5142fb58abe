//! Overlay generator (C7).
//!
//! Renders `<worktree>/.claude/CLAUDE.md` from a template using a plain
//! `{{PLACEHOLDER}}` string-replace pass — no templating crate, since the
//! placeholder set is small and fixed. The canonical-root guard compares
//! real filesystem paths via `std::fs::canonicalize` rather than an
//! existence heuristic; a fresh worktree directory may not exist yet at
//! guard-check time in some call orders, so canonicalization falls back to
//! lexical normalization when the path is missing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::OverlayError;
use crate::sessions::types::Capability;

/// Input to the overlay generator (§3 "Overlay config"). Deserializable so
/// the CLI can accept it as a JSON document (`overstory overlay --config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub agent_name: String,
    pub task_id: String,
    #[serde(default)]
    pub spec_path: Option<String>,
    pub branch_name: String,
    pub worktree_path: String,
    #[serde(default)]
    pub file_scope: Vec<String>,
    #[serde(default)]
    pub knowledge_domains: Vec<String>,
    #[serde(default)]
    pub parent_agent: Option<String>,
    #[serde(default)]
    pub depth: u32,
    pub capability: Capability,
    #[serde(default)]
    pub can_spawn: bool,
    #[serde(default)]
    pub base_definition: String,
    #[serde(default)]
    pub preloaded_expertise: Option<String>,
    #[serde(default)]
    pub plan_mode: Option<PlanModeConfig>,
    #[serde(default)]
    pub current_date: Option<String>,
    #[serde(default)]
    pub existing_plan_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanModeConfig {
    /// `true` for plan mode, `false` for execute mode.
    pub is_plan_mode: bool,
}

fn render_file_scope(scope: &[String]) -> String {
    if scope.is_empty() {
        "No file scope restrictions".to_string()
    } else {
        scope
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn render_knowledge_domains(domains: &[String]) -> String {
    if domains.is_empty() {
        String::new()
    } else {
        format!("```\nmulch prime {}\n```", domains.join(" "))
    }
}

fn render_can_spawn(config: &OverlayConfig) -> String {
    if config.can_spawn {
        format!(
            "You may spawn subordinate agents, e.g.:\n```\noverstory sling <task> --capability builder --name <name> --parent {} --depth {}\n```",
            config.agent_name,
            config.depth + 1
        )
    } else {
        "You may not spawn subordinate agents.".to_string()
    }
}

fn render_quality_gates(capability: Capability) -> String {
    if capability.is_read_only() {
        "## Completion\n\nFile your findings via `mulch record` and `bd close` when finished. You do not open merge requests.".to_string()
    } else {
        "## Quality Gates / Completion\n\nRun `bun test` and `bun run lint` before closing the task. Close with `bd close <task> --reason <summary>`.".to_string()
    }
}

fn render_constraints(capability: Capability) -> String {
    if capability.is_read_only() {
        "## Constraints\n\nYou operate read-only: no file modification tools, no destructive Bash commands.".to_string()
    } else {
        "## Constraints\n\nYou are isolated to your own worktree. All file writes must stay under your worktree path.".to_string()
    }
}

fn render_plan_mode(plan: &Option<PlanModeConfig>) -> String {
    match plan {
        Some(p) if p.is_plan_mode => {
            "You are in **plan mode**: produce a plan document before making any changes.".to_string()
        }
        Some(_) => "You are in **execute mode**: proceed directly with implementation.".to_string(),
        None => String::new(),
    }
}

fn substitute(template: &str, config: &OverlayConfig) -> String {
    let mut rendered = template.to_string();
    let replacements: Vec<(&str, String)> = vec![
        ("{{AGENT_NAME}}", config.agent_name.clone()),
        ("{{TASK_ID}}", config.task_id.clone()),
        ("{{SPEC_PATH}}", config.spec_path.clone().unwrap_or_default()),
        ("{{BRANCH_NAME}}", config.branch_name.clone()),
        ("{{WORKTREE_PATH}}", config.worktree_path.clone()),
        (
            "{{PARENT_AGENT}}",
            config
                .parent_agent
                .clone()
                .unwrap_or_else(|| "orchestrator".to_string()),
        ),
        ("{{DEPTH}}", config.depth.to_string()),
        ("{{CAPABILITY}}", config.capability.as_str().to_string()),
        ("{{FILE_SCOPE}}", render_file_scope(&config.file_scope)),
        (
            "{{KNOWLEDGE_DOMAINS}}",
            render_knowledge_domains(&config.knowledge_domains),
        ),
        ("{{CAN_SPAWN_BLOCK}}", render_can_spawn(config)),
        (
            "{{QUALITY_GATES_OR_COMPLETION}}",
            render_quality_gates(config.capability),
        ),
        ("{{CONSTRAINTS}}", render_constraints(config.capability)),
        (
            "{{PRELOADED_EXPERTISE}}",
            config.preloaded_expertise.clone().unwrap_or_default(),
        ),
        ("{{PLAN_MODE_BLOCK}}", render_plan_mode(&config.plan_mode)),
        (
            "{{CURRENT_DATE}}",
            config.current_date.clone().unwrap_or_default(),
        ),
        (
            "{{EXISTING_PLAN_PATH}}",
            config.existing_plan_path.clone().unwrap_or_default(),
        ),
        ("{{BASE_DEFINITION}}", config.base_definition.clone()),
    ];
    for (placeholder, value) in replacements {
        rendered = rendered.replace(placeholder, &value);
    }
    rendered
}

/// Resolves `path` for canonical-root comparison: canonicalizes if it
/// exists, otherwise lexically normalizes (a fresh worktree dir may not
/// exist yet at guard-check time).
fn resolve_for_comparison(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| lexically_normalize(path))
}

fn lexically_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Renders the overlay document and writes it to
/// `<worktree>/.claude/CLAUDE.md`. Refuses (and creates nothing) when the
/// worktree path resolves to the same path as `canonical_root`.
pub fn write_overlay(
    template: &str,
    config: &OverlayConfig,
    canonical_root: &Path,
) -> Result<PathBuf, OverlayError> {
    let worktree_path = Path::new(&config.worktree_path);
    let resolved_worktree = resolve_for_comparison(worktree_path);
    let resolved_root = resolve_for_comparison(canonical_root);

    if resolved_worktree == resolved_root {
        return Err(OverlayError::CanonicalRootWrite {
            path: resolved_worktree,
        });
    }

    let rendered = substitute(template, config);

    let claude_dir = worktree_path.join(".claude");
    std::fs::create_dir_all(&claude_dir)?;
    let output_path = claude_dir.join("CLAUDE.md");
    std::fs::write(&output_path, &rendered)?;
    Ok(output_path)
}
