//! Guard synthesizer (C6).
//!
//! Emits the hook JSON document at `<worktree>/.claude/settings.local.json`.
//! The six hook classes are a typed [`HookDocument`] struct rather than a
//! loose `serde_json::Value` tree, so the contractual `PreToolUse` ordering
//! (path-boundary → danger → capability → base logging) is enforced by
//! construction: a `Vec` built in that literal order, not by convention.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::GuardError;
use crate::sessions::types::Capability;

const PREAMBLE: &str = "[ -z \"$OVERSTORY_AGENT_NAME\" ] && exit 0;";

/// One `{type: "command", command}` hook invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub command: String,
}

impl HookCommand {
    fn command(command: impl Into<String>) -> Self {
        Self {
            kind: "command".to_string(),
            command: command.into(),
        }
    }
}

/// One `{matcher, hooks: [...]}` entry within a hook class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEntry {
    pub matcher: String,
    pub hooks: Vec<HookCommand>,
}

impl HookEntry {
    fn new(matcher: impl Into<String>, command: String) -> Self {
        Self {
            matcher: matcher.into(),
            hooks: vec![HookCommand::command(command)],
        }
    }
}

/// The six hook classes, each an ordered list of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookClasses {
    #[serde(rename = "SessionStart")]
    pub session_start: Vec<HookEntry>,
    #[serde(rename = "UserPromptSubmit")]
    pub user_prompt_submit: Vec<HookEntry>,
    #[serde(rename = "PreToolUse")]
    pub pre_tool_use: Vec<HookEntry>,
    #[serde(rename = "PostToolUse")]
    pub post_tool_use: Vec<HookEntry>,
    #[serde(rename = "Stop")]
    pub stop: Vec<HookEntry>,
    #[serde(rename = "PreCompact")]
    pub pre_compact: Vec<HookEntry>,
}

/// The top-level document written to `.claude/settings.local.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookDocument {
    pub hooks: HookClasses,
}

fn path_boundary_guard(tool: &str, field: &str) -> HookEntry {
    let command = format!(
        "{PREAMBLE} input=$(cat); path=$(echo \"$input\" | jq -r '.{field} // empty'); \
         [ -z \"$path\" ] && exit 0; \
         case \"$path\" in /*) abs=\"$path\";; *) abs=\"$(pwd)/$path\";; esac; \
         case \"$abs\" in \
           \"$OVERSTORY_WORKTREE_PATH\"|\"$OVERSTORY_WORKTREE_PATH\"/*) exit 0;; \
           *) echo '{{\"decision\":\"block\",\"reason\":\"Path boundary violation: '\"$abs\"' is outside the agent worktree\"}}'; exit 0;; \
         esac"
    );
    HookEntry::new(tool, command)
}

/// Full block for a file-editing tool under a read-only capability — no
/// path is inspected, every invocation is refused outright.
fn file_write_block(tool: &str, capability: Capability) -> HookEntry {
    let reason = format!("{capability} agents cannot modify files");
    HookEntry::new(
        tool,
        format!("{PREAMBLE} echo '{{\"decision\":\"block\",\"reason\":\"{reason}\"}}'"),
    )
}

fn danger_guard(agent_name: &str) -> HookEntry {
    let command = format!(
        "{PREAMBLE} input=$(cat); cmd=$(echo \"$input\" | jq -r '.command // empty'); \
         case \"$cmd\" in \
           *'git push'*) if ! echo \"$cmd\" | grep -q 'overstory/{agent_name}/'; then \
             echo '{{\"decision\":\"block\",\"reason\":\"git push is blocked outside this agent'\"'\"'s own overstory/{agent_name}/ branch\"}}'; exit 0; fi;; \
           *'git reset --hard'*) echo '{{\"decision\":\"block\",\"reason\":\"git reset --hard is never permitted\"}}'; exit 0;; \
           *'git checkout -b'*) if ! echo \"$cmd\" | grep -q 'overstory/{agent_name}/'; then \
             echo '{{\"decision\":\"block\",\"reason\":\"git checkout -b outside overstory/{agent_name}/ is blocked\"}}'; exit 0; fi;; \
         esac; exit 0"
    );
    HookEntry::new("Bash", command)
}

const DANGEROUS_PATTERNS: &[&str] = &[
    "sed -i",
    "sed --in-place",
    "tee ",
    "vim",
    "nano",
    "mv ",
    "cp ",
    "rm ",
    "mkdir",
    "touch",
    "chmod",
    "chown",
    ">>",
    "bun install",
    "bun add",
    "npm install",
    "bun -e",
    "bun --eval",
    "node -e",
    "deno eval",
    "python -c",
    "python3 -c",
    "perl -e",
    "ruby -e",
    "git add",
    "git commit",
    "git push",
];

fn safe_prefixes_for(capability: Capability) -> Vec<&'static str> {
    let mut prefixes = vec![
        "overstory ",
        "bd ",
        "git status",
        "git log",
        "git diff",
        "mulch ",
        "bun test",
        "bun run lint",
    ];
    if capability == Capability::Coordinator {
        prefixes.push("git add");
        prefixes.push("git commit");
    }
    prefixes
}

fn bash_file_guard(capability: Capability) -> HookEntry {
    let prefixes = safe_prefixes_for(capability);
    let prefix_cases: String = prefixes
        .iter()
        .map(|p| format!("{p}*", p = shell_glob_escape(p)))
        .collect::<Vec<_>>()
        .join("|");
    let pattern_grep = DANGEROUS_PATTERNS.join("\\|");
    let reason = format!("{} agents cannot modify files", capability);
    let command = format!(
        "{PREAMBLE} input=$(cat); cmd=$(echo \"$input\" | jq -r '.command // empty'); \
         case \"$cmd\" in {prefix_cases}) exit 0;; esac; \
         if echo \"$cmd\" | grep -qE '{pattern_grep}'; then \
           echo '{{\"decision\":\"block\",\"reason\":\"{reason}\"}}'; exit 0; \
         fi; exit 0"
    );
    HookEntry::new("Bash", command)
}

fn shell_glob_escape(prefix: &str) -> String {
    prefix.to_string()
}

fn bash_path_boundary_guard() -> HookEntry {
    let pattern_grep = DANGEROUS_PATTERNS.join("\\|");
    let command = format!(
        "{PREAMBLE} input=$(cat); cmd=$(echo \"$input\" | jq -r '.command // empty'); \
         if echo \"$cmd\" | grep -qE '{pattern_grep}|install|rsync'; then \
           for tok in $cmd; do \
             case \"$tok\" in \
               /*) abs=$(echo \"$tok\" | sed 's/[\";>]*$//'); \
                 case \"$abs\" in \
                   \"$OVERSTORY_WORKTREE_PATH\"|\"$OVERSTORY_WORKTREE_PATH\"/*|/dev/*|/tmp/*) ;; \
                   *) echo '{{\"decision\":\"block\",\"reason\":\"Path boundary violation: '\"$abs\"' is outside the agent worktree\"}}'; exit 0;; \
                 esac;; \
             esac; \
           done; \
         fi; exit 0"
    );
    HookEntry::new("Bash", command)
}

/// The 10 native-team-tool blocks every capability receives, steering
/// agents away from team-tool primitives and toward `overstory sling`.
fn native_team_tool_blocks() -> Vec<HookEntry> {
    let spawn_reason = "use 'overstory sling' to create a subordinate agent instead of Task";
    let team_reason = "team primitives are not available; use the overstory CLI";
    [
        ("Task", spawn_reason),
        ("TeamCreate", team_reason),
        ("TeamDestroy", team_reason),
        ("SendMessage", team_reason),
        ("ListAgents", team_reason),
        ("TaskCreate", team_reason),
        ("TaskList", team_reason),
        ("TaskGet", team_reason),
        ("TaskUpdate", team_reason),
        ("TaskStop", team_reason),
    ]
    .iter()
    .map(|(tool, reason)| {
        HookEntry::new(
            *tool,
            format!("{PREAMBLE} echo '{{\"decision\":\"block\",\"reason\":\"{reason}\"}}'"),
        )
    })
    .collect()
}

fn base_logging_hook(phase: &str) -> HookEntry {
    HookEntry::new(
        "",
        format!("{PREAMBLE} overstory log {phase} --stdin --agent \"$OVERSTORY_AGENT_NAME\""),
    )
}

fn mail_check_hook(debounce_ms: u32) -> HookEntry {
    HookEntry::new(
        "",
        format!(
            "{PREAMBLE} overstory mail check --inject --agent \"$OVERSTORY_AGENT_NAME\" --debounce {debounce_ms}"
        ),
    )
}

fn prime_hook(agent_name: &str, compact: bool) -> HookEntry {
    let flag = if compact { " --compact" } else { "" };
    HookEntry::new(
        "",
        format!("{PREAMBLE} overstory prime --agent {agent_name}{flag}"),
    )
}

fn learn_hook() -> HookEntry {
    HookEntry::new("", format!("{PREAMBLE} mulch learn"))
}

/// Synthesizes the complete hook document for `(agent_name, capability)`.
pub fn synthesize_hooks(agent_name: &str, capability: Capability) -> HookDocument {
    let mut pre_tool_use = Vec::new();

    // Contractual order: path-boundary guards -> danger guards -> capability
    // guards -> base logging hook. Tests assert this ordering. Read-only
    // capabilities get full Write/Edit/NotebookEdit blocks here (no writes
    // permitted anywhere, not even inside the worktree); writable
    // capabilities get the worktree path-boundary guards instead.
    if capability.is_read_only() {
        pre_tool_use.push(file_write_block("Write", capability));
        pre_tool_use.push(file_write_block("Edit", capability));
        pre_tool_use.push(file_write_block("NotebookEdit", capability));
    } else {
        pre_tool_use.push(path_boundary_guard("Write", "file_path"));
        pre_tool_use.push(path_boundary_guard("Edit", "file_path"));
        pre_tool_use.push(path_boundary_guard("NotebookEdit", "notebook_path"));
    }

    pre_tool_use.push(danger_guard(agent_name));

    if capability.is_read_only() {
        pre_tool_use.push(bash_file_guard(capability));
    } else {
        pre_tool_use.push(bash_path_boundary_guard());
    }

    pre_tool_use.extend(native_team_tool_blocks());
    pre_tool_use.push(base_logging_hook("tool-start"));

    let post_tool_use = vec![
        base_logging_hook("tool-end"),
        mail_check_hook(500),
    ];

    let user_prompt_submit = vec![mail_check_hook(30_000)];

    let stop = vec![base_logging_hook("session-end"), learn_hook()];

    let session_start = vec![prime_hook(agent_name, false)];
    let pre_compact = vec![prime_hook(agent_name, true)];

    HookDocument {
        hooks: HookClasses {
            session_start,
            user_prompt_submit,
            pre_tool_use,
            post_tool_use,
            stop,
            pre_compact,
        },
    }
}

/// Writes the synthesized document to `<worktree>/.claude/settings.local.json`.
pub fn deploy_hooks(
    worktree_path: &Path,
    agent_name: &str,
    capability: Capability,
) -> Result<(), GuardError> {
    let document = synthesize_hooks(agent_name, capability);
    let claude_dir = worktree_path.join(".claude");
    std::fs::create_dir_all(&claude_dir)?;
    let path = claude_dir.join("settings.local.json");
    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(&path, json).map_err(|e| GuardError::WriteFailed {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_hook_command_begins_with_the_universal_preamble() {
        let document = synthesize_hooks("scout-1", Capability::Scout);
        let all_entries = [
            &document.hooks.session_start,
            &document.hooks.user_prompt_submit,
            &document.hooks.pre_tool_use,
            &document.hooks.post_tool_use,
            &document.hooks.stop,
            &document.hooks.pre_compact,
        ];
        for class in all_entries {
            for entry in class {
                for hook in &entry.hooks {
                    assert!(
                        hook.command.starts_with(PREAMBLE),
                        "command did not start with preamble: {}",
                        hook.command
                    );
                }
            }
        }
    }

    #[test]
    fn test_pre_tool_use_ordering_is_path_boundary_then_danger_then_capability_then_logging() {
        let document = synthesize_hooks("scout-1", Capability::Scout);
        let matchers: Vec<&str> = document
            .hooks
            .pre_tool_use
            .iter()
            .map(|e| e.matcher.as_str())
            .collect();

        let write_idx = matchers.iter().position(|&m| m == "Write").unwrap();
        let edit_idx = matchers.iter().position(|&m| m == "Edit").unwrap();
        let notebook_idx = matchers.iter().position(|&m| m == "NotebookEdit").unwrap();
        // danger guard and capability guard are both "Bash"; there are two
        // Bash entries for read-only capabilities in this grammar variant
        // (danger guard, then file guard) — assert there are at least two
        // and that the first precedes the second.
        let bash_positions: Vec<usize> = matchers
            .iter()
            .enumerate()
            .filter(|(_, &m)| m == "Bash")
            .map(|(i, _)| i)
            .collect();
        assert!(bash_positions.len() >= 2);
        let logging_idx = matchers.iter().rposition(|&m| m.is_empty()).unwrap();

        assert!(write_idx < bash_positions[0]);
        assert!(edit_idx < bash_positions[0]);
        assert!(notebook_idx < bash_positions[0]);
        assert!(bash_positions[0] < bash_positions[1]);
        assert!(*bash_positions.last().unwrap() < logging_idx);
    }

    #[test]
    fn test_read_only_capabilities_get_write_edit_notebook_blocks_with_cannot_modify_reason() {
        for capability in [
            Capability::Scout,
            Capability::Reviewer,
            Capability::Lead,
            Capability::Coordinator,
            Capability::Supervisor,
        ] {
            let document = synthesize_hooks("agent", capability);
            for tool in ["Write", "Edit", "NotebookEdit"] {
                let entry = document
                    .hooks
                    .pre_tool_use
                    .iter()
                    .find(|e| e.matcher == tool)
                    .unwrap_or_else(|| panic!("{capability} missing a {tool} block entry"));
                assert!(
                    entry.hooks[0].command.contains("cannot modify files"),
                    "{capability}'s {tool} entry did not refuse outright: {}",
                    entry.hooks[0].command
                );
                assert!(
                    !entry.hooks[0].command.contains("Path boundary violation"),
                    "{capability}'s {tool} entry should block unconditionally, not just at the worktree boundary"
                );
            }
        }
    }

    #[test]
    fn test_writable_capabilities_have_no_cannot_modify_block_but_have_path_boundary_entries() {
        for capability in [Capability::Builder, Capability::Merger] {
            let document = synthesize_hooks("agent", capability);
            let has_cannot_modify = document
                .hooks
                .pre_tool_use
                .iter()
                .any(|e| e.hooks[0].command.contains("cannot modify files"));
            assert!(!has_cannot_modify);

            let has_write_path_boundary = document
                .hooks
                .pre_tool_use
                .iter()
                .any(|e| e.matcher == "Write" && e.hooks[0].command.contains("OVERSTORY_WORKTREE_PATH"));
            assert!(has_write_path_boundary);
        }
    }

    #[test]
    fn test_deploy_hooks_writes_valid_json_document() {
        let dir = tempfile::tempdir().unwrap();
        deploy_hooks(dir.path(), "scout-1", Capability::Scout).unwrap();
        let path = dir.path().join(".claude/settings.local.json");
        let contents = std::fs::read_to_string(&path).unwrap();
        let document: HookDocument = serde_json::from_str(&contents).unwrap();
        assert!(!document.hooks.pre_tool_use.is_empty());
    }

    #[test]
    fn test_coordinator_gets_extra_safe_prefixes() {
        let prefixes = safe_prefixes_for(Capability::Coordinator);
        assert!(prefixes.contains(&"git add"));
        assert!(prefixes.contains(&"git commit"));
        let scout_prefixes = safe_prefixes_for(Capability::Scout);
        assert!(!scout_prefixes.contains(&"git add"));
    }
}
