//! `overstory mail {check,send}` — stable command shapes for the mail bus.
//! The mail bus itself is an external collaborator (§1); these subcommands
//! give hook scripts something fixed to call and record the activity.

use std::path::Path;

use tracing::{info, warn};

use overstory_core::events::{Event, EventLevel, EventStore};
use overstory_core::paths::OverstoryPaths;
use overstory_core::sessions::SessionStore;

use crate::cli::MailTypeArg;

use super::CommandResult;

pub fn check(repo_root: &Path, agent: &str, inject: bool, debounce: u64) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let mail_dir = paths.mail_dir().join(agent);

    info!(event = "cli.mail.check_started", agent = agent, inject = inject, debounce = debounce);

    let mut sessions = SessionStore::open(paths.sessions_db())?;
    if let Err(err) = sessions.record_activity(agent, chrono::Utc::now(), None) {
        warn!(event = "cli.mail.activity_record_failed", agent = agent, error = %err);
    }
    sessions.close();

    let pending: Vec<_> = std::fs::read_dir(&mail_dir)
        .map(|entries| entries.filter_map(Result::ok).collect())
        .unwrap_or_default();

    if pending.is_empty() {
        println!("no mail");
        return Ok(());
    }

    for entry in &pending {
        let name = entry.file_name();
        if inject {
            println!("[MAIL] {}", name.to_string_lossy());
        } else {
            println!("{}", name.to_string_lossy());
        }
    }
    Ok(())
}

pub fn send(
    repo_root: &Path,
    to: &str,
    subject: &str,
    body: &str,
    mail_type: MailTypeArg,
    agent: &str,
    priority: Option<&str>,
) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let store = EventStore::open(paths.events_db());

    let type_str = match mail_type {
        MailTypeArg::Result => "result",
        MailTypeArg::WorkerDone => "worker_done",
        MailTypeArg::Error => "error",
    };

    info!(event = "cli.mail.send_requested", from = agent, to = to, mail_type = type_str);

    let recipient_dir = paths.mail_dir().join(to);
    std::fs::create_dir_all(&recipient_dir)?;
    let message = serde_json::json!({
        "from": agent,
        "to": to,
        "subject": subject,
        "body": body,
        "type": type_str,
        "priority": priority,
        "sent_at": chrono::Utc::now(),
    });
    let filename = format!("{}-{}.json", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0), agent);
    std::fs::write(recipient_dir.join(filename), serde_json::to_string_pretty(&message)?)?;

    let event = Event::new(agent, "mail_sent", EventLevel::Info).with_data(message);
    store.append(&event)?;
    Ok(())
}
