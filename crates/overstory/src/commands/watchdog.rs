//! `overstory watchdog` (C8).

use std::path::Path;

use tracing::info;

use overstory_core::config::WatchdogConfig;
use overstory_core::events::EventStore;
use overstory_core::failure::KnowledgeBaseFailureRecorder;
use overstory_core::paths::OverstoryPaths;
use overstory_core::sessions::SessionStore;
use overstory_core::tmux::RealMultiplexer;
use overstory_core::watchdog::{self, WatchdogDeps};

use super::CommandResult;

pub fn run(repo_root: &Path, once: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let config = WatchdogConfig::load(&paths.watchdog_config_file())?;

    let event_store = EventStore::open(paths.events_db());
    let multiplexer = RealMultiplexer;
    let failure_recorder = KnowledgeBaseFailureRecorder;

    let deps = WatchdogDeps {
        multiplexer: &multiplexer,
        failure_recorder: &failure_recorder,
        event_store: &event_store,
        triage_enabled: config.triage.enabled,
        triage: None,
        repo_root,
    };

    if once {
        info!(event = "cli.watchdog.tick_started", once = true);
        let run_id = std::fs::read_to_string(paths.current_run_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let mut store = SessionStore::open(paths.sessions_db())?;
        let report = watchdog::run_tick(
            &mut store,
            &deps,
            &config.thresholds,
            chrono::Utc::now(),
            run_id.as_deref(),
            &paths.run_complete_notified_file(),
        );
        store.close();
        println!(
            "processed {} escalated {} terminated {}",
            report.sessions_processed,
            report.escalated.len(),
            report.terminated.len()
        );
        return Ok(());
    }

    info!(event = "cli.watchdog.loop_started", tick_interval_ms = config.thresholds.tick_interval_ms);
    loop {
        let run_id = std::fs::read_to_string(paths.current_run_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let mut store = SessionStore::open(paths.sessions_db())?;
        let report = watchdog::run_tick(
            &mut store,
            &deps,
            &config.thresholds,
            chrono::Utc::now(),
            run_id.as_deref(),
            &paths.run_complete_notified_file(),
        );
        store.close();
        if report.sessions_processed > 0 {
            info!(
                event = "cli.watchdog.tick_completed",
                processed = report.sessions_processed,
                escalated = report.escalated.len(),
                terminated = report.terminated.len()
            );
        }
        std::thread::sleep(std::time::Duration::from_millis(config.thresholds.tick_interval_ms));
    }
}
