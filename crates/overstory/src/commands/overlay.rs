//! `overstory overlay` (C7).

use std::path::{Path, PathBuf};

use tracing::info;

use overstory_core::overlay::{self, OverlayConfig};

use super::CommandResult;

pub fn run(agent: &str, config_path: &Path, template_path: &Path, canonical_root: &Path) -> CommandResult {
    info!(event = "cli.overlay.started", agent = agent);

    let config_json = std::fs::read_to_string(config_path)?;
    let config: OverlayConfig = serde_json::from_str(&config_json)?;
    let template = std::fs::read_to_string(template_path)?;

    let output_path: PathBuf = overlay::write_overlay(&template, &config, canonical_root)?;
    println!("wrote overlay to {}", output_path.display());
    Ok(())
}
