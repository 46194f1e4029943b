//! CLI command handlers

pub mod check;
pub mod checks;
pub mod init;
pub mod logs;
pub mod simulate;
pub mod violations;

use safechat::registry::register_default_checks;
use safechat::{CheckRegistry, Settings};
use std::path::Path;
use tracing::warn;

/// Load settings and register the built-in checks.
///
/// Checks with invalid settings are reported and left out.
pub fn load(config: &Path) -> anyhow::Result<(Settings, CheckRegistry)> {
    let settings = Settings::load(Some(config))?;
    let mut registry = CheckRegistry::new();
    for error in register_default_checks(&mut registry, &settings) {
        warn!("⚠️ {}", error);
    }
    Ok((settings, registry))
}

pub fn open_database(settings: &Settings) -> anyhow::Result<safechat::db::Database> {
    safechat::db::Database::open(Path::new(&settings.database.path))
}
