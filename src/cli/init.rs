//! Write a default settings file

use safechat::Settings;
use std::path::Path;

pub fn run(config: &Path, force: bool) -> anyhow::Result<()> {
    if config.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config.display()
        );
    }

    Settings::default().write(config)?;
    println!("✅ Wrote default settings to {}", config.display());
    Ok(())
}
