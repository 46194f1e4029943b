//! Check command - evaluate one message against every check

use safechat::Engine;
use std::path::Path;

pub fn run(config: &Path, player: &str, message: &str) -> anyhow::Result<()> {
    let (settings, registry) = super::load(config)?;
    let engine = Engine::new(registry, &settings);

    println!("Testing message from {}: {}", player, message);
    println!("────────────────────────────────────");

    let decision = engine.submit(player, player, message, chrono::Utc::now());
    if decision.allowed {
        println!("✅ ALLOWED");
        return Ok(());
    }

    println!("❌ BLOCKED by {}", decision.failed_checks.join(", "));
    for warning in decision.warnings() {
        println!("Warning: {}", warning);
    }
    for command in decision.punishments() {
        println!("Punishment: /{}", command);
    }
    Ok(())
}
