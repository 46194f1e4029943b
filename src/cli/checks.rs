//! List registered checks

use safechat::Engine;
use std::path::Path;

pub fn run(config: &Path) -> anyhow::Result<()> {
    let (settings, registry) = super::load(config)?;
    let engine = Engine::new(registry, &settings);
    let registry = engine.registry();

    println!("📜 Registered Checks");
    println!("────────────────────");

    for check in registry.checks() {
        let status = if check.enabled() { "✅" } else { "❌" };
        println!(
            "{} [{}] {} - bypass: {}, punish every {} ({})",
            status,
            check.priority(),
            check.name(),
            check.permission(),
            check.punishment_interval(),
            check.punishment_command()
        );
    }

    println!("\nTotal: {} checks", registry.len());
    Ok(())
}
