//! Logs command - view the violation log

use std::path::Path;

pub fn run(config: &Path, tail: usize, prune_days: Option<u32>) -> anyhow::Result<()> {
    let (settings, _) = super::load(config)?;
    let db = super::open_database(&settings)?;

    if let Some(days) = prune_days {
        let deleted = db.cleanup(days)?;
        println!("🧹 Pruned {} entries older than {} days\n", deleted, days);
    }

    println!("📋 Recent Violations (last {} entries)", tail);
    println!("─────────────────────────────────────");

    let logs = db.recent_logs(tail)?;
    if logs.is_empty() {
        println!("\nNo violations logged yet. Enable `logging` on a check to record them.");
    }
    for entry in &logs {
        let mark = if entry.punished { "⚖️" } else { "⚠️" };
        println!(
            "{} {} [{}] {} #{}: {}",
            mark,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.check,
            entry.actor_name,
            entry.count,
            entry.message
        );
    }

    let stats = db.get_stats()?;
    println!(
        "\n{} players, {} violations counted, {} logged, {} punished",
        stats.actors, stats.violations, stats.logged, stats.punished
    );
    Ok(())
}
