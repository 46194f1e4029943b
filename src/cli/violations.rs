//! Stored violation counters

use safechat::enforcer::ViolationStore;
use std::path::Path;

pub fn list(config: &Path, player: Option<&str>) -> anyhow::Result<()> {
    let (settings, _) = super::load(config)?;
    let db = super::open_database(&settings)?;

    let records = match player {
        Some(p) => db.list_violations(Some(p))?,
        None => db.load_all()?,
    };

    println!("⚖️ Violation Counters");
    println!("─────────────────────");
    if records.is_empty() {
        println!("No violations recorded.");
        return Ok(());
    }

    for record in &records {
        println!("{:<24} {:<12} {}", record.actor_id, record.check, record.count);
    }
    println!("\nTotal: {} counters", records.len());
    Ok(())
}

pub fn reset(config: &Path, player: &str, check: Option<&str>) -> anyhow::Result<()> {
    let (settings, _) = super::load(config)?;
    let db = super::open_database(&settings)?;

    let deleted = db.reset(player, check)?;
    match check {
        Some(c) => println!("Reset {} counter for {} ({} removed)", c, player, deleted),
        None => println!("Reset all counters for {} ({} removed)", player, deleted),
    }
    Ok(())
}
