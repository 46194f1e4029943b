//! Replay a chat transcript through the engine
//!
//! Each non-empty line is `name: message`. Lines are stamped `interval_ms`
//! apart starting from now, so flood and repetition windows behave as they
//! would in a live chat at that pace.

use async_trait::async_trait;
use safechat::enforcer::dispatcher::Dispatcher;
use safechat::enforcer::{CommandExecutor, Messenger};
use safechat::Engine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, warn};

pub struct Options {
    pub file: Option<PathBuf>,
    pub interval_ms: u64,
    pub bypass: Vec<String>,
    pub persist: bool,
    pub json: bool,
}

/// Punishments are only reported, never run
struct DryRunExecutor;

#[async_trait]
impl CommandExecutor for DryRunExecutor {
    async fn execute(&self, command: &str) -> anyhow::Result<()> {
        info!("🔨 Would run: /{}", command);
        Ok(())
    }
}

struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, actor_id: &str, message: &str) -> anyhow::Result<()> {
        info!("💬 To {}: {}", actor_id, message);
        Ok(())
    }
}

/// Split `name: message`; `None` for lines without a sender
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (name, message) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, message.trim_start()))
}

pub async fn run(config: &Path, options: Options) -> anyhow::Result<()> {
    let (settings, registry) = super::load(config)?;

    let mut dispatcher = Dispatcher::new(Arc::new(DryRunExecutor), Arc::new(LogMessenger));
    let mut store: Option<Arc<safechat::db::Database>> = None;
    if options.persist {
        let db = Arc::new(super::open_database(&settings)?);
        dispatcher = dispatcher.with_store(db.clone());
        store = Some(db);
    }
    let (handle, task) = dispatcher.spawn();

    let bypass: HashSet<String> = options.bypass.into_iter().collect();
    let engine = Engine::new(registry, &settings)
        .with_permissions(Arc::new(move |actor: &str, _permission: &str| {
            bypass.contains(actor)
        }))
        .with_dispatcher(handle);

    if let Some(ref db) = store {
        engine.restore(db.as_ref());
    }

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match options.file {
        Some(ref path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let summary = replay(&engine, reader, options.interval_ms, options.json).await?;

    // Closing the engine's handle lets the dispatcher drain and stop
    drop(engine);
    if let Err(e) = task.await {
        warn!("Dispatcher task failed: {}", e);
    }

    if !options.json {
        println!(
            "\n{} messages, {} blocked, {} punishments",
            summary.messages, summary.blocked, summary.punishments
        );
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub messages: usize,
    pub blocked: usize,
    pub punishments: usize,
}

async fn replay<R>(engine: &Engine, reader: R, interval_ms: u64, json: bool) -> anyhow::Result<Summary>
where
    R: AsyncBufRead + Unpin,
{
    let step = chrono::Duration::try_milliseconds(i64::try_from(interval_ms)?)
        .ok_or_else(|| anyhow::anyhow!("interval too large: {}ms", interval_ms))?;
    let mut at = chrono::Utc::now();
    let mut summary = Summary::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some((name, message)) = parse_line(&line) else {
            warn!("Skipping line without a sender: {}", line);
            continue;
        };

        let decision = engine.submit(name, name, message, at);
        at += step;

        summary.messages += 1;
        summary.punishments += decision.punishments().count();
        if !decision.allowed {
            summary.blocked += 1;
        }

        if json {
            println!("{}", serde_json::to_string(&decision)?);
        } else if decision.allowed {
            println!("✅ {}: {}", name, message);
        } else {
            println!(
                "❌ {}: {}  [{}]",
                name,
                message,
                decision.failed_checks.join(", ")
            );
        }
    }

    Ok(summary)
}
