//! Effect delivery to collaborators
//!
//! The engine pushes effects into an unbounded channel and returns
//! immediately. An actor's effects are queued while its lock is held and a
//! single background task drains the channel in order, so saves for the same
//! counter arrive in count order.

use super::{CommandExecutor, Messenger, ViolationStore};
use crate::{Effect, ViolationLog};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cheap, cloneable sender side of the dispatcher
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Effect>,
}

impl DispatchHandle {
    /// Queue effects without blocking
    pub fn dispatch(&self, effects: impl IntoIterator<Item = Effect>) {
        for effect in effects {
            if let Err(e) = self.tx.send(effect) {
                warn!("Dispatcher stopped, dropping effect: {}", e.0);
            }
        }
    }
}

pub struct Dispatcher {
    executor: Arc<dyn CommandExecutor>,
    messenger: Arc<dyn Messenger>,
    store: Option<Arc<dyn ViolationStore>>,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn CommandExecutor>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            executor,
            messenger,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ViolationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Start the delivery task on the current tokio runtime.
    ///
    /// The task ends once every [`DispatchHandle`] has been dropped and the
    /// queue is drained.
    pub fn spawn(self) -> (DispatchHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Effect>();
        let task = tokio::spawn(async move {
            while let Some(effect) = rx.recv().await {
                self.deliver(effect).await;
            }
            debug!("Dispatcher queue closed");
        });
        (DispatchHandle { tx }, task)
    }

    async fn deliver(&self, effect: Effect) {
        match effect {
            Effect::Punish { check, command } => {
                info!("⚖️ Executing punishment for {}: /{}", check, command);
                if let Err(e) = self.executor.execute(&command).await {
                    error!("Failed to execute punishment command '{}': {}", command, e);
                }
            }
            Effect::Warn { actor_id, message } => {
                if let Err(e) = self.messenger.send(&actor_id, &message).await {
                    error!("Failed to warn {}: {}", actor_id, e);
                }
            }
            Effect::Persist(record) => {
                let Some(store) = self.store.clone() else {
                    return;
                };
                let key = format!("{}/{}", record.actor_id, record.check);
                match tokio::task::spawn_blocking(move || store.save(&record)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Failed to save violations for {}: {}", key, e),
                    Err(e) => error!("Violation save task for {} failed: {}", key, e),
                }
            }
            Effect::Log(entry) => {
                log_violation(&entry);
                let Some(store) = self.store.clone() else {
                    return;
                };
                match tokio::task::spawn_blocking(move || store.append_log(&entry)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Failed to append violation log: {}", e),
                    Err(e) => error!("Violation log task failed: {}", e),
                }
            }
        }
    }
}

fn log_violation(entry: &ViolationLog) {
    info!(
        target: "safechat::violations",
        actor = %entry.actor_id,
        player = %entry.actor_name,
        check = %entry.check,
        count = entry.count,
        punished = entry.punished,
        message = %entry.message,
        "violation"
    );
}
