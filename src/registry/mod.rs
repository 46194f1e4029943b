//! Ordered check registry
//!
//! Checks are registered during setup and evaluated in priority order. The
//! registry is read-only once it is handed to the engine.

use crate::checks::{
    AddressCheck, CapsCheck, Check, FloodCheck, Priority, RepetitionCheck, WordsBlacklistCheck,
};
use crate::config::{ConfigError, Settings};
use crate::state::ActorState;
use crate::ChatData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a check named `{0}` is already registered")]
    Duplicate(String),
}

/// Emitted every time a check is registered
#[derive(Clone)]
pub struct CheckRegistered {
    pub name: String,
    pub priority: Priority,
    pub check: Arc<dyn Check>,
}

impl std::fmt::Debug for CheckRegistered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRegistered")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

pub struct CheckRegistry {
    checks: Vec<Arc<dyn Check>>,
    events: broadcast::Sender<CheckRegistered>,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            checks: Vec::new(),
            events,
        }
    }

    /// Subscribe to registration events
    pub fn subscribe(&self) -> broadcast::Receiver<CheckRegistered> {
        self.events.subscribe()
    }

    /// Register a check, keeping the list sorted by priority.
    ///
    /// Checks with equal priority keep their registration order.
    pub fn register(&mut self, check: Arc<dyn Check>) -> Result<(), RegistryError> {
        let name = check.name().to_string();
        if self.get(&name).is_some() {
            return Err(RegistryError::Duplicate(name));
        }

        let priority = check.priority();
        let index = self.checks.partition_point(|c| c.priority() <= priority);
        self.checks.insert(index, check.clone());
        debug!("Registered check {} [{}] at position {}", name, priority, index);

        // No subscribers is fine
        let _ = self.events.send(CheckRegistered {
            name,
            priority,
            check,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Check>> {
        self.checks.iter().find(|c| c.name() == name)
    }

    /// Registered checks in evaluation order
    pub fn checks(&self) -> &[Arc<dyn Check>] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Run every check the actor cannot bypass.
    ///
    /// Returns `(check, failed)` for each evaluated check, in order. Bypassed
    /// checks are not evaluated and not returned. A check that panics is
    /// logged and counted as passed.
    pub fn evaluate_all<F>(
        &self,
        data: &ChatData,
        state: &mut ActorState,
        has_permission: F,
    ) -> Vec<(Arc<dyn Check>, bool)>
    where
        F: Fn(&str) -> bool,
    {
        let mut results = Vec::with_capacity(self.checks.len());

        for check in &self.checks {
            if has_permission(check.permission()) {
                debug!("{} bypasses {}", data.actor_name, check.name());
                continue;
            }

            let failed = match catch_unwind(AssertUnwindSafe(|| check.check(data, state))) {
                Ok(failed) => failed,
                Err(_) => {
                    error!(
                        "Check {} panicked on a message from {}; treating as passed",
                        check.name(),
                        data.actor_id
                    );
                    false
                }
            };
            results.push((check.clone(), failed));
        }

        results
    }
}

/// Build and register the built-in checks from settings.
///
/// A check whose settings are invalid is skipped; its error is returned so
/// the caller can surface it. The remaining checks are still registered.
pub fn register_default_checks(
    registry: &mut CheckRegistry,
    settings: &Settings,
) -> Vec<ConfigError> {
    let checks = &settings.checks;
    let built: Vec<Result<Arc<dyn Check>, ConfigError>> = vec![
        AddressCheck::new(&checks.address).map(|c| Arc::new(c) as Arc<dyn Check>),
        FloodCheck::new(&checks.flood).map(|c| Arc::new(c) as Arc<dyn Check>),
        RepetitionCheck::new(&checks.repetition).map(|c| Arc::new(c) as Arc<dyn Check>),
        WordsBlacklistCheck::new(&checks.blacklist).map(|c| Arc::new(c) as Arc<dyn Check>),
        CapsCheck::new(&checks.caps).map(|c| Arc::new(c) as Arc<dyn Check>),
    ];

    let mut errors = Vec::new();
    for result in built {
        match result {
            Ok(check) => {
                if let Err(e) = registry.register(check) {
                    warn!("⚠️ {}", e);
                }
            }
            Err(e) => {
                error!("❌ Check not registered: {}", e);
                errors.push(e);
            }
        }
    }

    info!("📜 Registered {} checks", registry.len());
    errors
}
