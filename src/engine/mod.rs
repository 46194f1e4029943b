//! Message evaluation entry point
//!
//! The [`Engine`] ties the registry, per-actor state and violation accounting
//! together. `submit` is synchronous and bounded: effects are returned in the
//! [`Decision`] and, when a dispatcher is attached, queued for delivery
//! without waiting for it.

use crate::config::Settings;
use crate::enforcer::dispatcher::DispatchHandle;
use crate::enforcer::{Enforcer, ViolationStore};
use crate::registry::CheckRegistry;
use crate::state::{ActorState, ActorStates, StateHandle};
use crate::{ChatData, Decision, ViolationRecord};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Answers whether an actor holds a permission
pub trait PermissionProvider: Send + Sync {
    fn has_permission(&self, actor_id: &str, permission: &str) -> bool;
}

/// Nobody bypasses anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionProvider for NoPermissions {
    fn has_permission(&self, _actor_id: &str, _permission: &str) -> bool {
        false
    }
}

impl<F> PermissionProvider for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn has_permission(&self, actor_id: &str, permission: &str) -> bool {
        self(actor_id, permission)
    }
}

pub struct Engine {
    registry: CheckRegistry,
    states: ActorStates,
    enforcer: Enforcer,
    permissions: Arc<dyn PermissionProvider>,
    dispatch: Option<DispatchHandle>,
    idle_timeout: Duration,
}

impl Engine {
    pub fn new(registry: CheckRegistry, settings: &Settings) -> Self {
        let idle_secs = i64::try_from(settings.state.idle_timeout_secs).unwrap_or(i64::MAX);
        Self {
            registry,
            states: ActorStates::new(),
            enforcer: Enforcer::new(settings.locale.clone(), settings.warnings.selection),
            permissions: Arc::new(NoPermissions),
            dispatch: None,
            idle_timeout: Duration::try_seconds(idle_secs).unwrap_or(Duration::MAX),
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionProvider>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_dispatcher(mut self, dispatch: DispatchHandle) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn active_actors(&self) -> usize {
        self.states.len()
    }

    /// Seed violation counters from stored records
    pub fn load_violations(&self, records: Vec<ViolationRecord>) -> usize {
        self.enforcer.ledger().load(records)
    }

    /// Seed violation counters from a store.
    ///
    /// A failing store is logged; counting continues in memory.
    pub fn restore(&self, store: &dyn ViolationStore) -> usize {
        match store.load_all() {
            Ok(records) => {
                let loaded = self.load_violations(records);
                info!("📂 Restored {} violation counters", loaded);
                loaded
            }
            Err(e) => {
                error!("Failed to load violation counters, starting empty: {}", e);
                0
            }
        }
    }

    pub fn violations(&self, actor_id: &str, check: &str) -> u64 {
        self.enforcer.ledger().get(actor_id, check)
    }

    pub fn violations_for(&self, actor_id: &str) -> Vec<ViolationRecord> {
        self.enforcer.ledger().for_actor(actor_id)
    }

    /// Evaluate one incoming message
    pub fn submit(
        &self,
        actor_id: &str,
        actor_name: &str,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        self.evaluate(&ChatData::new(actor_id, actor_name, message, timestamp))
    }

    pub fn evaluate(&self, data: &ChatData) -> Decision {
        if data.is_blank() {
            return Decision::allow();
        }

        let handle = self.states.handle(&data.actor_id, data.timestamp);
        self.evaluate_in(data, handle)
    }

    fn evaluate_in(&self, data: &ChatData, mut handle: StateHandle) -> Decision {
        loop {
            let mut state = handle.lock();
            if !state.is_evicted() {
                let decision = self.evaluate_locked(data, &mut state);
                // Queued under the actor lock: one actor's effects reach the
                // dispatcher in evaluation order
                self.queue_effects(&decision);
                return decision;
            }
            drop(state);
            // Lost a race with eviction; pick up the fresh state
            handle = self.states.handle(&data.actor_id, data.timestamp);
        }
    }

    fn queue_effects(&self, decision: &Decision) {
        if let Some(ref dispatch) = self.dispatch {
            if !decision.effects.is_empty() {
                dispatch.dispatch(decision.effects.iter().cloned());
            }
        }
    }

    fn evaluate_locked(&self, data: &ChatData, state: &mut ActorState) -> Decision {
        state.touch(data.timestamp);

        let results = self.registry.evaluate_all(data, state, |permission| {
            self.permissions.has_permission(&data.actor_id, permission)
        });

        let mut decision = Decision::allow();
        for (check, failed) in results {
            if !failed {
                continue;
            }
            debug!("🚫 {} failed {}", data.actor_name, check.name());
            decision.failed_checks.push(check.name().to_string());
            decision
                .effects
                .extend(self.enforcer.on_violation(check.as_ref(), data));
        }
        decision.allowed = decision.failed_checks.is_empty();
        decision
    }

    /// Forget an actor's message state (disconnect). Counters are kept.
    pub fn disconnect(&self, actor_id: &str) -> bool {
        self.states.evict(actor_id)
    }

    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        self.states.evict_idle(now, self.idle_timeout)
    }

    /// Periodically evict idle actor state on the current tokio runtime
    pub fn spawn_reaper(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(Utc::now());
                if evicted > 0 {
                    debug!("Reaper evicted {} idle actors", evicted);
                }
            }
        })
    }
}
