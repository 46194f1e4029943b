//! Per-actor message state
//!
//! Each actor gets one [`ActorState`] behind its own mutex. The engine holds
//! that mutex for the whole evaluation of a message, which serializes
//! messages from the same actor while different actors proceed in parallel.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// The previous message an actor sent, as seen by the repetition check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    /// Normalized text
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Rolling history for one actor
#[derive(Debug, Clone)]
pub struct ActorState {
    /// Timestamps inside the flood window, oldest first
    pub recent: VecDeque<DateTime<Utc>>,
    pub last_message: Option<LastMessage>,
    /// Consecutive messages similar to their predecessor
    pub repeat_streak: u32,
    pub last_seen: DateTime<Utc>,
    /// Set once the state has been removed from the store
    evicted: bool,
}

impl ActorState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            recent: VecDeque::new(),
            last_message: None,
            repeat_streak: 0,
            last_seen: now,
            evicted: false,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }
}

impl Default for ActorState {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

pub type StateHandle = Arc<Mutex<ActorState>>;

/// Concurrent store of actor states keyed by actor id
#[derive(Debug, Default)]
pub struct ActorStates {
    states: DashMap<String, StateHandle>,
}

impl ActorStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state handle for an actor, creating it on first use
    pub fn handle(&self, actor_id: &str, now: DateTime<Utc>) -> StateHandle {
        if let Some(existing) = self.states.get(actor_id) {
            return existing.value().clone();
        }
        self.states
            .entry(actor_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ActorState::new(now))))
            .value()
            .clone()
    }

    pub fn get(&self, actor_id: &str) -> Option<StateHandle> {
        self.states.get(actor_id).map(|h| h.value().clone())
    }

    /// Drop an actor's state (disconnect).
    ///
    /// Waits for any in-flight evaluation holding the actor lock, then marks
    /// the state evicted so late arrivals fetch a fresh one.
    pub fn evict(&self, actor_id: &str) -> bool {
        match self.states.remove(actor_id) {
            Some((_, handle)) => {
                handle.lock().evicted = true;
                debug!("Evicted message state for {}", actor_id);
                true
            }
            None => false,
        }
    }

    /// Drop states idle for at least `idle`. Busy states are skipped.
    pub fn evict_idle(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let before = self.states.len();
        self.states.retain(|_, handle| match handle.try_lock() {
            Some(mut state) if now.signed_duration_since(state.last_seen) >= idle => {
                state.evicted = true;
                false
            }
            _ => true,
        });
        let evicted = before.saturating_sub(self.states.len());
        if evicted > 0 {
            debug!("Evicted {} idle actor states", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_handle_is_shared_per_actor() {
        let states = ActorStates::new();
        let a = states.handle("alice", t0());
        let b = states.handle("alice", t0());
        assert!(Arc::ptr_eq(&a, &b));

        let c = states.handle("bob", t0());
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_evict_marks_old_handle() {
        let states = ActorStates::new();
        let old = states.handle("alice", t0());
        assert!(states.evict("alice"));
        assert!(old.lock().is_evicted());
        assert!(!states.evict("alice"));

        let fresh = states.handle("alice", t0());
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(!fresh.lock().is_evicted());
    }

    #[test]
    fn test_evict_idle() {
        let states = ActorStates::new();
        states.handle("idle", t0());
        let active = states.handle("active", t0());
        active.lock().touch(t0() + Duration::minutes(20));

        let evicted = states.evict_idle(t0() + Duration::minutes(30), Duration::minutes(15));
        assert_eq!(evicted, 1);
        assert!(states.get("idle").is_none());
        assert!(states.get("active").is_some());
    }

    #[test]
    fn test_evict_idle_skips_busy_state() {
        let states = ActorStates::new();
        let handle = states.handle("busy", t0());
        let _guard = handle.lock();

        let evicted = states.evict_idle(t0() + Duration::hours(2), Duration::minutes(15));
        assert_eq!(evicted, 0);
        assert!(states.get("busy").is_some());
    }
}
