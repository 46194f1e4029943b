//! SafeChat Library
//!
//! Chat abuse detection: pluggable checks, per-actor message state and
//! violation accounting with threshold punishments.

pub mod checks;
pub mod config;
pub mod db;
pub mod engine;
pub mod enforcer;
pub mod placeholders;
pub mod registry;
pub mod state;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use checks::{Check, CheckSettings, Priority};
pub use config::{ConfigError, Locale, Settings};
pub use engine::{Engine, PermissionProvider};
pub use registry::{CheckRegistry, RegistryError};

/// A single chat message as received from the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatData {
    /// Stable actor identifier (e.g. a player UUID)
    pub actor_id: String,
    /// Display name, used by the `{PLAYER}` placeholder
    pub actor_name: String,
    /// Raw message text
    pub message: String,
    /// When the host received the message
    pub timestamp: DateTime<Utc>,
}

impl ChatData {
    pub fn new(
        actor_id: impl Into<String>,
        actor_name: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Empty or whitespace-only messages are never evaluated
    pub fn is_blank(&self) -> bool {
        self.message.trim().is_empty()
    }
}

/// A side effect produced by a failed check, handed off to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Run a resolved punishment command with elevated privilege
    Punish { check: String, command: String },
    /// Show a resolved warning to the actor
    Warn { actor_id: String, message: String },
    /// Persist the new counter value for (actor, check)
    Persist(ViolationRecord),
    /// Emit a structured violation record
    Log(ViolationLog),
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Punish { check, command } => write!(f, "punish [{}] /{}", check, command),
            Effect::Warn { actor_id, message } => write!(f, "warn {}: {}", actor_id, message),
            Effect::Persist(r) => write!(f, "persist {}/{} = {}", r.actor_id, r.check, r.count),
            Effect::Log(l) => write!(f, "log {}/{} #{}", l.actor_name, l.check, l.count),
        }
    }
}

/// Stored violation counter for one (actor, check) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub actor_id: String,
    pub check: String,
    pub count: u64,
}

/// Structured record of a single violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationLog {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_name: String,
    pub check: String,
    pub message: String,
    /// Counter value after this violation
    pub count: u64,
    /// Whether this violation triggered the punishment command
    pub punished: bool,
}

/// Outcome of submitting one message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the message may be delivered
    pub allowed: bool,
    /// Names of the checks that failed, in evaluation order
    pub failed_checks: Vec<String>,
    /// Side effects triggered by the failures
    pub effects: Vec<Effect>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            ..Default::default()
        }
    }

    pub fn punishments(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Punish { command, .. } => Some(command.as_str()),
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Warn { message, .. } => Some(message.as_str()),
            _ => None,
        })
    }
}
