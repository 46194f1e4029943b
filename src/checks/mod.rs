//! Check definitions
//!
//! A check is one independent chat policy. Checks carry no per-actor state of
//! their own: anything temporal lives in the [`ActorState`] the engine hands
//! to [`Check::check`], so one instance serves every actor.
//!
//! Built-in checks:
//! 1. Address - leaked domains and IPv4 addresses
//! 2. Flood - too many messages in a rolling window
//! 3. Repetition - the same message over and over
//! 4. Caps - shouting
//! 5. Blacklist - forbidden words

pub mod address;
pub mod blacklist;
pub mod caps;
pub mod flood;
pub mod repetition;

pub use crate::config::CheckSettings;
pub use address::AddressCheck;
pub use blacklist::WordsBlacklistCheck;
pub use caps::CapsCheck;
pub use flood::FloodCheck;
pub use repetition::RepetitionCheck;

use crate::placeholders::{self, Context};
use crate::state::ActorState;
use crate::ChatData;
use serde::{Deserialize, Serialize};

/// Evaluation tier. Lower tiers run first; equal tiers keep registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Lowest = 4,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Highest => write!(f, "HIGHEST"),
            Priority::High => write!(f, "HIGH"),
            Priority::Normal => write!(f, "NORMAL"),
            Priority::Low => write!(f, "LOW"),
            Priority::Lowest => write!(f, "LOWEST"),
        }
    }
}

/// A pluggable chat policy
pub trait Check: Send + Sync {
    /// Stable, unique name
    fn name(&self) -> &str;

    /// Actors holding this permission skip the check entirely
    fn permission(&self) -> &str;

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Shared configuration values (enabled flag, warnings, punishment)
    fn settings(&self) -> &CheckSettings;

    /// Returns `true` if the message FAILS the check.
    ///
    /// Implementations must return `false` without touching `state` when the
    /// check is disabled or the message is blank.
    fn check(&self, data: &ChatData, state: &mut ActorState) -> bool;

    fn enabled(&self) -> bool {
        self.settings().enabled
    }

    fn warning_enabled(&self) -> bool {
        self.settings().warning
    }

    fn warning_messages(&self) -> &[String] {
        &self.settings().warning_messages
    }

    /// Punish every Nth violation
    fn punishment_interval(&self) -> u64 {
        self.settings().punish_after.max(1)
    }

    fn punishment_command(&self) -> &str {
        &self.settings().punish_command
    }

    fn logging_enabled(&self) -> bool {
        self.settings().logging
    }

    /// Resolve placeholders in a warning or command template.
    ///
    /// Override to add check-specific placeholders.
    fn replace_placeholders(&self, template: &str, ctx: &Context<'_>) -> String {
        placeholders::resolve(template, ctx)
    }
}

/// Shared precondition for every built-in check
pub(crate) fn skip(settings: &CheckSettings, data: &ChatData) -> bool {
    !settings.enabled || data.is_blank()
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::ChatData;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    pub fn msg(text: &str) -> ChatData {
        ChatData::new("uuid-1", "Steve", text, t0())
    }

    pub fn msg_at(text: &str, offset_ms: i64) -> ChatData {
        ChatData::new("uuid-1", "Steve", text, t0() + Duration::milliseconds(offset_ms))
    }
}
