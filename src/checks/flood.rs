//! Flood check: message rate per actor
//!
//! Keeps a rolling window of message timestamps in the actor state. A message
//! fails when the window holds more than `max_messages` entries after it is
//! added, or when it follows the previous message faster than
//! `min_interval_ms`.

use super::{skip, Check, CheckSettings, Priority};
use crate::config::{ConfigError, FloodSettings};
use crate::state::ActorState;
use crate::ChatData;
use chrono::Duration;

pub const NAME: &str = "Flood";
pub const PERMISSION: &str = "safechat.bypass.flood";

pub struct FloodCheck {
    settings: CheckSettings,
    max_messages: usize,
    window: Duration,
    min_interval: Option<Duration>,
}

impl FloodCheck {
    pub fn new(config: &FloodSettings) -> Result<Self, ConfigError> {
        config.check.validate(NAME)?;
        if config.max_messages == 0 {
            return Err(ConfigError::invalid(NAME, "max_messages", "must be at least 1"));
        }
        if config.window_secs == 0 {
            return Err(ConfigError::invalid(NAME, "window_secs", "must be at least 1"));
        }
        let window = i64::try_from(config.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ConfigError::invalid(NAME, "window_secs", "out of range"))?;
        let min_interval = match config.min_interval_ms {
            0 => None,
            ms => Some(
                i64::try_from(ms)
                    .ok()
                    .and_then(Duration::try_milliseconds)
                    .ok_or_else(|| ConfigError::invalid(NAME, "min_interval_ms", "out of range"))?,
            ),
        };

        Ok(Self {
            settings: config.check.clone(),
            max_messages: config.max_messages,
            window,
            min_interval,
        })
    }
}

impl Check for FloodCheck {
    fn name(&self) -> &str {
        NAME
    }

    fn permission(&self) -> &str {
        self.settings.permission.as_deref().unwrap_or(PERMISSION)
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    fn check(&self, data: &ChatData, state: &mut ActorState) -> bool {
        if skip(&self.settings, data) {
            return false;
        }

        let now = data.timestamp;
        let too_fast = match (self.min_interval, state.recent.back()) {
            (Some(min), Some(&previous)) => now.signed_duration_since(previous) < min,
            _ => false,
        };

        while let Some(&oldest) = state.recent.front() {
            if now.signed_duration_since(oldest) > self.window {
                state.recent.pop_front();
            } else {
                break;
            }
        }
        state.recent.push_back(now);

        // Only the newest max+1 entries can affect the outcome
        while state.recent.len() > self.max_messages + 1 {
            state.recent.pop_front();
        }

        too_fast || state.recent.len() > self.max_messages
    }
}
