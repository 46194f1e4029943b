//! Repetition check: the same message sent again and again
//!
//! Compares each message with the actor's previous one after case and
//! whitespace normalization. The previous message is replaced on every
//! evaluation, failed or not.

use super::{skip, Check, CheckSettings, Priority};
use crate::config::{ConfigError, RepetitionMode, RepetitionSettings};
use crate::state::{ActorState, LastMessage};
use crate::ChatData;
use chrono::Duration;

pub const NAME: &str = "Repetition";
pub const PERMISSION: &str = "safechat.bypass.repetition";

pub struct RepetitionCheck {
    settings: CheckSettings,
    mode: RepetitionMode,
    similarity: f64,
    within: Duration,
    allowed_repeats: u32,
    max_similar_chars: usize,
}

impl RepetitionCheck {
    pub fn new(config: &RepetitionSettings) -> Result<Self, ConfigError> {
        config.check.validate(NAME)?;
        if !(config.similarity > 0.0 && config.similarity <= 1.0) {
            return Err(ConfigError::invalid(
                NAME,
                "similarity",
                format!("{} is outside (0, 1]", config.similarity),
            ));
        }
        if config.max_similar_chars == 0 {
            return Err(ConfigError::invalid(NAME, "max_similar_chars", "must be at least 1"));
        }
        if config.within_secs == 0 {
            return Err(ConfigError::invalid(NAME, "within_secs", "must be at least 1"));
        }
        let within = i64::try_from(config.within_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ConfigError::invalid(NAME, "within_secs", "out of range"))?;

        Ok(Self {
            settings: config.check.clone(),
            mode: config.mode,
            similarity: config.similarity,
            within,
            allowed_repeats: config.allowed_repeats,
            max_similar_chars: config.max_similar_chars,
        })
    }

    fn is_repeat(&self, previous: &str, current: &str) -> bool {
        match self.mode {
            RepetitionMode::Exact => previous == current,
            RepetitionMode::Similar => {
                if previous == current {
                    return true;
                }
                let a: Vec<char> = previous.chars().collect();
                let b: Vec<char> = current.chars().collect();
                let longest = a.len().max(b.len());
                if longest > self.max_similar_chars {
                    return false;
                }
                // similarity >= threshold  <=>  distance <= (1 - threshold) * longest
                let budget = ((1.0 - self.similarity) * longest as f64 + 1e-9).floor() as usize;
                bounded_levenshtein(&a, &b, budget).is_some()
            }
        }
    }
}

/// Lowercase and collapse runs of whitespace
pub fn normalize(message: &str) -> String {
    message
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edit distance if it is at most `max`, stopping as soon as it cannot be
fn bounded_levenshtein(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    Some(prev[b.len()]).filter(|d| *d <= max)
}

impl Check for RepetitionCheck {
    fn name(&self) -> &str {
        NAME
    }

    fn permission(&self) -> &str {
        self.settings.permission.as_deref().unwrap_or(PERMISSION)
    }

    fn priority(&self) -> Priority {
        Priority::Normal
    }

    fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    fn check(&self, data: &ChatData, state: &mut ActorState) -> bool {
        if skip(&self.settings, data) {
            return false;
        }

        let current = normalize(&data.message);
        let repeated = state.last_message.as_ref().is_some_and(|last| {
            data.timestamp.signed_duration_since(last.at) <= self.within
                && self.is_repeat(&last.text, &current)
        });

        if repeated {
            state.repeat_streak = state.repeat_streak.saturating_add(1);
        } else {
            state.repeat_streak = 0;
        }
        state.last_message = Some(LastMessage {
            text: current,
            at: data.timestamp,
        });

        repeated && state.repeat_streak > self.allowed_repeats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{msg_at, t0};

    fn repetition(mode: RepetitionMode, allowed_repeats: u32) -> RepetitionCheck {
        RepetitionCheck::new(&RepetitionSettings {
            mode,
            similarity: 0.8,
            within_secs: 30,
            allowed_repeats,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_identical_twice_fails_on_second() {
        let c = repetition(RepetitionMode::Exact, 0);
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("buy my stuff", 0), &mut state));
        assert!(c.check(&msg_at("Buy   my STUFF", 1000), &mut state));
        assert!(c.check(&msg_at("buy my stuff", 2000), &mut state));
    }

    #[test]
    fn test_different_message_resets_streak() {
        let c = repetition(RepetitionMode::Exact, 0);
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("hello", 0), &mut state));
        assert!(c.check(&msg_at("hello", 1000), &mut state));
        assert!(!c.check(&msg_at("how is everyone", 2000), &mut state));
        assert_eq!(state.repeat_streak, 0);
        assert!(!c.check(&msg_at("hello", 3000), &mut state));
    }

    #[test]
    fn test_outside_time_window_passes() {
        let c = repetition(RepetitionMode::Exact, 0);
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("gg", 0), &mut state));
        assert!(!c.check(&msg_at("gg", 31_000), &mut state));
    }

    #[test]
    fn test_similar_mode() {
        let c = repetition(RepetitionMode::Similar, 0);
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("join my server now", 0), &mut state));
        assert!(c.check(&msg_at("join my server now!", 1000), &mut state));
        assert!(!c.check(&msg_at("what time is it", 2000), &mut state));
    }

    #[test]
    fn test_allowed_repeats() {
        let c = repetition(RepetitionMode::Exact, 1);
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("lol", 0), &mut state));
        assert!(!c.check(&msg_at("lol", 1000), &mut state));
        assert!(c.check(&msg_at("lol", 2000), &mut state));
    }

    #[test]
    fn test_disabled_leaves_history_untouched() {
        let mut settings = RepetitionSettings::default();
        settings.check.enabled = false;
        let c = RepetitionCheck::new(&settings).unwrap();
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("spam", 0), &mut state));
        assert!(!c.check(&msg_at("spam", 10), &mut state));
        assert!(state.last_message.is_none());
        assert_eq!(state.repeat_streak, 0);
    }

    #[test]
    fn test_bounded_levenshtein() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(bounded_levenshtein(&a, &b, 3), Some(3));
        assert_eq!(bounded_levenshtein(&a, &b, 2), None);
        assert_eq!(bounded_levenshtein(&a, &a, 0), Some(0));

        let short: Vec<char> = "ab".chars().collect();
        assert_eq!(bounded_levenshtein(&short, &b, 4), None);
    }

    #[test]
    fn test_similar_mode_threshold_is_inclusive() {
        // One edit over five characters is exactly 0.8
        let c = repetition(RepetitionMode::Similar, 0);
        let mut state = ActorState::new(t0());
        assert!(!c.check(&msg_at("hello", 0), &mut state));
        assert!(c.check(&msg_at("hallo", 1000), &mut state));
    }

    #[test]
    fn test_huge_messages_compared_exactly() {
        let c = repetition(RepetitionMode::Similar, 0);
        let mut state = ActorState::new(t0());
        let wall = "spam ".repeat(4200);
        let nearly = format!("{}x", wall.trim_end());

        let started = std::time::Instant::now();
        assert!(!c.check(&msg_at(&wall, 0), &mut state));
        assert!(c.check(&msg_at(&wall, 1000), &mut state));
        // Near-duplicates beyond the limit are not scored
        assert!(!c.check(&msg_at(&nearly, 2000), &mut state));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_similarity() {
        assert!(RepetitionCheck::new(&RepetitionSettings {
            similarity: 0.0,
            ..Default::default()
        })
        .is_err());
        assert!(RepetitionCheck::new(&RepetitionSettings {
            similarity: 1.5,
            ..Default::default()
        })
        .is_err());
        assert!(RepetitionCheck::new(&RepetitionSettings {
            max_similar_chars: 0,
            ..Default::default()
        })
        .is_err());
    }
}
