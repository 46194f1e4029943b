//! Caps check: too many uppercase letters

use super::{skip, Check, CheckSettings, Priority};
use crate::config::{CapsSettings, ConfigError};
use crate::state::ActorState;
use crate::ChatData;

pub const NAME: &str = "Caps";
pub const PERMISSION: &str = "safechat.bypass.caps";

pub struct CapsCheck {
    settings: CheckSettings,
    max_ratio: f64,
    min_letters: usize,
}

impl CapsCheck {
    pub fn new(config: &CapsSettings) -> Result<Self, ConfigError> {
        config.check.validate(NAME)?;
        if !(config.max_ratio > 0.0 && config.max_ratio <= 1.0) {
            return Err(ConfigError::invalid(
                NAME,
                "max_ratio",
                format!("{} is outside (0, 1]", config.max_ratio),
            ));
        }

        Ok(Self {
            settings: config.check.clone(),
            max_ratio: config.max_ratio,
            min_letters: config.min_letters,
        })
    }
}

/// Count (uppercase, total) letters, ignoring everything that is not a letter
pub fn letter_counts(message: &str) -> (usize, usize) {
    message
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0, 0), |(upper, total), c| {
            (upper + usize::from(c.is_uppercase()), total + 1)
        })
}

impl Check for CapsCheck {
    fn name(&self) -> &str {
        NAME
    }

    fn permission(&self) -> &str {
        self.settings.permission.as_deref().unwrap_or(PERMISSION)
    }

    fn priority(&self) -> Priority {
        Priority::Lowest
    }

    fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    fn check(&self, data: &ChatData, _state: &mut ActorState) -> bool {
        if skip(&self.settings, data) {
            return false;
        }

        let (upper, total) = letter_counts(&data.message);
        if total == 0 || total < self.min_letters {
            return false;
        }
        upper as f64 / total as f64 > self.max_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{msg, t0};

    fn caps(max_ratio: f64, min_letters: usize) -> CapsCheck {
        CapsCheck::new(&CapsSettings {
            max_ratio,
            min_letters,
            ..Default::default()
        })
        .unwrap()
    }

    fn fails(c: &CapsCheck, text: &str) -> bool {
        c.check(&msg(text), &mut ActorState::new(t0()))
    }

    #[test]
    fn test_ninety_percent_fails_at_eighty() {
        let c = caps(0.8, 5);
        // 9 of 10 letters uppercase
        assert!(fails(&c, "HELLO THERe"));
        assert!(!fails(&c, "Hello there"));
    }

    #[test]
    fn test_short_message_exempt() {
        let c = caps(0.8, 5);
        assert!(!fails(&c, "GG WP"));
        assert!(!fails(&c, "LOL!!!"));
        assert!(fails(&c, "LOLOL!!!"));
    }

    #[test]
    fn test_non_letters_ignored() {
        let c = caps(0.5, 4);
        assert!(!fails(&c, "12345 !!! ???"));
        assert!(fails(&c, "WHYY :( 123"));
    }

    #[test]
    fn test_letter_counts() {
        assert_eq!(letter_counts("AbC 1!"), (2, 3));
        assert_eq!(letter_counts("ÄÖü"), (2, 3));
    }

    #[test]
    fn test_invalid_ratio() {
        assert!(CapsCheck::new(&CapsSettings {
            max_ratio: 0.0,
            ..Default::default()
        })
        .is_err());
    }
}
