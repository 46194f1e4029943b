//! Words blacklist check
//!
//! Messages are normalized before matching: lowercased, optionally with
//! leetspeak mapped back to letters (`h3ll0` -> `hello`) and punctuation
//! removed (`b.a.d` -> `bad`). Blacklisted words go through the same
//! normalization.

use super::{skip, Check, CheckSettings, Priority};
use crate::config::{BlacklistSettings, ConfigError, WordMatch};
use crate::state::ActorState;
use crate::ChatData;
use regex::Regex;

pub const NAME: &str = "Blacklist";
pub const PERMISSION: &str = "safechat.bypass.blacklist";

pub struct WordsBlacklistCheck {
    settings: CheckSettings,
    words: Vec<String>,
    match_mode: WordMatch,
    strip_punctuation: bool,
    leetspeak: bool,
    /// Alternation of all words with word boundaries (whole-word mode only)
    whole_word: Option<Regex>,
}

impl WordsBlacklistCheck {
    pub fn new(config: &BlacklistSettings) -> Result<Self, ConfigError> {
        config.check.validate(NAME)?;

        let mut words = Vec::with_capacity(config.words.len());
        for word in &config.words {
            let normalized = normalize(word, config.leetspeak, config.strip_punctuation);
            if normalized.is_empty() {
                return Err(ConfigError::invalid(
                    NAME,
                    "words",
                    format!("entry `{}` is empty after normalization", word),
                ));
            }
            words.push(normalized);
        }

        let whole_word = match config.match_mode {
            WordMatch::WholeWord if !words.is_empty() => {
                let alternation = words
                    .iter()
                    .map(|w| regex::escape(w))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"\b(?:{})\b", alternation);
                Some(Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
                    check: NAME,
                    source,
                })?)
            }
            _ => None,
        };

        Ok(Self {
            settings: config.check.clone(),
            words,
            match_mode: config.match_mode,
            strip_punctuation: config.strip_punctuation,
            leetspeak: config.leetspeak,
            whole_word,
        })
    }

    /// First blacklisted word found in `message`, if any
    pub fn find(&self, message: &str) -> Option<&str> {
        let text = normalize(message, self.leetspeak, self.strip_punctuation);
        match self.match_mode {
            WordMatch::WholeWord => {
                let found = self.whole_word.as_ref()?.find(&text)?;
                self.words
                    .iter()
                    .find(|w| w.as_str() == found.as_str())
                    .map(String::as_str)
            }
            WordMatch::Substring => self
                .words
                .iter()
                .find(|w| text.contains(w.as_str()))
                .map(String::as_str),
        }
    }
}

fn unleet(c: char) -> char {
    match c {
        '0' => 'o',
        '1' => 'i',
        '3' => 'e',
        '4' | '@' => 'a',
        '5' | '$' => 's',
        '7' => 't',
        other => other,
    }
}

/// Lowercase, then optionally undo leetspeak and drop punctuation
pub fn normalize(text: &str, leetspeak: bool, strip_punctuation: bool) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if leetspeak { unleet(c) } else { c })
        .filter(|c| !strip_punctuation || c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

impl Check for WordsBlacklistCheck {
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

    fn check(&self, data: &ChatData, _state: &mut ActorState) -> bool {
        if skip(&self.settings, data) || self.words.is_empty() {
            return false;
        }
        self.find(&data.message).is_some()
    }
}
