//! Settings schema and loading
//!
//! Settings come from an optional YAML file layered under `SAFECHAT__*`
//! environment variables. Every key has a default, so an empty source set
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable prefix for overrides (`SAFECHAT__CHECKS__CAPS__MAX_RATIO=0.9`)
pub const ENV_PREFIX: &str = "SAFECHAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("[{check}] invalid `{field}`: {reason}")]
    Invalid {
        check: &'static str,
        field: &'static str,
        reason: String,
    },
    #[error("[{check}] malformed allow-list entry `{entry}`")]
    AllowList { check: &'static str, entry: String },
    #[error("[{check}] failed to compile pattern: {source}")]
    Pattern {
        check: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(check: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            check,
            field,
            reason: reason.into(),
        }
    }
}

/// Strings used when resolving templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locale {
    /// Value of the `{PREFIX}` placeholder
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_prefix() -> String {
    "&8[&cSafeChat&8]&r".to_string()
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("safechat")
        .join("safechat.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    /// Actor message state untouched for this long is evicted
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout() -> u64 {
    30 * 60
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// Which warning lines are sent when a check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WarningSelection {
    /// Every configured line, joined as one multi-line message
    All,
    /// Rotate through the lines by violation count
    #[default]
    Sequential,
    /// Pick one line at random
    Random,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarningSettings {
    #[serde(default)]
    pub selection: WarningSelection,
}

/// Settings shared by every check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Emit a structured log record for every violation
    #[serde(default)]
    pub logging: bool,
    /// Show a warning to the actor on every violation
    #[serde(default = "default_true")]
    pub warning: bool,
    #[serde(default = "default_warning_messages")]
    pub warning_messages: Vec<String>,
    /// Run the punishment command every Nth violation
    #[serde(default = "default_punish_after")]
    pub punish_after: u64,
    #[serde(default = "default_punish_command")]
    pub punish_command: String,
    /// Overrides the check's built-in bypass permission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_warning_messages() -> Vec<String> {
    vec!["{PREFIX} &7{PLAYER}, your message was blocked by the &c{CHECK}&7 filter.".to_string()]
}

fn default_punish_after() -> u64 {
    5
}

fn default_punish_command() -> String {
    "kick {PLAYER} Too many {CHECK} violations".to_string()
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            logging: false,
            warning: true,
            warning_messages: default_warning_messages(),
            punish_after: default_punish_after(),
            punish_command: default_punish_command(),
            permission: None,
        }
    }
}

impl CheckSettings {
    pub fn validate(&self, check: &'static str) -> Result<(), ConfigError> {
        if self.punish_after == 0 {
            return Err(ConfigError::invalid(check, "punish_after", "must be at least 1"));
        }
        if let Some(ref p) = self.permission {
            if p.trim().is_empty() {
                return Err(ConfigError::invalid(check, "permission", "must not be blank"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressSettings {
    #[serde(flatten)]
    pub check: CheckSettings,
    /// Domains allowed when a matched domain contains them
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,
    /// IPv4 addresses allowed on exact match
    #[serde(default)]
    pub allowed_addresses: Vec<String>,
}

fn default_allowed_domains() -> Vec<String> {
    vec!["minecraft.net".to_string(), "youtube.com".to_string()]
}

impl Default for AddressSettings {
    fn default() -> Self {
        Self {
            check: CheckSettings::default(),
            allowed_domains: default_allowed_domains(),
            allowed_addresses: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodSettings {
    #[serde(flatten)]
    pub check: CheckSettings,
    /// Messages allowed inside one rolling window
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Minimum gap between two messages; 0 disables
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

fn default_max_messages() -> usize {
    5
}

fn default_window_secs() -> u64 {
    10
}

fn default_min_interval_ms() -> u64 {
    0
}

impl Default for FloodSettings {
    fn default() -> Self {
        Self {
            check: CheckSettings::default(),
            max_messages: default_max_messages(),
            window_secs: default_window_secs(),
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepetitionMode {
    /// Normalized texts must be identical
    #[default]
    Exact,
    /// Normalized edit-distance similarity at or above the threshold
    Similar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitionSettings {
    #[serde(flatten)]
    pub check: CheckSettings,
    #[serde(default)]
    pub mode: RepetitionMode,
    /// Similarity in (0, 1] at which two messages count as repeated
    #[serde(default = "default_similarity")]
    pub similarity: f64,
    /// Only messages this close to the previous one are compared
    #[serde(default = "default_within_secs")]
    pub within_secs: u64,
    /// Consecutive repeats tolerated before failing
    #[serde(default)]
    pub allowed_repeats: u32,
    /// Longer messages are compared exactly in `similar` mode
    #[serde(default = "default_max_similar_chars")]
    pub max_similar_chars: usize,
}

fn default_similarity() -> f64 {
    0.85
}

fn default_max_similar_chars() -> usize {
    512
}

fn default_within_secs() -> u64 {
    30
}

impl Default for RepetitionSettings {
    fn default() -> Self {
        Self {
            check: CheckSettings::default(),
            mode: RepetitionMode::default(),
            similarity: default_similarity(),
            within_secs: default_within_secs(),
            allowed_repeats: 0,
            max_similar_chars: default_max_similar_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsSettings {
    #[serde(flatten)]
    pub check: CheckSettings,
    /// Uppercase-to-letters ratio above which a message fails
    #[serde(default = "default_max_ratio")]
    pub max_ratio: f64,
    /// Messages with fewer letters are exempt
    #[serde(default = "default_min_letters")]
    pub min_letters: usize,
}

fn default_max_ratio() -> f64 {
    0.8
}

fn default_min_letters() -> usize {
    6
}

impl Default for CapsSettings {
    fn default() -> Self {
        Self {
            check: CheckSettings::default(),
            max_ratio: default_max_ratio(),
            min_letters: default_min_letters(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WordMatch {
    #[default]
    WholeWord,
    Substring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistSettings {
    #[serde(flatten)]
    pub check: CheckSettings,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub match_mode: WordMatch,
    #[serde(default = "default_true")]
    pub strip_punctuation: bool,
    /// Map digits and symbols such as `3` and `$` to letters before matching
    #[serde(default = "default_true")]
    pub leetspeak: bool,
}

impl Default for BlacklistSettings {
    fn default() -> Self {
        Self {
            check: CheckSettings::default(),
            words: vec![],
            match_mode: WordMatch::default(),
            strip_punctuation: true,
            leetspeak: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksSettings {
    #[serde(default)]
    pub address: AddressSettings,
    #[serde(default)]
    pub flood: FloodSettings,
    #[serde(default)]
    pub repetition: RepetitionSettings,
    #[serde(default)]
    pub caps: CapsSettings,
    #[serde(default)]
    pub blacklist: BlacklistSettings,
}

/// Top-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub state: StateSettings,
    #[serde(default)]
    pub warnings: WarningSettings,
    #[serde(default)]
    pub checks: ChecksSettings,
}

impl Settings {
    /// Load settings from an optional YAML file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(false),
            );
        }

        let settings: Settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Global validation; per-check sections are validated when their check is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state.idle_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "state",
                "idle_timeout_secs",
                "must be at least 1",
            ));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::invalid("database", "path", "must not be blank"));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write these settings as YAML, creating parent directories
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}
