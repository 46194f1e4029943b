//! Address check: leaked domains and IPv4 addresses
//!
//! Domains are allowed when the matched domain *contains* an allow-listed
//! entry (`sub.example.com` passes with `example.com` allowed). IPv4
//! addresses are allowed only on exact match.

use super::{skip, Check, CheckSettings, Priority};
use crate::config::{AddressSettings, ConfigError};
use crate::state::ActorState;
use crate::ChatData;
use regex::Regex;
use std::net::Ipv4Addr;

pub const NAME: &str = "Address";
pub const PERMISSION: &str = "safechat.bypass.address";

pub const MINIMUM_DOMAIN_CHARS: usize = 6;
pub const MINIMUM_ADDRESS_CHARS: usize = 7;

const DOMAIN_PATTERN: &str =
    r"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,24}\b";
const IPV4_PATTERN: &str =
    r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b";

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Pattern {
        check: NAME,
        source,
    })
}

pub struct AddressCheck {
    settings: CheckSettings,
    domain_regex: Regex,
    ipv4_regex: Regex,
    allowed_domains: Vec<String>,
    allowed_addresses: Vec<String>,
}

impl AddressCheck {
    pub fn new(config: &AddressSettings) -> Result<Self, ConfigError> {
        config.check.validate(NAME)?;

        let mut allowed_domains = Vec::with_capacity(config.allowed_domains.len());
        for domain in &config.allowed_domains {
            let domain = domain.trim().to_lowercase();
            if domain.is_empty() || domain.chars().any(char::is_whitespace) {
                return Err(ConfigError::AllowList {
                    check: NAME,
                    entry: domain,
                });
            }
            allowed_domains.push(domain);
        }

        let mut allowed_addresses = Vec::with_capacity(config.allowed_addresses.len());
        for address in &config.allowed_addresses {
            let address = address.trim();
            if address.parse::<Ipv4Addr>().is_err() {
                return Err(ConfigError::AllowList {
                    check: NAME,
                    entry: address.to_string(),
                });
            }
            allowed_addresses.push(address.to_string());
        }

        Ok(Self {
            settings: config.check.clone(),
            domain_regex: compile(DOMAIN_PATTERN)?,
            ipv4_regex: compile(IPV4_PATTERN)?,
            allowed_domains,
            allowed_addresses,
        })
    }

    fn leaks_domain(&self, message: &str) -> bool {
        message
            .split_whitespace()
            .filter(|token| token.chars().count() >= MINIMUM_DOMAIN_CHARS)
            .flat_map(|token| self.domain_regex.find_iter(token))
            .any(|m| {
                let found = m.as_str().to_lowercase();
                !self.allowed_domains.iter().any(|d| found.contains(d.as_str()))
            })
    }

    fn leaks_address(&self, message: &str) -> bool {
        message
            .split_whitespace()
            .filter(|token| token.chars().count() >= MINIMUM_ADDRESS_CHARS)
            .flat_map(|token| self.ipv4_regex.find_iter(token))
            .any(|m| !self.allowed_addresses.iter().any(|a| a == m.as_str()))
    }
}

impl Check for AddressCheck {
    fn name(&self) -> &str {
        NAME
    }

    fn permission(&self) -> &str {
        self.settings.permission.as_deref().unwrap_or(PERMISSION)
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    fn check(&self, data: &ChatData, _state: &mut ActorState) -> bool {
        if skip(&self.settings, data) {
            return false;
        }

        let message = data.message.as_str();
        let chars = message.chars().count();
        if chars >= MINIMUM_DOMAIN_CHARS && self.leaks_domain(message) {
            return true;
        }
        chars >= MINIMUM_ADDRESS_CHARS && self.leaks_address(message)
    }
}
