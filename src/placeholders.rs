//! Placeholder substitution for punishment commands and warnings
//!
//! Templates reference `{NAME}` tokens. Substitution is a single pass over the
//! template, so text inserted for one placeholder (e.g. a chat message that
//! itself contains `{PLAYER}`) is never expanded again.
//!
//! Command templates never receive the chat text: `{MESSAGE}` stays literal
//! in a [`Context::for_command`] context.

use crate::config::Locale;
use crate::ChatData;

pub const PLAYER: &str = "PLAYER";
pub const PREFIX: &str = "PREFIX";
pub const CHECK: &str = "CHECK";
pub const MESSAGE: &str = "MESSAGE";
pub const VIOLATIONS: &str = "VL";

/// Values available to a template
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub data: &'a ChatData,
    pub locale: &'a Locale,
    pub check: Option<&'a str>,
    pub violations: Option<u64>,
    /// Whether `{MESSAGE}` resolves to the chat text
    pub include_message: bool,
}

impl<'a> Context<'a> {
    pub fn new(data: &'a ChatData, locale: &'a Locale) -> Self {
        Self {
            data,
            locale,
            check: None,
            violations: None,
            include_message: true,
        }
    }

    pub fn with_check(mut self, check: &'a str) -> Self {
        self.check = Some(check);
        self
    }

    pub fn with_violations(mut self, count: u64) -> Self {
        self.violations = Some(count);
        self
    }

    /// Context for a console command, where the chat text is not substituted
    pub fn for_command(mut self) -> Self {
        self.include_message = false;
        self
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            PLAYER => Some(self.data.actor_name.clone()),
            PREFIX => Some(self.locale.prefix.clone()),
            MESSAGE if self.include_message => Some(self.data.message.clone()),
            CHECK => self.check.map(str::to_string),
            VIOLATIONS => self.violations.map(|v| v.to_string()),
            _ => None,
        }
    }
}

/// Resolve every known `{NAME}` token in `template`.
///
/// Unknown tokens, and known tokens without a value in `ctx`, are left as-is.
pub fn resolve(template: &str, ctx: &Context<'_>) -> String {
    if !template.contains('{') {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match ctx.lookup(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
