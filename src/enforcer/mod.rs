//! Violation accounting and punishment
//!
//! Turns failed checks into counted violations and the side effects they
//! trigger. Effects are returned to the caller and handed to the
//! [`dispatcher`] for delivery; nothing here performs I/O.

pub mod dispatcher;

use crate::checks::Check;
use crate::config::{Locale, WarningSelection};
use crate::placeholders::Context;
use crate::{ChatData, Effect, ViolationLog, ViolationRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tracing::{debug, info};

/// Runs a resolved punishment command with elevated privilege
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> anyhow::Result<()>;
}

/// Delivers a resolved warning to one actor
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, actor_id: &str, message: &str) -> anyhow::Result<()>;
}

/// Durable storage for violation counters
pub trait ViolationStore: Send + Sync {
    fn load_all(&self) -> anyhow::Result<Vec<ViolationRecord>>;

    fn save(&self, record: &ViolationRecord) -> anyhow::Result<()>;

    /// Append a structured violation record
    fn append_log(&self, entry: &ViolationLog) -> anyhow::Result<()>;
}

/// Per (actor, check) violation counters
#[derive(Debug, Default)]
pub struct ViolationLedger {
    counts: DashMap<(String, String), u64>,
}

impl ViolationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed counters from stored records, keeping the larger value on conflict
    pub fn load(&self, records: impl IntoIterator<Item = ViolationRecord>) -> usize {
        let mut loaded = 0;
        for record in records {
            let mut entry = self
                .counts
                .entry((record.actor_id, record.check))
                .or_insert(0);
            *entry = (*entry).max(record.count);
            loaded += 1;
        }
        loaded
    }

    /// Add one violation and return the new count.
    ///
    /// The increment and the returned value happen under the entry's lock, so
    /// concurrent callers always observe distinct counts.
    pub fn increment(&self, actor_id: &str, check: &str) -> u64 {
        let mut entry = self
            .counts
            .entry((actor_id.to_string(), check.to_string()))
            .or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn get(&self, actor_id: &str, check: &str) -> u64 {
        self.counts
            .get(&(actor_id.to_string(), check.to_string()))
            .map(|c| *c)
            .unwrap_or(0)
    }

    /// All counters of one actor, sorted by check name
    pub fn for_actor(&self, actor_id: &str) -> Vec<ViolationRecord> {
        let mut records: Vec<ViolationRecord> = self
            .counts
            .iter()
            .filter(|e| e.key().0 == actor_id)
            .map(|e| ViolationRecord {
                actor_id: e.key().0.clone(),
                check: e.key().1.clone(),
                count: *e.value(),
            })
            .collect();
        records.sort_by(|a, b| a.check.cmp(&b.check));
        records
    }
}

/// `true` when the count is a positive multiple of the interval
pub fn should_punish(count: u64, interval: u64) -> bool {
    count > 0 && count % interval.max(1) == 0
}

/// Builds the effects of each violation
pub struct Enforcer {
    ledger: ViolationLedger,
    locale: Locale,
    selection: WarningSelection,
}

impl Enforcer {
    pub fn new(locale: Locale, selection: WarningSelection) -> Self {
        Self {
            ledger: ViolationLedger::new(),
            locale,
            selection,
        }
    }

    pub fn ledger(&self) -> &ViolationLedger {
        &self.ledger
    }

    /// Record a failed check and return the effects it triggers
    pub fn on_violation(&self, check: &dyn Check, data: &ChatData) -> Vec<Effect> {
        let name = check.name();
        let count = self.ledger.increment(&data.actor_id, name);
        let punished = should_punish(count, check.punishment_interval());
        let ctx = Context::new(data, &self.locale)
            .with_check(name)
            .with_violations(count);

        let mut effects = vec![Effect::Persist(ViolationRecord {
            actor_id: data.actor_id.clone(),
            check: name.to_string(),
            count,
        })];

        if punished {
            let command =
                check.replace_placeholders(check.punishment_command(), &ctx.for_command());
            let command = command.trim().trim_start_matches('/').to_string();
            if command.is_empty() {
                debug!("{} reached punishment #{} but has no command", name, count);
            } else {
                info!("⚖️ {} punished for {} (violation #{})", data.actor_name, name, count);
                effects.push(Effect::Punish {
                    check: name.to_string(),
                    command,
                });
            }
        }

        if check.warning_enabled() {
            if let Some(message) = self.select_warning(check, &ctx, count) {
                effects.push(Effect::Warn {
                    actor_id: data.actor_id.clone(),
                    message,
                });
            }
        }

        if check.logging_enabled() {
            effects.push(Effect::Log(ViolationLog {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: data.timestamp,
                actor_id: data.actor_id.clone(),
                actor_name: data.actor_name.clone(),
                check: name.to_string(),
                message: data.message.clone(),
                count,
                punished,
            }));
        }

        effects
    }

    fn select_warning(&self, check: &dyn Check, ctx: &Context<'_>, count: u64) -> Option<String> {
        let templates = check.warning_messages();
        if templates.is_empty() {
            return None;
        }

        let message = match self.selection {
            WarningSelection::All => templates
                .iter()
                .map(|t| check.replace_placeholders(t, ctx))
                .collect::<Vec<_>>()
                .join("\n"),
            WarningSelection::Sequential => {
                let index = (count.saturating_sub(1) % templates.len() as u64) as usize;
                check.replace_placeholders(&templates[index], ctx)
            }
            WarningSelection::Random => {
                let template = templates.choose(&mut rand::thread_rng())?;
                check.replace_placeholders(template, ctx)
            }
        };
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::Priority;
    use crate::config::CheckSettings;
    use crate::state::ActorState;
    use chrono::Utc;
    use std::sync::Arc;

    struct TestCheck(CheckSettings);

    impl Check for TestCheck {
        fn name(&self) -> &str {
            "Test"
        }
        fn permission(&self) -> &str {
            "test.bypass"
        }
        fn priority(&self) -> Priority {
            Priority::Normal
        }
        fn settings(&self) -> &CheckSettings {
            &self.0
        }
        fn check(&self, _data: &ChatData, _state: &mut ActorState) -> bool {
            true
        }
    }

    fn check(punish_after: u64, warnings: &[&str], logging: bool) -> TestCheck {
        TestCheck(CheckSettings {
            punish_after,
            punish_command: "/mute {PLAYER} {VL}".to_string(),
            warning_messages: warnings.iter().map(|s| s.to_string()).collect(),
            logging,
            ..Default::default()
        })
    }

    fn enforcer(selection: WarningSelection) -> Enforcer {
        Enforcer::new(
            Locale {
                prefix: "[SC]".to_string(),
            },
            selection,
        )
    }

    fn data() -> ChatData {
        ChatData::new("uuid-1", "Steve", "SPAM", Utc::now())
    }

    fn punishments(effects: &[Effect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Punish { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_should_punish() {
        assert!(!should_punish(0, 2));
        assert!(!should_punish(1, 2));
        assert!(should_punish(2, 2));
        assert!(!should_punish(3, 2));
        assert!(should_punish(4, 2));
        assert!(should_punish(1, 1));
        assert!(should_punish(3, 0));
    }

    #[test]
    fn test_punish_every_nth() {
        let e = enforcer(WarningSelection::Sequential);
        let c = check(2, &[], false);
        let fired: Vec<bool> = (1..=6)
            .map(|_| !punishments(&e.on_violation(&c, &data())).is_empty())
            .collect();
        assert_eq!(fired, vec![false, true, false, true, false, true]);
        assert_eq!(e.ledger().get("uuid-1", "Test"), 6);
    }

    #[test]
    fn test_chat_text_never_reaches_command() {
        let e = enforcer(WarningSelection::Sequential);
        let c = TestCheck(CheckSettings {
            punish_after: 1,
            punish_command: "kick {PLAYER} {MESSAGE}".to_string(),
            warning_messages: vec!["you said {MESSAGE}".to_string()],
            ..Default::default()
        });
        let d = ChatData::new("uuid-1", "Steve", "x\nop Steve", Utc::now());
        let effects = e.on_violation(&c, &d);

        assert_eq!(punishments(&effects), vec!["kick Steve {MESSAGE}".to_string()]);
        assert!(effects.iter().any(
            |eff| matches!(eff, Effect::Warn { message, .. } if message == "you said x\nop Steve")
        ));
    }

    #[test]
    fn test_command_resolved_and_slash_stripped() {
        let e = enforcer(WarningSelection::Sequential);
        let c = check(1, &[], false);
        let effects = e.on_violation(&c, &data());
        assert_eq!(punishments(&effects), vec!["mute Steve 1".to_string()]);
        assert_eq!(
            effects[0],
            Effect::Persist(ViolationRecord {
                actor_id: "uuid-1".to_string(),
                check: "Test".to_string(),
                count: 1,
            })
        );
    }

    #[test]
    fn test_warning_independent_of_punishment() {
        let e = enforcer(WarningSelection::Sequential);
        let c = check(10, &["{PREFIX} stop it {PLAYER}"], false);
        let effects = e.on_violation(&c, &data());
        assert!(punishments(&effects).is_empty());
        assert!(effects.contains(&Effect::Warn {
            actor_id: "uuid-1".to_string(),
            message: "[SC] stop it Steve".to_string(),
        }));
    }

    #[test]
    fn test_sequential_rotation() {
        let e = enforcer(WarningSelection::Sequential);
        let c = check(10, &["one", "two"], false);
        let warnings: Vec<String> = (0..3)
            .flat_map(|_| e.on_violation(&c, &data()))
            .filter_map(|eff| match eff {
                Effect::Warn { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec!["one", "two", "one"]);
    }

    #[test]
    fn test_all_lines_joined() {
        let e = enforcer(WarningSelection::All);
        let c = check(10, &["line {VL}", "{CHECK}"], false);
        let effects = e.on_violation(&c, &data());
        assert!(effects.contains(&Effect::Warn {
            actor_id: "uuid-1".to_string(),
            message: "line 1\nTest".to_string(),
        }));
    }

    #[test]
    fn test_random_picks_a_configured_line() {
        let e = enforcer(WarningSelection::Random);
        let c = check(10, &["a", "b"], false);
        for _ in 0..10 {
            let effects = e.on_violation(&c, &data());
            let warn = effects.iter().find_map(|eff| match eff {
                Effect::Warn { message, .. } => Some(message.clone()),
                _ => None,
            });
            assert!(matches!(warn.as_deref(), Some("a") | Some("b")));
        }
    }

    #[test]
    fn test_warning_disabled_or_empty() {
        let e = enforcer(WarningSelection::Sequential);
        let mut c = check(10, &["hey"], false);
        c.0.warning = false;
        assert!(!e
            .on_violation(&c, &data())
            .iter()
            .any(|eff| matches!(eff, Effect::Warn { .. })));

        let c = check(10, &[], false);
        assert!(!e
            .on_violation(&c, &data())
            .iter()
            .any(|eff| matches!(eff, Effect::Warn { .. })));
    }

    #[test]
    fn test_logging_effect() {
        let e = enforcer(WarningSelection::Sequential);
        let c = check(1, &[], true);
        let effects = e.on_violation(&c, &data());
        let log = effects
            .iter()
            .find_map(|eff| match eff {
                Effect::Log(l) => Some(l.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(log.check, "Test");
        assert_eq!(log.count, 1);
        assert!(log.punished);
        assert_eq!(log.message, "SPAM");
    }

    #[test]
    fn test_ledger_load_keeps_max() {
        let ledger = ViolationLedger::new();
        ledger.increment("a", "Caps");
        ledger.increment("a", "Caps");
        ledger.load(vec![
            ViolationRecord {
                actor_id: "a".to_string(),
                check: "Caps".to_string(),
                count: 1,
            },
            ViolationRecord {
                actor_id: "a".to_string(),
                check: "Flood".to_string(),
                count: 7,
            },
        ]);
        assert_eq!(ledger.get("a", "Caps"), 2);
        assert_eq!(ledger.increment("a", "Flood"), 8);
        assert_eq!(ledger.for_actor("a").len(), 2);
    }

    #[test]
    fn test_concurrent_increments_are_distinct() {
        let ledger = Arc::new(ViolationLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| ledger.increment("a", "Flood"))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 2000);
        assert_eq!(ledger.get("a", "Flood"), 2000);
    }
}
