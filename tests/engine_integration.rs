use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use safechat::enforcer::dispatcher::Dispatcher;
use safechat::enforcer::{CommandExecutor, Messenger};
use safechat::registry::register_default_checks;
use safechat::{CheckRegistry, Engine, Settings};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn build(settings: &Settings) -> Engine {
    let mut registry = CheckRegistry::new();
    assert!(register_default_checks(&mut registry, settings).is_empty());
    Engine::new(registry, settings)
}

#[derive(Default)]
struct Recorder {
    commands: Mutex<Vec<String>>,
    warnings: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CommandExecutor for Recorder {
    async fn execute(&self, command: &str) -> anyhow::Result<()> {
        self.commands.lock().push(command.to_string());
        Ok(())
    }
}

#[async_trait]
impl Messenger for Recorder {
    async fn send(&self, actor_id: &str, message: &str) -> anyhow::Result<()> {
        self.warnings
            .lock()
            .push((actor_id.to_string(), message.to_string()));
        Ok(())
    }
}

#[test]
fn integration_address_leaks() {
    let mut settings = Settings::default();
    settings.checks.address.allowed_domains = vec!["minecraft.net".to_string()];
    settings.checks.address.allowed_addresses = vec!["10.0.0.1".to_string()];
    let engine = build(&settings);

    let cases = [
        ("a", "join my server at play.example.org", false),
        ("b", "news on minecraft.net today", true),
        ("c", "see www.minecraft.net/download", true),
        ("d", "connect to 192.168.1.1 now", false),
        ("e", "connect to 10.0.0.1 now", true),
        ("f", "ab.cd", true),
    ];

    for (actor, text, allowed) in cases {
        let decision = engine.submit(actor, actor, text, t0());
        assert_eq!(decision.allowed, allowed, "{}", text);
        if !allowed {
            assert_eq!(decision.failed_checks, vec!["Address"]);
        }
    }
}

#[test]
fn integration_flood_then_recovery() {
    let engine = build(&Settings::default());

    for i in 0..5 {
        let text = format!("message number {}", i);
        assert!(engine
            .submit("uuid-1", "Steve", &text, t0() + Duration::milliseconds(i * 100))
            .allowed);
    }
    let decision = engine.submit("uuid-1", "Steve", "one too many", t0() + Duration::seconds(1));
    assert_eq!(decision.failed_checks, vec!["Flood"]);

    // The window has passed
    assert!(engine
        .submit("uuid-1", "Steve", "calm again", t0() + Duration::seconds(30))
        .allowed);
    assert_eq!(engine.violations("uuid-1", "Flood"), 1);
}

#[test]
fn integration_disabled_check_never_counts() {
    let mut settings = Settings::default();
    settings.checks.flood.check.enabled = false;
    let engine = build(&settings);

    for i in 0..20 {
        let text = format!("fast message {}", i);
        assert!(engine.submit("uuid-1", "Steve", &text, t0()).allowed);
    }
    assert_eq!(engine.violations("uuid-1", "Flood"), 0);
}

#[test]
fn integration_concurrent_messages_from_one_actor() {
    let engine = Arc::new(build(&Settings::default()));
    let threads = 16;

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let text = format!("message {}", i);
                engine.submit("uuid-1", "Steve", &text, t0()).allowed
            })
        })
        .collect();

    let allowed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|allowed| *allowed)
        .count();

    assert_eq!(allowed, 5);
    assert_eq!(engine.violations("uuid-1", "Flood"), threads - 5);
}

#[test]
fn integration_actors_are_independent() {
    let engine = Arc::new(build(&Settings::default()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let actor = format!("uuid-{}", i);
                (0..5)
                    .map(|n| {
                        let text = format!("hello {}", n);
                        engine.submit(&actor, &actor, &text, t0()).allowed
                    })
                    .all(|allowed| allowed)
            })
        })
        .collect();

    for h in handles {
        assert!(h.join().unwrap());
    }
    assert_eq!(engine.active_actors(), 8);
}

#[tokio::test]
async fn integration_punishment_delivered_every_nth() {
    let mut settings = Settings::default();
    settings.checks.caps.check.punish_after = 3;
    settings.checks.caps.check.punish_command = "/mute {PLAYER} for {CHECK}".to_string();
    settings.checks.caps.check.warning_messages = vec!["{PLAYER}, stop shouting".to_string()];

    let recorder = Arc::new(Recorder::default());
    let (handle, task) = Dispatcher::new(recorder.clone(), recorder.clone()).spawn();
    let engine = build(&settings).with_dispatcher(handle);

    for i in 0..7 {
        let text = format!("WHY IS NOBODY ANSWERING {}", i);
        let decision = engine.submit("uuid-1", "Steve", &text, t0() + Duration::minutes(i));
        assert!(!decision.allowed);
    }

    drop(engine);
    task.await.unwrap();

    assert_eq!(
        *recorder.commands.lock(),
        vec!["mute Steve for Caps".to_string(), "mute Steve for Caps".to_string()]
    );
    let warnings = recorder.warnings.lock();
    assert_eq!(warnings.len(), 7);
    assert!(warnings
        .iter()
        .all(|(actor, msg)| actor == "uuid-1" && msg == "Steve, stop shouting"));
}

#[tokio::test]
async fn integration_bypass_produces_no_effects() {
    let recorder = Arc::new(Recorder::default());
    let (handle, task) = Dispatcher::new(recorder.clone(), recorder.clone()).spawn();
    let engine = build(&Settings::default())
        .with_permissions(Arc::new(|actor: &str, permission: &str| {
            actor == "uuid-op" && permission.starts_with("safechat.bypass.")
        }))
        .with_dispatcher(handle);

    let decision = engine.submit("uuid-op", "Op", "EVERYONE LOOK AT evil.example.org", t0());
    assert!(decision.allowed);
    assert!(decision.effects.is_empty());

    drop(engine);
    task.await.unwrap();
    assert!(recorder.warnings.lock().is_empty());
}

#[tokio::test]
async fn integration_reaper_evicts_idle_actors() {
    let mut settings = Settings::default();
    settings.state.idle_timeout_secs = 1;
    let engine = Arc::new(build(&settings));

    engine.submit("uuid-1", "Steve", "hello", Utc::now() - Duration::minutes(5));
    assert_eq!(engine.active_actors(), 1);

    let reaper = engine.clone().spawn_reaper(std::time::Duration::from_millis(10));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    reaper.abort();

    assert_eq!(engine.active_actors(), 0);
}

#[test]
fn integration_registration_events() {
    let mut registry = CheckRegistry::new();
    let mut events = registry.subscribe();
    register_default_checks(&mut registry, &Settings::default());

    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name);
    }
    assert_eq!(names, vec!["Address", "Flood", "Repetition", "Blacklist", "Caps"]);
}
