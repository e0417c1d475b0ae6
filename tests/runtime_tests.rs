//! Integration tests for the interpreter, registry and event bus.

use choreo::actor::{ActorError, ActorRef, ActorStatus, Scope};
use choreo::builder::{goto, MachineBuilder, StateBuilder, TransitionBuilder};
use choreo::bus::EventBus;
use choreo::core::{ActionError, Guard, GuardError, Invoke, Machine};
use choreo::event_enum;
use choreo::system::{InspectionKind, System, SystemConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

event_enum! {
    enum Ev {
        Start,
        Echo,
        Leave,
        Loaded(u32),
        Timeout,
        Refresh,
        Loop,
        Check,
    }
    kind: EvKind
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Counter {
    value: u32,
    loaded: Option<u32>,
}

fn recording_system() -> (System, Arc<Mutex<Vec<InspectionKind>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let system = System::new().with_inspector(move |inspection| {
        sink.lock().unwrap().push(inspection.kind.clone());
    });
    (system, seen)
}

#[test]
fn self_send_from_action_runs_after_the_batch() {
    let machine = MachineBuilder::<Counter, Ev>::new("sequencer")
        .state(
            StateBuilder::new("idle").on(goto::<Counter, Ev>(EvKind::Start, "working").action(|scope| {
                scope.context.value = scope.context.value * 10 + 1;
                scope.self_ref().send(Ev::Echo)?;
                Ok(())
            })),
        )
        .state(
            StateBuilder::new("working")
                .entry(|scope: &mut Scope<'_, Counter, Ev>| {
                    scope.context.value = scope.context.value * 10 + 3;
                    Ok(())
                })
                .on(TransitionBuilder::on(EvKind::Echo)
                    .assign(|counter: &mut Counter, _| counter.value = counter.value * 10 + 2)),
        )
        .build()
        .unwrap();
    let actor = System::new().spawn(machine, Counter::default()).unwrap();

    let snapshot = actor.send(Ev::Start).unwrap();

    // action (1), entry (3), then the echo (2): never 1, 2, 3.
    assert_eq!(snapshot.context().value, 132);
}

#[tokio::test]
async fn exiting_a_state_discards_its_slow_service() {
    let gate = Arc::new(Notify::new());
    let service_gate = Arc::clone(&gate);
    let machine = MachineBuilder::<Counter, Ev>::new("loader")
        .state(
            StateBuilder::new("loading")
                .invoke(
                    Invoke::new("load", move |_: &Counter, _: Option<&Ev>| {
                        let gate = Arc::clone(&service_gate);
                        async move {
                            gate.notified().await;
                            Ok::<u32, String>(7)
                        }
                    })
                    .on_done(Ev::Loaded),
                )
                .on(goto(EvKind::Loaded, "ready").assign(|counter: &mut Counter, event: &Ev| {
                    if let Ev::Loaded(value) = event {
                        counter.loaded = Some(*value);
                    }
                }))
                .on(goto(EvKind::Leave, "elsewhere")),
        )
        .state(StateBuilder::new("ready"))
        .state(StateBuilder::new("elsewhere"))
        .build()
        .unwrap();
    let actor = System::new().spawn(machine, Counter::default()).unwrap();
    tokio::task::yield_now().await;

    actor.send(Ev::Leave).unwrap();
    let after_exit = actor.snapshot();
    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notifications);
    let _subscription = actor.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    gate.notify_waiters();
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(Arc::ptr_eq(&after_exit, &actor.snapshot()));
    assert_eq!(actor.snapshot().context().loaded, None);
    assert_eq!(notifications.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delayed_transition_fires_unless_state_exits() {
    let machine = Arc::new(
        MachineBuilder::<Counter, Ev>::new("request")
            .state(
                StateBuilder::new("waiting")
                    .after(Duration::from_millis(20), Ev::Timeout)
                    .on(goto(EvKind::Timeout, "timedOut"))
                    .on(goto(EvKind::Loaded, "done")),
            )
            .state(StateBuilder::new("timedOut"))
            .state(StateBuilder::new("done"))
            .build()
            .unwrap(),
    );
    let system = System::new();

    let slow = system.spawn(Arc::clone(&machine), Counter::default()).unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(slow.snapshot().matches("timedOut"));

    let fast = system.spawn(machine, Counter::default()).unwrap();
    fast.send(Ev::Loaded(1)).unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(fast.snapshot().matches("done"));
}

#[tokio::test]
async fn rejection_without_mapping_is_swallowed() {
    let (system, seen) = recording_system();
    let machine = MachineBuilder::<Counter, Ev>::new("fragile")
        .state(
            StateBuilder::new("loading")
                .invoke(Invoke::new("load", |_: &Counter, _: Option<&Ev>| async {
                    Err::<u32, _>("offline".to_string())
                }))
                .on(goto(EvKind::Loaded, "ready")),
        )
        .state(StateBuilder::new("ready"))
        .build()
        .unwrap();
    let actor = system.spawn(machine, Counter::default()).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(actor.snapshot().matches("loading"));
    assert_eq!(actor.status(), ActorStatus::Running);
    assert!(seen.lock().unwrap().contains(&InspectionKind::ServiceRejected {
        state: "loading".to_string(),
        message: "offline".to_string(),
    }));
}

#[test]
fn failing_guard_counts_as_false_and_does_not_bubble() {
    let (system, seen) = recording_system();
    let machine = MachineBuilder::<Counter, Ev>::new("guarded")
        .state(
            StateBuilder::new("outer")
                .on(goto(EvKind::Check, "fallback"))
                .state(
                    StateBuilder::new("inner").on(TransitionBuilder::on(EvKind::Check)
                        .target("checked")
                        .guard(
                            Guard::fallible(|_: &Counter, _: &Ev| Err(GuardError::new("lookup failed")))
                                .named("cache_lookup"),
                        )),
                )
                .state(StateBuilder::new("checked")),
        )
        .state(StateBuilder::new("fallback"))
        .build()
        .unwrap();
    let actor = system.spawn(machine, Counter::default()).unwrap();
    let before = actor.snapshot();

    let after = actor.send(Ev::Check).unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert!(after.matches("outer.inner"));
    assert!(seen.lock().unwrap().contains(&InspectionKind::GuardFailed {
        state: "outer.inner".to_string(),
        event: "Check".to_string(),
        guard: Some("cache_lookup".to_string()),
        message: "lookup failed".to_string(),
    }));
}

#[test]
fn parallel_regions_step_together() {
    let machine = MachineBuilder::<Counter, Ev>::new("panels")
        .parallel()
        .state(
            StateBuilder::new("editor")
                .state(StateBuilder::new("clean").on(goto(EvKind::Refresh, "dirty")))
                .state(StateBuilder::new("dirty")),
        )
        .state(
            StateBuilder::new("results")
                .state(StateBuilder::new("stale").on(goto(EvKind::Refresh, "fresh")))
                .state(StateBuilder::new("fresh")),
        )
        .build()
        .unwrap();
    let actor = System::new().spawn(machine, Counter::default()).unwrap();

    let snapshot = actor.send(Ev::Refresh).unwrap();

    assert_eq!(snapshot.leaf_paths(), vec!["editor.dirty", "results.fresh"]);
}

#[test]
fn runaway_raise_loop_hits_the_microstep_limit() {
    let system = System::with_config(SystemConfig {
        max_microsteps: 16,
        ..SystemConfig::default()
    })
    .unwrap();
    let machine = MachineBuilder::<Counter, Ev>::new("spinner")
        .state(
            StateBuilder::new("spinning")
                .on(TransitionBuilder::on(EvKind::Loop).raise(Ev::Loop))
                .on(TransitionBuilder::on(EvKind::Echo)
                    .assign(|counter: &mut Counter, _| counter.value += 1)),
        )
        .build()
        .unwrap();
    let actor = system.spawn(machine, Counter::default()).unwrap();

    let error = actor.send(Ev::Loop).unwrap_err();
    assert!(matches!(error, ActorError::MicrostepLimit { limit: 16, .. }));

    let snapshot = actor.send(Ev::Echo).unwrap();
    assert_eq!(snapshot.context().value, 1);
}

#[test]
fn microstep_limit_keeps_events_already_in_the_mailbox() {
    let system = System::with_config(SystemConfig {
        max_microsteps: 8,
        ..SystemConfig::default()
    })
    .unwrap();
    let machine = MachineBuilder::<Counter, Ev>::new("spinner")
        .state(
            StateBuilder::new("spinning")
                .on(TransitionBuilder::<Counter, Ev>::on(EvKind::Start).action(|scope| {
                    scope.self_ref().send(Ev::Echo)?;
                    scope.raise(Ev::Loop);
                    Ok(())
                }))
                .on(TransitionBuilder::on(EvKind::Loop).raise(Ev::Loop))
                .on(TransitionBuilder::on(EvKind::Echo)
                    .assign(|counter: &mut Counter, _| counter.value += 1)),
        )
        .build()
        .unwrap();
    let actor = system.spawn(machine, Counter::default()).unwrap();

    let error = actor.send(Ev::Start).unwrap_err();
    assert!(matches!(error, ActorError::MicrostepLimit { limit: 8, .. }));
    assert_eq!(actor.snapshot().context().value, 0);

    // The queued echo runs before the new one.
    let snapshot = actor.send(Ev::Echo).unwrap();
    assert_eq!(snapshot.context().value, 2);
}

#[tokio::test]
async fn reentering_a_state_restarts_its_service() {
    let starts = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let service_starts = Arc::clone(&starts);
    let service_gate = Arc::clone(&gate);
    let machine = MachineBuilder::<Counter, Ev>::new("loader")
        .state(
            StateBuilder::new("loading")
                .invoke(
                    Invoke::new("load", move |_: &Counter, _: Option<&Ev>| {
                        service_starts.fetch_add(1, Ordering::SeqCst);
                        let gate = Arc::clone(&service_gate);
                        async move {
                            gate.notified().await;
                            Ok::<u32, String>(7)
                        }
                    })
                    .on_done(Ev::Loaded),
                )
                .on(goto(EvKind::Refresh, "loading"))
                .on(goto(EvKind::Loaded, "ready").assign(|counter: &mut Counter, event: &Ev| {
                    counter.value += 1;
                    if let Ev::Loaded(value) = event {
                        counter.loaded = Some(*value);
                    }
                })),
        )
        .state(StateBuilder::new("ready"))
        .build()
        .unwrap();
    let actor = System::new().spawn(machine, Counter::default()).unwrap();
    tokio::task::yield_now().await;

    actor.send(Ev::Refresh).unwrap();
    assert_eq!(starts.load(Ordering::SeqCst), 2);
    assert!(actor.snapshot().matches("loading"));

    tokio::time::sleep(Duration::from_millis(10)).await;
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let snapshot = actor.snapshot();
    assert!(snapshot.matches("ready"));
    assert_eq!(snapshot.context().value, 1);
    assert_eq!(snapshot.context().loaded, Some(7));
}

event_enum! {
    enum ProfileEvent {
        Refresh,
    }
    kind: ProfileEventKind
}

fn profile_machine() -> Machine<u32, ProfileEvent> {
    MachineBuilder::new("profile")
        .state(StateBuilder::new("shown").on(TransitionBuilder::on(ProfileEventKind::Refresh)
            .assign(|refreshes: &mut u32, _| *refreshes += 1)))
        .build()
        .unwrap()
}

#[test]
fn actors_find_each_other_through_the_registry() {
    let system = System::new();
    let profile = system.spawn(profile_machine(), 0).unwrap();
    system.register(&profile, "profile-42").unwrap();

    let editor = MachineBuilder::<Counter, Ev>::new("editor")
        .state(StateBuilder::new("editing").on(TransitionBuilder::<Counter, Ev>::on(EvKind::Refresh).action(|scope| {
            let profile = scope
                .system()
                .get::<u32, ProfileEvent>("profile-42")
                .ok_or_else(|| ActionError::msg("profile-42 is not registered"))?;
            profile.send(ProfileEvent::Refresh)?;
            Ok(())
        })))
        .build()
        .unwrap();
    let editor = system.spawn(editor, Counter::default()).unwrap();

    editor.send(Ev::Refresh).unwrap();
    assert_eq!(*profile.snapshot().context(), 1);

    system.unregister("profile-42");
    assert!(matches!(
        editor.send(Ev::Refresh),
        Err(ActorError::Action { source: ActionError::Message(_), .. })
    ));
    assert_eq!(*profile.snapshot().context(), 1);
}

event_enum! {
    enum TableEvent {
        AddPreviewTable { key: String },
    }
    kind: TableEventKind
}

event_enum! {
    enum PreviewEvent {
        Load,
    }
    kind: PreviewEventKind
}

#[derive(Clone, Default)]
struct Tables {
    previews: BTreeMap<String, ActorRef<String, PreviewEvent>>,
}

fn tables_machine() -> Machine<Tables, TableEvent> {
    let preview = Arc::new(
        MachineBuilder::<String, PreviewEvent>::new("preview")
            .state(StateBuilder::new("empty").on(goto(PreviewEventKind::Load, "loaded")))
            .state(StateBuilder::new("loaded"))
            .build()
            .unwrap(),
    );

    MachineBuilder::new("tables")
        .state(StateBuilder::new("open").on(TransitionBuilder::<Tables, TableEvent>::on(TableEventKind::AddPreviewTable).action(
            move |scope| {
                let Some(TableEvent::AddPreviewTable { key }) = scope.event().cloned() else {
                    return Ok(());
                };
                if scope.context.previews.contains_key(&key) {
                    return Ok(());
                }
                let child = scope.spawn_child(Arc::clone(&preview), key.clone())?;
                scope.context.previews.insert(key, child);
                Ok(())
            },
        )))
        .build()
        .unwrap()
}

#[test]
fn adding_the_same_preview_table_twice_reuses_the_child() {
    let system = System::new();
    let tables = system.spawn(tables_machine(), Tables::default()).unwrap();
    let add = |key: &str| TableEvent::AddPreviewTable { key: key.to_string() };

    let first = tables.send(add("orders")).unwrap();
    let second = tables.send(add("orders")).unwrap();
    let third = tables.send(add("customers")).unwrap();

    let orders = &first.context().previews["orders"];
    assert_eq!(second.context().previews.len(), 1);
    assert_eq!(&second.context().previews["orders"], orders);
    assert_eq!(third.context().previews.len(), 2);
    assert_eq!(orders.parent(), Some(tables.id()));
    assert_eq!(*orders.snapshot().context(), "orders");
}

#[test]
fn stopping_a_parent_stops_its_children() {
    let system = System::new();
    let tables = system.spawn(tables_machine(), Tables::default()).unwrap();
    let snapshot = tables
        .send(TableEvent::AddPreviewTable {
            key: "orders".to_string(),
        })
        .unwrap();
    let child = snapshot.context().previews["orders"].clone();
    child.send(PreviewEvent::Load).unwrap();

    tables.stop();

    assert_eq!(child.status(), ActorStatus::Stopped);
    assert!(child.snapshot().matches("loaded"));
}

#[derive(Clone, Debug)]
enum AppMessage {
    VisualizationDeleted { id: u32 },
    UserSignedOut,
}

#[test]
fn bus_messages_reach_subscribed_actors() {
    let system = System::new();
    let profile = system.spawn(profile_machine(), 0).unwrap();
    let bus: EventBus<AppMessage> = EventBus::new();

    let subscription = bus.forward_to(&profile, |message| match message {
        AppMessage::VisualizationDeleted { .. } => Some(ProfileEvent::Refresh),
        AppMessage::UserSignedOut => None,
    });

    bus.publish(AppMessage::VisualizationDeleted { id: 3 });
    bus.publish(AppMessage::UserSignedOut);
    bus.publish(AppMessage::VisualizationDeleted { id: 4 });
    assert_eq!(*profile.snapshot().context(), 2);

    subscription.unsubscribe();
    bus.publish(AppMessage::VisualizationDeleted { id: 5 });
    assert_eq!(*profile.snapshot().context(), 2);
}
