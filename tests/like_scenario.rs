//! The like/unlike workflow: optimistic counter updates confirmed by an
//! invoked operation.

use choreo::actor::{ActorRef, Context, Snapshot};
use choreo::builder::{goto, MachineBuilder, StateBuilder};
use choreo::core::{Event, Invoke, Machine};
use choreo::event_enum;
use choreo::system::System;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

event_enum! {
    enum LikeEvent {
        Toggle,
        LikeSucceeded,
        UnlikeSucceeded,
        Failed(String),
    }
    kind: LikeEventKind
}

#[derive(Clone, Debug, PartialEq)]
struct Like {
    like_count: u32,
    initially_liked_by_me: bool,
}

/// Operation that completes each time the test releases the gate.
fn operation(id: &str, gate: &Arc<Notify>, done: LikeEvent) -> Invoke<Like, LikeEvent, (), String> {
    let gate = Arc::clone(gate);
    Invoke::new(id, move |_: &Like, _: Option<&LikeEvent>| {
        let gate = Arc::clone(&gate);
        async move {
            gate.notified().await;
            Ok(())
        }
    })
    .on_done(move |()| done.clone())
    .on_error(LikeEvent::Failed)
}

fn like_machine(gate: &Arc<Notify>) -> Machine<Like, LikeEvent> {
    MachineBuilder::new("like")
        .state(
            StateBuilder::new("liked")
                .initial_if(|like: &Like| like.initially_liked_by_me, "yes")
                .initial("no")
                .state(
                    StateBuilder::new("yes")
                        .state(StateBuilder::new("idle"))
                        .state(
                            StateBuilder::new("pendingLiking")
                                .invoke(operation("like", gate, LikeEvent::LikeSucceeded))
                                .on(goto(LikeEventKind::LikeSucceeded, "idle"))
                                .on(goto(LikeEventKind::Failed, "no.idle")
                                    .assign(|like: &mut Like, _| like.like_count -= 1)),
                        )
                        .on(goto(LikeEventKind::Toggle, "no.pendingUnliking")
                            .assign(|like: &mut Like, _| like.like_count -= 1)),
                )
                .state(
                    StateBuilder::new("no")
                        .state(StateBuilder::new("idle"))
                        .state(
                            StateBuilder::new("pendingUnliking")
                                .invoke(operation("unlike", gate, LikeEvent::UnlikeSucceeded))
                                .on(goto(LikeEventKind::UnlikeSucceeded, "idle"))
                                .on(goto(LikeEventKind::Failed, "yes.idle")
                                    .assign(|like: &mut Like, _| like.like_count += 1)),
                        )
                        .on(goto(LikeEventKind::Toggle, "yes.pendingLiking")
                            .assign(|like: &mut Like, _| like.like_count += 1)),
                ),
        )
        .build()
        .unwrap()
}

async fn settled<C: Context, E: Event>(actor: &ActorRef<C, E>, path: &str) -> Arc<Snapshot<C, E>> {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = actor.snapshot();
            if snapshot.matches(path) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("actor never reached {path}"))
}

#[tokio::test]
async fn toggling_like_updates_count_and_confirms() {
    let gate = Arc::new(Notify::new());
    let system = System::new();
    let actor = system
        .spawn(
            like_machine(&gate),
            Like {
                like_count: 5,
                initially_liked_by_me: false,
            },
        )
        .unwrap();

    let snapshot = actor.snapshot();
    assert!(snapshot.matches("liked.no"));
    assert_eq!(snapshot.context().like_count, 5);

    let snapshot = actor.send(LikeEvent::Toggle).unwrap();
    assert_eq!(snapshot.context().like_count, 6);
    assert_eq!(snapshot.leaf_paths(), vec!["liked.yes.pendingLiking"]);

    gate.notify_one();
    let snapshot = settled(&actor, "liked.yes.idle").await;
    assert_eq!(snapshot.context().like_count, 6);

    let snapshot = actor.send(LikeEvent::Toggle).unwrap();
    assert_eq!(snapshot.context().like_count, 5);
    assert_eq!(snapshot.leaf_paths(), vec!["liked.no.pendingUnliking"]);

    gate.notify_one();
    let snapshot = settled(&actor, "liked.no.idle").await;
    assert_eq!(snapshot.context().like_count, 5);
}

#[tokio::test]
async fn initial_state_follows_context() {
    let gate = Arc::new(Notify::new());
    let actor = System::new()
        .spawn(
            like_machine(&gate),
            Like {
                like_count: 1,
                initially_liked_by_me: true,
            },
        )
        .unwrap();

    assert_eq!(actor.snapshot().leaf_paths(), vec!["liked.yes.idle"]);
}

#[tokio::test]
async fn toggling_while_pending_cancels_the_operation() {
    let gate = Arc::new(Notify::new());
    let actor = System::new()
        .spawn(
            like_machine(&gate),
            Like {
                like_count: 5,
                initially_liked_by_me: false,
            },
        )
        .unwrap();

    actor.send(LikeEvent::Toggle).unwrap();
    let snapshot = actor.send(LikeEvent::Toggle).unwrap();
    assert_eq!(snapshot.leaf_paths(), vec!["liked.no.pendingUnliking"]);
    assert_eq!(snapshot.context().like_count, 5);

    // Only the unlike operation is still waiting on the gate.
    gate.notify_one();
    let snapshot = settled(&actor, "liked.no.idle").await;
    assert_eq!(snapshot.context().like_count, 5);
}
