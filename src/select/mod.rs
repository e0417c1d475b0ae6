//! Derived values from snapshots, with referential stability.
//!
//! A [`Selector`] maps a snapshot to an `Arc`'d value. Selectors built with
//! [`memo`] return the *same* `Arc` whenever the derived value did not
//! change, so consumers can skip work with [`Arc::ptr_eq`] instead of deep
//! comparisons. [`subscribe_selected`] builds on that to notify only on
//! actual changes.
//!
//! ```rust
//! use choreo::builder::{MachineBuilder, StateBuilder, TransitionBuilder};
//! use choreo::event_enum;
//! use choreo::select::{select_context, Selector};
//! use choreo::system::System;
//! use std::sync::Arc;
//!
//! event_enum! {
//!     enum Ev {
//!         Touch,
//!         Add(u32),
//!     }
//!     kind: EvKind
//! }
//!
//! #[derive(Clone)]
//! struct Ctx {
//!     total: u32,
//!     touches: u32,
//! }
//!
//! let machine = MachineBuilder::<Ctx, Ev>::new("sum")
//!     .state(
//!         StateBuilder::new("open")
//!             .on(TransitionBuilder::on(EvKind::Touch).assign(|ctx: &mut Ctx, _| ctx.touches += 1))
//!             .on(TransitionBuilder::<Ctx, Ev>::on(EvKind::Add).assign(|ctx: &mut Ctx, ev| {
//!                 if let Ev::Add(n) = ev {
//!                     ctx.total += n;
//!                 }
//!             })),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let actor = System::new().spawn(machine, Ctx { total: 0, touches: 0 }).unwrap();
//! let total = select_context(|ctx: &Ctx| ctx.total);
//!
//! let before = total.select(&actor.snapshot());
//! let after = total.select(&actor.send(Ev::Touch).unwrap());
//! assert!(Arc::ptr_eq(&before, &after));
//!
//! let added = total.select(&actor.send(Ev::Add(2)).unwrap());
//! assert_eq!(*added, 2);
//! ```

use crate::actor::{ActorRef, Context, Snapshot};
use crate::core::Event;
use crate::subscription::Subscription;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Pure projection of a snapshot.
pub trait Selector<C, E: Event>: Send + Sync {
    type Output: Send + Sync + 'static;

    fn select(&self, snapshot: &Arc<Snapshot<C, E>>) -> Arc<Self::Output>;
}

struct Cached<C, E: Event, T> {
    snapshot: Weak<Snapshot<C, E>>,
    value: Arc<T>,
}

/// Memoizing selector created by [`memo`].
///
/// The same snapshot is never computed twice in a row, and a recomputed
/// value equal to the previous one is returned as the previous `Arc`.
pub struct Memo<C, E: Event, T, F> {
    compute: F,
    cache: Mutex<Option<Cached<C, E, T>>>,
}

/// Memoize `compute`.
pub fn memo<C, E, T, F>(compute: F) -> Memo<C, E, T, F>
where
    E: Event,
    T: PartialEq + Send + Sync + 'static,
    F: Fn(&Snapshot<C, E>) -> T + Send + Sync,
{
    Memo {
        compute,
        cache: Mutex::new(None),
    }
}

impl<C, E, T, F> Selector<C, E> for Memo<C, E, T, F>
where
    C: Send + Sync,
    E: Event,
    T: PartialEq + Send + Sync + 'static,
    F: Fn(&Snapshot<C, E>) -> T + Send + Sync,
{
    type Output = T;

    fn select(&self, snapshot: &Arc<Snapshot<C, E>>) -> Arc<T> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            // The weak handle keeps the allocation, so the address cannot
            // have been reused by another snapshot.
            if std::ptr::eq(cached.snapshot.as_ptr(), Arc::as_ptr(snapshot)) {
                return Arc::clone(&cached.value);
            }
        }

        let computed = (self.compute)(snapshot);
        let value = match cache.as_ref() {
            Some(cached) if *cached.value == computed => Arc::clone(&cached.value),
            _ => Arc::new(computed),
        };
        *cache = Some(Cached {
            snapshot: Arc::downgrade(snapshot),
            value: Arc::clone(&value),
        });
        value
    }
}

/// Memoized projection of the context.
pub fn select_context<C, E, T, F>(project: F) -> Memo<C, E, T, impl Fn(&Snapshot<C, E>) -> T + Send + Sync>
where
    E: Event,
    T: PartialEq + Send + Sync + 'static,
    F: Fn(&C) -> T + Send + Sync,
{
    memo(move |snapshot: &Snapshot<C, E>| project(snapshot.context()))
}

/// Whether the state at `path` is active.
pub fn matches<C, E>(path: &str) -> Memo<C, E, bool, impl Fn(&Snapshot<C, E>) -> bool + Send + Sync>
where
    E: Event,
{
    let path = path.to_string();
    memo(move |snapshot: &Snapshot<C, E>| snapshot.matches(&path))
}

/// Current selected value plus a subscription calling `on_change` each time
/// the selector yields a different `Arc`.
pub fn subscribe_selected<C, E, S, F>(
    actor: &ActorRef<C, E>,
    selector: S,
    on_change: F,
) -> (Arc<S::Output>, Subscription)
where
    C: Context,
    E: Event,
    S: Selector<C, E> + 'static,
    F: Fn(&Arc<S::Output>) + Send + Sync + 'static,
{
    let current = selector.select(&actor.snapshot());
    let last = Mutex::new(Arc::clone(&current));
    let subscription = actor.subscribe(move |snapshot| {
        let next = selector.select(snapshot);
        let changed = {
            let mut last = last.lock();
            if Arc::ptr_eq(&last, &next) {
                false
            } else {
                *last = Arc::clone(&next);
                true
            }
        };
        if changed {
            on_change(&next);
        }
    });
    (current, subscription)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{goto, MachineBuilder, StateBuilder, TransitionBuilder};
    use crate::core::Machine;
    use crate::system::System;
    use std::sync::atomic::{AtomicUsize, Ordering};

    crate::event_enum! {
        enum Ev {
            Toggle,
            Rename(String),
        }
        kind: EvKind
    }

    #[derive(Clone, Debug, Default)]
    struct Ctx {
        name: String,
        toggles: u32,
    }

    fn machine() -> Machine<Ctx, Ev> {
        let rename = || {
            TransitionBuilder::<Ctx, Ev>::on(EvKind::Rename).assign(|ctx: &mut Ctx, ev| {
                if let Ev::Rename(name) = ev {
                    ctx.name = name.clone();
                }
            })
        };
        MachineBuilder::new("switch")
            .state(
                StateBuilder::new("off")
                    .on(goto(EvKind::Toggle, "on").assign(|ctx: &mut Ctx, _| ctx.toggles += 1))
                    .on(rename()),
            )
            .state(
                StateBuilder::new("on")
                    .on(goto(EvKind::Toggle, "off").assign(|ctx: &mut Ctx, _| ctx.toggles += 1))
                    .on(rename()),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn memo_skips_recomputation_for_same_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let selector = memo(move |snapshot: &Snapshot<Ctx, Ev>| {
            counter.fetch_add(1, Ordering::SeqCst);
            snapshot.context().toggles
        });
        let actor = System::new().spawn(machine(), Ctx::default()).unwrap();
        let snapshot = actor.snapshot();

        selector.select(&snapshot);
        selector.select(&snapshot);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unchanged_value_keeps_reference() {
        let actor = System::new().spawn(machine(), Ctx::default()).unwrap();
        let name = select_context(|ctx: &Ctx| ctx.name.clone());

        let first = name.select(&actor.snapshot());
        let second = name.select(&actor.send(Ev::Toggle).unwrap());
        assert!(Arc::ptr_eq(&first, &second));

        let third = name.select(&actor.send(Ev::Rename("lamp".to_string())).unwrap());
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.as_str(), "lamp");
    }

    #[test]
    fn matches_selector_tracks_state() {
        let actor = System::new().spawn(machine(), Ctx::default()).unwrap();
        let on = matches::<Ctx, Ev>("on");

        assert!(!*on.select(&actor.snapshot()));
        assert!(*on.select(&actor.send(Ev::Toggle).unwrap()));
    }

    #[test]
    fn subscribe_selected_fires_only_on_change() {
        let actor = System::new().spawn(machine(), Ctx::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let (initial, subscription) = subscribe_selected(
            &actor,
            select_context(|ctx: &Ctx| ctx.name.clone()),
            move |name: &Arc<String>| sink.lock().push(name.as_str().to_string()),
        );
        assert_eq!(initial.as_str(), "");

        actor.send(Ev::Toggle).unwrap();
        actor.send(Ev::Rename("desk".to_string())).unwrap();
        actor.send(Ev::Toggle).unwrap();
        actor.send(Ev::Rename("desk".to_string())).unwrap();
        subscription.unsubscribe();
        actor.send(Ev::Rename("porch".to_string())).unwrap();

        assert_eq!(*seen.lock(), vec!["desk"]);
    }
}
