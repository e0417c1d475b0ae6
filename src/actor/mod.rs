//! The interpreter: running instances of a [`Machine`].
//!
//! An actor owns one context and one configuration and processes events
//! one at a time. [`ActorRef::send`] applies a whole batch (the event and
//! everything its actions raise) before returning the resulting
//! [`Snapshot`]. Invoked services and delayed events run as tokio tasks
//! whose outcome re-enters the actor through its mailbox.
//!
//! # Example
//!
//! ```rust
//! use choreo::builder::{goto, MachineBuilder, StateBuilder};
//! use choreo::event_enum;
//! use choreo::system::System;
//!
//! event_enum! {
//!     enum Door {
//!         Open,
//!         Close,
//!     }
//!     kind: DoorKind
//! }
//!
//! let machine = MachineBuilder::<(), Door>::new("door")
//!     .state(StateBuilder::new("closed").on(goto(DoorKind::Open, "open")))
//!     .state(StateBuilder::new("open").on(goto(DoorKind::Close, "closed")))
//!     .build()
//!     .unwrap();
//!
//! let system = System::new();
//! let door = system.spawn(machine, ()).unwrap();
//! let snapshot = door.send(Door::Open).unwrap();
//! assert!(snapshot.matches("open"));
//! ```

mod activity;
pub(crate) mod cell;
mod error;
mod id;
mod interpreter;
mod scope;
mod snapshot;

pub use error::ActorError;
pub use id::ActorId;
pub use scope::Scope;
pub use snapshot::{ActorStatus, Snapshot};

use crate::core::{Event, Machine};
use crate::subscription::Subscription;
use crate::system::System;
use cell::{ActorCell, Envelope};
use std::fmt;
use std::sync::{Arc, Weak};

/// Bound on context types: cloned on write, shared with snapshots and
/// moved across tasks.
pub trait Context: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Context for T {}

/// Handle to a running actor. Cloning is cheap; all clones address the
/// same actor.
pub struct ActorRef<C, E: Event> {
    pub(crate) cell: Arc<ActorCell<C, E>>,
}

impl<C: Context, E: Event> ActorRef<C, E> {
    pub(crate) fn new(
        system: System,
        machine: Arc<Machine<C, E>>,
        context: C,
        parent: Option<ActorId>,
    ) -> Self {
        Self {
            cell: Arc::new(ActorCell::new(system, machine, context, parent)),
        }
    }

    pub fn id(&self) -> ActorId {
        self.cell.id
    }

    /// Actor that spawned this one, if any.
    pub fn parent(&self) -> Option<ActorId> {
        self.cell.parent
    }

    pub fn machine(&self) -> &Arc<Machine<C, E>> {
        &self.cell.machine
    }

    pub fn system(&self) -> &System {
        &self.cell.system
    }

    pub fn status(&self) -> ActorStatus {
        self.cell.status()
    }

    /// Current snapshot. Never blocks on event processing.
    pub fn snapshot(&self) -> Arc<Snapshot<C, E>> {
        self.cell.snapshot()
    }

    /// Enter the initial configuration, run entry actions, start the
    /// activities of the entered states and drain events queued so far.
    ///
    /// Starting an already started actor returns its current snapshot.
    pub fn start(&self) -> Result<Arc<Snapshot<C, E>>, ActorError> {
        self.begin()
    }

    /// Process `event` and everything it raises.
    ///
    /// An event no active state handles leaves the snapshot untouched: the
    /// returned `Arc` is the one held before. Called while this actor is
    /// already processing (from an action or a listener), the event is
    /// queued and the current snapshot is returned; the outer call drains
    /// it. Before [`start`](ActorRef::start) events are queued as well.
    ///
    /// When an action fails the batch still completes; the first failure
    /// is returned and the actor stays usable.
    pub fn send(&self, event: E) -> Result<Arc<Snapshot<C, E>>, ActorError> {
        self.deliver(Envelope::Event(event))
    }

    /// Call `listener` after every committed microstep until
    /// [`Subscription::unsubscribe`] or [`stop`](ActorRef::stop).
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot<C, E>>) + Send + Sync + 'static,
    {
        let id = self.cell.add_listener(Arc::new(listener));
        let cell = Arc::downgrade(&self.cell);
        Subscription::new(move || {
            if let Some(cell) = cell.upgrade() {
                cell.remove_listener(id);
            }
        })
    }

    /// Cancel every activity, stop spawned children, drop listeners and
    /// mark the actor stopped. Idempotent. Called while the actor is
    /// processing, the stop happens once the current batch is drained.
    pub fn stop(&self) {
        self.cell.stop();
    }

    pub fn downgrade(&self) -> WeakActorRef<C, E> {
        WeakActorRef {
            cell: Arc::downgrade(&self.cell),
        }
    }
}

impl<C, E: Event> Clone for ActorRef<C, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<C, E: Event> PartialEq for ActorRef<C, E> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<C, E: Event> Eq for ActorRef<C, E> {}

impl<C, E: Event> fmt::Debug for ActorRef<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.cell.id)
            .field("machine", &self.cell.machine.id())
            .finish()
    }
}

/// Non-owning actor handle.
pub struct WeakActorRef<C, E: Event> {
    cell: Weak<ActorCell<C, E>>,
}

impl<C, E: Event> WeakActorRef<C, E> {
    pub fn upgrade(&self) -> Option<ActorRef<C, E>> {
        self.cell.upgrade().map(|cell| ActorRef { cell })
    }
}

impl<C, E: Event> Clone for WeakActorRef<C, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
        }
    }
}
