//! Shared actor state behind every handle.
//!
//! Two locks split an actor: the mailbox (queue, status, draining flag) is
//! held only for a few instructions at a time, while the core (context,
//! configuration, live activities) is held for the duration of one event's
//! microsteps. Listeners run after the core lock is released; a panicking
//! listener is logged and skipped.

use super::activity::Activity;
use super::{ActorId, ActorStatus, Context, Snapshot};
use crate::core::{contain, Configuration, Event, Machine, Settlement, StateId};
use crate::system::{InspectionKind, System};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub(crate) type Listener<C, E> = Arc<dyn Fn(&Arc<Snapshot<C, E>>) + Send + Sync>;

/// Item waiting in the mailbox.
pub(crate) enum Envelope<E> {
    Event(E),
    Settled {
        state: StateId,
        token: u64,
        settlement: Settlement<E>,
    },
}

pub(crate) struct Mailbox<E> {
    pub(crate) queue: VecDeque<Envelope<E>>,
    pub(crate) status: ActorStatus,
    pub(crate) draining: bool,
    pub(crate) stop_requested: bool,
}

pub(crate) struct Core<C, E> {
    pub(crate) configuration: Configuration,
    pub(crate) context: Arc<C>,
    /// Events raised by actions, processed before the next mailbox item.
    pub(crate) raised: VecDeque<E>,
    pub(crate) activities: HashMap<StateId, Vec<Activity>>,
    pub(crate) next_token: u64,
    /// Weak stop handles of spawned children; the parent's context owns them.
    pub(crate) children: Vec<Weak<dyn AnyActor>>,
}

struct Listeners<C, E: Event> {
    next_id: u64,
    entries: Vec<(u64, Listener<C, E>)>,
}

/// Type-erased view of an actor used by the registry and by parents.
pub(crate) trait AnyActor: Send + Sync {
    fn id(&self) -> ActorId;

    /// Not yet done or stopped.
    fn is_reachable(&self) -> bool;

    fn stop(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub(crate) struct ActorCell<C, E: Event> {
    pub(crate) id: ActorId,
    pub(crate) parent: Option<ActorId>,
    pub(crate) machine: Arc<Machine<C, E>>,
    pub(crate) system: System,
    pub(crate) mailbox: Mutex<Mailbox<E>>,
    pub(crate) core: Mutex<Core<C, E>>,
    snapshot: RwLock<Arc<Snapshot<C, E>>>,
    listeners: Mutex<Listeners<C, E>>,
}

impl<C: Context, E: Event> ActorCell<C, E> {
    pub(crate) fn new(
        system: System,
        machine: Arc<Machine<C, E>>,
        context: C,
        parent: Option<ActorId>,
    ) -> Self {
        let context = Arc::new(context);
        let snapshot = Snapshot {
            machine: Arc::clone(&machine),
            configuration: machine.initial_configuration(&context),
            context: Arc::clone(&context),
            status: ActorStatus::NotStarted,
        };

        Self {
            id: ActorId::generate(),
            parent,
            machine,
            system,
            mailbox: Mutex::new(Mailbox {
                queue: VecDeque::new(),
                status: ActorStatus::NotStarted,
                draining: false,
                stop_requested: false,
            }),
            core: Mutex::new(Core {
                configuration: Configuration::new(),
                context,
                raised: VecDeque::new(),
                activities: HashMap::new(),
                next_token: 0,
                children: Vec::new(),
            }),
            snapshot: RwLock::new(Arc::new(snapshot)),
            listeners: Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> Arc<Snapshot<C, E>> {
        Arc::clone(&self.snapshot.read())
    }

    pub(crate) fn status(&self) -> ActorStatus {
        self.mailbox.lock().status
    }

    /// Publish the core's current state as the new snapshot.
    pub(crate) fn commit(&self, core: &Core<C, E>, status: ActorStatus) -> Arc<Snapshot<C, E>> {
        let snapshot = Arc::new(Snapshot {
            machine: Arc::clone(&self.machine),
            configuration: core.configuration.clone(),
            context: Arc::clone(&core.context),
            status,
        });
        *self.snapshot.write() = Arc::clone(&snapshot);
        snapshot
    }

    pub(crate) fn notify(&self, snapshot: &Arc<Snapshot<C, E>>) {
        let listeners: Vec<Listener<C, E>> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            if let Err(message) = contain(|| listener(snapshot)) {
                warn!(actor = %self.id, %message, "Listener panicked");
            }
        }
    }

    pub(crate) fn add_listener(&self, listener: Listener<C, E>) -> u64 {
        let mut listeners = self.listeners.lock();
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&self, id: u64) {
        self.listeners.lock().entries.retain(|(entry, _)| *entry != id);
    }

    pub(crate) fn inspect<F>(&self, kind: F)
    where
        F: FnOnce() -> InspectionKind,
    {
        self.system.inspect(self.id, kind);
    }

    /// Stop now, or after the current batch when one is being drained.
    pub(crate) fn stop(&self) {
        {
            let mut mailbox = self.mailbox.lock();
            if mailbox.status == ActorStatus::Stopped {
                return;
            }
            if mailbox.draining {
                mailbox.stop_requested = true;
                return;
            }
            mailbox.status = ActorStatus::Stopped;
            mailbox.queue.clear();
        }
        self.halt(ActorStatus::Stopped);
    }

    /// Mark the mailbox terminal and release everything the actor holds.
    pub(crate) fn finish(&self, status: ActorStatus) {
        {
            let mut mailbox = self.mailbox.lock();
            mailbox.status = status;
            mailbox.queue.clear();
            mailbox.draining = false;
            mailbox.stop_requested = false;
        }
        self.halt(status);
    }

    fn halt(&self, status: ActorStatus) {
        let children = {
            let mut core = self.core.lock();
            core.raised.clear();
            let cancelled = core.cancel_all();
            if status == ActorStatus::Stopped {
                self.commit(&core, status);
            }
            debug!(actor = %self.id, ?status, cancelled, "Actor halted");
            std::mem::take(&mut core.children)
        };

        self.listeners.lock().entries.clear();

        if self.system.config().stop_children_with_parent {
            for child in children.iter().filter_map(Weak::upgrade) {
                child.stop();
            }
        }

        self.inspect(|| match status {
            ActorStatus::Done => InspectionKind::Done,
            _ => InspectionKind::Stopped,
        });
    }
}

impl<C: Context, E: Event> AnyActor for ActorCell<C, E> {
    fn id(&self) -> ActorId {
        self.id
    }

    fn is_reachable(&self) -> bool {
        !self.status().is_terminal()
    }

    fn stop(&self) {
        ActorCell::stop(self);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
