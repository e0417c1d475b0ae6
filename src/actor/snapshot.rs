use crate::core::{Configuration, Event, Machine, StateValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorStatus {
    /// Created; events are queued until `start`.
    NotStarted,
    Running,
    /// A top-level final state was reached.
    Done,
    Stopped,
}

impl ActorStatus {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    /// `Done` or `Stopped`: no further events are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Stopped)
    }
}

/// Immutable view of an actor after a microstep.
///
/// A new snapshot is produced only when the configuration, the context or
/// the status changed. Holders can therefore compare snapshots with
/// [`Arc::ptr_eq`] to detect change.
pub struct Snapshot<C, E: Event> {
    pub(crate) machine: Arc<Machine<C, E>>,
    pub(crate) configuration: Configuration,
    pub(crate) context: Arc<C>,
    pub(crate) status: ActorStatus,
}

impl<C, E: Event> Snapshot<C, E> {
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Shared handle to the context, stable across snapshots that did not
    /// mutate it.
    pub fn context_arc(&self) -> &Arc<C> {
        &self.context
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn status(&self) -> ActorStatus {
        self.status
    }

    pub fn machine(&self) -> &Arc<Machine<C, E>> {
        &self.machine
    }

    /// Whether the state at `path` (for example `"liked.yes.idle"`) is
    /// active. Prefixes match too: `"liked"` is active while any of its
    /// descendants is.
    pub fn matches(&self, path: &str) -> bool {
        self.machine.matches(&self.configuration, path)
    }

    pub fn value(&self) -> StateValue {
        self.machine.state_value(&self.configuration)
    }

    /// Full paths of the active leaves, in document order.
    pub fn leaf_paths(&self) -> Vec<&str> {
        self.machine.leaf_paths(&self.configuration)
    }

    pub fn is_done(&self) -> bool {
        self.status == ActorStatus::Done
    }
}

impl<C: fmt::Debug, E: Event> fmt::Debug for Snapshot<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("machine", &self.machine.id())
            .field("states", &self.leaf_paths())
            .field("context", &self.context)
            .field("status", &self.status)
            .finish()
    }
}
