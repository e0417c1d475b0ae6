//! State nodes and transitions, stored in an arena owned by the machine.

use super::action::Action;
use super::event::Event;
use super::guard::{Guard, GuardError};
use super::invoke::{DelayDef, InvokeDef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Index of a node in its machine's arena.
///
/// Ids follow document order: a parent always has a smaller id than its
/// descendants, and earlier siblings have smaller ids than later ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural kind of a state node.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum StateKind {
    Atomic,
    Compound,
    Parallel,
    Final,
}

impl StateKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Atomic | Self::Final)
    }
}

/// A transition declared on a state node.
pub struct Transition<C, E: Event> {
    pub(crate) guard: Option<Guard<C, E>>,
    pub(crate) target_paths: Vec<String>,
    pub(crate) targets: Vec<StateId>,
    pub(crate) actions: Vec<Action<C, E>>,
    pub(crate) internal: bool,
}

impl<C, E: Event> Transition<C, E> {
    pub fn targets(&self) -> &[StateId] {
        &self.targets
    }

    pub fn is_targetless(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    /// Evaluate the guard; a transition without a guard is always enabled.
    pub fn enabled(&self, context: &C, event: &E) -> Result<bool, GuardError> {
        match &self.guard {
            Some(guard) => guard.check(context, event),
            None => Ok(true),
        }
    }
}

/// Context-dependent choice of a compound state's initial child.
pub(crate) struct InitialChoice<C> {
    pub(crate) when: Arc<dyn Fn(&C) -> bool + Send + Sync>,
    pub(crate) child: String,
    pub(crate) target: Option<StateId>,
}

/// One node of the state tree.
pub struct StateNode<C, E: Event> {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent: Option<StateId>,
    pub(crate) kind: StateKind,
    pub(crate) children: Vec<StateId>,
    pub(crate) initial: Option<StateId>,
    pub(crate) initial_choices: Vec<InitialChoice<C>>,
    pub(crate) transitions: HashMap<E::Kind, Vec<Transition<C, E>>>,
    pub(crate) entry: Vec<Action<C, E>>,
    pub(crate) exit: Vec<Action<C, E>>,
    pub(crate) invoke: Option<InvokeDef<C, E>>,
    pub(crate) delays: Vec<DelayDef<E>>,
}

impl<C, E: Event> StateNode<C, E> {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root, empty for the root itself.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<StateId> {
        self.parent
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn children(&self) -> &[StateId] {
        &self.children
    }

    /// Declared default initial child.
    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    /// Initial child for a given context: the first matching conditional
    /// choice, otherwise the declared default.
    pub fn initial_for(&self, context: &C) -> Option<StateId> {
        self.initial_choices
            .iter()
            .find(|choice| (choice.when)(context))
            .and_then(|choice| choice.target)
            .or(self.initial)
    }

    /// Transitions declared for an event kind, in declaration order.
    pub fn transitions_for(&self, kind: E::Kind) -> Option<&[Transition<C, E>]> {
        self.transitions.get(&kind).map(Vec::as_slice)
    }

    pub fn invoke_id(&self) -> Option<&str> {
        self.invoke.as_ref().map(|def| def.id.as_str())
    }

    /// Number of activities (service plus timers) started on entry.
    pub(crate) fn activity_count(&self) -> usize {
        usize::from(self.invoke.is_some()) + self.delays.len()
    }
}

impl<C, E: Event> fmt::Debug for StateNode<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("children", &self.children)
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}
