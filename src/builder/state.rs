//! Builder for state nodes.

use crate::actor::Scope;
use crate::builder::transition::TransitionBuilder;
use crate::core::{Action, ActionError, Event, Invoke};
use crate::core::invoke::{DelayDef, InvokeDef};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type InitialPredicate<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// Builder for one state and, recursively, its children.
///
/// The kind is inferred: a state with children is compound, one without is
/// atomic, unless [`parallel`](StateBuilder::parallel) or
/// [`final_state`](StateBuilder::final_state) say otherwise.
pub struct StateBuilder<C, E: Event> {
    pub(crate) name: String,
    pub(crate) parallel: bool,
    pub(crate) terminal: bool,
    pub(crate) initial: Option<String>,
    pub(crate) initial_choices: Vec<(InitialPredicate<C>, String)>,
    pub(crate) children: Vec<StateBuilder<C, E>>,
    pub(crate) transitions: Vec<TransitionBuilder<C, E>>,
    pub(crate) entry: Vec<Action<C, E>>,
    pub(crate) exit: Vec<Action<C, E>>,
    pub(crate) invoke: Option<InvokeDef<C, E>>,
    pub(crate) delays: Vec<DelayDef<E>>,
}

impl<C: 'static, E: Event> StateBuilder<C, E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parallel: false,
            terminal: false,
            initial: None,
            initial_choices: Vec::new(),
            children: Vec::new(),
            transitions: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            invoke: None,
            delays: Vec::new(),
        }
    }

    /// Make this a parallel state: all children are active together.
    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    /// Make this a final state.
    pub fn final_state(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// Default initial child. Without one, the first child is used.
    pub fn initial(mut self, child: impl Into<String>) -> Self {
        self.initial = Some(child.into());
        self
    }

    /// Initial child chosen when `predicate` holds for the context at entry.
    ///
    /// Choices are tried in declaration order before the default.
    pub fn initial_if<F>(mut self, predicate: F, child: impl Into<String>) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.initial_choices.push((Arc::new(predicate), child.into()));
        self
    }

    /// Add a child state.
    pub fn state(mut self, child: StateBuilder<C, E>) -> Self {
        self.children.push(child);
        self
    }

    /// Add a transition.
    pub fn on(mut self, transition: TransitionBuilder<C, E>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add an entry action.
    pub fn entry<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_, C, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.entry.push(Action::new(action));
        self
    }

    /// Add an exit action.
    pub fn exit<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_, C, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.exit.push(Action::new(action));
        self
    }

    /// Invoke a service for as long as this state is active.
    pub fn invoke<T, Err>(mut self, invoke: Invoke<C, E, T, Err>) -> Self
    where
        T: Send + 'static,
        Err: Display + Send + 'static,
    {
        self.invoke = Some(invoke.erase());
        self
    }

    /// Raise `event` once `delay` has elapsed, unless the state is exited
    /// first.
    pub fn after(mut self, delay: Duration, event: E) -> Self {
        self.delays.push(DelayDef { delay, event });
        self
    }
}
