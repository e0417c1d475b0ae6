//! Builder for transitions.

use crate::actor::Scope;
use crate::core::{Action, ActionError, Event, Guard, Transition};

/// Builder for a transition triggered by one event kind.
///
/// Without a [`target`](TransitionBuilder::target) the transition is
/// targetless: its actions run but no state is exited or entered.
pub struct TransitionBuilder<C, E: Event> {
    pub(crate) kind: E::Kind,
    guard: Option<Guard<C, E>>,
    targets: Vec<String>,
    actions: Vec<Action<C, E>>,
    internal: bool,
}

impl<C: 'static, E: Event> TransitionBuilder<C, E> {
    /// Start a transition for an event kind.
    pub fn on(kind: E::Kind) -> Self {
        Self {
            kind,
            guard: None,
            targets: Vec::new(),
            actions: Vec::new(),
            internal: false,
        }
    }

    /// Add a target state.
    ///
    /// Paths are resolved from the source's parent outward, so sibling
    /// names work and full paths from the root always work. A leading `.`
    /// addresses a descendant of the source. Several targets are allowed
    /// when they lie in different parallel regions.
    pub fn target(mut self, path: impl Into<String>) -> Self {
        self.targets.push(path.into());
        self
    }

    /// Add a guard.
    pub fn guard(mut self, guard: Guard<C, E>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure.
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&C, &E) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Append an action with full access to the scope.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut Scope<'_, C, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.actions.push(Action::new(action));
        self
    }

    /// Append a prepared action.
    pub fn with_action(mut self, action: Action<C, E>) -> Self {
        self.actions.push(action);
        self
    }

    /// Append an infallible context update.
    pub fn assign<F>(self, update: F) -> Self
    where
        F: Fn(&mut C, &E) + Send + Sync + 'static,
    {
        self.action(move |scope| {
            if let Some(event) = scope.event() {
                update(&mut *scope.context, event);
            }
            Ok(())
        })
    }

    /// Append an action raising `event` into the current batch.
    pub fn raise(self, event: E) -> Self {
        self.action(move |scope| {
            scope.raise(event.clone());
            Ok(())
        })
    }

    /// Do not exit and re-enter the source when targeting its descendants.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    pub(crate) fn build(self) -> Transition<C, E> {
        Transition {
            guard: self.guard,
            target_paths: self.targets,
            targets: Vec::new(),
            actions: self.actions,
            internal: self.internal,
        }
    }
}
