//! Actions run during the action phase of a microstep.
//!
//! Actions are the only place a context is mutated. They receive a
//! [`Scope`] giving access to the context, the triggering event and the
//! running actor (to raise events, spawn children or reach the system).

use crate::actor::Scope;
use crate::core::Event;
use crate::system::RegistryError;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by an action.
///
/// Mutations made before the failure are kept; the error is returned to
/// the caller of `send`.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Message(String),

    /// The action panicked; the payload message is kept.
    #[error("action panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Actor(#[from] Box<crate::actor::ActorError>),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ActionError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn other<Err>(error: Err) -> Self
    where
        Err: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }
}

impl From<crate::actor::ActorError> for ActionError {
    fn from(error: crate::actor::ActorError) -> Self {
        Self::Actor(Box::new(error))
    }
}

type ActionFn<C, E> = Arc<dyn Fn(&mut Scope<'_, C, E>) -> Result<(), ActionError> + Send + Sync>;

/// A named or anonymous side effect executed by the interpreter.
pub struct Action<C, E: Event> {
    run: ActionFn<C, E>,
    label: Option<&'static str>,
}

impl<C, E: Event> Action<C, E> {
    /// Create an action with full access to the scope.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn(&mut Scope<'_, C, E>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self {
            run: Arc::new(run),
            label: None,
        }
    }

    pub fn named(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    pub(crate) fn execute(&self, scope: &mut Scope<'_, C, E>) -> Result<(), ActionError> {
        (self.run)(scope)
    }
}

impl<C, E: Event> Clone for Action<C, E> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
            label: self.label,
        }
    }
}
