use super::cell::{ActorCell, AnyActor};
use super::{ActorError, ActorId, ActorRef, Context};
use crate::core::{Event, Machine};
use crate::system::System;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

/// What an action can reach while it runs.
///
/// The context is borrowed mutably for the duration of the action; the
/// rest of the actor is reachable through [`self_ref`](Scope::self_ref) and
/// [`system`](Scope::system). Sending to the running actor from here only
/// enqueues: the event is processed after the current batch.
pub struct Scope<'a, C, E: Event> {
    pub context: &'a mut C,
    pub(crate) event: Option<&'a E>,
    pub(crate) raised: &'a mut VecDeque<E>,
    pub(crate) children: &'a mut Vec<Weak<dyn AnyActor>>,
    pub(crate) actor: &'a ActorRef<C, E>,
}

impl<'a, C, E: Event> Scope<'a, C, E> {
    /// Event being processed; `None` for entry actions run at start.
    pub fn event(&self) -> Option<&'a E> {
        self.event
    }

    /// Queue `event` for this actor, ahead of anything still in the
    /// mailbox.
    pub fn raise(&mut self, event: E) {
        self.raised.push_back(event);
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor.cell.id
    }

    pub fn self_ref(&self) -> ActorRef<C, E> {
        self.actor.clone()
    }

    pub fn system(&self) -> &System {
        &self.actor.cell.system
    }

    /// Create and start a child actor.
    ///
    /// The returned handle is meant to be stored in the context; the parent
    /// keeps its own handle only to stop the child along with itself.
    pub fn spawn_child<C2, E2>(
        &mut self,
        machine: impl Into<Arc<Machine<C2, E2>>>,
        context: C2,
    ) -> Result<ActorRef<C2, E2>, ActorError>
    where
        C2: Context,
        E2: Event,
    {
        let cell = ActorCell::new(
            self.system().clone(),
            machine.into(),
            context,
            Some(self.actor_id()),
        );
        let child = ActorRef {
            cell: Arc::new(cell),
        };
        self.children
            .retain(|handle| handle.upgrade().is_some_and(|child| child.is_reachable()));
        let strong: Arc<dyn AnyActor> = child.cell.clone();
        self.children.push(Arc::downgrade(&strong));
        child.start()?;
        Ok(child)
    }
}
