//! Invoked services and delayed events running as tokio tasks.
//!
//! Every activity gets a token when started. Exiting its state aborts the
//! task and forgets the token, so a settlement that raced the abort is
//! recognised as stale and dropped.

use super::cell::{ActorCell, Core, Envelope};
use super::{ActorRef, Context};
use crate::core::{Event, Settlement, StateId};
use futures::future::BoxFuture;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub(crate) struct Activity {
    pub(crate) token: u64,
    task: JoinHandle<()>,
}

impl Activity {
    fn cancel(self) {
        self.task.abort();
    }
}

impl<C, E> Core<C, E> {
    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Abort every activity of `state`. Returns how many were live.
    pub(crate) fn cancel_activities(&mut self, state: StateId) -> usize {
        let Some(activities) = self.activities.remove(&state) else {
            return 0;
        };
        let count = activities.len();
        activities.into_iter().for_each(Activity::cancel);
        count
    }

    pub(crate) fn cancel_all(&mut self) -> usize {
        let states: Vec<StateId> = self.activities.keys().copied().collect();
        states
            .into_iter()
            .map(|state| self.cancel_activities(state))
            .sum()
    }

    /// Forget a settled activity. `false` when the token is no longer live.
    pub(crate) fn retire_activity(&mut self, state: StateId, token: u64) -> bool {
        let Some(activities) = self.activities.get_mut(&state) else {
            return false;
        };
        let Some(position) = activities.iter().position(|activity| activity.token == token) else {
            return false;
        };
        activities.swap_remove(position);
        if activities.is_empty() {
            self.activities.remove(&state);
        }
        true
    }
}

impl<C: Context, E: Event> ActorRef<C, E> {
    /// Start the service and timers declared on `state`, replacing any
    /// still registered for it.
    pub(crate) fn start_activities(&self, core: &mut Core<C, E>, state: StateId, event: Option<&E>) {
        let node = self.cell.machine.node(state);
        if node.activity_count() == 0 {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!(
                actor = %self.cell.id,
                state = node.path(),
                "No tokio runtime available; activities not started"
            );
            return;
        };

        core.cancel_activities(state);
        let mut started = Vec::with_capacity(node.activity_count());

        if let Some(invoke) = &node.invoke {
            let token = core.issue_token();
            let pending = (invoke.start)(&*core.context, event);
            debug!(actor = %self.cell.id, state = node.path(), service = %invoke.id, token, "Service started");
            started.push(Activity {
                token,
                task: runtime.spawn(settle(Arc::downgrade(&self.cell), state, token, pending)),
            });
        }

        for delay in &node.delays {
            let token = core.issue_token();
            let duration = delay.delay;
            let event = delay.event.clone();
            let pending: BoxFuture<'static, Settlement<E>> = Box::pin(async move {
                tokio::time::sleep(duration).await;
                Settlement::Done(Some(event))
            });
            debug!(actor = %self.cell.id, state = node.path(), ?duration, token, "Timer started");
            started.push(Activity {
                token,
                task: runtime.spawn(settle(Arc::downgrade(&self.cell), state, token, pending)),
            });
        }

        core.activities.insert(state, started);
    }
}

/// Await an activity and hand its outcome back to the actor, if it is
/// still alive.
async fn settle<C: Context, E: Event>(
    actor: Weak<ActorCell<C, E>>,
    state: StateId,
    token: u64,
    pending: BoxFuture<'static, Settlement<E>>,
) {
    let settlement = pending.await;
    let Some(cell) = actor.upgrade() else {
        return;
    };
    let actor = ActorRef { cell };
    if let Err(error) = actor.deliver(Envelope::Settled {
        state,
        token,
        settlement,
    }) {
        warn!(actor = %actor.id(), %error, "Processing a settlement failed");
    }
}
