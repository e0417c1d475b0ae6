//! Run-to-completion event processing.
//!
//! Whoever flips the mailbox's `draining` flag processes every queued
//! envelope, including ones enqueued meanwhile by actions, listeners or
//! other threads. Everyone else only enqueues.

use super::cell::{Core, Envelope, Mailbox};
use super::{ActorError, ActorRef, ActorStatus, Context, Scope, Snapshot};
use crate::core::{contain, Action, ActionError, Event, Selection, Settlement, StateId};
use crate::system::InspectionKind;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Hands the mailbox back if a drain unwinds, so later sends drain again.
struct DrainGuard<'a, E> {
    mailbox: &'a Mutex<Mailbox<E>>,
}

impl<E> Drop for DrainGuard<'_, E> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.mailbox.lock().draining = false;
            error!("Drain unwound; mailbox released");
        }
    }
}

pub(crate) enum Job<E> {
    Start,
    Deliver(Envelope<E>),
}

/// What one mailbox item produced.
struct Batch<C, E: Event> {
    committed: Vec<Arc<Snapshot<C, E>>>,
    error: Option<ActorError>,
    done: bool,
}

impl<C, E: Event> Batch<C, E> {
    fn new() -> Self {
        Self {
            committed: Vec::new(),
            error: None,
            done: false,
        }
    }

    fn fail(&mut self, error: ActorError) {
        self.error.get_or_insert(error);
    }
}

impl<C: Context, E: Event> ActorRef<C, E> {
    pub(crate) fn begin(&self) -> Result<Arc<Snapshot<C, E>>, ActorError> {
        {
            let mut mailbox = self.cell.mailbox.lock();
            if mailbox.status != ActorStatus::NotStarted {
                return Ok(self.cell.snapshot());
            }
            mailbox.status = ActorStatus::Running;
            mailbox.draining = true;
        }
        debug!(actor = %self.cell.id, machine = self.cell.machine.id(), "Actor starting");
        self.drain(Some(Job::Start))
    }

    pub(crate) fn deliver(&self, envelope: Envelope<E>) -> Result<Arc<Snapshot<C, E>>, ActorError> {
        let drain = {
            let mut mailbox = self.cell.mailbox.lock();
            let status = mailbox.status;
            if status.is_terminal() {
                drop(mailbox);
                return match envelope {
                    Envelope::Event(event) => {
                        trace!(actor = %self.cell.id, event = event.name(), ?status, "Event sent to inactive actor");
                        Err(ActorError::NotRunning {
                            actor: self.cell.id,
                            status,
                        })
                    }
                    Envelope::Settled { .. } => Ok(self.cell.snapshot()),
                };
            }
            mailbox.queue.push_back(envelope);
            let drain = status == ActorStatus::Running && !mailbox.draining;
            if drain {
                mailbox.draining = true;
            }
            drain
        };

        if drain {
            self.drain(None)
        } else {
            Ok(self.cell.snapshot())
        }
    }

    fn drain(&self, mut next: Option<Job<E>>) -> Result<Arc<Snapshot<C, E>>, ActorError> {
        let _guard = DrainGuard {
            mailbox: &self.cell.mailbox,
        };
        let limit = self.cell.system.config().max_microsteps;
        let mut steps = 0;
        let mut first_error: Option<ActorError> = None;

        let halted = loop {
            let job = match next.take() {
                Some(job) => job,
                None => {
                    let mut mailbox = self.cell.mailbox.lock();
                    if mailbox.stop_requested {
                        break Some(ActorStatus::Stopped);
                    }
                    match mailbox.queue.pop_front() {
                        Some(envelope) => Job::Deliver(envelope),
                        None => {
                            mailbox.draining = false;
                            break None;
                        }
                    }
                }
            };

            let batch = self.process(job, &mut steps, limit);
            let limited = matches!(batch.error, Some(ActorError::MicrostepLimit { .. }));
            if let Some(error) = batch.error {
                first_error.get_or_insert(error);
            }
            if batch.done {
                break Some(ActorStatus::Done);
            }
            if limited {
                // Queued envelopes wait for the next send or settlement.
                let mut mailbox = self.cell.mailbox.lock();
                if mailbox.stop_requested {
                    break Some(ActorStatus::Stopped);
                }
                mailbox.draining = false;
                break None;
            }
        };

        if let Some(status) = halted {
            self.cell.finish(status);
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(self.cell.snapshot()),
        }
    }

    /// Handle one job and every event it raises, then notify listeners.
    fn process(&self, job: Job<E>, steps: &mut usize, limit: usize) -> Batch<C, E> {
        let mut batch = Batch::new();
        let mut core = self.cell.core.lock();

        let mut pending = match job {
            Job::Start => {
                self.enter_initial(&mut core, &mut batch);
                None
            }
            Job::Deliver(Envelope::Event(event)) => Some(event),
            Job::Deliver(Envelope::Settled {
                state,
                token,
                settlement,
            }) => self.accept(&mut core, state, token, settlement),
        };

        loop {
            if self.cell.machine.is_done(&core.configuration) {
                core.raised.clear();
                batch.done = true;
                break;
            }
            let Some(event) = pending.take().or_else(|| core.raised.pop_front()) else {
                break;
            };
            *steps += 1;
            if *steps > limit {
                core.raised.clear();
                warn!(actor = %self.cell.id, limit, "Microstep limit exceeded; dropping raised events");
                batch.fail(ActorError::MicrostepLimit {
                    actor: self.cell.id,
                    limit,
                });
                break;
            }
            self.microstep(&mut core, &event, &mut batch);
        }
        drop(core);

        for snapshot in &batch.committed {
            self.cell.notify(snapshot);
        }
        batch
    }

    /// Map a settlement to the event it raises, if its activity is still
    /// live.
    fn accept(
        &self,
        core: &mut Core<C, E>,
        state: StateId,
        token: u64,
        settlement: Settlement<E>,
    ) -> Option<E> {
        let path = self.cell.machine.node(state).path();
        if !core.retire_activity(state, token) {
            trace!(actor = %self.cell.id, state = path, token, "Discarding settlement of a cancelled activity");
            self.cell.inspect(|| InspectionKind::ServiceDiscarded {
                state: path.to_string(),
            });
            return None;
        }

        match settlement {
            Settlement::Done(event) => event,
            Settlement::Rejected {
                message,
                event: Some(event),
            } => {
                debug!(actor = %self.cell.id, state = path, %message, "Service rejected");
                Some(event)
            }
            Settlement::Rejected {
                message,
                event: None,
            } => {
                warn!(
                    actor = %self.cell.id,
                    state = path,
                    %message,
                    "Service rejected without an error mapping; rejection swallowed"
                );
                self.cell.inspect(|| InspectionKind::ServiceRejected {
                    state: path.to_string(),
                    message,
                });
                None
            }
        }
    }

    fn enter_initial(&self, core: &mut Core<C, E>, batch: &mut Batch<C, E>) {
        let machine = &self.cell.machine;
        let entered: Vec<StateId> = machine.initial_configuration(&core.context).iter().collect();

        let mut failure = None;
        for &state in &entered {
            core.configuration.insert(state);
            if failure.is_none() {
                failure = self.run_actions(core, &machine.node(state).entry, None).err();
            }
        }
        for &state in &entered {
            self.start_activities(core, state, None);
        }

        batch.committed.push(self.cell.commit(core, self.status_of(core)));
        debug!(actor = %self.cell.id, states = ?machine.leaf_paths(&core.configuration), "Actor started");
        self.cell.inspect(|| InspectionKind::Started);

        if let Some(source) = failure {
            batch.fail(ActorError::Action {
                actor: self.cell.id,
                event: "start".to_string(),
                source,
            });
        }
    }

    /// One atomic step: exits, transition actions, entries, activities.
    fn microstep(&self, core: &mut Core<C, E>, event: &E, batch: &mut Batch<C, E>) {
        let cell = &self.cell;
        let machine = &cell.machine;

        let selection = machine.select(&core.configuration, &core.context, event, &mut |state, error| {
            let path = machine.node(state).path();
            let guard = error.guard.unwrap_or("anonymous");
            warn!(actor = %cell.id, state = path, event = event.name(), guard, %error, "Guard failed; treated as false");
            cell.inspect(|| InspectionKind::GuardFailed {
                state: path.to_string(),
                event: event.name().to_string(),
                guard: error.guard.map(str::to_string),
                message: error.message.clone(),
            });
        });

        let selected = match selection {
            Selection::Unhandled => {
                trace!(actor = %cell.id, event = event.name(), "Unhandled event");
                cell.inspect(|| InspectionKind::Unhandled {
                    event: event.name().to_string(),
                });
                return;
            }
            Selection::Blocked => {
                trace!(actor = %cell.id, event = event.name(), "No enabled transition");
                return;
            }
            Selection::Enabled(selected) => selected,
        };

        let from = owned_paths(machine.leaf_paths(&core.configuration));
        let exits = machine.exit_set(&core.configuration, &selected);

        for &state in &exits {
            core.cancel_activities(state);
        }

        let mut failure: Option<ActionError> = None;
        for &state in &exits {
            if failure.is_none() {
                failure = self.run_actions(core, &machine.node(state).exit, Some(event)).err();
            }
            core.configuration.remove(state);
        }

        for candidate in &selected {
            if failure.is_none() {
                failure = self
                    .run_actions(core, &candidate.transition.actions, Some(event))
                    .err();
            }
        }

        let entries = machine.entry_set(&selected, &core.context);
        for &state in &entries {
            core.configuration.insert(state);
            if failure.is_none() {
                failure = self.run_actions(core, &machine.node(state).entry, Some(event)).err();
            }
        }
        for &state in &entries {
            self.start_activities(core, state, Some(event));
        }

        batch.committed.push(cell.commit(core, self.status_of(core)));
        let to = owned_paths(machine.leaf_paths(&core.configuration));
        debug!(actor = %cell.id, event = event.name(), ?from, ?to, "Microstep");
        cell.inspect(|| InspectionKind::Microstep {
            event: event.name().to_string(),
            from,
            to,
        });

        if let Some(source) = failure {
            batch.fail(ActorError::Action {
                actor: cell.id,
                event: event.name().to_string(),
                source,
            });
        }
    }

    /// Run actions in order, stopping at the first failure.
    fn run_actions(
        &self,
        core: &mut Core<C, E>,
        actions: &[Action<C, E>],
        event: Option<&E>,
    ) -> Result<(), ActionError> {
        if actions.is_empty() {
            return Ok(());
        }
        let Core {
            context,
            raised,
            children,
            ..
        } = core;
        let mut scope = Scope {
            context: Arc::make_mut(context),
            event,
            raised,
            children,
            actor: self,
        };
        for action in actions {
            let outcome = contain(|| action.execute(&mut scope))
                .unwrap_or_else(|message| Err(ActionError::Panicked(message)));
            if let Err(error) = outcome {
                warn!(
                    actor = %self.cell.id,
                    action = action.label().unwrap_or("anonymous"),
                    %error,
                    "Action failed"
                );
                return Err(error);
            }
        }
        Ok(())
    }

    fn status_of(&self, core: &Core<C, E>) -> ActorStatus {
        if self.cell.machine.is_done(&core.configuration) {
            ActorStatus::Done
        } else {
            ActorStatus::Running
        }
    }
}

fn owned_paths(paths: Vec<&str>) -> Vec<String> {
    paths.into_iter().map(str::to_string).collect()
}
