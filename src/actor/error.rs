use super::{ActorId, ActorStatus};
use crate::core::ActionError;
use thiserror::Error;

/// Errors surfaced by [`ActorRef`](super::ActorRef) operations.
#[derive(Debug, Error)]
pub enum ActorError {
    /// An action failed. The configuration change of the microstep was
    /// still applied; actions declared after the failing one were skipped.
    #[error("Action failed in actor {actor} while handling {event}: {source}")]
    Action {
        actor: ActorId,
        event: String,
        #[source]
        source: ActionError,
    },

    #[error("Actor {actor} is not running (status: {status:?})")]
    NotRunning { actor: ActorId, status: ActorStatus },

    /// A batch of self-raised events did not settle.
    #[error("Actor {actor} exceeded {limit} microsteps in one batch")]
    MicrostepLimit { actor: ActorId, limit: usize },
}
