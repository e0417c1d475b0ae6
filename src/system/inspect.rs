//! Diagnostics records emitted by actors.

use crate::actor::ActorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observable runtime occurrence.
///
/// Delivered synchronously to the inspector installed with
/// [`System::with_inspector`](super::System::with_inspector).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inspection {
    pub actor: ActorId,
    pub at: DateTime<Utc>,
    pub kind: InspectionKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InspectionKind {
    Started,
    /// A committed microstep, with active leaf paths before and after.
    Microstep {
        event: String,
        from: Vec<String>,
        to: Vec<String>,
    },
    /// No active state declares a transition for the event.
    Unhandled { event: String },
    GuardFailed {
        state: String,
        event: String,
        guard: Option<String>,
        message: String,
    },
    /// Settlement of a service or timer whose state was already exited.
    ServiceDiscarded { state: String },
    /// Rejection of a service declared without an error mapping.
    ServiceRejected { state: String, message: String },
    Done,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_with_type_tag() {
        let json = serde_json::to_value(InspectionKind::Unhandled {
            event: "Ping".to_string(),
        })
        .unwrap();

        assert_eq!(json["type"], "unhandled");
        assert_eq!(json["event"], "Ping");
    }
}
