//! Build errors for machine definitions.

use thiserror::Error;

/// Errors that can occur when building a machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Machine '{machine}' is invalid: {}", summarize(.errors))]
    Invalid {
        machine: String,
        errors: Vec<DefinitionError>,
    },
}

impl BuildError {
    /// Every problem found in the definition.
    pub fn errors(&self) -> &[DefinitionError] {
        match self {
            Self::Invalid { errors, .. } => errors,
        }
    }
}

fn summarize(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single problem in a machine definition.
///
/// The builder collects all of them before failing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error("Machine has no states. Add at least one with .state(..)")]
    Empty,

    #[error("State name '{name}' must be non-empty and must not contain '.'")]
    InvalidName { name: String },

    #[error("State '{path}' has more than one child named '{name}'")]
    DuplicateChild { path: String, name: String },

    #[error("State '{path}' declares initial '{initial}', which is not one of its children")]
    UnknownInitial { path: String, initial: String },

    #[error("Parallel state '{path}' cannot declare an initial child")]
    InitialOnParallel { path: String },

    #[error("Parallel state '{path}' has no regions")]
    EmptyParallel { path: String },

    #[error("Final state '{path}' cannot have children")]
    FinalWithChildren { path: String },

    #[error("Transition on {event} from '{path}' targets unknown state '{target}'")]
    UnknownTarget {
        path: String,
        event: String,
        target: String,
    },

    #[error("Transition on {event} from '{path}' has targets that are not in distinct parallel regions")]
    ConflictingTargets { path: String, event: String },
}
