//! Builder API for ergonomic machine construction.
//!
//! This module provides fluent builders and a macro for declaring machines
//! with minimal boilerplate while keeping event handling exhaustive.

pub mod error;
pub mod machine;
pub mod macros;
pub mod state;
pub mod transition;

pub use error::{BuildError, DefinitionError};
pub use machine::MachineBuilder;
pub use state::StateBuilder;
pub use transition::TransitionBuilder;

use crate::core::Event;

/// Create an unguarded transition to `target`.
///
/// # Example
///
/// ```
/// use choreo::builder::{goto, MachineBuilder, StateBuilder};
/// use choreo::event_enum;
///
/// event_enum! {
///     enum Ev {
///         Next,
///     }
///     kind: EvKind
/// }
///
/// let machine = MachineBuilder::<(), Ev>::new("m")
///     .state(StateBuilder::new("a").on(goto(EvKind::Next, "b")))
///     .state(StateBuilder::new("b"))
///     .build()
///     .unwrap();
/// assert_eq!(machine.nodes().count(), 3);
/// ```
pub fn goto<C: 'static, E: Event>(kind: E::Kind, target: &str) -> TransitionBuilder<C, E> {
    TransitionBuilder::on(kind).target(target)
}

/// Create a transition to `target` taken only when `guard` holds.
pub fn guarded<C, E, F>(kind: E::Kind, target: &str, guard: F) -> TransitionBuilder<C, E>
where
    C: 'static,
    E: Event,
    F: Fn(&C, &E) -> bool + Send + Sync + 'static,
{
    TransitionBuilder::on(kind).target(target).when(guard)
}
