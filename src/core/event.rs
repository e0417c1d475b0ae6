//! The closed event union every machine is driven by.
//!
//! Each machine declares one event enum. Transitions are keyed by the
//! event's [`Event::Kind`], a fieldless mirror of the enum, so a transition
//! table can only mention variants that actually exist.

use std::fmt::Debug;
use std::hash::Hash;

/// Trait for the events a machine reacts to.
///
/// Implementations are usually generated with [`event_enum!`](crate::event_enum),
/// which derives the kind enum alongside the event enum.
///
/// # Example
///
/// ```rust
/// use choreo::core::Event;
///
/// #[derive(Clone, Debug)]
/// enum DoorEvent {
///     Open,
///     Lock { code: u32 },
/// }
///
/// #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
/// enum DoorEventKind {
///     Open,
///     Lock,
/// }
///
/// impl Event for DoorEvent {
///     type Kind = DoorEventKind;
///
///     fn kind(&self) -> DoorEventKind {
///         match self {
///             Self::Open => DoorEventKind::Open,
///             Self::Lock { .. } => DoorEventKind::Lock,
///         }
///     }
///
///     fn name(&self) -> &'static str {
///         match self {
///             Self::Open => "Open",
///             Self::Lock { .. } => "Lock",
///         }
///     }
/// }
///
/// assert_eq!(DoorEvent::Lock { code: 1 }.kind(), DoorEventKind::Lock);
/// ```
pub trait Event: Clone + Debug + Send + Sync + 'static {
    /// Payload-free discriminant used to key transition tables.
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// Discriminant of this event.
    fn kind(&self) -> Self::Kind;

    /// Variant name for logging and inspection.
    fn name(&self) -> &'static str;
}
