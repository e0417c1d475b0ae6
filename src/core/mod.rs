//! Core machine types and logic.
//!
//! This module contains the pure part of the runtime:
//! - Event unions via the `Event` trait
//! - Guard predicates and actions
//! - The state-node arena and machine definition
//! - Configurations and the transition-selection algorithms
//!
//! Nothing in here starts tasks or holds locks; the interpreter in
//! [`crate::actor`] is the imperative shell around it.

mod action;
mod configuration;
mod event;
mod guard;
pub(crate) mod invoke;
mod machine;
pub(crate) mod node;
mod unwind;

pub use action::{Action, ActionError};
pub use configuration::{Configuration, StateValue};
pub use event::Event;
pub use guard::{Guard, GuardError};
pub use invoke::Invoke;
pub use machine::Machine;
pub use node::{StateId, StateKind, StateNode, Transition};

pub(crate) use invoke::Settlement;
pub(crate) use machine::{Selected, Selection};
pub(crate) use unwind::contain;
