//! Choreo: hierarchical state machine actors
//!
//! Choreo runs statecharts as actors. Machine definitions are pure,
//! immutable values built with fluent builders; the interpreter around them
//! owns the side effects: actions, invoked services, timers and listeners.
//!
//! # Core Concepts
//!
//! - **Machine**: an arena of atomic, compound, parallel and final states
//!   with guarded transitions over a closed event enum
//! - **Actor**: a running machine holding one context and one
//!   configuration, processing events run-to-completion
//! - **Invoked services**: async operations tied to a state's lifetime,
//!   cancelled on exit, whose outcome re-enters the actor as an event
//! - **System**: spawns actors and lets unrelated ones find each other by
//!   name
//! - **EventBus**: breadth-first multicast for cross-cutting messages
//! - **Selectors**: referentially stable projections of snapshots
//!
//! # Example
//!
//! ```rust
//! use choreo::builder::{goto, MachineBuilder, StateBuilder, TransitionBuilder};
//! use choreo::event_enum;
//! use choreo::system::System;
//!
//! event_enum! {
//!     enum Query {
//!         Run,
//!         Reset,
//!     }
//!     kind: QueryKind
//! }
//!
//! #[derive(Clone, Default)]
//! struct Runs {
//!     count: u32,
//! }
//!
//! let machine = MachineBuilder::<Runs, Query>::new("query")
//!     .state(
//!         StateBuilder::new("idle")
//!             .on(goto(QueryKind::Run, "running").assign(|runs: &mut Runs, _| runs.count += 1)),
//!     )
//!     .state(StateBuilder::new("running").on(goto(QueryKind::Reset, "idle")))
//!     .on(TransitionBuilder::on(QueryKind::Reset).assign(|runs: &mut Runs, _| runs.count = 0))
//!     .build()
//!     .unwrap();
//!
//! let system = System::new();
//! let query = system.spawn(machine, Runs::default()).unwrap();
//!
//! let snapshot = query.send(Query::Run).unwrap();
//! assert!(snapshot.matches("running"));
//! assert_eq!(snapshot.context().count, 1);
//!
//! // `running` handles Reset itself, so the root's handler is not reached.
//! let snapshot = query.send(Query::Reset).unwrap();
//! assert!(snapshot.matches("idle"));
//! assert_eq!(snapshot.context().count, 1);
//!
//! // `idle` declares nothing for Reset: the event bubbles to the root.
//! let snapshot = query.send(Query::Reset).unwrap();
//! assert_eq!(snapshot.context().count, 0);
//! ```

pub mod actor;
pub mod builder;
pub mod bus;
pub mod core;
pub mod select;
pub mod system;

mod subscription;

// Re-export commonly used types
pub use actor::{ActorError, ActorRef, ActorStatus, Scope, Snapshot};
pub use builder::{BuildError, MachineBuilder, StateBuilder, TransitionBuilder};
pub use bus::EventBus;
pub use core::{Event, Machine};
pub use subscription::Subscription;
pub use system::System;
