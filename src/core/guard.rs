//! Guard predicates for controlling transitions.
//!
//! Guards are pure functions of the actor's context and the event being
//! processed. A guard that fails with a [`GuardError`] (or panics) is
//! treated as returning `false`; the interpreter logs the failure and moves
//! on.

use super::unwind::contain;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a fallible guard.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("guard failed: {message}")]
pub struct GuardError {
    pub message: String,
    /// Label of the failing guard, when it was [`named`](Guard::named).
    pub guard: Option<&'static str>,
}

impl GuardError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            guard: None,
        }
    }

    fn labelled(mut self, label: Option<&'static str>) -> Self {
        self.guard = self.guard.or(label);
        self
    }
}

type Predicate<C, E> = Arc<dyn Fn(&C, &E) -> Result<bool, GuardError> + Send + Sync>;

/// Pure predicate that determines if a transition can be taken.
///
/// # Example
///
/// ```rust
/// use choreo::core::Guard;
///
/// struct Counter {
///     value: u32,
/// }
///
/// let below_limit = Guard::new(|ctx: &Counter, limit: &u32| ctx.value < *limit);
///
/// assert!(below_limit.check(&Counter { value: 1 }, &3).unwrap());
/// assert!(!below_limit.check(&Counter { value: 5 }, &3).unwrap());
/// ```
pub struct Guard<C, E> {
    predicate: Predicate<C, E>,
    label: Option<&'static str>,
}

impl<C, E> Guard<C, E> {
    /// Create a guard from an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C, &E) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(move |ctx: &C, event: &E| -> Result<bool, GuardError> {
                Ok(predicate(ctx, event))
            }),
            label: None,
        }
    }

    /// Create a guard whose evaluation can fail.
    ///
    /// A failure is never propagated: the transition is simply not taken.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&C, &E) -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            label: None,
        }
    }

    /// Attach a name shown in logs and inspection records.
    pub fn named(mut self, label: &'static str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn label(&self) -> Option<&'static str> {
        self.label
    }

    /// Evaluate the predicate. A panicking predicate is reported as an
    /// error carrying the panic message.
    pub fn check(&self, context: &C, event: &E) -> Result<bool, GuardError> {
        contain(|| (self.predicate)(context, event))
            .unwrap_or_else(|message| Err(GuardError::new(format!("panicked: {message}"))))
            .map_err(|error| error.labelled(self.label))
    }
}

impl<C, E> Clone for Guard<C, E> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            label: self.label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        items: Vec<u32>,
    }

    #[test]
    fn guard_allows_matching_context() {
        let guard = Guard::new(|ctx: &Ctx, _: &()| !ctx.items.is_empty());

        assert!(guard.check(&Ctx { items: vec![1] }, &()).unwrap());
        assert!(!guard.check(&Ctx { items: vec![] }, &()).unwrap());
    }

    #[test]
    fn guard_sees_event_payload() {
        let guard = Guard::new(|ctx: &Ctx, wanted: &u32| ctx.items.contains(wanted));
        let ctx = Ctx {
            items: vec![1, 2, 3],
        };

        assert!(guard.check(&ctx, &2).unwrap());
        assert!(!guard.check(&ctx, &7).unwrap());
    }

    #[test]
    fn fallible_guard_reports_error() {
        let guard = Guard::fallible(|_: &Ctx, _: &()| Err(GuardError::new("no data")));

        let result = guard.check(&Ctx { items: vec![] }, &());
        assert_eq!(result, Err(GuardError::new("no data")));
    }

    #[test]
    fn guard_is_deterministic() {
        let ctx = Ctx { items: vec![4] };
        let guard = Guard::new(|ctx: &Ctx, _: &()| ctx.items.len() == 1);

        assert_eq!(guard.check(&ctx, &()), guard.check(&ctx, &()));
    }

    #[test]
    fn errors_carry_the_guard_label() {
        let guard = Guard::fallible(|_: &Ctx, _: &()| Err(GuardError::new("offline"))).named("has_session");

        let error = guard.check(&Ctx { items: vec![] }, &()).unwrap_err();
        assert_eq!(error.guard, Some("has_session"));
        assert_eq!(error.message, "offline");
    }

    #[test]
    fn panicking_guard_is_an_error() {
        let guard = Guard::new(|ctx: &Ctx, _: &()| ctx.items[3] > 0).named("fourth_item");

        let error = guard.check(&Ctx { items: vec![1] }, &()).unwrap_err();
        assert!(error.message.starts_with("panicked:"));
        assert_eq!(error.guard, Some("fourth_item"));
    }

    #[test]
    fn clone_keeps_label() {
        let guard = Guard::new(|_: &Ctx, _: &()| true).named("always");
        assert_eq!(guard.clone().label(), Some("always"));
    }
}
