//! Invoked services: asynchronous operations bound to a state's lifetime.
//!
//! A service is started when its state is entered and cancelled when the
//! state is exited. Its outcome is mapped back into the machine's own event
//! type and re-enters the actor like any other event.

use futures::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a finished activity, already mapped to the machine's events.
pub(crate) enum Settlement<E> {
    /// Resolved; the mapped event (if `on_done` was declared).
    Done(Option<E>),
    /// Rejected; the mapped event (if `on_error` was declared).
    Rejected { message: String, event: Option<E> },
}

type Starter<C, E> = Arc<dyn Fn(&C, Option<&E>) -> BoxFuture<'static, Settlement<E>> + Send + Sync>;

/// Type-erased service attached to a state node.
pub(crate) struct InvokeDef<C, E> {
    pub(crate) id: String,
    pub(crate) start: Starter<C, E>,
}

impl<C, E> Clone for InvokeDef<C, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            start: Arc::clone(&self.start),
        }
    }
}

/// Delayed transition trigger: `event` is raised after `delay` unless the
/// state is exited first.
pub(crate) struct DelayDef<E> {
    pub(crate) delay: Duration,
    pub(crate) event: E,
}

impl<E: Clone> Clone for DelayDef<E> {
    fn clone(&self) -> Self {
        Self {
            delay: self.delay,
            event: self.event.clone(),
        }
    }
}

type Service<C, E, T, Err> =
    Arc<dyn Fn(&C, Option<&E>) -> BoxFuture<'static, Result<T, Err>> + Send + Sync>;

/// Declaration of a service invoked while a state is active.
///
/// The service receives the context and the event that caused the state to
/// be entered (`None` when entered at start). Resolution is mapped with
/// [`on_done`](Invoke::on_done), rejection with [`on_error`](Invoke::on_error).
/// A rejection without `on_error` is logged and swallowed; the actor stays in
/// its current configuration.
///
/// # Example
///
/// ```rust
/// use choreo::core::Invoke;
///
/// #[derive(Clone, Debug)]
/// enum Ev {
///     Loaded(u32),
///     Failed(String),
/// }
///
/// let load: Invoke<(), Ev, u32, String> = Invoke::new("load", |_ctx: &(), _ev| async { Ok(7) })
///     .on_done(Ev::Loaded)
///     .on_error(Ev::Failed);
/// assert_eq!(load.id(), "load");
/// ```
pub struct Invoke<C, E, T, Err> {
    id: String,
    service: Service<C, E, T, Err>,
    on_done: Option<Arc<dyn Fn(T) -> E + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(Err) -> E + Send + Sync>>,
}

impl<C, E, T, Err> Invoke<C, E, T, Err>
where
    C: 'static,
    E: Send + 'static,
    T: Send + 'static,
    Err: Display + Send + 'static,
{
    pub fn new<F, Fut>(id: impl Into<String>, service: F) -> Self
    where
        F: Fn(&C, Option<&E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, Err>> + Send + 'static,
    {
        Self {
            id: id.into(),
            service: Arc::new(
                move |ctx: &C, event: Option<&E>| -> BoxFuture<'static, Result<T, Err>> {
                    Box::pin(service(ctx, event))
                },
            ),
            on_done: None,
            on_error: None,
        }
    }

    pub fn on_done<F>(mut self, map: F) -> Self
    where
        F: Fn(T) -> E + Send + Sync + 'static,
    {
        self.on_done = Some(Arc::new(map));
        self
    }

    pub fn on_error<F>(mut self, map: F) -> Self
    where
        F: Fn(Err) -> E + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(map));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn erase(self) -> InvokeDef<C, E> {
        let Self {
            id,
            service,
            on_done,
            on_error,
        } = self;

        let start: Starter<C, E> = Arc::new(
            move |ctx: &C, event: Option<&E>| -> BoxFuture<'static, Settlement<E>> {
                let pending = service(ctx, event);
                let on_done = on_done.clone();
                let on_error = on_error.clone();
                Box::pin(async move {
                    match pending.await {
                        Ok(value) => Settlement::Done(on_done.map(|map| map(value))),
                        Err(error) => {
                            let message = error.to_string();
                            Settlement::Rejected {
                                message,
                                event: on_error.map(|map| map(error)),
                            }
                        }
                    }
                })
            },
        );

        InvokeDef { id, start }
    }
}
