//! Multicast bus for cross-cutting messages.
//!
//! Any number of handlers subscribe to an [`EventBus`]; every published
//! message reaches every current subscriber, synchronously and in
//! subscription order. The bus is independent of the registry and of actor
//! hierarchies: actors join it through [`EventBus::forward_to`].
//!
//! # Re-entrancy
//!
//! A message published while another is being delivered (from a handler,
//! or from another thread) is queued and delivered after the current
//! subscriber list finishes. Delivery is therefore breadth-first and never
//! recurses into `publish`.
//!
//! ```rust
//! use choreo::bus::EventBus;
//! use std::sync::{Arc, Mutex};
//!
//! let bus: EventBus<String> = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let subscription = bus.subscribe(move |message: &String| sink.lock().unwrap().push(message.clone()));
//!
//! bus.publish("visualization-created".to_string());
//! subscription.unsubscribe();
//! bus.publish("ignored".to_string());
//!
//! assert_eq!(*seen.lock().unwrap(), vec!["visualization-created"]);
//! ```

use crate::actor::{ActorRef, Context};
use crate::core::Event;
use crate::subscription::Subscription;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{trace, warn};

type Handler<M> = Box<dyn Fn(&M) + Send + Sync>;
type Filter<M> = Box<dyn Fn(&M) -> bool + Send + Sync>;

struct Subscriber<M> {
    id: u64,
    filter: Option<Filter<M>>,
    handler: Handler<M>,
    active: AtomicBool,
}

impl<M> Subscriber<M> {
    fn accepts(&self, message: &M) -> bool {
        self.active.load(Ordering::Acquire) && self.filter.as_ref().map_or(true, |filter| filter(message))
    }
}

struct Delivery<M> {
    pending: VecDeque<M>,
    delivering: bool,
}

/// Clears `delivering` if a handler unwinds out of `publish`.
struct DeliveryGuard<'a, M> {
    delivery: &'a Mutex<Delivery<M>>,
}

impl<M> Drop for DeliveryGuard<'_, M> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.delivery.lock().delivering = false;
        }
    }
}

struct BusInner<M> {
    subscribers: Mutex<Vec<Arc<Subscriber<M>>>>,
    delivery: Mutex<Delivery<M>>,
    next_id: AtomicU64,
}

/// Cheaply cloneable handle to a message bus.
pub struct EventBus<M> {
    inner: Arc<BusInner<M>>,
}

impl<M: Send + 'static> EventBus<M> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                delivery: Mutex::new(Delivery {
                    pending: VecDeque::new(),
                    delivering: false,
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Deliver `message` to every subscriber, or queue it behind the
    /// delivery in progress.
    pub fn publish(&self, message: M) {
        {
            let mut delivery = self.inner.delivery.lock();
            delivery.pending.push_back(message);
            if delivery.delivering {
                trace!(queued = delivery.pending.len(), "Message queued behind current delivery");
                return;
            }
            delivery.delivering = true;
        }

        let _guard = DeliveryGuard {
            delivery: &self.inner.delivery,
        };
        loop {
            let message = {
                let mut delivery = self.inner.delivery.lock();
                match delivery.pending.pop_front() {
                    Some(message) => message,
                    None => {
                        delivery.delivering = false;
                        return;
                    }
                }
            };
            let subscribers = self.inner.subscribers.lock().clone();
            for subscriber in subscribers {
                if subscriber.accepts(&message) {
                    (subscriber.handler)(&message);
                }
            }
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.attach(None, Box::new(handler))
    }

    /// Subscribe to the messages for which `filter` holds.
    pub fn subscribe_filtered<P, F>(&self, filter: P, handler: F) -> Subscription
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.attach(Some(Box::new(filter)), Box::new(handler))
    }

    /// Send `map(message)` to `actor` for every message that maps to an
    /// event.
    ///
    /// The subscription holds the actor weakly; once the actor is dropped
    /// messages are ignored. Errors from the actor are logged, not
    /// propagated to the publisher.
    pub fn forward_to<C, E, F>(&self, actor: &ActorRef<C, E>, map: F) -> Subscription
    where
        C: Context,
        E: Event,
        F: Fn(&M) -> Option<E> + Send + Sync + 'static,
    {
        let target = actor.downgrade();
        self.subscribe(move |message| {
            let Some(event) = map(message) else {
                return;
            };
            let Some(actor) = target.upgrade() else {
                return;
            };
            if let Err(error) = actor.send(event) {
                warn!(actor = %actor.id(), %error, "Forwarded bus message failed");
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    fn attach(&self, filter: Option<Filter<M>>, handler: Handler<M>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            filter,
            handler,
            active: AtomicBool::new(true),
        });
        self.inner.subscribers.lock().push(Arc::clone(&subscriber));

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            subscriber.active.store(false, Ordering::Release);
            if let Some(inner) = inner.upgrade() {
                inner.subscribers.lock().retain(|entry| entry.id != id);
            }
        })
    }
}

impl<M: Send + 'static> Default for EventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for EventBus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for EventBus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.inner.subscribers.lock().len())
            .finish()
    }
}
