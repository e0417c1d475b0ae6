//! Explicitly released subscriptions.

use std::fmt;

/// Handle returned by every `subscribe` in the crate.
///
/// Dropping a `Subscription` does **not** unsubscribe; the holder owns the
/// listener's lifetime and must call [`unsubscribe`](Subscription::unsubscribe)
/// when done.
#[must_use = "a subscription stays active until `unsubscribe` is called"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the listener. Later notifications are not delivered to it.
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}
