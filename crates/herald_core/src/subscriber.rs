//! Subscriber handles
//!
//! A [`Subscriber`] is a shared handle to one registered callable. Handles
//! compare by identity: clones of the same handle are equal, two handles
//! wrapping separately built closures never are. This is what `remove`
//! matches against.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::dispatcher::EventDispatcher;
use crate::signature::{Handler, Signature};

/// Shared handle to a registered callable
pub struct Subscriber<S: Signature> {
    callback: Arc<S::Callback>,
}

impl<S: Signature> Subscriber<S> {
    /// Wrap a closure as a subscriber for signature `S`
    pub fn new<F: Handler<S>>(handler: F) -> Self {
        Self {
            callback: handler.into_callback(),
        }
    }

    /// Wrap an already shared callable
    pub fn from_arc(callback: Arc<S::Callback>) -> Self {
        Self { callback }
    }

    pub(crate) fn callback(&self) -> &S::Callback {
        &self.callback
    }
}

impl<S: Signature> Clone for Subscriber<S> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<S: Signature> PartialEq for Subscriber<S> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<S: Signature> Eq for Subscriber<S> {}

impl<S: Signature> fmt::Debug for Subscriber<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscriber")
            .field(&Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

/// Registration guard returned by [`EventDispatcher::subscribe`]
///
/// Dropping the guard removes its subscriber, if the dispatcher is still
/// alive. Call [`detach`](Subscription::detach) to keep the subscriber
/// registered for the dispatcher's lifetime.
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription<S: Signature> {
    dispatcher: Weak<EventDispatcher<S>>,
    subscriber: Subscriber<S>,
    armed: bool,
}

impl<S: Signature> Subscription<S> {
    pub(crate) fn new(dispatcher: &Arc<EventDispatcher<S>>, subscriber: Subscriber<S>) -> Self {
        Self {
            dispatcher: Arc::downgrade(dispatcher),
            subscriber,
            armed: true,
        }
    }

    /// Handle of the guarded subscriber
    pub fn subscriber(&self) -> &Subscriber<S> {
        &self.subscriber
    }

    /// Keep the subscriber registered and give up the guard
    pub fn detach(mut self) -> Subscriber<S> {
        self.armed = false;
        self.subscriber.clone()
    }
}

impl<S: Signature> Drop for Subscription<S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.remove(&self.subscriber);
        }
    }
}

impl<S: Signature> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber", &self.subscriber)
            .field("armed", &self.armed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Notify;

    type Tick = Notify<u64>;

    #[test]
    fn test_identity_equality() {
        let a: Subscriber<Tick> = Subscriber::new(|_: &u64| {});
        let b: Subscriber<Tick> = Subscriber::new(|_: &u64| {});

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_shared_arc_is_equal() {
        let callback: Arc<dyn Fn(&u64) + Send + Sync> = Arc::new(|_: &u64| {});
        let a = Subscriber::<Tick>::from_arc(Arc::clone(&callback));
        let b = Subscriber::<Tick>::from_arc(callback);

        assert_eq!(a, b);
    }
}
