//! Cached multicast event dispatcher
//!
//! [`EventDispatcher`] owns the subscriber list of one event and delivers
//! payloads to every subscriber synchronously, on the calling thread.
//!
//! ## Architecture
//! ```text
//! add / remove / transfer_to            invoke(args)
//!        │                                   │
//!        ▼                                   ▼
//!  ┌──────────────┐   publish (store)  ┌──────────────┐
//!  │ Mutex<Vec<_>>│ ─────────────────► │ ArcSwap<Vec> │ ── load_full ──► strategy
//!  │ (master list)│                    │  (snapshot)  │                     │
//!  └──────────────┘                    └──────────────┘          ┌──────────┼──────────┐
//!                                                                ▼          ▼          ▼
//!                                                              sub1       sub2  ...  subN
//!                                                          (catch_unwind per subscriber)
//! ```
//!
//! ## Rules
//! - **Registration order**: subscribers run in the order they were added
//! - **Snapshot per call**: an in-flight `invoke` keeps the snapshot it loaded;
//!   concurrent mutations are seen by the next call
//! - **Isolation**: a panicking subscriber is logged and skipped, later ones still run
//! - **Veto**: for [`Cancellable`](crate::Cancellable) events the first subscriber that
//!   moves the flag away from the default verdict ends delivery
//! - **Reentrancy**: no lock is held while subscribers run, so handlers may
//!   add, remove or invoke on the same dispatcher

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::config::{render_error_message, DispatcherConfig};
use crate::error::{HeraldError, Result};
use crate::signature::{Allow, Handler, Signature};
use crate::subscriber::{Subscriber, Subscription};

/// Allocation sequence; also the lock order for `transfer_to`
static NEXT_DISPATCHER_ID: AtomicU64 = AtomicU64::new(1);

/// Invocation strategy, bound once at construction
type Strategy<S> = fn(&EventDispatcher<S>, &[Subscriber<S>], &<S as Signature>::Args) -> bool;

/// Thread-safe multicast dispatcher for one event
pub struct EventDispatcher<S: Signature> {
    id: u64,
    owner: String,
    name: String,
    default_veto: bool,
    error_message: String,
    subscribers: Mutex<Vec<Subscriber<S>>>,
    snapshot: ArcSwap<Vec<Subscriber<S>>>,
    strategy: Strategy<S>,
}

impl<S: Signature> EventDispatcher<S> {
    /// Create a dispatcher for `owner.name`
    ///
    /// `default_veto` is the verdict cancellable handlers start from:
    /// `true` means allowed unless someone denies.
    ///
    /// # Errors
    ///
    /// [`HeraldError::ReturnsValue`] if the signature's handlers return
    /// anything but `()`.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        default_veto: bool,
    ) -> Result<Self> {
        Self::builder(owner, name).default_veto(default_veto).build()
    }

    /// Start building a dispatcher for `owner.name`
    pub fn builder(owner: impl Into<String>, name: impl Into<String>) -> DispatcherBuilder<S> {
        DispatcherBuilder {
            config: DispatcherConfig::new(owner, name),
            _signature: PhantomData,
        }
    }

    /// Create a dispatcher from a resolved config
    pub fn from_config(config: &DispatcherConfig) -> Result<Self> {
        if TypeId::of::<S::Output>() != TypeId::of::<()>() {
            tracing::error!(
                owner = %config.owner,
                event = %config.name,
                return_type = type_name::<S::Output>(),
                "multicast event declared with a return value"
            );
            return Err(HeraldError::ReturnsValue {
                owner: config.owner.clone(),
                event: config.name.clone(),
                return_type: type_name::<S::Output>(),
            });
        }

        Ok(Self {
            id: NEXT_DISPATCHER_ID.fetch_add(1, Ordering::Relaxed),
            owner: config.owner.clone(),
            name: config.name.clone(),
            default_veto: config.default_veto,
            error_message: config.error_message.clone(),
            subscribers: Mutex::new(Vec::new()),
            snapshot: ArcSwap::from_pointee(Vec::new()),
            strategy: select_strategy::<S>(config.default_veto),
        })
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Label of the component that declared the event
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Initial verdict handed to cancellable handlers
    pub fn default_veto(&self) -> bool {
        self.default_veto
    }

    /// Whether handlers receive an [`Allow`] flag
    pub fn is_cancellable(&self) -> bool {
        S::CANCELLABLE
    }

    /// Template logged when a subscriber panics
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    // =========================================================================
    // Subscription management
    // =========================================================================

    /// Append a subscriber. `None` is ignored.
    ///
    /// Adding the same handle twice registers it twice.
    pub fn add(&self, subscriber: impl Into<Option<Subscriber<S>>>) {
        let Some(subscriber) = subscriber.into() else {
            return;
        };

        let mut list = self.subscribers.lock();
        list.push(subscriber);
        self.publish(&list);
        tracing::trace!(
            owner = %self.owner,
            event = %self.name,
            subscribers = list.len(),
            "subscriber added"
        );
    }

    /// Wrap `handler` and append it, returning the handle for later removal
    pub fn add_handler<F: Handler<S>>(&self, handler: F) -> Subscriber<S> {
        let subscriber = Subscriber::new(handler);
        self.add(subscriber.clone());
        subscriber
    }

    /// Add `handler` and return a guard that removes it on drop
    pub fn subscribe<F: Handler<S>>(self: &Arc<Self>, handler: F) -> Subscription<S> {
        let subscriber = self.add_handler(handler);
        Subscription::new(self, subscriber)
    }

    /// Remove the most recently added occurrence of `subscriber`
    ///
    /// `None` and handles that are not registered are ignored.
    pub fn remove<'a>(&self, subscriber: impl Into<Option<&'a Subscriber<S>>>) {
        let Some(subscriber) = subscriber.into() else {
            return;
        };

        let mut list = self.subscribers.lock();
        if let Some(index) = list.iter().rposition(|s| s == subscriber) {
            list.remove(index);
            self.publish(&list);
            tracing::trace!(
                owner = %self.owner,
                event = %self.name,
                subscribers = list.len(),
                "subscriber removed"
            );
        }
    }

    /// Copy this dispatcher's subscribers into `other`
    ///
    /// With `union == false` the subscribers of `other` are replaced, so both
    /// end up with the same sequence. With `union == true` entries of `other`
    /// equal to one of ours are dropped, then each distinct subscriber of ours
    /// is appended once, so no subscriber appears twice in `other` afterward.
    /// This dispatcher is left unchanged.
    pub fn transfer_to(&self, other: &EventDispatcher<S>, union: bool) {
        if self.id == other.id {
            return;
        }

        let (ours, mut theirs) = if self.id < other.id {
            let ours = self.subscribers.lock();
            (ours, other.subscribers.lock())
        } else {
            let theirs = other.subscribers.lock();
            (self.subscribers.lock(), theirs)
        };

        if union {
            theirs.retain(|s| !ours.contains(s));
            for subscriber in ours.iter() {
                if !theirs.contains(subscriber) {
                    theirs.push(subscriber.clone());
                }
            }
        } else {
            theirs.clear();
            theirs.extend(ours.iter().cloned());
        }
        other.publish(&theirs);

        tracing::debug!(
            from = %self,
            to = %other,
            union = union,
            subscribers = theirs.len(),
            "subscribers transferred"
        );
    }

    /// Copy of the current subscriber sequence
    pub fn snapshot(&self) -> Vec<Subscriber<S>> {
        self.snapshot.load_full().as_slice().to_vec()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Replace the cached snapshot. Callers hold the list lock.
    fn publish(&self, list: &[Subscriber<S>]) {
        self.snapshot.store(Arc::new(list.to_vec()));
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Deliver `args` to every subscriber in the current snapshot
    ///
    /// Never panics on behalf of a subscriber: faults are logged with the
    /// configured error message and delivery moves on.
    ///
    /// Panics are caught after the process panic hook has run, so the default
    /// hook still prints each fault to stderr. Hosts that want faults only in
    /// the tracing log install their own hook with [`std::panic::set_hook`].
    pub fn invoke(&self, args: &S::Args) {
        self.decide(args);
    }

    /// Deliver `args` like [`invoke`](Self::invoke) and return the final verdict
    ///
    /// Cancellable events report the flag as the last subscriber left it, or
    /// the default verdict if no one ran. Other events always report `true`.
    pub fn decide(&self, args: &S::Args) -> bool {
        let snapshot = self.snapshot.load_full();
        (self.strategy)(self, snapshot.as_slice(), args)
    }

    /// Run one subscriber, returning `false` if it panicked
    ///
    /// A panicking subscriber's vote is discarded: `allow` is restored to the
    /// value it had before the call.
    fn call_guarded(&self, subscriber: &Subscriber<S>, args: &S::Args, allow: &mut Allow) -> bool {
        let before = *allow;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = S::call(subscriber.callback(), args, allow);
        }));

        match result {
            Ok(()) => true,
            Err(payload) => {
                *allow = before;
                self.report_fault(&*payload);
                false
            }
        }
    }

    fn report_fault(&self, payload: &(dyn Any + Send)) {
        let panic = panic_message(payload);
        let message = render_error_message(&self.error_message, &self.owner, &self.name, &panic);
        tracing::error!(owner = %self.owner, event = %self.name, panic = %panic, "{message}");
    }
}

impl<S: Signature> fmt::Display for EventDispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

impl<S: Signature> fmt::Debug for EventDispatcher<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("default_veto", &self.default_veto)
            .field("cancellable", &S::CANCELLABLE)
            .field("subscribers", &self.snapshot.load().len())
            .finish()
    }
}

/// Builder for [`EventDispatcher`]
pub struct DispatcherBuilder<S: Signature> {
    config: DispatcherConfig,
    _signature: PhantomData<fn() -> S>,
}

impl<S: Signature> DispatcherBuilder<S> {
    /// Initial verdict for cancellable handlers (default `true`)
    pub fn default_veto(mut self, default_veto: bool) -> Self {
        self.config.default_veto = default_veto;
        self
    }

    /// Template logged when a subscriber panics
    ///
    /// Supports `{owner}`, `{event}` and `{panic}` placeholders.
    pub fn error_message(mut self, template: impl Into<String>) -> Self {
        self.config.error_message = template.into();
        self
    }

    pub fn build(self) -> Result<EventDispatcher<S>> {
        EventDispatcher::from_config(&self.config)
    }
}

fn select_strategy<S: Signature>(default_veto: bool) -> Strategy<S> {
    match (S::CANCELLABLE, default_veto) {
        (false, _) => dispatch_plain::<S>,
        (true, true) => dispatch_vetoable::<S, true>,
        (true, false) => dispatch_vetoable::<S, false>,
    }
}

fn dispatch_plain<S: Signature>(
    dispatcher: &EventDispatcher<S>,
    subscribers: &[Subscriber<S>],
    args: &S::Args,
) -> bool {
    let mut allow = Allow::new(true);
    for subscriber in subscribers {
        dispatcher.call_guarded(subscriber, args, &mut allow);
    }
    true
}

fn dispatch_vetoable<S: Signature, const DEFAULT: bool>(
    dispatcher: &EventDispatcher<S>,
    subscribers: &[Subscriber<S>],
    args: &S::Args,
) -> bool {
    let mut allow = Allow::new(DEFAULT);
    for subscriber in subscribers {
        if dispatcher.call_guarded(subscriber, args, &mut allow) && allow.is_allowed() != DEFAULT {
            tracing::trace!(
                owner = %dispatcher.owner,
                event = %dispatcher.name,
                allowed = allow.is_allowed(),
                "delivery stopped by veto"
            );
            break;
        }
    }
    allow.is_allowed()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
