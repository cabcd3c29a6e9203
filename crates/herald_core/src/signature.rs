//! Event signatures
//!
//! A [`Signature`] describes the shape of the callables an event accepts:
//! the argument type, the return type, and whether handlers receive a
//! trailing [`Allow`] flag they can use to veto further delivery.
//!
//! Two markers cover every shape the dispatcher supports:
//!
//! - [`Notify<A>`]: handlers are `Fn(&A)`
//! - [`Cancellable<A>`]: handlers are `Fn(&A, &mut Allow)`
//!
//! Events with several parameters use a tuple or a payload struct for `A`.

use std::marker::PhantomData;
use std::sync::Arc;

/// Cooperative veto flag passed to handlers of [`Cancellable`] events
///
/// Starts at the dispatcher's default verdict. A handler that moves it away
/// from that default stops delivery to every handler after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Allow(bool);

impl Allow {
    /// Create a flag with the given initial verdict
    pub const fn new(allowed: bool) -> Self {
        Self(allowed)
    }

    /// Current verdict
    pub const fn is_allowed(&self) -> bool {
        self.0
    }

    /// Vote to allow
    pub fn allow(&mut self) {
        self.0 = true;
    }

    /// Vote to deny
    pub fn deny(&mut self) {
        self.0 = false;
    }

    /// Vote for `allowed`, as [`allow`](Self::allow) or [`deny`](Self::deny) would
    pub fn set(&mut self, allowed: bool) {
        self.0 = allowed;
    }
}

/// Compile-time description of an event's callable shape
pub trait Signature: 'static {
    /// Payload handed to every handler by reference
    type Args: ?Sized;

    /// Handler return type. Dispatchers reject anything but `()`.
    type Output: 'static;

    /// Unsized callable stored for each subscriber
    type Callback: ?Sized + Send + Sync + 'static;

    /// Whether handlers receive the trailing [`Allow`] flag
    const CANCELLABLE: bool;

    /// Call one handler. Non-cancellable signatures ignore `allow`.
    fn call(callback: &Self::Callback, args: &Self::Args, allow: &mut Allow) -> Self::Output;
}

/// Signature for events whose handlers cannot veto delivery
pub struct Notify<A: ?Sized, R = ()>(PhantomData<fn(&A) -> R>);

impl<A: ?Sized + 'static, R: 'static> Signature for Notify<A, R> {
    type Args = A;
    type Output = R;
    type Callback = dyn Fn(&A) -> R + Send + Sync + 'static;

    const CANCELLABLE: bool = false;

    #[inline]
    fn call(callback: &Self::Callback, args: &A, _allow: &mut Allow) -> R {
        callback(args)
    }
}

/// Signature for events whose handlers may veto delivery through [`Allow`]
pub struct Cancellable<A: ?Sized, R = ()>(PhantomData<fn(&A, &mut Allow) -> R>);

impl<A: ?Sized + 'static, R: 'static> Signature for Cancellable<A, R> {
    type Args = A;
    type Output = R;
    type Callback = dyn Fn(&A, &mut Allow) -> R + Send + Sync + 'static;

    const CANCELLABLE: bool = true;

    #[inline]
    fn call(callback: &Self::Callback, args: &A, allow: &mut Allow) -> R {
        callback(args, allow)
    }
}

/// Closures that can be stored as a handler for signature `S`
pub trait Handler<S: Signature>: Send + Sync + 'static {
    fn into_callback(self) -> Arc<S::Callback>;
}

impl<A, R, F> Handler<Notify<A, R>> for F
where
    A: ?Sized + 'static,
    R: 'static,
    F: Fn(&A) -> R + Send + Sync + 'static,
{
    fn into_callback(self) -> Arc<dyn Fn(&A) -> R + Send + Sync + 'static> {
        Arc::new(self)
    }
}

impl<A, R, F> Handler<Cancellable<A, R>> for F
where
    A: ?Sized + 'static,
    R: 'static,
    F: Fn(&A, &mut Allow) -> R + Send + Sync + 'static,
{
    fn into_callback(self) -> Arc<dyn Fn(&A, &mut Allow) -> R + Send + Sync + 'static> {
        Arc::new(self)
    }
}
