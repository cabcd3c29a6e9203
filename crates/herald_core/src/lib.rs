//! Herald Core
//!
//! Cached multicast event dispatch for engine lifecycle notifications:
//!
//! - **Dispatchers**: one [`EventDispatcher`] per event, with lock-protected
//!   mutation and a lock-free, snapshot-based dispatch path
//! - **Fault isolation**: a panicking subscriber is logged and skipped
//! - **Cooperative veto**: [`Cancellable`] events hand every subscriber an
//!   [`Allow`] flag; the first vote against the default verdict stops delivery
//! - **Hubs**: [`EventHub`] groups named dispatchers without global state
//!
//! # Example
//!
//! ```rust
//! use herald_core::{Allow, Cancellable, EventDispatcher, Notify};
//!
//! struct FrameTick {
//!     frame: u64,
//! }
//!
//! let ticks = EventDispatcher::<Notify<FrameTick>>::new("Engine", "FrameTick", true).unwrap();
//! ticks.add_handler(|tick: &FrameTick| assert!(tick.frame > 0));
//! ticks.invoke(&FrameTick { frame: 1 });
//!
//! let regions = EventDispatcher::<Cancellable<str>>::new("World", "RegionChange", true).unwrap();
//! regions.add_handler(|region: &str, allow: &mut Allow| {
//!     if region == "restricted" {
//!         allow.deny();
//!     }
//! });
//! assert!(regions.decide("meadow"));
//! assert!(!regions.decide("restricted"));
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hub;
pub mod signature;
pub mod subscriber;

pub use config::{DispatcherConfig, HeraldConfig, DEFAULT_ERROR_MESSAGE};
pub use dispatcher::{DispatcherBuilder, EventDispatcher};
pub use error::{HeraldError, Result};
pub use hub::{EventHub, EventKey};
pub use signature::{Allow, Cancellable, Handler, Notify, Signature};
pub use subscriber::{Subscriber, Subscription};
