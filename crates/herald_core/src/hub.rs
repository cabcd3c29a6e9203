//! Event hub
//!
//! [`EventHub`] keeps the dispatchers of one component tree together so that
//! collaborators can look events up by owner and name. A hub is an ordinary
//! value: create one where the events' lifetime begins and pass it (or an
//! `Arc` of it) to whoever raises or observes those events.
//!
//! ```ignore
//! let hub = EventHub::with_config(config);
//! let ticks = hub.register::<Notify<FrameTick>>("Engine", "FrameTick")?;
//! ticks.add_handler(|tick: &FrameTick| tracing::debug!(frame = tick.frame));
//! ```

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::config::HeraldConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::{HeraldError, Result};
use crate::signature::Signature;

/// Identifies an event on a hub
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey {
    pub owner: String,
    pub name: String,
}

impl EventKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Type-erased registry entry
struct HubEntry {
    /// `type_name` of the signature, for mismatch reports
    signature: &'static str,
    dispatcher: Arc<dyn Any + Send + Sync>,
}

/// Registry of named dispatchers
#[derive(Default)]
pub struct EventHub {
    config: HeraldConfig,
    entries: Mutex<FxHashMap<EventKey, HubEntry>>,
}

impl EventHub {
    /// Create a hub where every event uses default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a hub that applies `config` to events as they are registered
    pub fn with_config(config: HeraldConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// Get or create the dispatcher for `owner.name`
    ///
    /// The first registration builds the dispatcher from the hub's config;
    /// later registrations with the same signature return the same instance.
    ///
    /// # Errors
    ///
    /// - [`HeraldError::SignatureMismatch`] if the event exists with another signature
    /// - [`HeraldError::ReturnsValue`] if `S` returns a value
    pub fn register<S: Signature>(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Arc<EventDispatcher<S>>> {
        let key = EventKey::new(owner, name);
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(&key) {
            return downcast::<S>(&key, entry);
        }

        let config = self.config.resolve(owner, name);
        let dispatcher = Arc::new(EventDispatcher::<S>::from_config(&config)?);
        tracing::debug!(event = %key, signature = type_name::<S>(), "event registered");

        entries.insert(
            key,
            HubEntry {
                signature: type_name::<S>(),
                dispatcher: dispatcher.clone(),
            },
        );
        Ok(dispatcher)
    }

    /// Look up an already registered dispatcher
    ///
    /// Returns `None` if the event is unknown or registered with another signature.
    pub fn get<S: Signature>(&self, owner: &str, name: &str) -> Option<Arc<EventDispatcher<S>>> {
        let key = EventKey::new(owner, name);
        let entries = self.entries.lock();
        entries.get(&key).and_then(|entry| downcast::<S>(&key, entry).ok())
    }

    /// Registered events, sorted by owner then name
    pub fn events(&self) -> Vec<EventKey> {
        let mut keys: Vec<EventKey> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("events", &self.events())
            .finish()
    }
}

fn downcast<S: Signature>(key: &EventKey, entry: &HubEntry) -> Result<Arc<EventDispatcher<S>>> {
    Arc::clone(&entry.dispatcher)
        .downcast::<EventDispatcher<S>>()
        .map_err(|_| HeraldError::SignatureMismatch {
            owner: key.owner.clone(),
            event: key.name.clone(),
            registered: entry.signature,
            requested: type_name::<S>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::signature::{Cancellable, Notify};

    #[test]
    fn test_register_returns_same_instance() {
        let hub = EventHub::new();
        let first = hub.register::<Notify<u64>>("Engine", "FrameTick").unwrap();
        let second = hub.register::<Notify<u64>>("Engine", "FrameTick").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_signature_mismatch() {
        let hub = EventHub::new();
        hub.register::<Notify<u64>>("Engine", "FrameTick").unwrap();

        let err = hub.register::<Cancellable<u64>>("Engine", "FrameTick").unwrap_err();
        assert!(matches!(err, HeraldError::SignatureMismatch { .. }));
        assert!(hub.get::<Cancellable<u64>>("Engine", "FrameTick").is_none());
        assert!(hub.get::<Notify<u64>>("Engine", "FrameTick").is_some());
    }

    #[test]
    fn test_value_returning_event_is_not_registered() {
        let hub = EventHub::new();
        let err = hub.register::<Notify<u64, u64>>("Engine", "Query").unwrap_err();

        assert!(matches!(err, HeraldError::ReturnsValue { .. }));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_config_applies_on_register() {
        let config = HeraldConfig {
            error_message: None,
            events: vec![DispatcherConfig::new("World", "RegionChange")
                .with_default_veto(false)
                .with_error_message("region: {panic}")],
        };
        let hub = EventHub::with_config(config);

        let region = hub.register::<Cancellable<str>>("World", "RegionChange").unwrap();
        assert!(!region.default_veto());
        assert_eq!(region.error_message(), "region: {panic}");
    }

    #[test]
    fn test_events_sorted() {
        let hub = EventHub::new();
        hub.register::<Notify<u64>>("World", "RegionChange").unwrap();
        hub.register::<Notify<u64>>("Engine", "FrameTick").unwrap();
        hub.register::<Notify<u64>>("Assets", "TableRenamed").unwrap();

        let names: Vec<String> = hub.events().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["Assets.TableRenamed", "Engine.FrameTick", "World.RegionChange"]);
    }
}
