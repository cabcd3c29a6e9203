//! Herald error types

use thiserror::Error;

/// Errors raised while declaring or configuring events
///
/// Subscriber faults never surface here: they are caught and logged by the
/// dispatcher that ran them.
#[derive(Error, Debug)]
pub enum HeraldError {
    /// The event signature returns a value; multicast events must return `()`
    #[error("event {owner}.{event} returns `{return_type}`; multicast events must return ()")]
    ReturnsValue {
        owner: String,
        event: String,
        return_type: &'static str,
    },

    /// The event is already registered on the hub with another signature
    #[error("event {owner}.{event} is registered as `{registered}`, requested as `{requested}`")]
    SignatureMismatch {
        owner: String,
        event: String,
        registered: &'static str,
        requested: &'static str,
    },

    /// Failed to parse a herald configuration document
    #[error("invalid herald config: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for herald operations
pub type Result<T> = std::result::Result<T, HeraldError>;
