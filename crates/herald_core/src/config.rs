//! Dispatcher configuration
//!
//! Events are declared in code, but their diagnostics and default verdict
//! can be tuned from a TOML document:
//!
//! ```toml
//! error_message = "{owner}.{event} handler failed: {panic}"
//!
//! [[events]]
//! owner = "World"
//! name = "RegionChange"
//! default_veto = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Error message used when no template is configured
///
/// Placeholders: `{owner}`, `{event}`, `{panic}`.
pub const DEFAULT_ERROR_MESSAGE: &str = "subscriber to {owner}.{event} panicked: {panic}";

/// Settings for a single dispatcher
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Label of the component that declares the event
    pub owner: String,
    /// Event name
    pub name: String,
    /// Initial verdict handed to cancellable handlers (`true` = allow)
    #[serde(default = "default_true")]
    pub default_veto: bool,
    /// Template logged when a subscriber panics
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

fn default_true() -> bool {
    true
}

fn default_error_message() -> String {
    DEFAULT_ERROR_MESSAGE.to_string()
}

impl DispatcherConfig {
    /// Create a config with default verdict and error message
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            default_veto: true,
            error_message: default_error_message(),
        }
    }

    pub fn with_default_veto(mut self, default_veto: bool) -> Self {
        self.default_veto = default_veto;
        self
    }

    pub fn with_error_message(mut self, template: impl Into<String>) -> Self {
        self.error_message = template.into();
        self
    }
}

/// Top-level herald configuration (herald.toml)
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeraldConfig {
    /// Fallback error message for events without their own override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Per-event overrides
    #[serde(default)]
    pub events: Vec<DispatcherConfig>,
}

impl HeraldConfig {
    /// Parse a configuration document
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Find the override for `owner.name`, if any
    pub fn event(&self, owner: &str, name: &str) -> Option<&DispatcherConfig> {
        self.events
            .iter()
            .find(|event| event.owner == owner && event.name == name)
    }

    /// Resolve the effective config for `owner.name`
    ///
    /// An explicit `[[events]]` entry wins; otherwise the event gets the
    /// default verdict and the top-level error message, if one is set.
    pub fn resolve(&self, owner: &str, name: &str) -> DispatcherConfig {
        if let Some(event) = self.event(owner, name) {
            return event.clone();
        }

        let config = DispatcherConfig::new(owner, name);
        match &self.error_message {
            Some(template) => config.with_error_message(template.clone()),
            None => config,
        }
    }
}

/// Render an error message template
pub fn render_error_message(template: &str, owner: &str, event: &str, panic: &str) -> String {
    template
        .replace("{owner}", owner)
        .replace("{event}", event)
        .replace("{panic}", panic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_message() {
        let rendered = render_error_message(DEFAULT_ERROR_MESSAGE, "Engine", "FrameTick", "boom");
        assert_eq!(rendered, "subscriber to Engine.FrameTick panicked: boom");
    }

    #[test]
    fn test_parse_defaults() {
        let config = HeraldConfig::from_toml(
            r#"
            [[events]]
            owner = "Engine"
            name = "FrameTick"
            "#,
        )
        .unwrap();

        let event = config.event("Engine", "FrameTick").unwrap();
        assert!(event.default_veto);
        assert_eq!(event.error_message, DEFAULT_ERROR_MESSAGE);
        assert!(config.error_message.is_none());
    }

    #[test]
    fn test_resolve_prefers_event_entry() {
        let config = HeraldConfig::from_toml(
            r#"
            error_message = "global: {panic}"

            [[events]]
            owner = "World"
            name = "RegionChange"
            default_veto = false
            error_message = "region: {panic}"
            "#,
        )
        .unwrap();

        let region = config.resolve("World", "RegionChange");
        assert!(!region.default_veto);
        assert_eq!(region.error_message, "region: {panic}");

        let other = config.resolve("Assets", "TableRenamed");
        assert!(other.default_veto);
        assert_eq!(other.error_message, "global: {panic}");
    }

    #[test]
    fn test_invalid_document() {
        assert!(HeraldConfig::from_toml("events = 3").is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = HeraldConfig {
            error_message: None,
            events: vec![DispatcherConfig::new("Engine", "FrameTick").with_default_veto(false)],
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(HeraldConfig::from_toml(&text).unwrap(), config);
    }
}
