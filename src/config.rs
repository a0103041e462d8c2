//! Persistence options for a store.

use serde::Deserialize;

/// How a store persists its state.
///
/// Deserializable so an application can nest it in its own configuration:
///
/// ```
/// use api_store::PersistOptions;
///
/// let opts: PersistOptions = serde_json::from_str(r#"{ "key": "my-app.api" }"#).unwrap();
/// assert!(opts.enabled);
/// assert_eq!(opts.storage_key("api"), "my-app.api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistOptions {
    /// Whether state is restored on construction and saved on mutation.
    pub enabled: bool,
    /// Storage key override. Defaults to the store id.
    pub key: Option<String>,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            key: None,
        }
    }
}

impl PersistOptions {
    /// Options with persistence turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            key: None,
        }
    }

    /// Use `key` instead of the store id as the storage key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Resolve the storage key for a store with the given id.
    pub fn storage_key<'a>(&'a self, store_id: &'a str) -> &'a str {
        self.key.as_deref().unwrap_or(store_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_enabled_with_store_id() {
        let opts = PersistOptions::default();
        assert!(opts.enabled);
        assert_eq!(opts.storage_key("api"), "api");
    }

    #[test]
    fn key_override() {
        let opts = PersistOptions::default().with_key("custom");
        assert_eq!(opts.storage_key("api"), "custom");
    }

    #[test]
    fn deserialize_partial() {
        let opts: PersistOptions = serde_json::from_str(r#"{ "enabled": false }"#).unwrap();
        assert_eq!(opts, PersistOptions::disabled());
    }
}
