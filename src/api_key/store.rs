use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ApiKey;
use crate::config::PersistOptions;
use crate::persist::PersistBackend;
use crate::store::{Store, SubscriptionId};

/// Id of the API-key store, also its default storage key.
pub const API_STORE_ID: &str = "api";

/// State held by [`ApiKeyStore`].
///
/// Persisted as `{"apiKey":"..."}`. A missing field restores as an empty key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiKeyState {
    pub api_key: ApiKey,
}

/// Shared, persisted holder of the application's API key.
///
/// The key starts out empty. Every handle (clones included) sees the latest
/// write, and when a backend is configured the key is restored on
/// construction and saved on every change.
///
/// ```
/// use std::sync::Arc;
/// use api_store::{ApiKeyStore, MemoryBackend};
///
/// let storage = MemoryBackend::new();
/// let store = ApiKeyStore::with_backend(Arc::new(storage.clone()));
/// assert_eq!(store.api_key().expose(), "");
///
/// store.set_api_key("sk-123");
///
/// let reloaded = ApiKeyStore::with_backend(Arc::new(storage));
/// assert_eq!(reloaded.api_key().expose(), "sk-123");
/// ```
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    store: Store<ApiKeyState>,
}

impl Default for ApiKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiKeyStore {
    /// A store that lives in memory only.
    pub fn new() -> Self {
        Self {
            store: Store::new(API_STORE_ID, ApiKeyState::default()),
        }
    }

    /// A store that restores from and saves to `backend` under the key `"api"`.
    pub fn with_backend(backend: Arc<dyn PersistBackend>) -> Self {
        Self::with_options(PersistOptions::default(), backend)
    }

    /// A store persisted according to `options`.
    pub fn with_options(options: PersistOptions, backend: Arc<dyn PersistBackend>) -> Self {
        Self {
            store: Store::builder(API_STORE_ID, ApiKeyState::default())
                .persist(backend)
                .options(options)
                .build(),
        }
    }

    /// The current key.
    pub fn api_key(&self) -> ApiKey {
        self.store.with(|state| state.api_key.clone())
    }

    /// Replace the key. Any string is accepted.
    pub fn set_api_key(&self, value: impl Into<ApiKey>) {
        let api_key = value.into();
        self.store.set(ApiKeyState { api_key });
    }

    /// Whether a non-empty key is set.
    pub fn has_api_key(&self) -> bool {
        self.store.with(|state| !state.api_key.is_empty())
    }

    /// Set the key back to empty.
    pub fn clear(&self) {
        self.store.reset();
    }

    /// Call `callback` with the new key after every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ApiKey) + Send + Sync + 'static,
    {
        self.store.subscribe(move |state| callback(&state.api_key))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// The underlying generic store.
    pub fn store(&self) -> &Store<ApiKeyState> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryBackend;
    use crate::runtime::ReactiveRuntime;
    use crate::signal::create_effect;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn starts_empty() {
        ReactiveRuntime::scope(|| {
            let store = ApiKeyStore::new();
            assert_eq!(store.api_key().expose(), "");
            assert!(!store.has_api_key());
            assert!(!store.store().is_persisted());
        });
    }

    #[test]
    fn state_json_shape() {
        let state = ApiKeyState {
            api_key: ApiKey::from("sk-123"),
        };
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"apiKey":"sk-123"}"#
        );

        let empty: ApiKeyState = serde_json::from_str("{}").unwrap();
        assert!(empty.api_key.is_empty());
    }

    #[test]
    fn saves_under_store_id() {
        ReactiveRuntime::scope(|| {
            let backend = MemoryBackend::new();
            let store = ApiKeyStore::with_backend(Arc::new(backend.clone()));

            store.set_api_key("sk-123");
            assert_eq!(
                backend.load(API_STORE_ID).unwrap().as_deref(),
                Some(r#"{"apiKey":"sk-123"}"#)
            );

            store.clear();
            assert_eq!(
                backend.load(API_STORE_ID).unwrap().as_deref(),
                Some(r#"{"apiKey":""}"#)
            );
        });
    }

    #[test]
    fn subscribers_see_changes_once() {
        ReactiveRuntime::scope(|| {
            let store = ApiKeyStore::new();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let seen_clone = seen.clone();

            let id = store.subscribe(move |key| {
                seen_clone.lock().unwrap().push(key.expose().to_string());
            });
            store.set_api_key("sk-1");
            store.set_api_key("sk-1");
            store.set_api_key("");
            assert!(store.unsubscribe(id));
            store.set_api_key("sk-2");

            assert_eq!(*seen.lock().unwrap(), vec!["sk-1".to_string(), String::new()]);
        });
    }

    #[test]
    fn effects_track_the_key() {
        ReactiveRuntime::scope(|| {
            let store = ApiKeyStore::new();
            let runs = Arc::new(AtomicUsize::new(0));
            let runs_clone = runs.clone();
            let watched = store.clone();

            let _effect = create_effect(move || {
                let _ = watched.has_api_key();
                runs_clone.fetch_add(1, Ordering::SeqCst);
            });
            store.set_api_key("sk-1");

            assert_eq!(runs.load(Ordering::SeqCst), 2);
        });
    }
}
