use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::config::PersistOptions;
use crate::persist::PersistBackend;
use crate::signal::Signal;
use crate::Result;

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Store::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

struct Persister<T> {
    key: String,
    backend: Arc<dyn PersistBackend>,
    encode: fn(&T) -> serde_json::Result<String>,
    decode: fn(&str) -> serde_json::Result<T>,
}

fn encode<T: Serialize>(state: &T) -> serde_json::Result<String> {
    serde_json::to_string(state)
}

fn decode<T: DeserializeOwned>(raw: &str) -> serde_json::Result<T> {
    serde_json::from_str(raw)
}

/// A named, shareable state container.
///
/// Reads go through a [`Signal`], so effects that read the store re-run when
/// it changes. Writes that leave the state equal to what it was are ignored.
/// When built with a backend, state is restored on construction and saved
/// after every effective write.
///
/// Cloning a store yields another handle on the same state.
pub struct Store<T> {
    id: Arc<str>,
    state: Signal<T>,
    initial: Arc<T>,
    subscribers: Arc<RwLock<Vec<(SubscriptionId, Subscriber<T>)>>>,
    next_subscriber: Arc<AtomicUsize>,
    persister: Option<Arc<Persister<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            state: self.state.clone(),
            initial: Arc::clone(&self.initial),
            subscribers: Arc::clone(&self.subscribers),
            next_subscriber: Arc::clone(&self.next_subscriber),
            persister: self.persister.clone(),
        }
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("storage_key", &self.storage_key())
            .finish_non_exhaustive()
    }
}

impl<T> Store<T> {
    /// The store's id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this store saves to a backend.
    pub fn is_persisted(&self) -> bool {
        self.persister.is_some()
    }

    /// The key state is saved under, if persisted.
    pub fn storage_key(&self) -> Option<&str> {
        self.persister.as_ref().map(|p| p.key.as_str())
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Store<T> {
    /// Create an in-memory store with the given initial state.
    pub fn new(id: &str, initial: T) -> Self {
        Self::with_persister(id, initial, None)
    }

    /// Start building a store, optionally persisted.
    pub fn builder(id: &str, initial: T) -> StoreBuilder<T> {
        StoreBuilder {
            id: id.to_string(),
            initial,
            backend: None,
            options: PersistOptions::default(),
        }
    }

    fn with_persister(id: &str, initial: T, persister: Option<Persister<T>>) -> Self {
        Self {
            id: Arc::from(id),
            state: Signal::new(initial.clone()),
            initial: Arc::new(initial),
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_subscriber: Arc::new(AtomicUsize::new(0)),
            persister: persister.map(Arc::new),
        }
    }

    /// Get a clone of the current state, tracking the read.
    pub fn get(&self) -> T {
        self.state.get()
    }

    /// Read state with a function, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.state.with(f)
    }

    /// Read state without triggering reactivity.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.state.with_untracked(f)
    }

    /// The signal holding the state.
    pub fn signal(&self) -> &Signal<T> {
        &self.state
    }

    /// Replace the state.
    ///
    /// Does nothing if `new_state` equals the current state. Otherwise
    /// effects re-run, the state is saved, then subscribers are called.
    pub fn set(&self, new_state: T) {
        if self.state.with_untracked(|current| *current == new_state) {
            trace!(store = %self.id, "state unchanged");
            return;
        }
        self.state.set(new_state);
        self.persist();
        self.notify();
    }

    /// Update the state using a function.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.state.get_untracked();
        f(&mut next);
        self.set(next);
    }

    /// Put the state back to what the store was created with.
    pub fn reset(&self) {
        self.set((*self.initial).clone());
    }

    /// Subscribe to state changes.
    ///
    /// The callback is called after every effective write.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscriber.fetch_add(1, Ordering::SeqCst));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Drop every subscriber on every handle of this store.
    ///
    /// State and persisted data are left as they are.
    pub fn dispose(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!(store = %self.id, "disposed");
    }

    /// Reload state from the backend.
    ///
    /// Returns `Ok(false)` when the store is not persisted or nothing is
    /// stored under its key. A restored value is not saved back.
    pub fn hydrate(&self) -> Result<bool> {
        let Some(persister) = &self.persister else {
            return Ok(false);
        };
        let Some(raw) = persister.backend.load(&persister.key)?.map(Zeroizing::new) else {
            return Ok(false);
        };
        let restored = (persister.decode)(raw.as_str())?;

        if self.state.with_untracked(|current| *current != restored) {
            self.state.set(restored);
            self.notify();
        }
        Ok(true)
    }

    /// Save the current state to the backend now.
    ///
    /// A no-op for stores without persistence.
    pub fn flush(&self) -> Result<()> {
        let Some(persister) = &self.persister else {
            return Ok(());
        };
        let data = Zeroizing::new(self.state.with_untracked(|state| (persister.encode)(state))?);
        persister.backend.save(&persister.key, data.as_str())?;
        debug!(store = %self.id, key = %persister.key, "persisted state");
        Ok(())
    }

    fn restore(&self) {
        match self.hydrate() {
            Ok(true) => debug!(store = %self.id, "restored persisted state"),
            Ok(false) => debug!(store = %self.id, "no persisted state"),
            Err(e) => warn!(store = %self.id, error = %e, "ignoring unreadable persisted state"),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            warn!(store = %self.id, error = %e, "failed to persist state");
        }
    }

    fn notify(&self) {
        let subscribers: Vec<Subscriber<T>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        if subscribers.is_empty() {
            return;
        }

        let state = self.state.get_untracked();
        trace!(store = %self.id, subscribers = subscribers.len(), "notifying subscribers");
        for subscriber in subscribers {
            subscriber(&state);
        }
    }
}

/// Builder for a [`Store`], see [`Store::builder`].
pub struct StoreBuilder<T> {
    id: String,
    initial: T,
    backend: Option<Arc<dyn PersistBackend>>,
    options: PersistOptions,
}

impl<T> StoreBuilder<T>
where
    T: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Save to and restore from `backend`.
    pub fn persist(mut self, backend: Arc<dyn PersistBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the persistence options.
    pub fn options(mut self, options: PersistOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the store, restoring persisted state if any.
    ///
    /// Unreadable persisted state is logged and the initial state is kept.
    pub fn build(self) -> Store<T> {
        let persister = match self.backend {
            Some(backend) if self.options.enabled => Some(Persister {
                key: self.options.storage_key(&self.id).to_string(),
                backend,
                encode: encode::<T>,
                decode: decode::<T>,
            }),
            _ => None,
        };

        let store = Store::with_persister(&self.id, self.initial, persister);
        if store.is_persisted() {
            store.restore();
        }
        store
    }
}
