use crate::runtime::{ReactiveRuntime, WeakRuntime};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

/// A reactive value that notifies observers when it changes.
///
/// Clones are handles on the same value.
pub struct Signal<T> {
    value: Arc<RwLock<T>>,
    id: usize,
    runtime: Arc<ReactiveRuntime>,
    _dependencies: Arc<Mutex<Vec<WatchGuard>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            id: self.id,
            runtime: Arc::clone(&self.runtime),
            _dependencies: Arc::clone(&self._dependencies),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Create a new signal bound to the current runtime.
    pub fn new(initial: T) -> Self {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();

        Self {
            value: Arc::new(RwLock::new(initial)),
            id,
            runtime,
            _dependencies: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the current value, tracking the read.
    pub fn get(&self) -> T {
        self.runtime.track_read(self.id);
        self.get_untracked()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }

    /// Set a new value and notify observers.
    pub fn set(&self, new_value: T) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = new_value;
        self.runtime.notify_observers(self.id);
    }

    /// Update the value in place and notify observers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.value.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut value);
        }
        self.runtime.notify_observers(self.id);
    }

    /// Read the value with a function without cloning, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.runtime.track_read(self.id);
        self.with_untracked(f)
    }

    /// Read the value with a function without registering a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&value)
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Call `callback` now and after every change.
    ///
    /// The watcher stays registered until the returned guard is dropped.
    pub fn watch<F>(&self, callback: F) -> WatchGuard
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let observer_id = self.runtime.next_id();
        let source_id = self.id;
        let runtime = self.runtime.downgrade();
        let value = Arc::clone(&self.value);
        let callback = Arc::new(callback);
        let callback_clone = Arc::clone(&callback);

        self.runtime.create_observer(observer_id, move || {
            runtime.track_read(source_id);
            let val = value.read().unwrap_or_else(PoisonError::into_inner).clone();
            callback_clone(val);
        });
        self.runtime
            .with_observer(observer_id, || self.runtime.track_read(self.id));

        callback(self.get_untracked());

        WatchGuard {
            observer_id,
            runtime: self.runtime.downgrade(),
        }
    }

    /// Create a derived signal by applying a function to this signal's value.
    pub fn map<U, F>(&self, f: F) -> Signal<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = ReactiveRuntime::with_runtime(Arc::clone(&self.runtime), || {
            Signal::new(self.with_untracked(&f))
        });
        let derived_weak = derived.downgrade();

        let guard = self.watch(move |value| {
            if let Some(derived) = derived_weak.upgrade() {
                derived.set(f(&value));
            }
        });

        // Keep the watcher alive as long as the derived signal
        derived
            ._dependencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(guard);
        derived
    }
}

impl<T> Signal<T> {
    fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal {
            value: Arc::downgrade(&self.value),
            id: self.id,
            runtime: Arc::downgrade(&self.runtime),
            dependencies: Arc::downgrade(&self._dependencies),
        }
    }
}

/// Non-owning handle on a signal, so a watcher feeding a derived signal does
/// not keep that signal alive.
struct WeakSignal<T> {
    value: Weak<RwLock<T>>,
    id: usize,
    runtime: Weak<ReactiveRuntime>,
    dependencies: Weak<Mutex<Vec<WatchGuard>>>,
}

impl<T> WeakSignal<T> {
    fn upgrade(&self) -> Option<Signal<T>> {
        Some(Signal {
            value: self.value.upgrade()?,
            id: self.id,
            runtime: self.runtime.upgrade()?,
            _dependencies: self.dependencies.upgrade()?,
        })
    }
}

/// RAII guard for signal watchers.
pub struct WatchGuard {
    observer_id: usize,
    runtime: WeakRuntime,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.runtime.remove_observer(self.observer_id);
    }
}
