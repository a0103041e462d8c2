use crate::runtime::{ReactiveRuntime, WeakRuntime};
use std::sync::Arc;

/// A side effect that re-runs when the signals it reads change.
///
/// Unregistered when dropped.
#[must_use = "an effect stops reacting as soon as it is dropped"]
pub struct Effect {
    run: Arc<dyn Fn() + Send + Sync>,
    id: usize,
    runtime: WeakRuntime,
}

impl Effect {
    fn new<F>(effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = ReactiveRuntime::current();
        let id = runtime.next_id();
        let effect = Arc::new(effect);
        let effect_clone = effect.clone();

        runtime.create_observer(id, move || effect_clone());

        // Run immediately within the observer context to track dependencies
        runtime.with_observer(id, || effect());

        Self {
            run: effect,
            id,
            runtime: runtime.downgrade(),
        }
    }

    /// Manually trigger the effect.
    pub fn run(&self) {
        (self.run)();
    }

    /// Stop reacting to changes.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.runtime.remove_observer(self.id);
    }
}

/// Create a new effect that runs when dependencies change.
///
/// The effect runs immediately and then again whenever any signal
/// it read on its last run changes. It stays registered until the returned
/// [`Effect`] is dropped or disposed; until then it keeps everything its
/// closure captures alive.
///
/// # Example
///
/// ```
/// use api_store::{create_effect, ApiKeyStore};
///
/// let store = ApiKeyStore::new();
/// let watched = store.clone();
/// let _effect = create_effect(move || {
///     println!("configured: {}", watched.has_api_key());
/// });
/// store.set_api_key("sk-123");
/// ```
pub fn create_effect<F>(effect: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(effect)
}
