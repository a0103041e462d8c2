use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Dependency graph shared by everything created under one runtime.
#[derive(Default)]
struct ReactiveContext {
    // Map from source ID to set of observer IDs that read it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from observer ID to set of source IDs it read
    observer_deps: HashMap<usize, HashSet<usize>>,
    observers: HashMap<usize, Observer>,
}

impl ReactiveContext {
    fn record_read(&mut self, observer_id: usize, source_id: usize) {
        if !self.observers.contains_key(&observer_id) {
            return;
        }
        self.dependencies
            .entry(source_id)
            .or_default()
            .insert(observer_id);
        self.observer_deps
            .entry(observer_id)
            .or_default()
            .insert(source_id);
    }

    fn forget_reads(&mut self, observer_id: usize) {
        if let Some(old_deps) = self.observer_deps.remove(&observer_id) {
            for source_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&source_id) {
                    deps.remove(&observer_id);
                    if deps.is_empty() {
                        self.dependencies.remove(&source_id);
                    }
                }
            }
        }
    }

    fn detach(&mut self, observer_id: usize) {
        self.observers.remove(&observer_id);
        self.forget_reads(observer_id);
    }
}

fn lock(context: &Mutex<ReactiveContext>) -> MutexGuard<'_, ReactiveContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The observer running on this thread, if it belongs to the runtime `key`.
fn current_observer(key: usize) -> Option<usize> {
    OBSERVER_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .filter(|(runtime, _)| *runtime == key)
            .map(|(_, observer)| *observer)
    })
}

/// Weak handle on a runtime, held by guards and observers that must not
/// keep it alive.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<Mutex<ReactiveContext>>);

impl WeakRuntime {
    pub(crate) fn remove_observer(&self, observer_id: usize) {
        if let Some(context) = self.0.upgrade() {
            lock(&context).detach(observer_id);
        }
    }

    pub(crate) fn track_read(&self, source_id: usize) {
        let Some(observer) = current_observer(self.0.as_ptr() as usize) else {
            return;
        };
        if let Some(context) = self.0.upgrade() {
            lock(&context).record_read(observer, source_id);
        }
    }
}

/// Reactive runtime tracking which observers read which sources.
///
/// Supports both a global runtime (default) and scoped runtimes for
/// isolation. Signals bind to the runtime that is current when they are
/// created.
///
/// # Examples
///
/// Using the default global runtime:
///
/// ```
/// use api_store::Signal;
///
/// let signal = Signal::new(42);
/// assert_eq!(signal.get(), 42);
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use api_store::runtime::ReactiveRuntime;
/// use api_store::Signal;
///
/// ReactiveRuntime::scope(|| {
///     let signal = Signal::new(0);
///     assert_eq!(signal.get(), 0);
/// });
/// ```
pub struct ReactiveRuntime {
    next_id: AtomicUsize,
    context: Arc<Mutex<ReactiveContext>>,
}

// Thread-local stacks for scoped runtimes and running observers
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
    // (runtime key, observer ID)
    static OBSERVER_STACK: RefCell<Vec<(usize, usize)>> = const { RefCell::new(Vec::new()) };
}

impl ReactiveRuntime {
    /// Create a new isolated runtime with its own dependency graph.
    pub fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            next_id: AtomicUsize::new(0),
            context: Arc::new(Mutex::new(ReactiveContext::default())),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime is dropped when the function returns, unless a signal or
    /// store created inside it is still alive. A live [`Effect`] keeps what it
    /// captures alive until it is dropped.
    ///
    /// [`Effect`]: crate::Effect
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Self::with_runtime(Self::new(), f)
    }

    /// Get or create the global runtime.
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// The runtime on top of the thread-local stack, or the global one.
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with `runtime` as the current runtime.
    ///
    /// ```
    /// use api_store::runtime::ReactiveRuntime;
    /// use api_store::Signal;
    ///
    /// let runtime = ReactiveRuntime::new();
    /// ReactiveRuntime::with_runtime(runtime, || {
    ///     let signal = Signal::new(42);
    ///     assert_eq!(signal.get(), 42);
    /// });
    /// ```
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| stack.borrow_mut().push(runtime));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Drop every observer and dependency and reset the ID counter.
    pub fn clear(&self) {
        *lock(&self.context) = ReactiveContext::default();
        self.next_id.store(0, Ordering::SeqCst);
    }

    fn key(&self) -> usize {
        Arc::as_ptr(&self.context) as usize
    }

    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Arc::downgrade(&self.context))
    }

    /// Generate the next unique ID for a source or observer.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Record that the observer running on this thread (if any) read
    /// `source_id`.
    pub fn track_read(&self, source_id: usize) {
        if let Some(observer) = current_observer(self.key()) {
            lock(&self.context).record_read(observer, source_id);
        }
    }

    /// Re-run every observer that read `source_id`.
    ///
    /// Observers run without the runtime lock held. What an observer read on
    /// its previous run is forgotten, and its reads on this run are tracked
    /// afresh.
    pub fn notify_observers(&self, source_id: usize) {
        let pending: Vec<(usize, Observer)> = {
            let ctx = lock(&self.context);
            let Some(observer_ids) = ctx.dependencies.get(&source_id) else {
                return;
            };
            observer_ids
                .iter()
                .filter_map(|id| ctx.observers.get(id).map(|f| (*id, Arc::clone(f))))
                .collect()
        };

        trace!(source = source_id, observers = pending.len(), "notifying observers");
        for (observer_id, observer) in pending {
            lock(&self.context).forget_reads(observer_id);
            self.with_observer(observer_id, || observer());
        }
    }

    /// Register `f` as the callback for `observer_id`.
    ///
    /// Dependencies recorded for a previous registration of the same ID are
    /// dropped.
    pub fn create_observer<F>(&self, observer_id: usize, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut ctx = lock(&self.context);
        ctx.detach(observer_id);
        ctx.observers.insert(observer_id, Arc::new(f));
    }

    /// Unregister an observer and forget what it read.
    pub fn remove_observer(&self, observer_id: usize) {
        lock(&self.context).detach(observer_id);
    }

    /// Run a function with `observer_id` as the current observer on this
    /// thread.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let key = self.key();
        OBSERVER_STACK.with(|stack| stack.borrow_mut().push((key, observer_id)));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        OBSERVER_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Number of observers currently registered.
    pub fn observer_count(&self) -> usize {
        lock(&self.context).observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn tracks_reads_only_inside_observer() {
        let runtime = ReactiveRuntime::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let source = runtime.next_id();
        let observer = runtime.next_id();

        // Read outside any observer: nothing recorded
        runtime.track_read(source);
        let hits_clone = hits.clone();
        runtime.create_observer(observer, move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        runtime.notify_observers(source);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        runtime.with_observer(observer, || runtime.track_read(source));
        runtime.notify_observers(source);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_observer_is_not_notified() {
        let runtime = ReactiveRuntime::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let source = runtime.next_id();
        let observer = runtime.next_id();

        let hits_clone = hits.clone();
        runtime.create_observer(observer, move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });
        runtime.with_observer(observer, || runtime.track_read(source));
        runtime.remove_observer(observer);
        runtime.notify_observers(source);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.observer_count(), 0);
    }

    #[test]
    fn scope_is_isolated_from_global() {
        let global = ReactiveRuntime::global();
        ReactiveRuntime::scope(|| {
            assert!(!Arc::ptr_eq(&ReactiveRuntime::current(), &global));
        });
        assert!(Arc::ptr_eq(&ReactiveRuntime::current(), &global));
    }

    #[test]
    fn clear_resets_ids() {
        let runtime = ReactiveRuntime::new();
        runtime.next_id();
        runtime.next_id();
        runtime.clear();
        assert_eq!(runtime.next_id(), 0);
    }

    #[test]
    fn reads_on_another_thread_are_not_attributed() {
        let runtime = ReactiveRuntime::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let watched = runtime.next_id();
        let unrelated = runtime.next_id();
        let observer = runtime.next_id();

        let hits_clone = hits.clone();
        runtime.create_observer(observer, move || {
            hits_clone.fetch_add(1, Ordering::SeqCst);
        });

        let (running_tx, running_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                runtime.with_observer(observer, || {
                    runtime.track_read(watched);
                    running_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                });
            })
        };

        // The worker is inside its observer while this thread reads
        running_rx.recv().unwrap();
        runtime.track_read(unrelated);
        release_tx.send(()).unwrap();
        worker.join().unwrap();

        runtime.notify_observers(unrelated);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        runtime.notify_observers(watched);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rerun_forgets_previous_reads() {
        let runtime = ReactiveRuntime::new();
        let source = runtime.next_id();
        let observer = runtime.next_id();

        runtime.create_observer(observer, || {});
        runtime.with_observer(observer, || runtime.track_read(source));
        assert!(lock(&runtime.context).dependencies.contains_key(&source));

        // The callback reads nothing, so the dependency goes away
        runtime.notify_observers(source);
        assert!(lock(&runtime.context).dependencies.is_empty());
        assert!(lock(&runtime.context).observer_deps.is_empty());
        assert_eq!(runtime.observer_count(), 1);
    }
}
