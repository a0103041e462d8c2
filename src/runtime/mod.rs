//! Runtime support for reactive primitives.
//!
//! Dependency tracking between sources (signals) and the observers
//! (effects, watchers) that read them.

mod context;

pub use context::ReactiveRuntime;
pub(crate) use context::WeakRuntime;
