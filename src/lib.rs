//! # api-store
//!
//! A persisted, reactive store for an application's API key.
//!
//! ## Signals (Low-level primitives)
//!
//! - `Signal<T>` - Reactive values that notify dependents when changed
//! - `Effect` - Side effects that run when dependencies change
//!
//! ## Store (State management)
//!
//! - `Store<T>` - Named state container with subscribers, change detection
//!   and optional persistence
//! - `ApiKeyStore` - The `"api"` store holding a single API key
//!
//! ## Persistence
//!
//! Stores restore from a [`PersistBackend`] on construction and save to it
//! after every change. [`MemoryBackend`] and [`FileBackend`] are provided.
//! Failures on those implicit paths are logged through `tracing` and never
//! reach the caller; [`Store::hydrate`] and [`Store::flush`] report them.

pub mod api_key;
pub mod config;
mod error;
pub mod persist;
pub mod runtime;
pub mod signal;
pub mod store;

// Re-export main types for convenience
pub use api_key::{ApiKey, ApiKeyState, ApiKeyStore, API_STORE_ID};
pub use config::PersistOptions;
pub use error::{Result, StoreError};
pub use persist::{FileBackend, MemoryBackend, PersistBackend};
pub use signal::{create_effect, Effect, Signal, WatchGuard};
pub use store::{Store, StoreBuilder, SubscriptionId};
