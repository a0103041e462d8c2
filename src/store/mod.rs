//! Named state containers.
//!
//! A store wraps a signal with subscribers, change detection and optional
//! persistence through a [`PersistBackend`](crate::persist::PersistBackend).

mod store;

pub use store::{Store, StoreBuilder, SubscriptionId};
