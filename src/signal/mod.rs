//! Fine-grained reactive primitives.
//!
//! - Signals: reactive values
//! - Effects: side effects that react to changes

mod effect;
mod signal;

pub use effect::{create_effect, Effect};
pub use signal::{Signal, WatchGuard};
