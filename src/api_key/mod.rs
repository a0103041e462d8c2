//! The persisted API-key store.

mod secret;
mod store;

pub use secret::ApiKey;
pub use store::{ApiKeyState, ApiKeyStore, API_STORE_ID};
