//! API-key store backed by a storage file, across a simulated reload.
//!
//! Run with `RUST_LOG=api_store=debug cargo run --example api_key`.

use std::sync::Arc;

use api_store::{create_effect, ApiKeyStore, FileBackend};
use tracing_subscriber::EnvFilter;

fn main() -> api_store::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== API Key Store ===\n");

    let path = std::env::temp_dir().join("api-store-demo").join("storage.json");
    let backend = Arc::new(FileBackend::open(&path));
    println!("Storage file: {}", path.display());

    let store = ApiKeyStore::with_backend(backend.clone());
    println!("Restored key: {:?}", store.api_key());

    // Re-runs whenever the key changes
    let watched = store.clone();
    let effect = create_effect(move || {
        println!("Configured: {}", watched.has_api_key());
    });

    store.subscribe(|key| println!("Key changed ({} bytes)", key.len()));

    println!("\nSetting key...");
    store.set_api_key("sk-123");
    store.store().flush()?;

    println!("\nReloading...");
    effect.dispose();
    drop(store);
    let reloaded = ApiKeyStore::with_backend(backend);
    println!("Key after reload: {}", reloaded.api_key().expose());

    println!("\nClearing...");
    reloaded.clear();
    println!("Configured: {}", reloaded.has_api_key());

    Ok(())
}
