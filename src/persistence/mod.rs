//! Durable state module
//!
//! This module contains the key-value store shared across popup mounts and
//! the debounced gate through which the timer record is written.

pub mod gate;
pub mod retry;
pub mod store;

// Re-export main types
pub use gate::PersistenceGate;
pub use store::{load_timer_state, JsonFileStore, KeyValueStore, MemoryStore, StoreError};
