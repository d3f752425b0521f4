//! `quorum-store` — client-local durable key/value persistence.
//!
//! Values survive process restarts when the file backend is used. Every key is
//! independently removable; a missing key is never an error.

pub mod file;
pub mod kv;

pub use file::{FileKeyValueStore, default_store_path};
pub use kv::{InMemoryKeyValueStore, KeyValueStore, StoreError};
