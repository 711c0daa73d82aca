//! Storage backends for Weft.
//!
//! The core defines the [`weft_core::StorageBackend`] seam; this crate
//! provides concrete implementations. Currently that is a JSON file backend
//! with atomic writes and a backup fallback.

pub mod file_storage;

pub use file_storage::FileStorageBackend;
