//! Key-value storage backing the session cache.
//!
//! Two stores are used side by side:
//! - durable (`FileStore`): survives restarts, holds the session and theme
//! - volatile (`MemoryStore` or a temp-dir `FileStore`): holds the last
//!   dashboard snapshot as `CachedData`, stamped with its capture time

pub mod cached;
pub mod store;

pub use cached::{age_display, is_stale, CachedData};
pub use store::{FileStore, KeyValueStore, MemoryStore};
