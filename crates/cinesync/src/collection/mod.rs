//! Realtime-synchronized collection caches.

mod cache;
mod listener;
mod resource;

pub use cache::{CacheOptions, CollectionCache, Snapshot, DEFAULT_SNAPSHOT_CAPACITY};
pub use resource::{decode_rows, Resource};
