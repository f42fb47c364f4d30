//! cinesync - realtime-synchronized collection caches for the cinema
//! dashboard.
//!
//! Each table is mirrored by a [`CollectionCache`]: a full snapshot that is
//! re-fetched whenever the change feed reports a write, and patched right
//! away when the write comes from this process. The [`Catalog`] owns one
//! cache per table.

pub mod catalog;
pub mod collection;
pub mod config;
pub mod memory;
pub mod mock_data;
pub mod optimistic;
pub mod resources;
pub mod session;

pub use catalog::Catalog;
pub use collection::{CacheOptions, CollectionCache, Resource, Snapshot};
pub use config::Config;
pub use memory::{MemoryFeed, MemoryStore};
pub use optimistic::optimistic;
pub use session::{FileKv, MemoryKv, Session};
