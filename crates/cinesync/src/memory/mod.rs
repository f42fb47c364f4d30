//! In-process backend: a JSON row store plus the change feed it writes to.

mod feed;
mod store;

pub use feed::{MemoryFeed, DEFAULT_CHANNEL_CAPACITY};
pub use store::MemoryStore;
