//! cinesync_core - pure types and contracts shared by the cinesync crates.
//!
//! Nothing in here performs I/O. The remote store and change feed are
//! described as traits; the HTTP/WebSocket implementations live in
//! `cinesync_client` and the in-memory ones in `cinesync`.

pub mod cinema;
pub mod serde;
pub mod session;
pub mod store;
