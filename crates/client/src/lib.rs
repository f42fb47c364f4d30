//! cinesync_client - PostgREST and realtime transport for the cinema
//! database, plus the `cinesync-client` CLI.

pub mod cli;
pub mod client;
pub mod error;
pub mod output;

pub use client::{RealtimeClient, RealtimeConfig, RestClient};
pub use error::{ClientError, Result};
