//! HTTP source for catalog deltas.

pub mod client;
pub mod error;

pub use client::HttpSource;
pub use error::RemoteError;
