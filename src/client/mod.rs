//! Upstream HTTP client.

pub mod http;

pub use http::{Upstream, UpstreamClient};
