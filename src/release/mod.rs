//! Release discovery against the SpringRoll Connect API
//!
//! ## Module Organization
//!
//! - `request` - API URL construction and selector precedence
//! - `fetch` - HTTP client, response validation
//! - `retry` - backoff policy shared with archive downloads

mod fetch;
mod request;
mod retry;

pub use fetch::{ReleaseClient, ReleaseResult};
pub use request::{build_request_url, redact};
pub use retry::RetryPolicy;
