//! Network plumbing shared by every API call.
//!
//! - A token-bucket rate limiter gating outbound requests
//! - A transport seam over `reqwest`
//! - A retrying decorator with exponential backoff and `Retry-After` support

mod rate_limit;
mod retry;
mod transport;

pub use rate_limit::RateLimiter;
pub use retry::RetryTransport;
pub use transport::{Transport, TransportError};
