//! Protection around outbound calls and inbound admission: a per-client
//! rate limiter, per-service circuit breakers, retry with backoff, and the
//! service client that composes the last two.

mod circuit_breaker;
mod client;
mod error;
mod rate_limiter;
mod retry;

pub use circuit_breaker::{
    BreakerError, BreakerFailure, CircuitBreaker, CircuitBreakerConfig, CircuitState,
};
pub use client::{DEFAULT_TIMEOUT, ServiceClient, UpstreamResponse};
pub use error::ServiceError;
pub use rate_limiter::RateLimiter;
pub use retry::{RetryConfig, RetryPolicy};
