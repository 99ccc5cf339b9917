//! Resilience primitives for Larder.
//!
//! - [`RateLimiter`]: fixed-window admission control keyed by
//!   `(caller, operation)` or `(caller, global)`.
//! - [`CircuitBreakers`]: per-dependency failure isolation with
//!   closed / open / half-open states.
//!
//! Both structures are shared across concurrent dispatches. Every
//! check-and-update happens under a short per-key lock that is released
//! before any `.await`.
//!
//! Time is read from [`tokio::time::Instant`], so tests can drive windows
//! and cool-downs with a paused clock.

pub mod circuit_breaker;
pub mod error;
pub mod rate_limit;

pub use circuit_breaker::{BreakerConfig, CircuitBreakers, CircuitState};
pub use error::CircuitError;
pub use rate_limit::{Admission, BucketScope, GLOBAL_BUCKET, Limit, RateLimitConfig, RateLimiter};
