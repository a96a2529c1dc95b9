pub mod config;
pub mod error;
pub mod error_utils;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use config::*;
pub use error::*;
pub use error_utils::*;
pub use rate_limiter::{RateLimitConfig, RateLimitPermit, RateLimitStatus, RateLimiter};
pub use retry::{RetryExecutor, RetryPolicy, RetryStrategy};
pub use types::*;
