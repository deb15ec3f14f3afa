//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use docguard_common::{config::RateLimitConfig, errors::AppError};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide rate limiter
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Shared limiter plus the configured rate for error reporting
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<GlobalRateLimiter>,
    requests_per_second: u32,
}

impl RateLimitState {
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, AppError> {
        let rate = non_zero(config.requests_per_second, "rate_limit.requests_per_second")?;
        let burst = non_zero(config.burst, "rate_limit.burst")?;
        let quota = Quota::per_second(rate).allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            requests_per_second: config.requests_per_second,
        })
    }
}

fn non_zero(value: u32, key: &str) -> Result<NonZeroU32, AppError> {
    NonZeroU32::new(value).ok_or_else(|| AppError::Configuration {
        message: format!("{} must be positive", key),
    })
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(limit = state.requests_per_second, "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: state.requests_per_second,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_enforced() {
        let state = RateLimitState::from_config(&RateLimitConfig {
            requests_per_second: 1,
            burst: 2,
            enabled: true,
        })
        .unwrap();

        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_ok());
        assert!(state.limiter.check().is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result = RateLimitState::from_config(&RateLimitConfig {
            requests_per_second: 0,
            burst: 10,
            enabled: true,
        });
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }
}
