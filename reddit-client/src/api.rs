use crate::auth::TokenManager;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use subtrends_core::rate_limiter::RateLimiter;
use subtrends_core::{CoreError, RedditApiError, RetryExecutor};
use tracing::{debug, error, warn};

/// Seconds to wait after a 429 that carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Authenticated, rate-limited, retrying access to the OAuth API host.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: String,
    tokens: Arc<TokenManager>,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
}

impl RedditApiClient {
    pub fn new(
        http_client: Client,
        base_url: &str,
        tokens: Arc<TokenManager>,
        rate_limiter: Arc<RateLimiter>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            rate_limiter,
            retry,
        }
    }

    /// GETs `endpoint` and decodes the JSON body, retrying per the client's
    /// policy. A rejected token is refreshed once without using an attempt.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let operation = format!("GET {}", endpoint);
        self.retry
            .execute(&operation, || self.send_once(Method::GET, endpoint, query))
            .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let access_token = self.tokens.access_token().await?;
        let url = format!("{}{}", self.base_url, endpoint);

        // The permit covers the round trip only; backoff sleeps happen outside it.
        let (status, retry_after, body) = {
            let permit = self.rate_limiter.acquire_permit().await?;
            let window = self.rate_limiter.get_rate_limit_status().await;
            debug!(
                "Acquired rate limit permit for {} {} after {:?} ({} requests left in window)",
                method,
                endpoint,
                permit.queue_wait_time,
                window.requests_remaining_in_window()
            );

            let start_time = Instant::now();
            let response = self
                .http_client
                .request(method.clone(), &url)
                .bearer_auth(&access_token)
                .query(query)
                .send()
                .await
                .map_err(|e| transport_error(&method, endpoint, e))?;

            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            let body = response
                .bytes()
                .await
                .map_err(|e| transport_error(&method, endpoint, e))?;

            debug!(
                "{} {} -> {} in {:?}",
                method,
                endpoint,
                status,
                start_time.elapsed()
            );
            (status, retry_after, body)
        };

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                error!("Failed to parse response for {}: {}", endpoint, e);
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("{}: {}", endpoint, e),
                })
            });
        }

        Err(self.status_error(status, retry_after, endpoint, &access_token).await)
    }

    async fn status_error(
        &self,
        status: StatusCode,
        retry_after: Option<u64>,
        endpoint: &str,
        access_token: &str,
    ) -> CoreError {
        let error = match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!("Rate limited by Reddit, waiting {}s", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Token rejected for {}, refreshing", endpoint);
                if let Err(e) = self.tokens.invalidate(access_token).await {
                    warn!("Failed to clear token cache: {}", e);
                }
                RedditApiError::InvalidToken
            }
            s if s.is_server_error() => {
                warn!("Reddit server error {} for {}", s, endpoint);
                RedditApiError::ServerError {
                    status_code: s.as_u16(),
                }
            }
            s => {
                warn!("Unexpected status {} for {}", s, endpoint);
                RedditApiError::UnexpectedStatus {
                    status_code: s.as_u16(),
                }
            }
        };
        CoreError::RedditApi(error)
    }
}

fn transport_error(method: &Method, endpoint: &str, e: reqwest::Error) -> CoreError {
    warn!("Network error for {} {}: {}", method, endpoint, e);
    if e.is_timeout() {
        CoreError::RedditApi(RedditApiError::RequestTimeout)
    } else {
        CoreError::Network(e)
    }
}
