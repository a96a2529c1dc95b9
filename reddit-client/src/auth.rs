use crate::token_cache::TokenCache;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    TokenResponse, TokenUrl,
};
use std::sync::Arc;
use std::time::Duration;
use subtrends_core::{CachedToken, CoreError, RedditApiError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Applied when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_EXPIRY: Duration = Duration::from_secs(86_400);

/// Application-only OAuth tokens (client-credentials grant).
///
/// Lookups try the in-memory token first without locking. A miss takes the
/// refresh lock, re-checks memory and the shared [`TokenCache`], and only then
/// performs the exchange, so concurrent callers trigger at most one exchange
/// per expiry.
#[derive(Debug)]
pub struct TokenManager {
    oauth: BasicClient,
    http_client: reqwest::Client,
    cache: Arc<TokenCache>,
    current: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        token_url: &str,
        http_client: reqwest::Client,
        cache: Arc<TokenCache>,
    ) -> Result<Self, CoreError> {
        let token_url = TokenUrl::new(token_url.to_string()).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("Invalid token URL '{}': {}", token_url, e),
            }
        })?;
        // The grant never visits the authorize endpoint, but the client type needs one.
        let auth_url = AuthUrl::new(token_url.url().to_string()).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("Invalid auth URL: {}", e),
            }
        })?;

        let oauth = BasicClient::new(
            ClientId::new(client_id.to_string()),
            Some(ClientSecret::new(client_secret.to_string())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth,
            http_client,
            cache,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    /// A bearer token valid for at least the configured expiry buffer.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.valid_in_memory().await {
            return Ok(token);
        }

        let _refresh = self.refresh_lock.lock().await;

        if let Some(token) = self.valid_in_memory().await {
            return Ok(token);
        }

        if let Some(cached) = self.cache.get().await {
            debug!("Loaded Reddit token from cache");
            let access_token = cached.access_token.clone();
            *self.current.write().await = Some(cached);
            return Ok(access_token);
        }

        info!("Obtaining new Reddit OAuth token");
        let (access_token, expires_in) = self.exchange().await?;

        let token = match self.cache.set(&access_token, expires_in).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Continuing with unpersisted token: {}", e);
                CachedToken::new(access_token.clone(), expires_in)
            }
        };
        *self.current.write().await = Some(token);
        Ok(access_token)
    }

    /// Drops `rejected` from memory and from the cache file.
    ///
    /// A no-op when another task already replaced the rejected token, so a
    /// burst of 401s for the same token causes a single refresh.
    pub async fn invalidate(&self, rejected: &str) -> Result<(), CoreError> {
        let _refresh = self.refresh_lock.lock().await;

        let mut current = self.current.write().await;
        let stale = match current.as_ref() {
            Some(token) => token.access_token == rejected,
            None => true,
        };
        if !stale {
            debug!("Rejected token already replaced");
            return Ok(());
        }

        warn!("Reddit token rejected, clearing cached credentials");
        *current = None;
        drop(current);
        self.cache.clear().await
    }

    async fn valid_in_memory(&self) -> Option<String> {
        let current = self.current.read().await;
        current
            .as_ref()
            .filter(|token| token.is_valid(self.cache.expiry_buffer()))
            .map(|token| token.access_token.clone())
    }

    async fn exchange(&self) -> Result<(String, Duration), CoreError> {
        let http_client = self.http_client.clone();
        let response = self
            .oauth
            .exchange_client_credentials()
            .request_async(|request| send_oauth_request(http_client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: response.to_string(),
                    })
                }
                RequestTokenError::Request(e) if e.is_timeout() => {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                }
                RequestTokenError::Request(e) => CoreError::Network(e),
                RequestTokenError::Parse(e, _) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: format!("malformed token response: {}", e),
                    })
                }
                RequestTokenError::Other(reason) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed { reason })
                }
            })?;

        let access_token = response.access_token().secret().to_string();
        if access_token.is_empty() {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: "token response carried an empty access token".to_string(),
            }));
        }

        let expires_in = response.expires_in().unwrap_or(DEFAULT_TOKEN_EXPIRY);
        Ok((access_token, expires_in))
    }
}

/// Runs an oauth2 token request on our own client so it shares the
/// configured timeout and User-Agent.
async fn send_oauth_request(
    client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
