pub mod api;
pub mod auth;
pub mod listing;
pub mod token_cache;


use api::RedditApiClient;
use auth::TokenManager;
use chrono::Utc;
use futures::future::join_all;
use listing::{RedditListing, RedditPostData};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use subtrends_core::rate_limiter::RateLimiter;
use subtrends_core::{
    Comment, CoreError, Post, RateLimitConfig, RedditSettings, RetryExecutor, RetryPolicy,
};
use token_cache::TokenCache;
use tracing::{debug, error, info};

pub use auth::DEFAULT_TOKEN_EXPIRY;

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub base_url: String,
    pub auth_url: String,
    pub timeframe: String,
    pub request_timeout: Duration,
    pub token_expiry_buffer: Duration,
    pub token_file_path: PathBuf,
    pub rate_limit: RateLimitConfig,
    pub retry_policy: RetryPolicy,
}

impl RedditConfig {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self::from_settings(&RedditSettings {
            client_id,
            client_secret,
            user_agent,
            ..RedditSettings::default()
        })
    }

    pub fn from_settings(settings: &RedditSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            user_agent: settings.user_agent.clone(),
            base_url: settings.base_url.clone(),
            auth_url: settings.auth_url.clone(),
            timeframe: settings.timeframe.clone(),
            request_timeout: settings.request_timeout(),
            token_expiry_buffer: settings.token_expiry_buffer(),
            token_file_path: settings.token_file_path.clone(),
            rate_limit: settings.rate_limit(),
            retry_policy: settings.retry_policy(),
        }
    }
}

/// Reddit content client: top posts of the day and their top comments.
///
/// Content fetches never fail outright. Exhausted retries and malformed
/// listings are logged and produce empty results so one bad subreddit cannot
/// sink a whole group.
#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    timeframe: String,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, CoreError> {
        let cache = Arc::new(TokenCache::new(
            config.token_file_path.clone(),
            config.token_expiry_buffer,
        ));
        Self::with_token_cache(config, cache)
    }

    /// Builds a client sharing an existing token cache.
    pub fn with_token_cache(
        config: RedditConfig,
        cache: Arc<TokenCache>,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        let tokens = Arc::new(TokenManager::new(
            &config.client_id,
            &config.client_secret,
            &config.auth_url,
            http_client.clone(),
            cache,
        )?);

        let api = RedditApiClient::new(
            http_client,
            &config.base_url,
            tokens,
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
            RetryExecutor::new(config.retry_policy.clone()),
        );

        Ok(Self {
            api,
            timeframe: config.timeframe,
        })
    }

    /// Top posts of `subreddit` for `time_filter`, restricted to the last day.
    pub async fn fetch_top_posts(&self, subreddit: &str, limit: u32, time_filter: &str) -> Vec<Post> {
        let subreddit = normalize_subreddit(subreddit);
        let endpoint = format!("/r/{}/top", subreddit);
        let query = [("t", time_filter.to_string()), ("limit", limit.to_string())];

        let listing: RedditListing<RedditPostData> =
            match self.api.get_json(&endpoint, &query).await {
                Ok(listing) => listing,
                Err(e) => {
                    error!("Failed to fetch posts from r/{}: {}", subreddit, e);
                    return Vec::new();
                }
            };

        let posts = listing::parse_posts(listing, subreddit, Utc::now());
        debug!("Fetched {} posts from r/{}", posts.len(), subreddit);
        posts
    }

    pub async fn fetch_post_comments(&self, post: &Post, limit: u32) -> Vec<Comment> {
        if post.permalink.is_empty() {
            return Vec::new();
        }

        let endpoint = format!("/{}.json", post.permalink.trim_matches('/'));
        let query = [("limit", limit.to_string()), ("sort", "top".to_string())];

        let thread: Vec<serde_json::Value> = match self.api.get_json(&endpoint, &query).await {
            Ok(thread) => thread,
            Err(e) => {
                error!(
                    "Failed to fetch comments for '{}': {}",
                    title_excerpt(&post.title, 50),
                    e
                );
                return Vec::new();
            }
        };

        let comments = match listing::comment_listing_from_thread(thread) {
            Ok(Some(listing)) => listing::parse_comments(listing, limit as usize),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(
                    "Malformed comment listing for '{}': {}",
                    title_excerpt(&post.title, 50),
                    e
                );
                Vec::new()
            }
        };

        debug!(
            "Fetched {} comments for '{}'",
            comments.len(),
            title_excerpt(&post.title, 30)
        );
        comments
    }

    /// Top posts with their comments attached, in listing order. Comment
    /// fetches for all posts run concurrently.
    pub async fn fetch_posts_with_comments(
        &self,
        subreddit: &str,
        num_posts: u32,
        num_comments: u32,
    ) -> Vec<Post> {
        let mut posts = self
            .fetch_top_posts(subreddit, num_posts, &self.timeframe)
            .await;

        let comments = join_all(
            posts
                .iter()
                .map(|post| self.fetch_post_comments(post, num_comments)),
        )
        .await;

        for (post, comments) in posts.iter_mut().zip(comments) {
            post.comments = comments;
        }

        info!(
            "Fetched {} posts with comments from r/{}",
            posts.len(),
            normalize_subreddit(subreddit)
        );
        posts
    }
}

/// Accepts `worldnews`, `r/worldnews` and `/r/worldnews`.
pub fn normalize_subreddit(subreddit: &str) -> &str {
    let trimmed = subreddit.trim().trim_start_matches('/');
    trimmed
        .strip_prefix("r/")
        .or_else(|| trimmed.strip_prefix("R/"))
        .unwrap_or(trimmed)
}

fn title_excerpt(title: &str, max_chars: usize) -> String {
    title.chars().take(max_chars).collect()
}
