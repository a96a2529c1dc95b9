//! Application configuration.
//!
//! Settings come from an optional TOML file, are then overridden by
//! environment variables, and are validated before anything talks to the
//! network. Subreddit groups are read from `SUB_<GROUP>=sub1,sub2` variables
//! or from the `[groups]` table of the file.

use crate::{ConfigError, CoreError, RateLimitConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const GROUP_ENV_PREFIX: &str = "SUB_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub base_url: String,
    pub auth_url: String,
    pub timeframe: String,
    pub num_posts: u32,
    pub num_comments: u32,
    pub request_timeout_secs: u64,
    pub token_expiry_buffer_secs: u64,
    pub token_file_path: PathBuf,
    pub max_concurrent_requests: usize,
    pub requests_per_minute: usize,
    pub max_retries: u32,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: "subtrends:v1.0".to_string(),
            base_url: "https://oauth.reddit.com".to_string(),
            auth_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            timeframe: "day".to_string(),
            num_posts: 7,
            num_comments: 7,
            request_timeout_secs: 10,
            token_expiry_buffer_secs: 300,
            token_file_path: PathBuf::from("data/reddit_token.json"),
            max_concurrent_requests: 5,
            requests_per_minute: 60,
            max_retries: 3,
        }
    }
}

impl RedditSettings {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_concurrent: self.max_concurrent_requests,
            max_requests: self.requests_per_minute,
            time_window: Duration::from_secs(60),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::reddit().with_max_attempts(self.max_retries)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_expiry_buffer(&self) -> Duration {
        Duration::from_secs(self.token_expiry_buffer_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub requests_per_minute: usize,
}

impl Default for AnthropicSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-opus-4-5".to_string(),
            max_tokens: 4096,
            request_timeout_secs: 120,
            max_concurrent_requests: 5,
            requests_per_minute: 50,
        }
    }
}

impl AnthropicSettings {
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_concurrent: self.max_concurrent_requests,
            max_requests: self.requests_per_minute,
            time_window: Duration::from_secs(60),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditSettings,
    pub anthropic: AnthropicSettings,
    /// Group name (lowercase) to ordered subreddit list.
    pub groups: BTreeMap<String, Vec<String>>,
    /// Target language of the second summarization pass; `None` skips it.
    pub translation_language: Option<String>,
    pub preferences_file_path: PathBuf,
    /// Per-tenant record of summarized groups.
    pub sessions_file_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reddit: RedditSettings::default(),
            anthropic: AnthropicSettings::default(),
            groups: BTreeMap::new(),
            translation_language: Some("Ukrainian".to_string()),
            preferences_file_path: PathBuf::from("data/preferences.json"),
            sessions_file_path: PathBuf::from("data/sessions.json"),
        }
    }
}

impl AppConfig {
    /// File (if given) → process environment → validation.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(std::env::vars())?;
        config.validate()?;

        if config.groups.is_empty() {
            warn!("No subreddit groups configured (SUB_* environment variables)");
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                CoreError::Io(e)
            }
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let mut config: AppConfig = toml::from_str(contents).map_err(ConfigError::from)?;
        config.groups = normalize_groups(std::mem::take(&mut config.groups));
        Ok(config)
    }

    /// Applies recognised variables from `vars`; unknown keys are ignored.
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(group) = key.strip_prefix(GROUP_ENV_PREFIX) {
                let subreddits = parse_csv(&value);
                if !group.is_empty() && !subreddits.is_empty() {
                    let name = group.to_lowercase();
                    info!("Found subreddit group '{}': {:?}", name, subreddits);
                    self.groups.insert(name, subreddits);
                }
                continue;
            }

            match key.as_str() {
                "REDDIT_CLIENT_ID" => self.reddit.client_id = value,
                "REDDIT_CLIENT_SECRET" => self.reddit.client_secret = value,
                "REDDIT_USER_AGENT" => self.reddit.user_agent = value,
                "REDDIT_BASE_URL" => self.reddit.base_url = value,
                "REDDIT_AUTH_URL" => self.reddit.auth_url = value,
                "REDDIT_TIMEFRAME" => self.reddit.timeframe = value,
                "REDDIT_TOKEN_FILE_PATH" => self.reddit.token_file_path = PathBuf::from(value),
                "NUM_POSTS" => self.reddit.num_posts = parse_number(&key, &value)?,
                "NUM_COMMENTS" => self.reddit.num_comments = parse_number(&key, &value)?,
                "MAX_CONCURRENT_REQUESTS" => {
                    self.reddit.max_concurrent_requests = parse_number(&key, &value)?
                }
                "REQUESTS_PER_MINUTE" => {
                    self.reddit.requests_per_minute = parse_number(&key, &value)?
                }
                "REDDIT_MAX_RETRIES" => self.reddit.max_retries = parse_number(&key, &value)?,
                "REDDIT_REQUEST_TIMEOUT" => {
                    self.reddit.request_timeout_secs = parse_duration(&key, &value)?.as_secs()
                }
                "REDDIT_TOKEN_EXPIRY_BUFFER" => {
                    self.reddit.token_expiry_buffer_secs = parse_duration(&key, &value)?.as_secs()
                }
                "ANTHROPIC_API_KEY" => self.anthropic.api_key = value,
                "ANTHROPIC_API_ENDPOINT" => self.anthropic.endpoint = value,
                "ANTHROPIC_MODEL" => self.anthropic.model = value,
                "ANTHROPIC_MAX_TOKENS" => self.anthropic.max_tokens = parse_number(&key, &value)?,
                "ANTHROPIC_REQUEST_TIMEOUT" => {
                    self.anthropic.request_timeout_secs = parse_duration(&key, &value)?.as_secs()
                }
                "ANTHROPIC_REQUESTS_PER_MINUTE" => {
                    self.anthropic.requests_per_minute = parse_number(&key, &value)?
                }
                "TRANSLATION_LANGUAGE" => {
                    let language = value.trim();
                    self.translation_language = if language.is_empty() {
                        None
                    } else {
                        Some(language.to_string())
                    };
                }
                "PREFERENCES_FILE_PATH" => self.preferences_file_path = PathBuf::from(value),
                "SESSIONS_FILE_PATH" => self.sessions_file_path = PathBuf::from(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// Fails fast on missing credentials, zero limits and unparsable URLs.
    pub fn validate(&self) -> Result<(), CoreError> {
        require_non_empty("REDDIT_CLIENT_ID", &self.reddit.client_id)?;
        require_non_empty("REDDIT_CLIENT_SECRET", &self.reddit.client_secret)?;
        require_non_empty("ANTHROPIC_API_KEY", &self.anthropic.api_key)?;

        require_positive("reddit.max_concurrent_requests", self.reddit.max_concurrent_requests)?;
        require_positive("reddit.requests_per_minute", self.reddit.requests_per_minute)?;
        require_positive("reddit.request_timeout_secs", self.reddit.request_timeout_secs as usize)?;
        require_positive("reddit.num_posts", self.reddit.num_posts as usize)?;
        require_positive(
            "anthropic.max_concurrent_requests",
            self.anthropic.max_concurrent_requests,
        )?;
        require_positive("anthropic.requests_per_minute", self.anthropic.requests_per_minute)?;
        require_positive(
            "anthropic.request_timeout_secs",
            self.anthropic.request_timeout_secs as usize,
        )?;

        require_url("reddit.base_url", &self.reddit.base_url)?;
        require_url("reddit.auth_url", &self.reddit.auth_url)?;
        require_url("anthropic.endpoint", &self.anthropic.endpoint)?;
        Ok(())
    }
}

fn normalize_groups(groups: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    groups
        .into_iter()
        .map(|(name, subreddits)| {
            let subreddits = subreddits
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>();
            (name.to_lowercase(), subreddits)
        })
        .filter(|(_, subreddits)| !subreddits.is_empty())
        .collect()
}

fn parse_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value.trim().parse::<T>().map_err(|_| invalid_value(key, value))
}

/// Accepts plain seconds or a `s`/`m`/`h` suffix: `10`, `10s`, `5m`, `1h`.
pub fn parse_duration(key: &str, value: &str) -> Result<Duration, CoreError> {
    let value_lower = value.trim().to_lowercase();
    let (number, unit_secs) = if let Some(n) = value_lower.strip_suffix('s') {
        (n, 1.0)
    } else if let Some(n) = value_lower.strip_suffix('m') {
        (n, 60.0)
    } else if let Some(n) = value_lower.strip_suffix('h') {
        (n, 3600.0)
    } else {
        (value_lower.as_str(), 1.0)
    };

    let amount: f64 = number
        .trim()
        .parse()
        .map_err(|_| invalid_value(key, value))?;
    if amount < 0.0 {
        return Err(invalid_value(key, value));
    }
    Duration::try_from_secs_f64(amount * unit_secs).map_err(|_| invalid_value(key, value))
}

fn invalid_value(field: &str, value: &str) -> CoreError {
    CoreError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn require_non_empty(var_name: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Config(ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        }));
    }
    Ok(())
}

fn require_positive(field: &str, value: usize) -> Result<(), CoreError> {
    if value == 0 {
        return Err(invalid_value(field, "0"));
    }
    Ok(())
}

fn require_url(field: &str, value: &str) -> Result<(), CoreError> {
    Url::parse(value).map_err(|_| invalid_value(field, value))?;
    Ok(())
}
