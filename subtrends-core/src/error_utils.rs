//! Presentation of errors on the command line and in logs.
//!
//! Whether an error is worth retrying is decided in one place,
//! [`get_retry_strategy`]; everything here derives from it.

use crate::error::*;
use crate::retry::{get_retry_strategy, RetryStrategy};
use std::time::Duration;
use tracing::{error, warn};

pub trait ErrorExt {
    /// Stable identifier for log queries, e.g. `REDDIT_RATE_LIMIT`.
    fn error_code(&self) -> &'static str;

    /// One line for a terminal, naming the setting to fix when there is one.
    fn user_friendly_message(&self) -> String;
}

impl CoreError {
    /// True when the retry executor would try the operation again.
    pub fn is_retryable(&self) -> bool {
        get_retry_strategy(self) != RetryStrategy::NoRetry
    }

    /// Server-dictated wait, when the server sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match get_retry_strategy(self) {
            RetryStrategy::RetryWithDelay(delay) => Some(delay),
            _ => None,
        }
    }
}

impl ErrorExt for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(e) => e.error_code(),
            CoreError::Llm(e) => e.error_code(),
            CoreError::Config(e) => e.error_code(),
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "JSON",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::NotFound { .. } => "GROUP_NOT_FOUND",
            CoreError::LimiterClosed => "LIMITER_CLOSED",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Llm(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Io(e) => format!("Could not read or write a local file: {}", e),
            CoreError::Serialization(e) => format!("A local JSON file is corrupt: {}", e),
            CoreError::Network(_) => {
                "Could not reach the server. Check the network connection.".to_string()
            }
            CoreError::InvalidInput { message } => message.clone(),
            CoreError::NotFound { group, available } if available.is_empty() => format!(
                "Unknown group '{}'. No groups are configured; set SUB_<GROUP>=sub1,sub2.",
                group
            ),
            CoreError::NotFound { group, available } => format!(
                "Unknown group '{}'. Available groups: {}",
                group,
                available.join(", ")
            ),
            CoreError::LimiterClosed => "Shutting down, request was not sent.".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::InvalidToken => "REDDIT_TOKEN_REJECTED",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_BAD_LISTING",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
            RedditApiError::UnexpectedStatus { .. } => "REDDIT_UNEXPECTED_STATUS",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { reason } => format!(
                "Reddit rejected the app credentials ({}). Check REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET.",
                reason
            ),
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Reddit is rate limiting this app. Try again in {} seconds.",
                retry_after
            ),
            RedditApiError::InvalidToken => {
                "Reddit rejected a freshly issued access token. Delete the token file and retry."
                    .to_string()
            }
            RedditApiError::RequestTimeout => {
                "Reddit did not answer in time. Raise REDDIT_REQUEST_TIMEOUT if this persists."
                    .to_string()
            }
            RedditApiError::InvalidResponse { .. } => {
                "Reddit sent a listing SubTrends could not read.".to_string()
            }
            RedditApiError::ServerError { status_code } => format!(
                "Reddit is having trouble (HTTP {}). Try again later.",
                status_code
            ),
            RedditApiError::UnexpectedStatus { status_code } => {
                format!("Reddit answered with HTTP {}.", status_code)
            }
        }
    }
}

impl ErrorExt for LlmError {
    fn error_code(&self) -> &'static str {
        match self {
            LlmError::AuthenticationFailed { .. } => "LLM_FORBIDDEN",
            LlmError::InvalidApiKey { .. } => "LLM_INVALID_API_KEY",
            LlmError::RateLimitExceeded { .. } => "LLM_RATE_LIMIT",
            LlmError::ModelNotAvailable { .. } => "LLM_UNKNOWN_MODEL",
            LlmError::InvalidPrompt { .. } => "LLM_BAD_REQUEST",
            LlmError::ServiceUnavailable { .. } => "LLM_UNAVAILABLE",
            LlmError::RequestTimeout { .. } => "LLM_TIMEOUT",
            LlmError::InvalidResponseFormat { .. } => "LLM_EMPTY_REPLY",
            LlmError::UnexpectedStatus { .. } => "LLM_UNEXPECTED_STATUS",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            LlmError::AuthenticationFailed { .. } => {
                "The Anthropic API refused access for this key.".to_string()
            }
            LlmError::InvalidApiKey { .. } => {
                "ANTHROPIC_API_KEY was rejected. Check that it is set and current.".to_string()
            }
            LlmError::RateLimitExceeded {
                retry_after: Some(seconds),
                ..
            } => format!("Anthropic is rate limiting requests. Try again in {} seconds.", seconds),
            LlmError::RateLimitExceeded { .. } => {
                "Anthropic is rate limiting requests. Try again shortly.".to_string()
            }
            LlmError::ModelNotAvailable { model } => format!(
                "Model '{}' is not available. Pick another with `subtrends model <name>`.",
                model
            ),
            LlmError::InvalidPrompt { reason } => {
                format!("Anthropic rejected the request: {}", reason)
            }
            LlmError::ServiceUnavailable { status_code, .. } => format!(
                "Anthropic is overloaded or down (HTTP {}). Try again later.",
                status_code
            ),
            LlmError::RequestTimeout { .. } => {
                "Anthropic did not answer in time. Raise ANTHROPIC_REQUEST_TIMEOUT for long digests."
                    .to_string()
            }
            LlmError::InvalidResponseFormat { .. } => {
                "Anthropic returned a reply without any text.".to_string()
            }
            LlmError::UnexpectedStatus {
                status_code,
                detail,
            } => format!("Anthropic answered with HTTP {}: {}", status_code, detail),
        }
    }
}

impl ErrorExt for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => format!("Config file {} does not exist.", path),
            ConfigError::InvalidValue { field, value } => {
                format!("{} has an invalid value '{}'.", field, value)
            }
            ConfigError::MissingEnvironmentVariable { var_name } => {
                format!("{} must be set.", var_name)
            }
            ConfigError::Parse(e) => format!("Config file is not valid TOML: {}", e),
        }
    }
}

/// Logs a failed operation with its error code. Transient failures that
/// survived every retry are warnings; everything else is an error.
pub fn report_error(context: &str, error: &CoreError) {
    let code = error.error_code();
    if error.is_retryable() {
        warn!(code, retry_after = ?error.retry_after(), "{} gave up after retries: {}", context, error);
    } else {
        error!(code, "{} failed: {}", context, error);
    }
}
