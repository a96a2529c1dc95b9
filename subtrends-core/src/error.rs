use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("reddit: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("anthropic: {0}")]
    Llm(#[from] LlmError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("file access failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("group '{group}' not found. Available groups: {}", .available.join(", "))]
    NotFound {
        group: String,
        available: Vec<String>,
    },

    #[error("rate limiter was shut down")]
    LimiterClosed,
}

/// Failures talking to the Reddit content and token endpoints.
#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("token exchange rejected: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("HTTP 429, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("bearer token rejected (HTTP 401)")]
    InvalidToken,

    #[error("request timed out")]
    RequestTimeout,

    #[error("unreadable listing: {details}")]
    InvalidResponse { details: String },

    #[error("HTTP {status_code} from server")]
    ServerError { status_code: u16 },

    #[error("unexpected HTTP {status_code}")]
    UnexpectedStatus { status_code: u16 },
}

/// Failures from the generative API, tagged with the provider that raised them.
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("{provider} refused access (HTTP 403)")]
    AuthenticationFailed { provider: String },

    #[error("{provider} rejected the API key")]
    InvalidApiKey { provider: String },

    #[error("{provider} rate limited the request")]
    RateLimitExceeded {
        provider: String,
        retry_after: Option<u64>,
    },

    #[error("model '{model}' does not exist")]
    ModelNotAvailable { model: String },

    #[error("bad request: {reason}")]
    InvalidPrompt { reason: String },

    #[error("{provider} overloaded or down (HTTP {status_code})")]
    ServiceUnavailable { provider: String, status_code: u16 },

    #[error("{provider} did not answer in time")]
    RequestTimeout { provider: String },

    #[error("unusable reply from {provider}: {details}")]
    InvalidResponseFormat { provider: String, details: String },

    #[error("unexpected HTTP {status_code}: {detail}")]
    UnexpectedStatus { status_code: u16, detail: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{path} does not exist")]
    FileNotFound { path: String },

    #[error("{field} has invalid value '{value}'")]
    InvalidValue { field: String, value: String },

    #[error("{var_name} is not set")]
    MissingEnvironmentVariable { var_name: String },

    #[error("TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
