use crate::{GenerationRequest, LlmProvider};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtrends_core::rate_limiter::RateLimiter;
use subtrends_core::{
    AnthropicSettings, CoreError, LlmError, RateLimitConfig, RetryExecutor, RetryPolicy,
};
use tracing::{debug, error, warn};

pub const PROVIDER_NAME: &str = "anthropic";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-opus-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub endpoint: String,
    pub default_model: String,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub retry_policy: RetryPolicy,
}

impl AnthropicConfig {
    pub fn new(api_key: String) -> Self {
        Self::from_settings(&AnthropicSettings {
            api_key,
            ..AnthropicSettings::default()
        })
    }

    pub fn from_settings(settings: &AnthropicSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            default_model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            request_timeout: settings.request_timeout(),
            rate_limit: settings.rate_limit(),
            retry_policy: RetryPolicy::anthropic(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

/// Messages API client with its own rate limiter and retry policy.
#[derive(Debug)]
pub struct AnthropicClient {
    http_client: Client,
    config: AnthropicConfig,
    rate_limiter: Arc<RateLimiter>,
    retry: RetryExecutor,
}

impl AnthropicClient {
    pub fn new(config: AnthropicConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder().timeout(config.request_timeout).build()?;
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let retry = RetryExecutor::new(config.retry_policy.clone());

        Ok(Self {
            http_client,
            config,
            rate_limiter,
            retry,
        })
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<String, CoreError> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let body = MessagesRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let (status, retry_after, bytes) = {
            let permit = self.rate_limiter.acquire_permit().await?;
            let window = self.rate_limiter.get_rate_limit_status().await;
            debug!(
                "Sending request to Anthropic API (model: {}, queued {:?}, {} requests left in window)",
                model,
                permit.queue_wait_time,
                window.requests_remaining_in_window()
            );

            let start_time = Instant::now();
            let response = self
                .http_client
                .post(&self.config.endpoint)
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            let bytes = response.bytes().await.map_err(transport_error)?;
            debug!("Anthropic API answered {} in {:?}", status, start_time.elapsed());
            (status, retry_after, bytes)
        };

        if !status.is_success() {
            return Err(status_error(status, retry_after, &bytes, model));
        }

        let response: MessagesResponse = serde_json::from_slice(&bytes).map_err(|e| {
            error!("Failed to parse Anthropic response: {}", e);
            invalid_format(format!("unparsable body: {}", e))
        })?;

        if let Some(usage) = &response.usage {
            debug!(
                "Received response: {} input tokens, {} output tokens",
                usage.input_tokens, usage.output_tokens
            );
        }

        extract_text(response)
    }
}

impl LlmProvider for AnthropicClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<String, CoreError>> + Send {
        async move {
            self.retry
                .execute("anthropic messages", || self.send_once(&request))
                .await
        }
    }
}

fn extract_text(response: MessagesResponse) -> Result<String, CoreError> {
    let mut text_blocks = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .peekable();

    if text_blocks.peek().is_none() {
        return Err(invalid_format("response contained no text blocks".to_string()));
    }
    Ok(text_blocks.collect())
}

fn status_error(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &[u8],
    model: &str,
) -> CoreError {
    let detail = serde_json::from_slice::<ErrorEnvelope>(body)
        .map(|envelope| format!("{}: {}", envelope.error.kind, envelope.error.message))
        .unwrap_or_else(|_| String::from_utf8_lossy(body).chars().take(200).collect());
    let provider = PROVIDER_NAME.to_string();

    let error = match status.as_u16() {
        400 => LlmError::InvalidPrompt { reason: detail },
        401 => LlmError::InvalidApiKey { provider },
        403 => LlmError::AuthenticationFailed { provider },
        404 => LlmError::ModelNotAvailable {
            model: model.to_string(),
        },
        429 => {
            warn!("Anthropic rate limit error: {}", detail);
            LlmError::RateLimitExceeded {
                provider,
                retry_after,
            }
        }
        code if status.is_server_error() => {
            warn!("Anthropic server error {}: {}", code, detail);
            LlmError::ServiceUnavailable {
                provider,
                status_code: code,
            }
        }
        code => {
            error!("Anthropic API error {}: {}", code, detail);
            LlmError::UnexpectedStatus {
                status_code: code,
                detail,
            }
        }
    };
    CoreError::Llm(error)
}

fn transport_error(e: reqwest::Error) -> CoreError {
    warn!("Network error calling Anthropic API: {}", e);
    if e.is_timeout() {
        CoreError::Llm(LlmError::RequestTimeout {
            provider: PROVIDER_NAME.to_string(),
        })
    } else {
        CoreError::Network(e)
    }
}

fn invalid_format(details: String) -> CoreError {
    CoreError::Llm(LlmError::InvalidResponseFormat {
        provider: PROVIDER_NAME.to_string(),
        details,
    })
}
