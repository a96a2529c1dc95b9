pub mod anthropic;

use std::future::Future;
use subtrends_core::CoreError;

pub use anthropic::{AnthropicClient, AnthropicConfig};

/// One single-turn generation call. Unset fields fall back to the
/// provider's configured defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A text generation backend. Futures are `Send` so callers may spawn them.
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn generate(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<String, CoreError>> + Send;
}
