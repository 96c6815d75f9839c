//! LLM manager: completion requests with failover across the key pool.

use crate::config::LlmConfig;
use crate::conversation::DialogTurn;
use crate::error::{LlmError, Result};
use crate::llm::client::{CompletionClient, CompletionRequest, OpenAiClient};
use crate::llm::pool::KeyPool;

use anyhow::Context as _;
use std::sync::Arc;
use std::time::Duration;

/// Returned when the provider sends a choice with no text.
pub const EMPTY_COMPLETION_PLACEHOLDER: &str = "Empty response from the AI";

/// Attempts allowed per key before giving up.
const ATTEMPTS_PER_KEY: usize = 2;

/// Owns the key pool and runs the retry loop.
#[derive(Debug)]
pub struct LlmManager {
    pool: KeyPool,
    model: String,
    max_tokens: u32,
    retry_delay: Duration,
}

impl LlmManager {
    /// Create a manager with one OpenAI-compatible client per configured key.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .with_context(|| "failed to build HTTP client")?;

        let clients: Vec<Arc<dyn CompletionClient>> = config
            .api_keys
            .iter()
            .map(|key| {
                Arc::new(OpenAiClient::new(
                    http_client.clone(),
                    config.base_url.clone(),
                    key.clone(),
                )) as Arc<dyn CompletionClient>
            })
            .collect();

        Ok(Self::from_pool(
            KeyPool::new(clients)?,
            config.model.clone(),
            config.max_output_tokens,
            config.retry_delay,
        ))
    }

    /// Build from an existing pool.
    pub fn from_pool(
        pool: KeyPool,
        model: impl Into<String>,
        max_tokens: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            pool,
            model: model.into(),
            max_tokens,
            retry_delay,
        }
    }

    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Number of configured API keys.
    pub fn key_count(&self) -> usize {
        self.pool.len()
    }

    /// Ask the active client for a completion, rotating keys on failure.
    ///
    /// Makes at most `2 × pool size` attempts with a flat delay between them.
    /// Returns the first choice's text, or a placeholder when it is empty.
    pub async fn complete(&self, transcript: &[DialogTurn]) -> Result<String> {
        if transcript.is_empty() {
            return Err(LlmError::NoInput.into());
        }

        let request = CompletionRequest {
            model: &self.model,
            messages: transcript,
            max_tokens: self.max_tokens,
        };

        let max_attempts = self.pool.len() * ATTEMPTS_PER_KEY;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let (index, client) = self.pool.current();

            match client.complete(&request).await {
                Ok(completion) => {
                    tracing::debug!(key = index + 1, attempt = attempt + 1, "completion received");
                    return Ok(completion
                        .content
                        .filter(|text| !text.is_empty())
                        .unwrap_or_else(|| EMPTY_COMPLETION_PLACEHOLDER.to_string()));
                }
                Err(error) => {
                    tracing::error!(
                        key = index + 1,
                        attempt = attempt + 1,
                        %error,
                        "completion request failed"
                    );
                    last_error = Some(error.to_string());
                    self.pool.rotate();
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        Err(LlmError::Exhausted {
            attempts: max_attempts,
            last_error: last_error.unwrap_or_default(),
        }
        .into())
    }
}
