//! OpenAI-compatible chat-completions client.

use crate::conversation::DialogTurn;
use crate::error::LlmError;

use serde::Serialize;

/// One completion call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [DialogTurn],
    pub max_tokens: u32,
}

/// Text of the first choice. `None` when the provider returned a choice without content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: Option<String>,
}

/// A client bound to a single API key.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, LlmError>;
}

/// Calls `{base_url}/chat/completions` with bearer auth.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, LlmError> {
        let response = self
            .http_client
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::ProviderRequest(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| LlmError::ProviderRequest(format!("failed to read response body: {e}")))?;

        let response_body: serde_json::Value =
            serde_json::from_str(&response_text).map_err(|e| {
                LlmError::ProviderRequest(format!(
                    "response ({status}) is not valid JSON: {e}\nBody: {}",
                    truncate_body(&response_text)
                ))
            })?;

        if !status.is_success() {
            let message = response_body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error");
            return Err(LlmError::ProviderRequest(format!(
                "API error ({status}): {message}"
            )));
        }

        parse_chat_completion(&response_body)
    }
}

/// Extract the first choice's text from a chat-completions body.
fn parse_chat_completion(body: &serde_json::Value) -> Result<Completion, LlmError> {
    let choice = body["choices"]
        .as_array()
        .and_then(|choices| choices.first())
        .ok_or_else(|| LlmError::EmptyResponse("no choices in response".into()))?;

    let content = choice["message"]["content"]
        .as_str()
        .map(ToString::to_string);

    Ok(Completion { content })
}

/// Keep error bodies readable in logs.
fn truncate_body(body: &str) -> &str {
    const LIMIT: usize = 500;
    if body.len() <= LIMIT {
        return body;
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn request_serializes_to_chat_completions_body() {
        let messages = vec![
            DialogTurn::new(Role::User, "hello"),
            DialogTurn::new(Role::Assistant, "hi there"),
        ];
        let request = CompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: 1500,
        };

        let body = serde_json::to_value(&request).expect("request should serialize");

        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "hi there"},
                ],
                "max_tokens": 1500,
            })
        );
    }

    #[test]
    fn parses_first_choice_content() {
        let body = serde_json::json!({
            "choices": [
                {"message": {"role": "assistant", "content": "first"}},
                {"message": {"role": "assistant", "content": "second"}},
            ]
        });

        let completion = parse_chat_completion(&body).expect("should parse");
        assert_eq!(completion.content.as_deref(), Some("first"));
    }

    #[test]
    fn null_content_is_none() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        });

        let completion = parse_chat_completion(&body).expect("should parse");
        assert_eq!(completion.content, None);
    }

    #[test]
    fn missing_choices_is_an_error() {
        let error = parse_chat_completion(&serde_json::json!({"choices": []}))
            .expect_err("no choices must fail");
        assert!(matches!(error, LlmError::EmptyResponse(_)));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate_body(&body);
        assert!(truncated.len() <= 500);
        assert!(body.starts_with(truncated));
    }
}
