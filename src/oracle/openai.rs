//! OpenAI-compatible chat completions backend (Groq, OpenAI, OpenRouter)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, Oracle};
use crate::config::{DEFAULT_REQUEST_TIMEOUT, http_client};
use crate::{Error, Result};

/// Oracle backed by a `/chat/completions` endpoint
pub struct ChatCompletionsOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsOracle {
    /// Create a new chat completions oracle
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(base_url: String, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("API key required for the oracle".to_string()));
        }

        Ok(Self {
            client: http_client(DEFAULT_REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    /// Give up on requests that take longer than `timeout`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = http_client(timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl Oracle for ChatCompletionsOracle {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::debug!(
            purpose = ?request.purpose,
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Oracle(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("unexpected completion body: {e}")))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }

    fn name(&self) -> &'static str {
        "chat-completions"
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        let result = ChatCompletionsOracle::new(
            "https://api.groq.com/openai/v1".to_string(),
            String::new(),
            "llama".to_string(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn trims_trailing_slash() {
        let oracle = ChatCompletionsOracle::new(
            "https://api.groq.com/openai/v1/".to_string(),
            "key".to_string(),
            "llama".to_string(),
        )
        .unwrap();
        assert_eq!(oracle.base_url, "https://api.groq.com/openai/v1");
    }

    #[test]
    fn response_with_null_content_parses() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
