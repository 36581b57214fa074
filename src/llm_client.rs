//! LLM API client for OpenAI, Anthropic and Gemini.
//!
//! OpenAI goes through `async-openai`; the other two are plain JSON over reqwest.

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI (GPT models).
    OpenAI,
    /// Anthropic (Claude models).
    Anthropic,
    /// Google (Gemini models).
    Gemini,
}

/// Configuration for LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    provider: LlmProvider,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl LlmConfig {
    /// Creates a new LLM configuration.
    #[instrument(skip(api_key), fields(provider = ?provider, model = %model))]
    pub fn new(provider: LlmProvider, api_key: String, model: String, max_tokens: u32) -> Self {
        debug!("Creating LLM config");
        Self {
            provider,
            api_key,
            model,
            max_tokens,
        }
    }

    /// Gets the provider.
    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Gets the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Gets the max tokens.
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// LLM client that abstracts over multiple providers.
#[derive(Debug, Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::Client,
}

impl LlmClient {
    /// Creates a new LLM client.
    #[instrument(skip(config), fields(provider = ?config.provider()))]
    pub fn new(config: LlmConfig) -> Self {
        info!("Creating LLM client");
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Generates a completion from a system prompt and user message.
    #[instrument(skip(self, system_prompt, user_message), fields(provider = ?self.config.provider, model = %self.config.model))]
    pub async fn generate(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        debug!("Generating completion");
        let content = match self.config.provider {
            LlmProvider::OpenAI => self.generate_openai(system_prompt, user_message).await?,
            LlmProvider::Anthropic => self.generate_anthropic(system_prompt, user_message).await?,
            LlmProvider::Gemini => self.generate_gemini(system_prompt, user_message).await?,
        };
        info!(content_length = content.len(), "Generated completion");
        Ok(content)
    }

    /// Sends a prepared request and returns the parsed JSON body.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        provider: &str,
    ) -> Result<serde_json::Value, LlmError> {
        debug!(provider, "Sending request");
        let response = request.send().await.map_err(|e| {
            error!(error = ?e, provider, "API request failed");
            LlmError::new(format!("{} API request failed: {}", provider, e))
        })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            error!(error = ?e, provider, "Failed to read response");
            LlmError::new(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            error!(status = %status, response = %response_text, provider, "API error");
            return Err(LlmError::new(format!(
                "{} API error {}: {}",
                provider, status, response_text
            )));
        }

        debug!(response_length = response_text.len(), provider, "Parsing response");
        serde_json::from_str(&response_text).map_err(|e| {
            error!(error = ?e, response = %response_text, provider, "Failed to parse response");
            LlmError::new(format!("Failed to parse response: {}", e))
        })
    }

    /// Generates a completion using Anthropic Claude.
    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_anthropic(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": [
                {
                    "role": "user",
                    "content": user_message
                }
            ]
        });

        let request = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", self.config.api_key.clone())
            .header("anthropic-version", "2023-06-01")
            .json(&request_body);
        let response_json = self.send(request, "Anthropic").await?;

        text_at(&response_json, &["content", "0", "text"], "Anthropic")
    }

    /// Generates a completion using OpenAI chat completions.
    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_openai(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let client = OpenAIClient::with_config(
            OpenAIConfig::new().with_api_key(self.config.api_key.clone()),
        );

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| LlmError::new(format!("Failed to build system message: {}", e)))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_message)
                    .build()
                    .map_err(|e| LlmError::new(format!("Failed to build user message: {}", e)))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .build()
            .map_err(|e| LlmError::new(format!("Failed to build request: {}", e)))?;

        debug!("Sending request to OpenAI");
        let response = client.chat().create(request).await.map_err(|e| {
            error!(error = ?e, "OpenAI API error");
            LlmError::new(format!("OpenAI API error: {}", e))
        })?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::new("No text content in OpenAI response".to_string()))
    }

    /// Generates a completion using Google Gemini, asking for a JSON reply.
    #[instrument(skip(self, system_prompt, user_message))]
    async fn generate_gemini(&self, system_prompt: &str, user_message: &str) -> Result<String, LlmError> {
        let request_body = serde_json::json!({
            "system_instruction": { "parts": [ { "text": system_prompt } ] },
            "contents": [
                { "role": "user", "parts": [ { "text": user_message } ] }
            ],
            "generationConfig": {
                "maxOutputTokens": self.config.max_tokens,
                "responseMimeType": "application/json"
            }
        });

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.config.model
        );
        let request = self
            .http
            .post(url)
            .header("x-goog-api-key", self.config.api_key.clone())
            .json(&request_body);
        let response_json = self.send(request, "Gemini").await?;

        text_at(
            &response_json,
            &["candidates", "0", "content", "parts", "0", "text"],
            "Gemini",
        )
    }
}

/// Walks a JSON value along `path` (object keys or array indices) to a string.
fn text_at(value: &serde_json::Value, path: &[&str], provider: &str) -> Result<String, LlmError> {
    let mut current = value;
    for key in path {
        current = match key.parse::<usize>() {
            Ok(index) => &current[index],
            Err(_) => &current[*key],
        };
    }
    current.as_str().map(str::to_string).ok_or_else(|| {
        error!(response = %value, provider, "No text content in response");
        LlmError::new(format!("No text content in {} response", provider))
    })
}

/// LLM client error.
#[derive(Debug, Clone, Display, Error)]
#[display("LLM error: {} at {}:{}", message, file, line)]
pub struct LlmError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl LlmError {
    /// Creates a new LLM error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_message = %message, "LLM error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_at_walks_arrays_and_objects() {
        let body = serde_json::json!({
            "candidates": [ { "content": { "parts": [ { "text": "{\"row\":7,\"col\":7}" } ] } } ]
        });
        let text = text_at(&body, &["candidates", "0", "content", "parts", "0", "text"], "Gemini")
            .expect("text present");
        assert_eq!(text, "{\"row\":7,\"col\":7}");
    }

    #[test]
    fn test_text_at_missing_field() {
        let body = serde_json::json!({ "content": [] });
        let err = text_at(&body, &["content", "0", "text"], "Anthropic").unwrap_err();
        assert!(err.message.contains("Anthropic"));
    }

    #[test]
    fn test_provider_names_lowercase() {
        let provider: LlmProvider = serde_json::from_str("\"gemini\"").expect("parse");
        assert_eq!(provider, LlmProvider::Gemini);
    }
}
