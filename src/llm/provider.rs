use crate::config::schema::{ApiType, ProviderConfig};
use crate::llm::types::{LlmMessage, LlmResponse, ProviderError, TokenUsage};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// LLM Provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request
    async fn complete(&self, messages: &[LlmMessage]) -> Result<LlmResponse, ProviderError>;

    /// Get provider name
    fn name(&self) -> &str;

    /// Get model name
    fn model(&self) -> &str;
}

fn http_client(timeout_seconds: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .unwrap_or_default()
}

/// Send the request and turn non-2xx statuses into a classified error.
async fn send_json(request: RequestBuilder) -> Result<serde_json::Value, ProviderError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ProviderError::from_status(status.as_u16(), error_text));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

fn require_content(content: Option<&str>) -> Result<String, ProviderError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text.to_string()),
        _ => Err(ProviderError::InvalidResponse(
            "response has no text content".to_string(),
        )),
    }
}

fn token(value: &serde_json::Value) -> u32 {
    value.as_u64().unwrap_or(0) as u32
}

/// OpenAI-compatible provider (OpenAI, Groq, OpenRouter, Mistral, DashScope)
pub struct OpenAiProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig, timeout_seconds: u64) -> Self {
        Self {
            client: http_client(timeout_seconds),
            config,
        }
    }

    fn build_body(&self, messages: &[LlmMessage]) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role,
                    "content": msg.content
                })
            })
            .collect();

        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<LlmResponse, ProviderError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut request = self.client.post(&url).json(&self.build_body(messages));
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let json = send_json(request).await?;
        let content = require_content(json["choices"][0]["message"]["content"].as_str())?;

        let usage = TokenUsage {
            prompt_tokens: token(&json["usage"]["prompt_tokens"]),
            completion_tokens: token(&json["usage"]["completion_tokens"]),
            total_tokens: token(&json["usage"]["total_tokens"]),
        };

        Ok(LlmResponse {
            content,
            model: self.config.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &str {
        &self.config.id
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Anthropic provider
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig, timeout_seconds: u64) -> Self {
        Self {
            client: http_client(timeout_seconds),
            config,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        // System prompt travels outside the message list
        let mut anthropic_messages = Vec::new();
        let mut system_prompt = String::new();

        for msg in messages {
            if msg.role == "system" {
                system_prompt = msg.content.clone();
            } else {
                anthropic_messages.push(serde_json::json!({
                    "role": msg.role,
                    "content": [{ "type": "text", "text": msg.content }]
                }));
            }
        }

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": anthropic_messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        if !system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(system_prompt);
        }

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::Auth("Anthropic API key required".to_string()))?;

        let request = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);

        let json = send_json(request).await?;
        let content = require_content(json["content"][0]["text"].as_str())?;

        let input = token(&json["usage"]["input_tokens"]);
        let output = token(&json["usage"]["output_tokens"]);

        Ok(LlmResponse {
            content,
            model: self.config.model.clone(),
            usage: TokenUsage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: input + output,
            },
        })
    }

    fn name(&self) -> &str {
        &self.config.id
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Google Gemini provider (generateContent REST API)
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, timeout_seconds: u64) -> Self {
        Self {
            client: http_client(timeout_seconds),
            config,
        }
    }

    fn build_body(&self, messages: &[LlmMessage]) -> serde_json::Value {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for msg in messages {
            match msg.role.as_str() {
                "system" => system_parts.push(serde_json::json!({ "text": msg.content })),
                "assistant" => contents.push(serde_json::json!({
                    "role": "model",
                    "parts": [{ "text": msg.content }]
                })),
                _ => contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{ "text": msg.content }]
                })),
            }
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "temperature": self.config.temperature,
                "topK": 40,
                "maxOutputTokens": self.config.max_tokens
            }
        });

        if !system_parts.is_empty() {
            body["systemInstruction"] = serde_json::json!({ "parts": system_parts });
        }

        body
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<LlmResponse, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::Auth("Gemini API key required".to_string()))?;

        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.build_body(messages));

        let json = send_json(request).await?;
        let content =
            require_content(json["candidates"][0]["content"]["parts"][0]["text"].as_str())?;

        Ok(LlmResponse {
            content,
            model: self.config.model.clone(),
            usage: TokenUsage {
                prompt_tokens: token(&json["usageMetadata"]["promptTokenCount"]),
                completion_tokens: token(&json["usageMetadata"]["candidatesTokenCount"]),
                total_tokens: token(&json["usageMetadata"]["totalTokenCount"]),
            },
        })
    }

    fn name(&self) -> &str {
        &self.config.id
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Create a provider instance for a configured entry
pub fn build_provider(config: ProviderConfig, timeout_seconds: u64) -> Box<dyn LlmProvider> {
    match config.api_type {
        ApiType::Openai => Box::new(OpenAiProvider::new(config, timeout_seconds)),
        ApiType::Anthropic => Box::new(AnthropicProvider::new(config, timeout_seconds)),
        ApiType::Gemini => Box::new(GeminiProvider::new(config, timeout_seconds)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_type: ApiType) -> ProviderConfig {
        ProviderConfig {
            id: "test".to_string(),
            api_type,
            base_url: "https://api.example.com/".to_string(),
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            temperature: 0.1,
            max_tokens: 256,
        }
    }

    #[test]
    fn test_openai_body() {
        let provider = OpenAiProvider::new(config(ApiType::Openai), 5);
        let body = provider.build_body(&[LlmMessage::user("Hello")]);
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_gemini_body_splits_system() {
        let provider = GeminiProvider::new(config(ApiType::Gemini), 5);
        let body = provider.build_body(&[
            LlmMessage::system("Be brief"),
            LlmMessage::user("Hi"),
            LlmMessage {
                role: "assistant".to_string(),
                content: "Hello".to_string(),
            },
        ]);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief");
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(body["generationConfig"]["topK"], 40);
    }

    #[test]
    fn test_build_provider_names() {
        for api_type in [ApiType::Openai, ApiType::Anthropic, ApiType::Gemini] {
            let provider = build_provider(config(api_type), 5);
            assert_eq!(provider.name(), "test");
            assert_eq!(provider.model(), "test-model");
        }
    }

    #[test]
    fn test_require_content() {
        assert!(require_content(Some("ok")).is_ok());
        assert!(require_content(Some("   ")).is_err());
        assert!(require_content(None).is_err());
    }
}
