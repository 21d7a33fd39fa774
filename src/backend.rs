use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use eyre::{Result, bail};
use log::debug;
use serde::Serialize;

use crate::config::{self, Config};

/// LLM provider kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ollama,
    Gemini,
    OpenAi,
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Ollama => write!(f, "ollama"),
            Provider::Gemini => write!(f, "gemini"),
            Provider::OpenAi => write!(f, "openai"),
            Provider::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl FromStr for Provider {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => bail!("unknown AI provider: {other}"),
        }
    }
}

impl Provider {
    /// Resolve a caller-supplied selector; unknown or missing values fall back to the default
    pub fn select(requested: Option<&str>, default: Provider) -> Provider {
        requested
            .filter(|r| !r.trim().is_empty())
            .and_then(|r| r.parse().ok())
            .unwrap_or(default)
    }
}

/// A text-completion backend
#[async_trait]
pub trait Backend: Send + Sync {
    fn provider(&self) -> Provider;

    /// Whether the backend has what it needs (credentials, enabled flag) to be called
    fn is_available(&self) -> bool;

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

/// Build the backend for a provider from config
pub fn create_backend(provider: Provider, config: &Config, client: reqwest::Client) -> Box<dyn Backend> {
    match provider {
        Provider::Ollama => Box::new(OllamaBackend {
            client,
            url: config.ollama_url(),
            model: config.ollama_model(),
            available: config.ollama_available(),
        }),
        Provider::Gemini => Box::new(GeminiBackend {
            client,
            api_key: config.gemini_api_key(),
            model: config
                .gemini
                .model
                .clone()
                .unwrap_or_else(|| config::DEFAULT_GEMINI_MODEL.to_string()),
        }),
        Provider::OpenAi => Box::new(OpenAiBackend {
            client,
            api_key: config.openai_api_key(),
            model: config
                .openai
                .model
                .clone()
                .unwrap_or_else(|| config::DEFAULT_OPENAI_MODEL.to_string()),
        }),
        Provider::Anthropic => Box::new(AnthropicBackend {
            client,
            api_key: config.anthropic_api_key(),
            model: config
                .anthropic
                .model
                .clone()
                .unwrap_or_else(|| config::DEFAULT_ANTHROPIC_MODEL.to_string()),
        }),
    }
}

async fn post_json(request: reqwest::RequestBuilder, body: &serde_json::Value, name: &str) -> Result<serde_json::Value> {
    let resp = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{name} API returned {status}: {body}");
    }

    Ok(resp.json().await?)
}

pub struct OllamaBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    available: bool,
}

#[async_trait]
impl Backend for OllamaBackend {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let endpoint = format!("{}/generate", self.url.trim_end_matches('/'));
        debug!("Calling Ollama at {endpoint} with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature }
        });

        let json = post_json(self.client.post(&endpoint), &body, "Ollama").await?;
        extract_ollama_text(&json)
    }
}

fn extract_ollama_text(json: &serde_json::Value) -> Result<String> {
    match json.get("response").and_then(|r| r.as_str()) {
        Some(text) => Ok(text.to_string()),
        None => bail!("unexpected Ollama API response format"),
    }
}

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

#[async_trait]
impl Backend for GeminiBackend {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| eyre::eyre!("GEMINI_API_KEY not configured (required for Gemini summarization)"))?;

        debug!("Calling Gemini API with model {}", self.model);

        let endpoint = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": { "temperature": temperature }
        });

        let json = post_json(self.client.post(&endpoint).query(&[("key", api_key)]), &body, "Gemini").await?;
        extract_gemini_text(&json)
    }
}

fn extract_gemini_text(json: &serde_json::Value) -> Result<String> {
    if let Some(parts) = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text")?.as_str())
            .collect();
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Gemini API response format");
}

pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| eyre::eyre!("OPENAI_API_KEY not configured (required for OpenAI summarization)"))?;

        debug!("Calling OpenAI API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "temperature": temperature,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful assistant that summarizes YouTube video captions."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let request = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key);
        let json = post_json(request, &body, "OpenAI").await?;
        extract_openai_text(&json)
    }
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected OpenAI API response format");
}

pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

#[async_trait]
impl Backend for AnthropicBackend {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| eyre::eyre!("ANTHROPIC_API_KEY not configured (required for Claude summarization)"))?;

        debug!("Calling Anthropic API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 4096,
            "temperature": temperature,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let request = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01");
        let json = post_json(request, &body, "Anthropic").await?;
        extract_anthropic_text(&json)
    }
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str()
                } else {
                    None
                }
            })
            .collect();
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!("ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert_eq!("Gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("mistral".parse::<Provider>().is_err());
    }

    #[test]
    fn test_provider_select_falls_back_to_default() {
        assert_eq!(Provider::select(None, Provider::Ollama), Provider::Ollama);
        assert_eq!(Provider::select(Some(""), Provider::Gemini), Provider::Gemini);
        assert_eq!(Provider::select(Some("nope"), Provider::Ollama), Provider::Ollama);
        assert_eq!(Provider::select(Some("anthropic"), Provider::Ollama), Provider::Anthropic);
    }

    #[test]
    fn test_provider_display_round_trips() {
        for provider in [Provider::Ollama, Provider::Gemini, Provider::OpenAi, Provider::Anthropic] {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn test_backend_availability_follows_credentials() {
        let client = reqwest::Client::new();
        let mut config = Config::default();
        config.ollama.available = Some(false);
        config.gemini.api_key = Some("key".to_string());

        assert!(!create_backend(Provider::Ollama, &config, client.clone()).is_available());
        assert!(create_backend(Provider::Gemini, &config, client).is_available());
    }

    #[test]
    fn test_extract_ollama_text() {
        let json = serde_json::json!({"model": "m", "response": "A summary.", "done": true});
        assert_eq!(extract_ollama_text(&json).unwrap(), "A summary.");
        assert!(extract_ollama_text(&serde_json::json!({"error": "boom"})).is_err());
    }

    #[test]
    fn test_extract_gemini_text_joins_parts() {
        let json = serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": "Hello " }, { "text": "world" } ] } }
            ]
        });
        assert_eq!(extract_gemini_text(&json).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_gemini_text_missing_candidates() {
        assert!(extract_gemini_text(&serde_json::json!({"promptFeedback": {}})).is_err());
    }

    #[test]
    fn test_extract_anthropic_text() {
        let json = serde_json::json!({
            "content": [
                {
                    "type": "text",
                    "text": "Here is the summary."
                }
            ]
        });
        assert_eq!(extract_anthropic_text(&json).unwrap(), "Here is the summary.");
    }

    #[test]
    fn test_extract_anthropic_text_empty() {
        let json = serde_json::json!({"content": []});
        assert!(extract_anthropic_text(&json).is_err());
    }

    #[test]
    fn test_extract_openai_text() {
        let json = serde_json::json!({
            "choices": [
                {
                    "message": {
                        "role": "assistant",
                        "content": "Summary of the video."
                    }
                }
            ]
        });
        assert_eq!(extract_openai_text(&json).unwrap(), "Summary of the video.");
    }

    #[test]
    fn test_extract_openai_text_empty() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_openai_text(&json).is_err());
    }
}
