//! Chat completion backends.
//!
//! | Backend | Endpoint |
//! |---------|----------|
//! | `openai` | `POST {base}/v1/chat/completions`, key from `OPENAI_API_KEY` |
//! | `ollama` | `POST {url}/api/chat` with `stream: false` |
//! | `debug` | offline; echoes the question and cites every excerpt |
//!
//! Any other backend name is rejected with
//! [`DocQaError::UnsupportedModel`] before a request is made.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::DocQaError;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat model that turns a message list into one reply.
#[async_trait]
pub trait CompletionService: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

/// Build the backend named by `config.backend`.
pub fn create_completion(config: &CompletionConfig) -> Result<Box<dyn CompletionService>> {
    match config.backend.as_str() {
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        "debug" => Ok(Box::new(DebugCompletion)),
        other => Err(DocQaError::UnsupportedModel(other.to_string()).into()),
    }
}

async fn post_json(
    request: reqwest::RequestBuilder,
    label: &str,
) -> Result<serde_json::Value> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("{} API error {}: {}", label, status, body_text);
    }
    Ok(response.json().await?)
}

// ============ OpenAI ============

pub struct OpenAIChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIChat {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_OPENAI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": temperature,
        });
        let request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let json = post_json(request, "OpenAI").await?;
        let parsed: OpenAIResponse = serde_json::from_value(json)?;
        // Multiple choices are concatenated.
        Ok(parsed
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect())
    }
}

// ============ Ollama ============

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaChat {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_OLLAMA_URL)
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl CompletionService for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": temperature },
        });
        let request = self
            .client
            .post(format!("{}/api/chat", self.url))
            .json(&body);
        let json = post_json(request, "Ollama").await?;
        let parsed: OllamaResponse = serde_json::from_value(json)?;
        Ok(parsed.message.content)
    }
}

// ============ Debug ============

/// Offline backend for wiring checks. Replies with the question it was
/// asked and a `SOURCES:` line citing every `Source:` excerpt in the prompt.
pub struct DebugCompletion;

#[async_trait]
impl CompletionService for DebugCompletion {
    fn model_name(&self) -> &str {
        "debug"
    }

    async fn complete(&self, messages: &[ChatMessage], _temperature: f32) -> Result<String> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let question = prompt
            .lines()
            .find_map(|l| l.strip_prefix("QUESTION: "))
            .or_else(|| prompt.lines().next())
            .unwrap_or_default();
        let sources: Vec<&str> = messages
            .iter()
            .flat_map(|m| m.content.lines())
            .filter_map(|l| l.strip_prefix("Source: "))
            .collect();

        let mut reply = format!("Debug answer for: {}", question.trim());
        if !sources.is_empty() {
            reply.push_str("\nSOURCES: ");
            reply.push_str(&sources.join(", "));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_is_unsupported_model() {
        let config = CompletionConfig {
            backend: "gpt-neo".to_string(),
            ..Default::default()
        };
        let err = create_completion(&config).err().unwrap();
        assert_eq!(
            err.downcast_ref::<DocQaError>(),
            Some(&DocQaError::UnsupportedModel("gpt-neo".to_string()))
        );
    }

    #[tokio::test]
    async fn debug_backend_cites_excerpts() {
        let config = CompletionConfig {
            backend: "debug".to_string(),
            ..Default::default()
        };
        let service = create_completion(&config).unwrap();
        let reply = service
            .complete(
                &[
                    ChatMessage::system("be brief"),
                    ChatMessage::user(
                        "QUESTION: what grew?\nContent: revenue\nSource: a.pdf-0\n\nContent: costs\nSource: a.pdf-1",
                    ),
                ],
                0.0,
            )
            .await
            .unwrap();
        assert_eq!(reply, "Debug answer for: what grew?\nSOURCES: a.pdf-0, a.pdf-1");
    }

    #[test]
    fn chat_message_serializes_as_role_content() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }
}
