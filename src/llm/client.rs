//! Chat completion clients for OpenAI-compatible and Ollama endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::TextGenerator;
use crate::config::LlmProviderConfig;
use crate::errors::CohortMatchError;
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    /// `POST {endpoint}/chat/completions`
    OpenAI,
    /// `POST {endpoint}/api/chat`
    Ollama,
}

impl ChatProvider {
    pub fn parse(kind: &str) -> Result<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            other => Err(CohortMatchError::ConfigError(format!(
                "unknown llm provider kind '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct ChatClient {
    name: String,
    provider: ChatProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: usize,
    client: Client,
}

impl ChatClient {
    pub fn new(
        name: impl Into<String>,
        provider: ChatProvider,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CohortMatchError::HttpError(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            provider,
            model: model.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
            temperature: 0.3,
            max_tokens: 800,
            client,
        })
    }

    pub fn from_config(config: &LlmProviderConfig) -> Result<Self> {
        let mut client = Self::new(
            config.name.clone(),
            ChatProvider::parse(&config.kind)?,
            config.model.clone(),
            config.endpoint.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        client.temperature = config.temperature;
        client.max_tokens = config.max_tokens;
        Ok(client)
    }

    async fn complete_openai(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            temperature: f32,
            max_tokens: usize,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ResponseMessage,
        }

        #[derive(Deserialize)]
        struct ResponseMessage {
            #[serde(default)]
            content: Option<String>,
        }

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Calling chat completions API: {}", url);

        let request = OpenAIRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CohortMatchError::LlmError(format!(
                "{} API error ({status}): {error_text}",
                self.name
            )));
        }

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| CohortMatchError::LlmError(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CohortMatchError::LlmError("No completion in response".to_string()))
    }

    async fn complete_ollama(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct OllamaOptions {
            temperature: f32,
            num_predict: usize,
        }

        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            messages: Vec<ChatMessage<'a>>,
            stream: bool,
            options: OllamaOptions,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            message: OllamaMessage,
        }

        #[derive(Deserialize)]
        struct OllamaMessage {
            content: String,
        }

        let url = format!("{}/api/chat", self.endpoint);
        debug!("Calling Ollama chat API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CohortMatchError::LlmError(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| CohortMatchError::LlmError(format!("Failed to parse response: {e}")))?;

        Ok(result.message.content)
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        match self.provider {
            ChatProvider::OpenAI => self.complete_openai(system, user).await,
            ChatProvider::Ollama => self.complete_ollama(system, user).await,
        }
    }
}
