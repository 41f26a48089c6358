use std::env;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::web::models::ChatMessage;

#[derive(Debug, Error)]
pub enum OpenAiError {
    #[error("Falta OPENAI_API_KEY en variables de entorno.")]
    MissingApiKey,
    #[error("La API de OpenAI respondió con un error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("Tiempo de espera agotado en la llamada a OpenAI.")]
    Timeout,
    #[error("Error de red en la llamada a OpenAI: {0}")]
    Transport(reqwest::Error),
    #[error("Respuesta de OpenAI con formato inesperado: {0}")]
    Malformed(serde_json::Error),
}

/// Connection settings, read from the environment with sensible defaults.
/// The API key is optional here: its absence is reported per request so the
/// server still boots (and the error reaches the caller as a JSON envelope).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            max_tokens: 900,
            timeout: Duration::from_secs(30),
        }
    }
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: env::var("OPENAI_API_URL").unwrap_or(defaults.base_url),
            model: env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            temperature: env::var("TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(defaults.temperature),
            max_tokens: env::var("MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.max_tokens),
            timeout: env::var("OPENAI_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// One completed model call: the free-text answer plus the first tool call,
/// if the model produced one. Arguments stay a raw string; decoding them is
/// the extractor's job.
#[derive(Debug, Clone)]
pub struct RawModelResponse {
    pub content: String,
    pub tool_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

// Client for an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env())
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&Value>,
        tool_choice: Option<&Value>,
    ) -> Result<RawModelResponse, OpenAiError> {
        let api_key = self.config.api_key.as_deref().ok_or(OpenAiError::MissingApiKey)?;

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut payload = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": messages,
        });
        if let Some(tools) = tools {
            payload["tools"] = tools.clone();
        }
        if let Some(choice) = tool_choice {
            payload["tool_choice"] = choice.clone();
        }

        info!(
            "Calling {} (model {}, {} messages)",
            url,
            self.config.model,
            messages.len()
        );
        debug!("Payload: {}", payload);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::classify)?;

        if !status.is_success() {
            return Err(OpenAiError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(OpenAiError::Malformed)?;
        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .unwrap_or_default();

        let content = message.content.unwrap_or_default();
        let tool_call = message.tool_calls.into_iter().next().map(|t| t.function);

        debug!(
            "Response: {} chars of text, tool call: {}",
            content.len(),
            tool_call.as_ref().map(|t| t.name.as_str()).unwrap_or("none")
        );

        Ok(RawModelResponse { content, tool_call })
    }

    fn classify(err: reqwest::Error) -> OpenAiError {
        if err.is_timeout() {
            OpenAiError::Timeout
        } else {
            OpenAiError::Transport(err)
        }
    }
}

// Pull the provider's own error message out of a non-2xx body when possible.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "sin detalle del proveedor".to_string())
}
