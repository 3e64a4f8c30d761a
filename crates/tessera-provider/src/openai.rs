//! Client for OpenAI-compatible chat completion endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tessera_config::ProviderDef;

use crate::error::ProviderError;
use crate::service::{CompletionRequest, GenerationService};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Error bodies are cut to this many characters in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
  name: String,
  model: String,
  base_url: String,
  client: reqwest::Client,
}

impl OpenAiCompatible {
  pub fn new(
    name: impl Into<String>,
    base_url: impl Into<String>,
    model: impl Into<String>,
    api_key: Option<String>,
    timeout: Duration,
  ) -> Result<Self, ProviderError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key {
      let value = HeaderValue::from_str(&format!("Bearer {}", key))
        .map_err(|_| ProviderError::config("API key is not a valid header value"))?;
      headers.insert(AUTHORIZATION, value);
    }

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .default_headers(headers)
      .build()
      .map_err(|e| ProviderError::config(format!("failed to create HTTP client: {}", e)))?;

    Ok(Self {
      name: name.into(),
      model: model.into(),
      base_url: base_url.into().trim_end_matches('/').to_string(),
      client,
    })
  }

  /// Build a client from its definition, reading the key from the environment.
  pub fn from_def(def: &ProviderDef) -> Result<Self, ProviderError> {
    let api_key = match &def.api_key_env {
      Some(var) => Some(
        std::env::var(var)
          .map_err(|_| ProviderError::config(format!("environment variable {} is not set", var)))?,
      ),
      None => None,
    };
    let timeout = def
      .timeout_ms
      .map(Duration::from_millis)
      .unwrap_or(DEFAULT_TIMEOUT);
    Self::new(&def.name, &def.base_url, &def.model, api_key, timeout)
  }

  fn chat_url(&self) -> String {
    format!("{}/chat/completions", self.base_url)
  }
}

#[derive(Serialize)]
struct ChatApiRequest<'a> {
  model: &'a str,
  messages: Vec<ApiMessage<'a>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
  role: &'static str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatApiResponse {
  #[serde(default)]
  choices: Vec<Choice>,
  error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
  message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
  message: String,
}

#[async_trait]
impl GenerationService for OpenAiCompatible {
  fn name(&self) -> &str {
    &self.name
  }

  async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
      messages.push(ApiMessage {
        role: "system",
        content: &request.system_prompt,
      });
    }
    messages.push(ApiMessage {
      role: "user",
      content: &request.user_message,
    });

    let body = ChatApiRequest {
      model: &self.model,
      messages,
      temperature: request.options.temperature,
      max_tokens: request.options.max_tokens,
    };

    let response = self
      .client
      .post(self.chat_url())
      .json(&body)
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
      .text()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !status.is_success() {
      let message = serde_json::from_str::<ChatApiResponse>(&text)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .unwrap_or_else(|| text.chars().take(MAX_ERROR_BODY).collect());
      return Err(ProviderError::Http {
        status: status.as_u16(),
        message,
      });
    }

    let parsed: ChatApiResponse = serde_json::from_str(&text)
      .map_err(|e| ProviderError::InvalidResponse(format!("malformed body: {}", e)))?;

    if let Some(error) = parsed.error {
      return Err(ProviderError::InvalidResponse(error.message));
    }

    parsed
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message)
      .and_then(|m| m.content)
      .ok_or_else(|| ProviderError::InvalidResponse("response has no message content".to_string()))
  }
}
