// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! OpenRouter provider (OpenAI-compatible chat completions)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ProviderError, ServiceError};
use crate::http::{self, PROBE_TIMEOUT};
use crate::service::{StructuredRequest, TextService};

/// Default OpenRouter endpoint
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

/// Default OpenRouter model
pub const DEFAULT_OPENROUTER_MODEL: &str = "qwen/qwen3-coder:free";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Text service backed by the OpenRouter API
#[derive(Clone)]
pub struct OpenRouterService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for OpenRouterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterService")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OpenRouterService {
    /// Create a service with an explicit API key
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Client` if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            api_key: api_key.into(),
            base_url: http::trim_base_url(base_url),
            model: model.into(),
            timeout,
        })
    }

    /// Create a service reading the API key from `api_key_env`
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::MissingApiKey` if the variable is unset or
    /// empty.
    pub fn from_env(
        api_key_env: &str,
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                env_var: api_key_env.to_string(),
            })?;
        Self::new(api_key, base_url, model, timeout)
    }
}

#[async_trait]
impl TextService for OpenRouterService {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.base_url);
        match self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "OpenRouter probe failed");
                false
            }
        }
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<String, ServiceError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.full_prompt(),
        });

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            response_format: json!({ "type": "json_object" }),
        };

        debug!(model = %self.model, "Sending OpenRouter request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::map_transport(&e, self.timeout))?;
        let response = http::check_status(response).await.inspect_err(|e| {
            warn!(model = %self.model, error = %e, "OpenRouter request rejected");
        })?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::invalid(format!("not a chat completion: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ServiceError::invalid("empty reply"));
        }
        Ok(content)
    }
}
