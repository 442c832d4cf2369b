// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Ollama provider (`/api/generate` with a JSON `format`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ProviderError, ServiceError};
use crate::http::{self, PROBE_TIMEOUT};
use crate::service::{StructuredRequest, TextService};

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Environment variable overriding the configured endpoint
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    format: &'a Value,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Text service backed by a local or remote Ollama server
#[derive(Debug, Clone)]
pub struct OllamaService {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaService {
    /// Create a service for `model` at `base_url`
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Client` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: http::trim_base_url(base_url),
            model: model.into(),
            timeout,
        })
    }

    /// Like [`OllamaService::new`], but `OLLAMA_HOST` wins over `base_url`
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Client` if the HTTP client cannot be built.
    pub fn from_env_or(
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        match std::env::var(OLLAMA_HOST_ENV) {
            Ok(host) if !host.trim().is_empty() => Self::new(&host, model, timeout),
            _ => Self::new(base_url, model, timeout),
        }
    }

    /// The endpoint in use
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TextService for OllamaService {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "Ollama probe failed");
                false
            }
        }
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: request.full_prompt(),
            system: request.system.as_deref(),
            stream: false,
            format: &request.schema,
            options: GenerateOptions {
                temperature: request.temperature,
            },
        };

        debug!(model = %self.model, prompt_chars = body.prompt.len(), "Sending Ollama request");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::map_transport(&e, self.timeout))?;
        let response = http::check_status(response).await.inspect_err(|e| {
            warn!(model = %self.model, error = %e, "Ollama request rejected");
        })?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::invalid(format!("not an Ollama reply: {e}")))?;
        if parsed.response.trim().is_empty() {
            return Err(ServiceError::invalid("empty reply"));
        }
        Ok(parsed.response)
    }
}
