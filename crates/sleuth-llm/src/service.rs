// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! The text-understanding capability

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::ServiceError;

/// Sampling temperature used unless a request overrides it
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Instruction appended to every prompt
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with valid JSON only, no additional text.";

/// A prompt together with the JSON shape the reply must follow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRequest {
    /// Optional system prompt
    pub system: Option<String>,
    /// The user prompt
    pub prompt: String,
    /// JSON Schema of the expected reply
    pub schema: Value,
    /// Sampling temperature
    pub temperature: f32,
}

impl StructuredRequest {
    /// Create a request with the default temperature and no system prompt
    #[must_use]
    pub fn new(prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            schema,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the sampling temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The prompt as sent, with the JSON-only instruction appended
    #[must_use]
    pub fn full_prompt(&self) -> String {
        format!("{}\n\n{JSON_ONLY_INSTRUCTION}", self.prompt)
    }
}

/// Anything that can turn a prompt into structured text
///
/// Implementations must be safe to share across concurrently running
/// analysis tasks.
#[async_trait]
pub trait TextService: Send + Sync + fmt::Debug {
    /// Short provider name for logs and reports
    fn name(&self) -> &str;

    /// Cheap reachability probe
    async fn is_available(&self) -> bool;

    /// Generate a reply that should follow `request.schema`
    ///
    /// The reply is returned as raw text; callers extract and validate the
    /// JSON themselves.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Unavailable` or `ServiceError::Timeout` for
    /// transport failures and `ServiceError::InvalidResponse` when the
    /// provider's reply envelope is unusable.
    async fn generate_structured(&self, request: &StructuredRequest)
    -> Result<String, ServiceError>;
}

/// A service that is never available
///
/// Selected by `--no-llm` or `provider: "none"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledService;

#[async_trait]
impl TextService for DisabledService {
    fn name(&self) -> &str {
        "none"
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn generate_structured(
        &self,
        _request: &StructuredRequest,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::unavailable("text service disabled"))
    }
}
