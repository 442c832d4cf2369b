// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! sleuth-llm: The text-understanding capability used by sleuth
//!
//! Both the output parser and the failure analyzer depend on a single narrow
//! interface, [`TextService::generate_structured`], so providers are
//! interchangeable:
//!
//! - [`OllamaService`] talks to an Ollama server
//! - [`OpenRouterService`] talks to the OpenRouter chat-completions API
//! - [`DisabledService`] is never available
//! - [`ScriptedService`] replays canned replies for tests and offline runs
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use sleuth_llm::{ScriptedService, StructuredRequest, TextService, parse_object};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = ScriptedService::replies(["```json\n{\"confidence\": 0.9}\n```"]);
//! let request = StructuredRequest::new("Parse this", json!({"type": "object"}));
//! let reply = service.generate_structured(&request).await.unwrap();
//! assert_eq!(parse_object(&reply).unwrap()["confidence"], 0.9);
//! # }
//! ```

pub mod error;
mod http;
pub mod json;
pub mod ollama;
pub mod openrouter;
pub mod scripted;
pub mod service;

pub use error::{ProviderError, ServiceError};
pub use http::PROBE_TIMEOUT;
pub use json::{extract_json, parse_object};
pub use ollama::OllamaService;
pub use openrouter::OpenRouterService;
pub use scripted::ScriptedService;
pub use service::{DisabledService, StructuredRequest, TextService};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::ServiceError;
    pub use crate::json::parse_object;
    pub use crate::service::{DisabledService, StructuredRequest, TextService};
}
