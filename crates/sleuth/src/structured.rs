// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Validated structured requests with a single corrective retry

use serde_json::{Map, Value};
use sleuth_llm::{ServiceError, StructuredRequest, TextService, parse_object};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StrategyError;
use crate::prompts::corrective_prompt;

/// Retries allowed after a malformed reply
pub const MAX_CORRECTIVE_RETRIES: usize = 1;

/// Send `request`, validate the reply, and retry once if it is malformed
///
/// Transport errors are returned immediately without a retry. An
/// `InvalidResponse` from the service counts as a malformed reply. A reply
/// that is malformed twice yields `StrategyError::Malformed` carrying the
/// last problem found.
///
/// # Errors
///
/// Returns `StrategyError::Service` for transport failures,
/// `StrategyError::Malformed` when no valid reply arrived, and
/// `StrategyError::Cancelled` if `cancel` fires while waiting.
pub async fn request_validated<T, F>(
    service: &dyn TextService,
    request: StructuredRequest,
    cancel: &CancellationToken,
    validate: F,
) -> Result<T, StrategyError>
where
    F: Fn(&Map<String, Value>) -> Result<T, String>,
{
    let original = request.prompt.clone();
    let mut request = request;
    let mut problem = String::new();

    for attempt in 0..=MAX_CORRECTIVE_RETRIES {
        if attempt > 0 {
            request.prompt = corrective_prompt(&original, &problem);
        }

        let reply = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(StrategyError::Cancelled),
            reply = service.generate_structured(&request) => reply,
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err(ServiceError::InvalidResponse { reason }) => {
                warn!(service = service.name(), attempt, reason = %reason, "invalid structured reply");
                problem = reason;
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        match parse_object(&reply).map_err(|e| e.to_string()).and_then(|obj| validate(&obj)) {
            Ok(value) => {
                debug!(service = service.name(), attempt, "structured reply accepted");
                return Ok(value);
            }
            Err(reason) => {
                warn!(service = service.name(), attempt, reason = %reason, "malformed structured reply");
                problem = reason;
            }
        }
    }

    Err(StrategyError::Malformed { reason: problem })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use similar_asserts::assert_eq;
    use sleuth_llm::ScriptedService;

    fn require_answer(obj: &Map<String, Value>) -> Result<i64, String> {
        obj.get("answer")
            .and_then(Value::as_i64)
            .ok_or_else(|| "missing integer field answer".to_string())
    }

    fn request() -> StructuredRequest {
        StructuredRequest::new("what is six times seven", json!({"type": "object"}))
    }

    #[tokio::test]
    async fn test_first_reply_accepted() {
        let service = ScriptedService::replies(["```json\n{\"answer\": 42}\n```"]);
        let value = request_validated(&service, request(), &CancellationToken::new(), require_answer)
            .await
            .expect("valid reply");
        assert_eq!(value, 42);
        assert_eq!(service.request_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_once_with_correction() {
        let service = ScriptedService::replies(["{\"answer\": \"forty-two\"}", "{\"answer\": 42}"]);
        let value = request_validated(&service, request(), &CancellationToken::new(), require_answer)
            .await
            .expect("second reply valid");
        assert_eq!(value, 42);
        let requests = service.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("missing integer field answer"));
        assert!(requests[1].prompt.starts_with("what is six times seven"));
    }

    #[tokio::test]
    async fn test_two_malformed_replies_give_up() {
        let service = ScriptedService::replies(["not json", "still not json", "{\"answer\": 42}"]);
        let err = request_validated(&service, request(), &CancellationToken::new(), require_answer)
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Malformed { .. }));
        assert_eq!(service.request_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_not_retried() {
        let service = ScriptedService::new([
            Err(ServiceError::Timeout { timeout_ms: 10 }),
            Ok("{\"answer\": 42}".to_string()),
        ]);
        let err = request_validated(&service, request(), &CancellationToken::new(), require_answer)
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Service(ServiceError::Timeout { .. })));
        assert_eq!(service.request_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_response_gets_corrective_retry() {
        let service = ScriptedService::new([
            Err(ServiceError::invalid("envelope missing response")),
            Ok("{\"answer\": 42}".to_string()),
        ]);
        let value = request_validated(&service, request(), &CancellationToken::new(), require_answer)
            .await
            .expect("second reply valid");
        assert_eq!(value, 42);
        let requests = service.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].prompt.contains("envelope missing response"));
    }

    #[tokio::test]
    async fn test_invalid_response_twice_is_malformed() {
        let service = ScriptedService::new([
            Err(ServiceError::invalid("empty body")),
            Err(ServiceError::invalid("empty body again")),
        ]);
        let err = request_validated(&service, request(), &CancellationToken::new(), require_answer)
            .await
            .unwrap_err();
        match err {
            StrategyError::Malformed { reason } => assert_eq!(reason, "empty body again"),
            other => panic!("expected Malformed, got {other:?}"),
        }
        assert_eq!(service.request_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_reply() {
        let service = ScriptedService::replies(["{\"answer\": 42}"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = request_validated(&service, request(), &cancel, require_answer)
            .await
            .unwrap_err();
        assert!(matches!(err, StrategyError::Cancelled));
    }
}
