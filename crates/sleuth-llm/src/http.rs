// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Shared HTTP plumbing for the providers

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};

use crate::error::{ProviderError, ServiceError};

/// Timeout of the availability probe
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a client whose requests time out after `timeout`
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Map a transport failure onto the capability's error set
pub(crate) fn map_transport(error: &reqwest::Error, timeout: Duration) -> ServiceError {
    if error.is_timeout() {
        ServiceError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if error.is_decode() {
        ServiceError::invalid(format!("undecodable body: {error}"))
    } else {
        ServiceError::unavailable(error.to_string())
    }
}

/// Reject non-success statuses; every one of them makes the service unusable
pub(crate) async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(200).collect();
    Err(ServiceError::unavailable(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("HTTP {status}: credentials rejected")
        }
        StatusCode::TOO_MANY_REQUESTS => format!("HTTP {status}: rate limited"),
        _ if detail.is_empty() => format!("HTTP {status}"),
        _ => format!("HTTP {status}: {detail}"),
    }))
}

/// Strip trailing slashes from a base URL
pub(crate) fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
