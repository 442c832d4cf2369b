// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Deterministic in-process text service
//!
//! [`ScriptedService`] replays queued replies (or computes them with a
//! closure) and records every request it receives. It backs the test suites
//! and offline replays of recorded model output.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::service::{StructuredRequest, TextService};

type Responder = Box<dyn Fn(&StructuredRequest) -> Result<String, ServiceError> + Send + Sync>;

/// Text service that answers from a script
pub struct ScriptedService {
    available: bool,
    queue: Mutex<VecDeque<Result<String, ServiceError>>>,
    responder: Option<Responder>,
    requests: Mutex<Vec<StructuredRequest>>,
}

impl fmt::Debug for ScriptedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedService")
            .field("available", &self.available)
            .field("queued", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .field("has_responder", &self.responder.is_some())
            .finish()
    }
}

impl ScriptedService {
    /// Replay `replies` in order; once exhausted every call is `Unavailable`
    #[must_use]
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ServiceError>>,
    {
        Self {
            available: true,
            queue: Mutex::new(replies.into_iter().collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replay successful replies in order
    #[must_use]
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Answer every request with `responder`
    #[must_use]
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&StructuredRequest) -> Result<String, ServiceError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new([])
        }
    }

    /// A service whose probe reports it unreachable
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new([])
        }
    }

    /// Every request received so far
    #[must_use]
    pub fn requests(&self) -> Vec<StructuredRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests received so far
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl TextService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn generate_structured(
        &self,
        request: &StructuredRequest,
    ) -> Result<String, ServiceError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if !self.available {
            return Err(ServiceError::unavailable("scripted service offline"));
        }
        let queued = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match (queued, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(request),
            (None, None) => Err(ServiceError::unavailable("script exhausted")),
        }
    }
}
