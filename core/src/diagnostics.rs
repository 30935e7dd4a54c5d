//! Structured log events emitted by the client core.
//!
//! # Design
//! Components never call a global logger. They describe what happened as a
//! `ClientEvent` and hand it to the `Diagnostics` collaborator owned by the
//! client. `TracingDiagnostics` forwards to `tracing` with structured fields;
//! `MemoryDiagnostics` keeps events for inspection in tests.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::http::HttpMethod;

/// Severity of a `ClientEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Everything the core reports about a request, a payload or the batch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    RequestSent {
        method: HttpMethod,
        url: String,
        attempt: u32,
    },
    TransportFailed {
        url: String,
        error: String,
    },
    /// Any status other than 200.
    StatusRejected {
        url: String,
        status: u16,
        reason: String,
    },
    RetryScheduled {
        url: String,
        attempt: u32,
        delay: Duration,
    },
    /// The body stream failed part way; `bytes_read` bytes were kept.
    BodyReadFailed {
        bytes_read: usize,
        error: String,
    },
    /// The normalizer stored a non-empty body as text.
    NonJsonBody {
        length: usize,
    },
    /// A body opened like JSON but did not parse. Swallowed.
    MalformedJson {
        opening: char,
        error: String,
    },
    /// The classifier rejected a text payload.
    NonJsonResponse {
        text: String,
    },
    /// The classifier found an `error` field in an object payload.
    ServiceError {
        message: String,
    },
    EmptyBatch,
    /// The batch envelope could not be serialized; nothing was sent.
    EnvelopeUnencodable {
        error: String,
    },
    BatchSubmitted {
        operations: usize,
        envelope: String,
    },
    BatchCleared {
        operations: usize,
    },
    BatchRejected {
        retained: usize,
    },
}

impl ClientEvent {
    pub fn level(&self) -> Level {
        match self {
            ClientEvent::RequestSent { .. } => Level::Debug,
            ClientEvent::BatchSubmitted { .. } | ClientEvent::BatchCleared { .. } => Level::Info,
            ClientEvent::RetryScheduled { .. }
            | ClientEvent::BodyReadFailed { .. }
            | ClientEvent::NonJsonBody { .. }
            | ClientEvent::NonJsonResponse { .. }
            | ClientEvent::EmptyBatch
            | ClientEvent::BatchRejected { .. } => Level::Warn,
            ClientEvent::TransportFailed { .. }
            | ClientEvent::StatusRejected { .. }
            | ClientEvent::MalformedJson { .. }
            | ClientEvent::ServiceError { .. }
            | ClientEvent::EnvelopeUnencodable { .. } => Level::Error,
        }
    }
}

/// Sink for `ClientEvent`s.
pub trait Diagnostics: Send + Sync {
    fn record(&self, event: &ClientEvent);
}

/// Forwards events to the `tracing` subscriber installed by the application.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&self, event: &ClientEvent) {
        match event {
            ClientEvent::RequestSent { method, url, attempt } => {
                tracing::debug!(%method, %url, attempt, "sending HTTP request");
            }
            ClientEvent::TransportFailed { url, error } => {
                tracing::error!(%url, %error, "error caught trying to perform HTTP request");
            }
            ClientEvent::StatusRejected { url, status, reason } => {
                tracing::error!(%url, status, %reason, "request returned non-200 status");
            }
            ClientEvent::RetryScheduled { url, attempt, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(%url, attempt, delay_ms, "retrying HTTP request");
            }
            ClientEvent::BodyReadFailed { bytes_read, error } => {
                tracing::warn!(bytes_read, %error, "failed to read response body to the end");
            }
            ClientEvent::NonJsonBody { length } => {
                tracing::warn!(length, "response body is neither a JSON object nor an array");
            }
            ClientEvent::MalformedJson { opening, error } => {
                tracing::error!(
                    %opening,
                    %error,
                    "response body looked like JSON but did not parse"
                );
            }
            ClientEvent::NonJsonResponse { text } => {
                tracing::warn!(%text, "non-JSON response");
            }
            ClientEvent::ServiceError { message } => {
                tracing::error!(%message, "error in server response");
            }
            ClientEvent::EmptyBatch => {
                tracing::warn!("no batch requests in queue, ignoring flush");
            }
            ClientEvent::EnvelopeUnencodable { error } => {
                tracing::error!(%error, "could not convert batch requests to JSON");
            }
            ClientEvent::BatchSubmitted { operations, envelope } => {
                tracing::info!(operations, %envelope, "submitting batch request");
            }
            ClientEvent::BatchCleared { operations } => {
                tracing::info!(operations, "completed batch request, cleared queue");
            }
            ClientEvent::BatchRejected { retained } => {
                tracing::warn!(retained, "batch request failed, queue retained");
            }
        }
    }
}

/// Keeps every recorded event in memory.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<ClientEvent>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far, oldest first.
    pub fn events(&self) -> Vec<ClientEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events at `level` or above.
    pub fn at_least(&self, level: Level) -> Vec<ClientEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level() >= level)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn record(&self, event: &ClientEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
