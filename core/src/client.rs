//! Authenticated client context, request executor and batch flushing.
//!
//! # Design
//! `SocrataClient` owns everything a logical client shares across requests:
//! the resolved config, a precomputed Basic credential, the transport (and
//! with it the connection pool), the diagnostics sink and the batch queue.
//! Entity-specific helpers take a `&SocrataClient` (or `&mut` to enqueue)
//! instead of inheriting its fields.
//!
//! Requests go through three steps: `build_request` attaches the app token and
//! credentials, `try_execute` runs the round-trip and normalizes a 200 body,
//! and `is_erroneous` classifies the payload. Failures are logged and turned
//! into sentinels on the public path (`execute` returns `None`).
//!
//! Every mutating operation takes `&mut self`, so one client serves one caller
//! at a time. Share it behind a `Mutex` or keep one client per thread.

use std::sync::Arc;
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::batch::{BatchOperation, BatchQueue, FlushOutcome};
use crate::classify::{classify, Verdict};
use crate::config::ClientConfig;
use crate::diagnostics::{ClientEvent, Diagnostics, TracingDiagnostics};
use crate::error::{ConfigError, RequestError};
use crate::http::{HttpMethod, HttpRequest};
use crate::payload::Payload;
use crate::transport::{Transport, UreqTransport};

/// Header carrying the application token on every request.
pub const APP_TOKEN_HEADER: &str = "X-App-Token";

/// Path, relative to the base URL, that accepts batch envelopes.
pub const BATCH_PATH: &str = "/batches";

/// Authenticated handle on one service host.
///
/// Builds requests, executes them over `T` and accumulates batch writes until
/// `flush`.
pub struct SocrataClient<T: Transport = UreqTransport> {
    config: ClientConfig,
    authorization: String,
    transport: T,
    diagnostics: Arc<dyn Diagnostics>,
    batch: BatchQueue,
}

impl SocrataClient<UreqTransport> {
    /// Client over a blocking `ureq` transport using the config's timeout.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> SocrataClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let credentials = format!("{}:{}", config.username, config.password);
        let authorization = format!("Basic {}", STANDARD.encode(credentials));
        Ok(Self {
            config,
            authorization,
            transport,
            diagnostics: Arc::new(TracingDiagnostics),
            batch: BatchQueue::new(),
        })
    }

    /// Replace the default `tracing` sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    /// Operations waiting for the next `flush`, in enqueue order.
    pub fn pending(&self) -> &[BatchOperation] {
        self.batch.operations()
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = vec![
            (APP_TOKEN_HEADER.to_string(), self.config.app_token.clone()),
            ("Authorization".to_string(), self.authorization.clone()),
            ("Accept".to_string(), "application/json".to_string()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        HttpRequest {
            method,
            url: self.url(path),
            headers,
            body,
        }
    }

    /// Run `request`, retrying per config, and normalize a 200 body.
    pub fn try_execute(&self, request: &HttpRequest) -> Result<Payload, RequestError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match self.attempt(request, attempt) {
                Ok(payload) => return Ok(payload),
                Err(err) => err,
            };
            if attempt >= attempts || !error.is_retryable() {
                return Err(error);
            }
            let delay = self.config.backoff_delay(attempt);
            self.diagnostics.record(&ClientEvent::RetryScheduled {
                url: request.url.clone(),
                attempt: attempt + 1,
                delay,
            });
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            attempt += 1;
        }
    }

    /// Run `request`; `None` on transport failure or any status but 200.
    pub fn execute(&self, request: &HttpRequest) -> Option<Payload> {
        self.try_execute(request).ok()
    }

    pub fn get(&self, path: &str) -> Option<Payload> {
        self.execute(&self.build_request(HttpMethod::Get, path, None))
    }

    pub fn post(&self, path: &str, body: impl Into<String>) -> Option<Payload> {
        self.execute(&self.build_request(HttpMethod::Post, path, Some(body.into())))
    }

    /// Classify `payload` and log why it is erroneous, if it is.
    pub fn is_erroneous(&self, payload: Option<&Payload>) -> bool {
        let verdict = classify(payload);
        match &verdict {
            Verdict::NonJson(text) => self
                .diagnostics
                .record(&ClientEvent::NonJsonResponse { text: text.clone() }),
            Verdict::ServiceError(message) => self.diagnostics.record(&ClientEvent::ServiceError {
                message: message.clone(),
            }),
            Verdict::Absent | Verdict::Success => {}
        }
        verdict.is_erroneous()
    }

    /// Queue a write for the next `flush`. `path` is relative to the base URL.
    pub fn enqueue(
        &mut self,
        method: HttpMethod,
        path: impl Into<String>,
        body: impl Into<String>,
    ) {
        self.batch.push(BatchOperation::new(method, path, body));
    }

    /// Submit every queued operation as one `POST /batches`.
    ///
    /// The queue is cleared only when the response classifies as a success;
    /// otherwise it is left as it was and `flush` can be called again.
    pub fn flush(&mut self) -> FlushOutcome {
        if self.batch.is_empty() {
            self.diagnostics.record(&ClientEvent::EmptyBatch);
            return FlushOutcome::Empty;
        }

        let retained = self.batch.len();
        let envelope = match serde_json::to_string(&self.batch.envelope()) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.diagnostics.record(&ClientEvent::EnvelopeUnencodable {
                    error: err.to_string(),
                });
                return FlushOutcome::Rejected { retained };
            }
        };
        self.diagnostics.record(&ClientEvent::BatchSubmitted {
            operations: retained,
            envelope: envelope.clone(),
        });

        let request = self.build_request(HttpMethod::Post, BATCH_PATH, Some(envelope));
        let response = self.execute(&request);
        if self.is_erroneous(response.as_ref()) {
            self.diagnostics.record(&ClientEvent::BatchRejected { retained });
            return FlushOutcome::Rejected { retained };
        }

        self.batch.clear();
        self.diagnostics
            .record(&ClientEvent::BatchCleared { operations: retained });
        FlushOutcome::Submitted {
            operations: retained,
        }
    }

    fn attempt(&self, request: &HttpRequest, attempt: u32) -> Result<Payload, RequestError> {
        self.diagnostics.record(&ClientEvent::RequestSent {
            method: request.method,
            url: request.url.clone(),
            attempt,
        });

        let response = match self.transport.send(request) {
            Ok(response) => response,
            Err(source) => {
                self.diagnostics.record(&ClientEvent::TransportFailed {
                    url: request.url.clone(),
                    error: source.to_string(),
                });
                return Err(RequestError::Transport {
                    uri: request.url.clone(),
                    source,
                });
            }
        };

        if response.status != 200 {
            self.diagnostics.record(&ClientEvent::StatusRejected {
                url: request.url.clone(),
                status: response.status,
                reason: response.reason.clone(),
            });
            return Err(RequestError::Status {
                status: response.status,
                reason: response.reason,
                uri: request.url.clone(),
            });
        }

        Ok(Payload::from_reader(response.body, self.diagnostics.as_ref()))
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.base_url();
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}
