//! Synchronous client core for a Socrata-style tabular data service.
//!
//! # Overview
//! Sends authenticated HTTP requests, normalizes whatever comes back (JSON
//! object, JSON array or bare text) into a `Payload`, decides whether that
//! payload is a service-reported error, and accumulates writes into a single
//! batch request.
//!
//! # Design
//! - `SocrataClient` is the per-client context: config, credentials,
//!   transport, diagnostics and the batch queue.
//! - I/O happens only behind the `Transport` trait; `UreqTransport` is the
//!   blocking implementation.
//! - Failures on the request path become sentinels (`None`, `false`,
//!   `FlushOutcome::Rejected`) after being reported to the injected
//!   `Diagnostics` sink. `try_execute` keeps the underlying `RequestError`.
//! - Entity helpers (datasets, users, ...) live outside this crate and call
//!   `build_request` / `execute` / `is_erroneous` / `enqueue`.

pub mod batch;
pub mod classify;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod http;
pub mod payload;
pub mod transport;

pub use batch::{BatchEnvelope, BatchOperation, BatchQueue, FlushOutcome};
pub use classify::{classify, Verdict};
pub use client::{SocrataClient, APP_TOKEN_HEADER, BATCH_PATH};
pub use config::{ClientConfig, Scheme};
pub use diagnostics::{ClientEvent, Diagnostics, Level, MemoryDiagnostics, TracingDiagnostics};
pub use error::{ConfigError, MethodParseError, RequestError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use payload::{Payload, PayloadKind};
pub use transport::{Transport, UreqTransport};
