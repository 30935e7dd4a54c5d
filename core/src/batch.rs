//! Deferred writes submitted together as one batch envelope.
//!
//! # Design
//! `BatchQueue` only stores and serializes. Sending lives in
//! `SocrataClient::flush`, which clears the queue only after the response
//! classifies as a success, so a rejected flush can be repeated with the
//! same envelope.

use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;

/// One deferred write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperation {
    #[serde(rename = "requestType", with = "method_name")]
    pub method: HttpMethod,
    #[serde(rename = "url")]
    pub path: String,
    /// Serialized request body, carried verbatim.
    pub body: String,
}

impl BatchOperation {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: body.into(),
        }
    }
}

/// Request body of `POST /batches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub requests: Vec<BatchOperation>,
}

/// Insertion-ordered queue of pending writes. No bound, no deduplication.
#[derive(Debug, Clone, Default)]
pub struct BatchQueue {
    operations: Vec<BatchOperation>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: BatchOperation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Envelope for the current contents, in enqueue order.
    pub fn envelope(&self) -> BatchEnvelope {
        BatchEnvelope {
            requests: self.operations.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.operations.clear();
    }
}

/// Result of `SocrataClient::flush`.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued; no request was made.
    Empty,
    /// The service accepted the batch and the queue was cleared.
    Submitted { operations: usize },
    /// The batch failed; the queue is unchanged.
    Rejected { retained: usize },
}

impl FlushOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, FlushOutcome::Submitted { .. })
    }
}

mod method_name {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::http::HttpMethod;

    pub fn serialize<S: Serializer>(method: &HttpMethod, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(method.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HttpMethod, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
