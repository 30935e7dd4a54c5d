//! Decides whether a payload is a logical service error.
//!
//! A 200 response is not enough: the service reports failures inside the
//! body. Rules are applied in order and the first match wins:
//!
//! 1. no payload (transport or status failure) is an error;
//! 2. non-empty text is an error, a success is never bare text;
//! 3. an object is an error iff it has an `error` field, whatever its value;
//! 4. an array is never an error;
//! 5. anything else (empty text, unparseable JSON) is not an error.
//!
//! Rule 5 lets malformed JSON through; the tests below pin that behavior.

use serde_json::Value;

use crate::payload::Payload;

/// Outcome of classifying a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Absent,
    NonJson(String),
    ServiceError(String),
    Success,
}

impl Verdict {
    pub fn is_erroneous(&self) -> bool {
        !matches!(self, Verdict::Success)
    }
}

pub fn classify(payload: Option<&Payload>) -> Verdict {
    let Some(payload) = payload else {
        return Verdict::Absent;
    };
    match payload {
        Payload::Text(text) if !text.is_empty() => Verdict::NonJson(text.clone()),
        Payload::Object(map) => match map.get("error") {
            Some(value) => Verdict::ServiceError(error_message(map.get("message"), value)),
            None => Verdict::Success,
        },
        Payload::Array(_) => Verdict::Success,
        Payload::Text(_) | Payload::Unparseable(_) => Verdict::Success,
    }
}

/// Human-readable message for an `error` field. The service sometimes sends
/// `"error": true` next to a `message` field.
fn error_message(message: Option<&Value>, error: &Value) -> String {
    match (error, message) {
        (Value::String(text), _) => text.clone(),
        (_, Some(Value::String(text))) => text.clone(),
        (other, _) => other.to_string(),
    }
}
