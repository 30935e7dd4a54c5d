//! Normalizes raw response bodies into a single inspectable `Payload`.
//!
//! # Design
//! The service answers with JSON objects, JSON arrays or bare text (error
//! pages, notices). The normalizer looks at the first non-whitespace
//! character and commits to one shape:
//!
//! | opening      | parses          | result        |
//! |--------------|-----------------|---------------|
//! | `[`          | yes             | `Array`       |
//! | `[`          | no              | `Unparseable` |
//! | `{`          | yes             | `Object`      |
//! | `{`          | no              | `Unparseable` |
//! | other, empty | n/a             | `Text`        |
//!
//! There is no fall-through between rows: a body opening with `[` is never
//! retried as an object or kept as text. Only the leading JSON value is read;
//! anything after it (an HTML comment from a proxy, a second value) is
//! ignored. Normalization never fails.

use std::fmt;
use std::io::Read;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Deserializer, Map, Value};

use crate::diagnostics::{ClientEvent, Diagnostics};

/// The normalized result of one response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Object(Map<String, Value>),
    Array(Vec<Value>),
    /// Anything not opening with `[` or `{`, kept verbatim. Includes the
    /// empty body.
    Text(String),
    /// Opened like JSON but did not parse. No facet is exposed.
    Unparseable(String),
}

/// Tag of a `Payload` without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Object,
    Array,
    Text,
    Unparseable,
}

impl Payload {
    /// Normalize a complete body without reporting anything.
    pub fn parse(body: &str) -> Payload {
        decode(body).0
    }

    /// Normalize a complete body, reporting non-JSON and malformed bodies.
    pub fn normalize(body: &str, diagnostics: &dyn Diagnostics) -> Payload {
        let (payload, parse_error) = decode(body);
        match (&payload, parse_error) {
            (Payload::Unparseable(raw), Some(err)) => {
                diagnostics.record(&ClientEvent::MalformedJson {
                    opening: raw.trim_start().chars().next().unwrap_or_default(),
                    error: err.to_string(),
                });
            }
            (Payload::Text(text), _) if !text.is_empty() => {
                diagnostics.record(&ClientEvent::NonJsonBody { length: text.len() });
            }
            _ => {}
        }
        payload
    }

    /// Drain `reader` completely, release it, then normalize what was read.
    ///
    /// A read error keeps the bytes received so far. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn from_reader<R: Read>(mut reader: R, diagnostics: &dyn Diagnostics) -> Payload {
        let mut buf = Vec::new();
        if let Err(err) = reader.read_to_end(&mut buf) {
            diagnostics.record(&ClientEvent::BodyReadFailed {
                bytes_read: buf.len(),
                error: err.to_string(),
            });
        }
        drop(reader);

        let body = String::from_utf8_lossy(&buf);
        Payload::normalize(&body, diagnostics)
    }

    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Object(_) => PayloadKind::Object,
            Payload::Array(_) => PayloadKind::Array,
            Payload::Text(_) => PayloadKind::Text,
            Payload::Unparseable(_) => PayloadKind::Unparseable,
        }
    }

    pub fn object(&self) -> Option<&Map<String, Value>> {
        match self {
            Payload::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn array(&self) -> Option<&[Value]> {
        match self {
            Payload::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// True when no facet is populated (`Unparseable`, or empty text).
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Object(_) | Payload::Array(_) => false,
            Payload::Text(text) => text.is_empty(),
            Payload::Unparseable(_) => true,
        }
    }

    /// Deserialize the JSON facet into a typed value.
    ///
    /// Returns `None` for text and unparseable payloads, or when the JSON
    /// does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Option<T> {
        let value = match self {
            Payload::Object(map) => Value::Object(map.clone()),
            Payload::Array(items) => Value::Array(items.clone()),
            Payload::Text(_) | Payload::Unparseable(_) => return None,
        };
        serde_json::from_value(value).ok()
    }
}

fn decode(body: &str) -> (Payload, Option<serde_json::Error>) {
    match body.trim_start().chars().next() {
        Some('[') => match leading_value::<Vec<Value>>(body) {
            Ok(items) => (Payload::Array(items), None),
            Err(err) => (Payload::Unparseable(body.to_string()), Some(err)),
        },
        Some('{') => match leading_value::<Map<String, Value>>(body) {
            Ok(map) => (Payload::Object(map), None),
            Err(err) => (Payload::Unparseable(body.to_string()), Some(err)),
        },
        _ => (Payload::Text(body.to_string()), None),
    }
}

/// Parse the first JSON value in `body` without requiring end of input.
fn leading_value<T: DeserializeOwned>(body: &str) -> serde_json::Result<T> {
    let mut de = Deserializer::from_str(body);
    T::deserialize(&mut de)
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) if text.is_empty() => Ok(()),
            Payload::Text(text) => write!(f, "String Response: \"{text}\""),
            Payload::Array(items) => {
                let rendered = serde_json::to_string_pretty(items).map_err(|_| fmt::Error)?;
                write!(f, "Array: {rendered}")
            }
            Payload::Object(map) => {
                let rendered = serde_json::to_string_pretty(map).map_err(|_| fmt::Error)?;
                write!(f, "Object: {rendered}")
            }
            Payload::Unparseable(raw) => write!(f, "Unparseable: \"{raw}\""),
        }
    }
}
