//! Decoded response bodies.
//!
//! # Design
//! The controller usually answers with JSON but is not guaranteed to. A body
//! is therefore either `Structured` (parsed JSON) or `Raw` (text to show
//! literally), and code that wants a mapping has to go through
//! [`ResponseBody::as_structured`] rather than indexing into text by accident.

use serde_json::{Map, Value};
use tracing::warn;

use crate::http::{HttpResponse, APPLICATION_JSON};

/// Reserved key under which unstructured text appears in a mapping view.
pub const RAW_KEY: &str = "_raw";

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Structured(Value),
    Raw(String),
}

impl ResponseBody {
    /// Decode a successful response according to its `Content-Type`.
    ///
    /// A JSON content type with an empty body yields an empty mapping; JSON
    /// that fails to parse and every other content type fall back to `Raw`.
    pub fn decode(response: &HttpResponse) -> Self {
        if !response.content_type().contains(APPLICATION_JSON) {
            return ResponseBody::Raw(response.text());
        }
        if response.body.is_empty() {
            return ResponseBody::Structured(Value::Object(Map::new()));
        }
        match serde_json::from_slice(&response.body) {
            Ok(value) => ResponseBody::Structured(value),
            Err(e) => {
                warn!(error = %e, "declared JSON body did not parse, keeping raw text");
                ResponseBody::Raw(response.text())
            }
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            ResponseBody::Structured(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            ResponseBody::Raw(text) => Some(text),
            ResponseBody::Structured(_) => None,
        }
    }

    /// Top-level field of a structured object body.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_structured()?.get(key)
    }

    /// True for an empty mapping, empty JSON container, `null` or empty text.
    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Structured(Value::Object(map)) => map.is_empty(),
            ResponseBody::Structured(Value::Array(items)) => items.is_empty(),
            ResponseBody::Structured(Value::Null) => true,
            ResponseBody::Structured(_) => false,
            ResponseBody::Raw(text) => text.is_empty(),
        }
    }

    /// Mapping view: structured bodies as-is, raw text as `{"_raw": text}`.
    pub fn to_json(&self) -> Value {
        match self {
            ResponseBody::Structured(value) => value.clone(),
            ResponseBody::Raw(text) => {
                let mut map = Map::new();
                map.insert(RAW_KEY.to_string(), Value::String(text.clone()));
                Value::Object(map)
            }
        }
    }
}
