//! Operator-facing renderings of errors and successful exchanges.
//!
//! These strings are the only diagnostics an operator sees, so the branch
//! structure is fixed: `HttpStatus` has a debug form (everything, verbatim)
//! and a concise form (`message`/`details` from a JSON body when available),
//! `Network` gets a one-line prefix, and any other error falls through to a
//! generic line.

use std::error::Error;

use serde_json::{Map, Value};

use crate::body::ResponseBody;
use crate::client::ResponseMetadata;
use crate::error::ApiError;

/// Render any error. `ApiError`s get the dedicated formats.
pub fn format_error(err: &(dyn Error + 'static), debug: bool) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(api) => format_api_error(api, debug),
        None => format!("Error: {err}"),
    }
}

pub fn format_api_error(err: &ApiError, debug: bool) -> String {
    match err {
        ApiError::HttpStatus {
            code,
            url,
            headers,
            body,
        } => {
            if debug {
                format!("HTTP {code} {url}\n{}\n\n{body}", header_lines(headers))
            } else {
                concise_status(*code, body)
            }
        }
        ApiError::Network { reason } => format!("Network error: {reason}"),
    }
}

/// `HTTP 404 - not found - no such program` when the body is a JSON object,
/// `HTTP 404 - <body>` otherwise.
fn concise_status(code: u16, body: &str) -> String {
    let parsed = if body.is_empty() {
        Ok(Value::Object(Map::new()))
    } else {
        serde_json::from_str::<Value>(body)
    };
    match parsed {
        Ok(Value::Object(fields)) => {
            let mut parts = vec![format!("HTTP {code}")];
            for key in ["message", "details"] {
                if let Some(value) = fields.get(key).filter(|v| is_truthy(v)) {
                    parts.push(display_value(value));
                }
            }
            parts.join(" - ")
        }
        _ => format!("HTTP {code} - {body}"),
    }
}

/// Debug rendering of a successful exchange from its metadata snapshot.
pub fn format_success(metadata: &ResponseMetadata, body: &ResponseBody) -> String {
    let mut out = format!(
        "HTTP {} {} {}",
        metadata.status, metadata.method, metadata.url
    );
    if let Some(request_body) = metadata.request_body.as_ref().filter(|v| is_truthy(v)) {
        out.push_str("\nRequest Body:\n");
        out.push_str(&pretty(request_body));
    }
    out.push_str("\nResponse Headers:\n");
    out.push_str(&header_lines(&metadata.headers));
    if !body.is_empty() {
        out.push_str("\nResponse Body:\n");
        match body {
            ResponseBody::Structured(value) => out.push_str(&pretty(value)),
            ResponseBody::Raw(text) => out.push_str(text),
        }
    }
    out
}

fn header_lines(headers: &[(String, String)]) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::http::HttpMethod;

    fn status(code: u16, body: &str) -> ApiError {
        ApiError::HttpStatus {
            code,
            url: "http://robot/universal-robots/robot-api/program/v1/load".to_string(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("server".to_string(), "robot".to_string()),
            ],
            body: body.to_string(),
        }
    }

    #[test]
    fn concise_status_uses_message_and_details() {
        let err = status(404, r#"{"message":"not found","details":"no such program"}"#);
        assert_eq!(
            format_api_error(&err, false),
            "HTTP 404 - not found - no such program"
        );
    }

    #[test]
    fn concise_status_skips_empty_fields() {
        let err = status(409, r#"{"message":"conflict","details":""}"#);
        assert_eq!(format_api_error(&err, false), "HTTP 409 - conflict");
        assert_eq!(format_api_error(&status(500, "{}"), false), "HTTP 500");
        assert_eq!(format_api_error(&status(500, ""), false), "HTTP 500");
    }

    #[test]
    fn concise_status_falls_back_to_raw_body() {
        assert_eq!(
            format_api_error(&status(502, "Bad Gateway"), false),
            "HTTP 502 - Bad Gateway"
        );
        assert_eq!(
            format_api_error(&status(400, r#"["a"]"#), false),
            r#"HTTP 400 - ["a"]"#
        );
    }

    #[test]
    fn debug_status_is_verbatim() {
        let err = status(404, r#"{"message":"not found"}"#);
        assert_eq!(
            format_api_error(&err, true),
            "HTTP 404 http://robot/universal-robots/robot-api/program/v1/load\n\
             content-type: application/json\nserver: robot\n\n\
             {\"message\":\"not found\"}"
        );
    }

    #[test]
    fn network_error_line() {
        let err = ApiError::Network {
            reason: "connection refused".to_string(),
        };
        assert_eq!(format_api_error(&err, false), "Network error: connection refused");
        assert_eq!(format_api_error(&err, true), "Network error: connection refused");
    }

    #[test]
    fn foreign_errors_use_generic_line() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "worker panicked");
        assert_eq!(format_error(&err, false), "Error: worker panicked");
    }

    #[test]
    fn api_errors_are_found_through_anyhow() {
        let err = anyhow::Error::from(ApiError::Network {
            reason: "timed out".to_string(),
        });
        assert_eq!(format_error(err.as_ref(), false), "Network error: timed out");
    }

    #[test]
    fn success_rendering_includes_request_and_response() {
        let meta = ResponseMetadata {
            method: HttpMethod::Put,
            url: "http://robot/x".to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            request_body: Some(json!({ "programName": "demo" })),
        };
        let body = ResponseBody::Structured(json!({ "ok": true }));
        assert_eq!(
            format_success(&meta, &body),
            "HTTP 200 PUT http://robot/x\
             \nRequest Body:\n{\n  \"programName\": \"demo\"\n}\
             \nResponse Headers:\ncontent-type: application/json\
             \nResponse Body:\n{\n  \"ok\": true\n}"
        );
    }

    #[test]
    fn success_rendering_skips_empty_parts() {
        let meta = ResponseMetadata {
            method: HttpMethod::Get,
            url: "http://robot/y".to_string(),
            status: 204,
            headers: Vec::new(),
            request_body: None,
        };
        let body = ResponseBody::Raw(String::new());
        assert_eq!(
            format_success(&meta, &body),
            "HTTP 204 GET http://robot/y\nResponse Headers:\n"
        );
    }
}
