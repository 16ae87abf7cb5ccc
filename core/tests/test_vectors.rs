//! Check operations and error formatting against the JSON vectors in
//! `test-vectors/`.
//!
//! Each operation case names the request the client must send and a canned
//! response to decode. Bodies are compared as parsed JSON so key order in the
//! vector files does not matter.

use std::sync::Arc;

use parking_lot::Mutex;
use robot_api_core::{
    format_api_error, ApiError, ClientConfig, HttpMethod, HttpRequest, HttpResponse, ResponseBody,
    RobotApiClient, Transport, TransportError,
};
use serde_json::Value;

/// Answers every request with one canned response and keeps what it saw.
struct Recorder {
    response: HttpResponse,
    seen: Mutex<Vec<HttpRequest>>,
}

impl Transport for Recorder {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().push(request.clone());
        Ok(self.response.clone())
    }
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "PUT" => HttpMethod::Put,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated(sim: &Value) -> HttpResponse {
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: vec![(
            "Content-Type".to_string(),
            sim["content_type"].as_str().unwrap().to_string(),
        )],
        body: sim["body"].as_str().unwrap().as_bytes().to_vec(),
    }
}

fn invoke(
    client: &RobotApiClient<Arc<Recorder>>,
    operation: &str,
    argument: &str,
) -> Result<ResponseBody, ApiError> {
    match operation {
        "get_program_state" => client.get_program_state(),
        "set_program_action" => client.set_program_action(argument),
        "load_program" => client.load_program(argument),
        "set_robot_state" => client.set_robot_state(argument),
        "get_safety_mode" => client.get_safety_mode(),
        "get_robot_mode" => client.get_robot_mode(),
        "get_control_mode" => client.get_control_mode(),
        "get_operational_mode" => client.get_operational_mode(),
        "list_programs" => client.list_programs(),
        "get_program" => client.get_program(argument),
        other => panic!("unknown operation: {other}"),
    }
}

#[test]
fn operation_vectors() {
    let raw = include_str!("../../test-vectors/operations.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let host = vectors["host"].as_str().unwrap();
    let base_url = vectors["base_url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let recorder = Arc::new(Recorder {
            response: simulated(&case["simulated_response"]),
            seen: Mutex::new(Vec::new()),
        });
        let client = RobotApiClient::with_transport(Arc::clone(&recorder), ClientConfig::default());
        client.set_host(host);
        assert_eq!(client.base_url(), base_url, "{name}: base url");

        let operation = case["operation"].as_str().unwrap();
        let argument = case["argument"].as_str().unwrap_or_default();
        let body = invoke(&client, operation, argument).unwrap();
        assert_eq!(body.to_json(), case["expected_result"], "{name}: decoded body");

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1, "{name}: one request");
        let req = &seen[0];
        let expected = &case["expected_request"];
        assert_eq!(
            req.method,
            parse_method(expected["method"].as_str().unwrap()),
            "{name}: method"
        );
        assert_eq!(
            req.url,
            format!("{base_url}{}", expected["path"].as_str().unwrap()),
            "{name}: url"
        );
        assert_eq!(req.header("Accept"), Some("application/json"), "{name}: accept");

        match &expected["body"] {
            Value::Null => {
                assert!(req.body.is_none(), "{name}: no body");
                assert!(req.header("Content-Type").is_none(), "{name}: no content type");
            }
            expected_body => {
                let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(&sent, expected_body, "{name}: body");
                assert_eq!(
                    req.header("Content-Type"),
                    Some("application/json"),
                    "{name}: content type"
                );
            }
        }
    }
}

#[test]
fn error_format_vectors() {
    let raw = include_str!("../../test-vectors/errors.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();
    let url = vectors["url"].as_str().unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let status = case["status"].as_u64().unwrap() as u16;
        let body = case["body"].as_str().unwrap();
        let headers: Vec<(String, String)> = case["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| {
                let pair = h.as_array().unwrap();
                (
                    pair[0].as_str().unwrap().to_string(),
                    pair[1].as_str().unwrap().to_string(),
                )
            })
            .collect();

        let err = ApiError::HttpStatus {
            code: status,
            url: url.to_string(),
            headers: headers.clone(),
            body: body.to_string(),
        };
        assert_eq!(
            format_api_error(&err, false),
            case["concise"].as_str().unwrap(),
            "{name}: concise"
        );

        let debug = format_api_error(&err, true);
        let header_block = headers
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(
            debug,
            format!("HTTP {status} {url}\n{header_block}\n\n{body}"),
            "{name}: debug"
        );
    }
}
