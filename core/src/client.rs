//! Blocking client for the controller REST API.
//!
//! # Design
//! `RobotApiClient` owns the base URL and the metadata of the last successful
//! response; both sit behind locks so one client can be shared by every
//! worker thread of a session. Each operation is a thin wrapper over
//! [`RobotApiClient::request`], which runs the hop loop:
//!
//! 1. send one `HttpRequest` through the `Transport`,
//! 2. classify the answer as `Hop::Terminal` or `Hop::Redirect`,
//! 3. follow 307/308 redirects with the same method and body, up to
//!    `max_redirects` times,
//! 4. decode a 2xx terminal response or turn anything else into
//!    `ApiError::HttpStatus`.

use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::body::ResponseBody;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, LOCATION};
use crate::transport::{Transport, UreqTransport};
use crate::urls;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_REDIRECTS: u32 = 3;

pub const PROGRAM_STATE_PATH: &str = "/program/v1/state";
pub const PROGRAM_LOAD_PATH: &str = "/program/v1/load";
pub const ROBOT_STATE_PATH: &str = "/robotstate/v1/state";
pub const SAFETY_MODE_PATH: &str = "/robotstate/v1/safetymode";
pub const ROBOT_MODE_PATH: &str = "/robotstate/v1/robotmode";
pub const CONTROL_MODE_PATH: &str = "/system/v1/controlmode";
pub const OPERATIONAL_MODE_PATH: &str = "/system/v1/operationalmode";
pub const PROGRAMS_PATH: &str = "/programs/v1";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Wall-clock limit for a single hop.
    pub timeout: Duration,
    /// Redirects followed before the last 307/308 is returned as an error.
    pub max_redirects: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// Snapshot of the last successful exchange, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMetadata {
    pub method: HttpMethod,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub request_body: Option<Value>,
}

/// Outcome of one hop.
enum Hop {
    Terminal(HttpResponse),
    Redirect { target: String, response: HttpResponse },
}

pub struct RobotApiClient<T = UreqTransport> {
    transport: T,
    config: ClientConfig,
    base_url: RwLock<String>,
    last_response: Mutex<Option<ResponseMetadata>>,
}

impl RobotApiClient<UreqTransport> {
    /// Client with the default configuration and no host set.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(transport, config)
    }
}

impl Default for RobotApiClient<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> RobotApiClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            base_url: RwLock::new(String::new()),
            last_response: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Point the client at `host` (hostname, IP, `host:port` or full URL).
    ///
    /// Reachability is not checked here; the first request surfaces it.
    pub fn set_host(&self, host: &str) {
        let base = urls::base_url_for(host);
        debug!(base_url = %base, "host set");
        *self.base_url.write() = base;
    }

    pub fn base_url(&self) -> String {
        self.base_url.read().clone()
    }

    /// Copy of the metadata of the last successful response, if any.
    pub fn last_response_metadata(&self) -> Option<ResponseMetadata> {
        self.last_response.lock().clone()
    }

    /// Send `method` to `base_url + path`, following redirects and decoding
    /// the terminal response.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        payload: Option<Value>,
    ) -> Result<ResponseBody, ApiError> {
        let url = format!("{}{path}", self.base_url.read());
        let body = payload.as_ref().map(Value::to_string);
        let mut request = HttpRequest::json(method, url, body);
        let mut follows = 0;

        loop {
            match self.send_hop(&request)? {
                Hop::Terminal(response) => return self.finish(&request, payload, response),
                Hop::Redirect { target, .. } if follows < self.config.max_redirects => {
                    info!(from = %request.url, to = %target, "following redirect");
                    follows += 1;
                    request = request.redirected(target);
                }
                Hop::Redirect { response, .. } => {
                    warn!(
                        url = %request.url,
                        limit = self.config.max_redirects,
                        "redirect limit reached"
                    );
                    return Err(status_error(&request, response));
                }
            }
        }
    }

    fn send_hop(&self, request: &HttpRequest) -> Result<Hop, ApiError> {
        let response = self.transport.execute(request).map_err(|e| {
            debug!(method = %request.method, url = %request.url, error = %e, "transport failure");
            ApiError::from(e)
        })?;
        debug!(
            method = %request.method,
            url = %request.url,
            status = response.status,
            "controller response"
        );

        if !response.is_method_preserving_redirect() {
            return Ok(Hop::Terminal(response));
        }
        let target = response
            .header(LOCATION)
            .and_then(|location| urls::resolve_redirect(&request.url, location));
        Ok(match target {
            Some(target) => Hop::Redirect { target, response },
            None => Hop::Terminal(response),
        })
    }

    fn finish(
        &self,
        request: &HttpRequest,
        payload: Option<Value>,
        response: HttpResponse,
    ) -> Result<ResponseBody, ApiError> {
        if !response.is_success() {
            return Err(status_error(request, response));
        }
        let body = ResponseBody::decode(&response);
        *self.last_response.lock() = Some(ResponseMetadata {
            method: request.method,
            url: request.url.clone(),
            status: response.status,
            headers: response.headers,
            request_body: payload,
        });
        Ok(body)
    }

    pub fn get_program_state(&self) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Get, PROGRAM_STATE_PATH, None)
    }

    /// `action` is one of `play`, `pause`, `stop`, `resume`; not validated.
    pub fn set_program_action(&self, action: &str) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Put, PROGRAM_STATE_PATH, Some(json!({ "action": action })))
    }

    pub fn load_program(&self, program_name: &str) -> Result<ResponseBody, ApiError> {
        self.request(
            HttpMethod::Put,
            PROGRAM_LOAD_PATH,
            Some(json!({ "programName": program_name })),
        )
    }

    /// `action` is a robot state verb such as `POWER_ON`; not validated.
    pub fn set_robot_state(&self, action: &str) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Put, ROBOT_STATE_PATH, Some(json!({ "action": action })))
    }

    pub fn get_safety_mode(&self) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Get, SAFETY_MODE_PATH, None)
    }

    pub fn get_robot_mode(&self) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Get, ROBOT_MODE_PATH, None)
    }

    pub fn get_control_mode(&self) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Get, CONTROL_MODE_PATH, None)
    }

    pub fn get_operational_mode(&self) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Get, OPERATIONAL_MODE_PATH, None)
    }

    pub fn list_programs(&self) -> Result<ResponseBody, ApiError> {
        self.request(HttpMethod::Get, PROGRAMS_PATH, None)
    }

    /// The name is percent-encoded as a single path segment.
    pub fn get_program(&self, name: &str) -> Result<ResponseBody, ApiError> {
        let path = format!("{PROGRAMS_PATH}/{}", urlencoding::encode(name));
        self.request(HttpMethod::Get, &path, None)
    }
}

fn status_error(request: &HttpRequest, response: HttpResponse) -> ApiError {
    let body = response.text();
    ApiError::HttpStatus {
        code: response.status,
        url: request.url.clone(),
        headers: response.headers,
        body,
    }
}
