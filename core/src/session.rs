//! Headless operator session: the handlers behind a controller front end.
//!
//! # Design
//! A `Session` owns one shared `RobotApiClient`, a `Dispatcher` and the
//! display state a front end renders (connection indicator, connect button,
//! program-state label, timestamped log). Every handler logs an optional
//! "starting" line, runs its API call on a worker, and on the next pump
//! appends the success line (plus the full exchange in debug mode) or one
//! formatted error line. Affordances such as the connect button are restored
//! on both paths.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};

use crate::body::ResponseBody;
use crate::client::RobotApiClient;
use crate::dispatch::Dispatcher;
use crate::error::ApiError;
use crate::format::{format_error, format_success};
use crate::transport::{Transport, UreqTransport};
use crate::types::program_state_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotConnected,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "Not Connected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connection Success",
            ConnectionStatus::Failed => "Connection Failed",
        }
    }

    /// Indicator colour name.
    pub fn indicator(self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "gray",
            ConnectionStatus::Connecting => "orange",
            ConnectionStatus::Connected => "green",
            ConnectionStatus::Failed => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub time: NaiveTime,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.time.format("%H:%M:%S"), self.message)
    }
}

/// Everything a front end needs to draw.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub status: ConnectionStatus,
    pub connect_enabled: bool,
    pub program_state: Option<String>,
    pub log: Vec<LogEntry>,
}

impl SessionState {
    fn push_log(&mut self, message: impl Into<String>) {
        self.log.push(LogEntry {
            time: Local::now().time(),
            message: message.into(),
        });
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::NotConnected,
            connect_enabled: true,
            program_state: None,
            log: Vec::new(),
        }
    }
}

pub struct Session<T: Transport + 'static = UreqTransport> {
    client: Arc<RobotApiClient<T>>,
    dispatcher: Dispatcher,
    // Only touched on the owning thread; workers see the client alone.
    state: Rc<RefCell<SessionState>>,
    debug: Rc<Cell<bool>>,
}

impl<T: Transport + 'static> Session<T> {
    pub fn new(client: RobotApiClient<T>) -> Self {
        Self {
            client: Arc::new(client),
            dispatcher: Dispatcher::new(),
            state: Rc::new(RefCell::new(SessionState::default())),
            debug: Rc::new(Cell::new(false)),
        }
    }

    pub fn client(&self) -> &RobotApiClient<T> {
        &self.client
    }

    pub fn set_debug(&self, enabled: bool) {
        self.debug.set(enabled);
    }

    pub fn debug(&self) -> bool {
        self.debug.get()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Log entries from index `from` on.
    pub fn log_since(&self, from: usize) -> Vec<LogEntry> {
        let state = self.state.borrow();
        state.log[from.min(state.log.len())..].to_vec()
    }

    pub fn log_len(&self) -> usize {
        self.state.borrow().log.len()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    /// Append an operator-facing line.
    pub fn note(&self, message: impl Into<String>) {
        self.state.borrow_mut().push_log(message);
    }

    pub fn pump(&self) -> usize {
        self.dispatcher.pump()
    }

    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        self.dispatcher.pump_timeout(timeout)
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.dispatcher.wait_idle(timeout)
    }

    /// Point the client at `host` and probe it with a program-state read.
    pub fn connect(&self, host: &str) {
        let host = host.trim();
        if host.is_empty() {
            self.note("Please enter a robot host/IP.");
            return;
        }
        {
            let mut state = self.state.borrow_mut();
            if !state.connect_enabled {
                return;
            }
            state.connect_enabled = false;
            state.status = ConnectionStatus::Connecting;
        }
        self.client.set_host(host);

        self.execute(
            |client| client.get_program_state(),
            None,
            Some("Connected successfully.".to_string()),
            |state, _| state.status = ConnectionStatus::Connected,
            |state| state.status = ConnectionStatus::Failed,
            |state| state.connect_enabled = true,
        );
    }

    pub fn robot_state_action(&self, action: &str) {
        let action = action.to_string();
        let worker_action = action.clone();
        self.execute(
            move |client| client.set_robot_state(&worker_action),
            Some(format!("Sending robot state action: {action}")),
            Some(format!("Robot state action '{action}' succeeded.")),
            |_, _| {},
            |_| {},
            |_| {},
        );
    }

    pub fn load_program(&self, name: &str) {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.note("Please enter a program name to load.");
            return;
        }
        let worker_name = name.clone();
        self.execute(
            move |client| client.load_program(&worker_name),
            Some(format!("Loading program: {name}")),
            Some(format!("Program '{name}' loaded successfully.")),
            |_, _| {},
            |_| {},
            |_| {},
        );
    }

    pub fn program_action(&self, action: &str) {
        let action = action.to_string();
        let worker_action = action.clone();
        self.execute(
            move |client| client.set_program_action(&worker_action),
            Some(format!("Sending program action: {action}")),
            Some(format!("Program action '{action}' succeeded.")),
            |_, _| {},
            |_| {},
            |_| {},
        );
    }

    pub fn refresh_program_state(&self) {
        self.execute(
            |client| client.get_program_state(),
            Some("Refreshing program state...".to_string()),
            Some("Program state refreshed.".to_string()),
            |state, body| {
                state.program_state = Some(format!("Program state: {}", program_state_text(body)));
            },
            |_| {},
            |_| {},
        );
    }

    pub fn query_safety_mode(&self) {
        self.query("Safety mode", |client| client.get_safety_mode());
    }

    pub fn query_robot_mode(&self) {
        self.query("Robot mode", |client| client.get_robot_mode());
    }

    pub fn query_control_mode(&self) {
        self.query("Control mode", |client| client.get_control_mode());
    }

    pub fn query_operational_mode(&self) {
        self.query("Operational mode", |client| client.get_operational_mode());
    }

    pub fn list_programs(&self) {
        self.query("Programs", |client| client.list_programs());
    }

    pub fn show_program(&self, name: &str) {
        let name = name.trim().to_string();
        if name.is_empty() {
            self.note("Please enter a program name.");
            return;
        }
        let label = format!("Program '{name}'");
        self.query(&label, move |client| client.get_program(&name));
    }

    /// Read-only call whose body is logged as `"{label}: {body}"`.
    fn query<W>(&self, label: &str, call: W)
    where
        W: FnOnce(&RobotApiClient<T>) -> Result<ResponseBody, ApiError> + Send + 'static,
    {
        let label = label.to_string();
        self.execute(
            call,
            None,
            None,
            move |state, body| state.push_log(format!("{label}: {}", body_text(body))),
            |_| {},
            |_| {},
        );
    }

    fn execute<W, S, F, D>(
        &self,
        call: W,
        initial_message: Option<String>,
        success_message: Option<String>,
        on_success: S,
        on_error: F,
        on_finally: D,
    ) where
        W: FnOnce(&RobotApiClient<T>) -> Result<ResponseBody, ApiError> + Send + 'static,
        S: FnOnce(&mut SessionState, &ResponseBody) + 'static,
        F: FnOnce(&mut SessionState) + 'static,
        D: FnOnce(&mut SessionState) + 'static,
    {
        if let Some(message) = initial_message {
            self.note(message);
        }

        let worker_client = Arc::clone(&self.client);
        let client = Arc::clone(&self.client);
        let success_state = Rc::clone(&self.state);
        let error_state = Rc::clone(&self.state);
        let finally_state = Rc::clone(&self.state);
        let success_debug = Rc::clone(&self.debug);
        let error_debug = Rc::clone(&self.debug);

        self.dispatcher.run_async_then(
            move || call(&worker_client),
            move |body| {
                let mut state = success_state.borrow_mut();
                if let Some(message) = success_message {
                    state.push_log(message);
                }
                if success_debug.get() {
                    if let Some(metadata) = client.last_response_metadata() {
                        state.push_log(format_success(&metadata, &body));
                    }
                }
                on_success(&mut *state, &body);
            },
            move |err| {
                let mut state = error_state.borrow_mut();
                state.push_log(format_error(&*err, error_debug.get()));
                on_error(&mut *state);
            },
            move || on_finally(&mut *finally_state.borrow_mut()),
        );
    }
}

fn body_text(body: &ResponseBody) -> String {
    match body {
        ResponseBody::Structured(value) => value.to_string(),
        ResponseBody::Raw(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::transport::fake::FakeTransport;
    use crate::transport::TransportError;

    const WAIT: Duration = Duration::from_secs(5);

    fn json(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    fn session(transport: &Arc<FakeTransport>) -> Session<Arc<FakeTransport>> {
        Session::new(RobotApiClient::with_transport(
            Arc::clone(transport),
            ClientConfig::default(),
        ))
    }

    fn messages(session: &Session<Arc<FakeTransport>>) -> Vec<String> {
        session.snapshot().log.into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn empty_host_is_rejected_locally() {
        let transport = FakeTransport::new(|_| Ok(json(200, "{}")));
        let s = session(&transport);
        s.connect("   ");
        assert_eq!(messages(&s), ["Please enter a robot host/IP."]);
        assert!(transport.requests().is_empty());
        assert_eq!(s.snapshot().status, ConnectionStatus::NotConnected);
    }

    #[test]
    fn connect_success_marks_connected_and_reenables_button() {
        let transport = FakeTransport::new(|_| Ok(json(200, r#"{"state":"STOPPED"}"#)));
        let s = session(&transport);

        s.connect(" localhost:50020 ");
        let during = s.snapshot();
        assert_eq!(during.status, ConnectionStatus::Connecting);
        assert!(!during.connect_enabled);

        assert!(s.wait_idle(WAIT));
        let after = s.snapshot();
        assert_eq!(after.status, ConnectionStatus::Connected);
        assert_eq!(after.status.indicator(), "green");
        assert!(after.connect_enabled);
        assert_eq!(messages(&s), ["Connected successfully."]);

        let meta = s.client().last_response_metadata().unwrap();
        assert_eq!(meta.method, HttpMethod::Get);
        assert_eq!(meta.status, 200);
        assert_eq!(
            meta.url,
            "http://localhost:50020/universal-robots/robot-api/program/v1/state"
        );
    }

    #[test]
    fn connect_failure_marks_failed_and_reenables_button() {
        let transport = FakeTransport::new(|_| Err(TransportError::Io("connection refused".to_string())));
        let s = session(&transport);

        s.connect("10.0.0.5");
        assert!(s.wait_idle(WAIT));

        let after = s.snapshot();
        assert_eq!(after.status, ConnectionStatus::Failed);
        assert!(after.connect_enabled);
        assert_eq!(messages(&s), ["Network error: connection refused"]);
    }

    #[test]
    fn connect_is_ignored_while_in_flight() {
        let transport = FakeTransport::new(|_| Ok(json(200, "{}")));
        let s = session(&transport);
        s.connect("robot");
        s.connect("robot");
        assert!(s.wait_idle(WAIT));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn load_program_logs_start_and_rejection() {
        let transport = FakeTransport::new(|_| {
            Ok(json(404, r#"{"message":"not found","details":"no such program"}"#))
        });
        let s = session(&transport);
        s.client().set_host("robot");

        s.load_program("demo");
        assert!(s.wait_idle(WAIT));
        assert_eq!(
            messages(&s),
            ["Loading program: demo", "HTTP 404 - not found - no such program"]
        );
    }

    #[test]
    fn empty_program_name_is_rejected_locally() {
        let transport = FakeTransport::new(|_| Ok(json(200, "{}")));
        let s = session(&transport);
        s.load_program("");
        assert_eq!(messages(&s), ["Please enter a program name to load."]);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn actions_log_success_lines() {
        let transport = FakeTransport::new(|_| Ok(json(200, "{}")));
        let s = session(&transport);
        s.client().set_host("robot");

        s.robot_state_action("POWER_ON");
        assert!(s.wait_idle(WAIT));
        s.program_action("play");
        assert!(s.wait_idle(WAIT));

        assert_eq!(
            messages(&s),
            [
                "Sending robot state action: POWER_ON",
                "Robot state action 'POWER_ON' succeeded.",
                "Sending program action: play",
                "Program action 'play' succeeded.",
            ]
        );
    }

    #[test]
    fn debug_mode_appends_exchange_details() {
        let transport = FakeTransport::new(|_| Ok(json(200, r#"{"ok":true}"#)));
        let s = session(&transport);
        s.client().set_host("robot");
        s.set_debug(true);

        s.load_program("demo");
        assert!(s.wait_idle(WAIT));

        let log = messages(&s);
        assert_eq!(log.len(), 3);
        assert!(log[2].starts_with(
            "HTTP 200 PUT http://robot/universal-robots/robot-api/program/v1/load"
        ));
        assert!(log[2].contains("\"programName\": \"demo\""));
    }

    #[test]
    fn refresh_sets_program_state_label() {
        let transport = FakeTransport::new(|_| Ok(json(200, r#"{"state":"PLAYING"}"#)));
        let s = session(&transport);
        s.client().set_host("robot");

        s.refresh_program_state();
        assert!(s.wait_idle(WAIT));
        assert_eq!(
            s.snapshot().program_state.as_deref(),
            Some("Program state: PLAYING")
        );
    }

    #[test]
    fn queries_log_bodies() {
        let transport = FakeTransport::new(|_| Ok(json(200, r#"{"safetyMode":"NORMAL"}"#)));
        let s = session(&transport);
        s.client().set_host("robot");

        s.query_safety_mode();
        assert!(s.wait_idle(WAIT));
        assert_eq!(messages(&s), [r#"Safety mode: {"safetyMode":"NORMAL"}"#]);
    }

    #[test]
    fn log_entries_render_with_timestamp() {
        let entry = LogEntry {
            time: NaiveTime::from_hms_opt(9, 5, 7).unwrap(),
            message: "Connected successfully.".to_string(),
        };
        assert_eq!(entry.to_string(), "[09:05:07] Connected successfully.");
    }
}
