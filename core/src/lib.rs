//! Client core for a robot controller's REST API.
//!
//! # Overview
//! `RobotApiClient` turns a user-entered host into the API base URL, issues
//! the controller's GET/PUT operations, follows 307/308 redirects with the
//! original method and body, and decodes answers into [`ResponseBody`].
//! Failures are classified into the two [`ApiError`] variants.
//!
//! # Design
//! - The network sits behind the [`Transport`] trait; `UreqTransport` is the
//!   real one and executes a single hop without following redirects.
//! - [`Dispatcher`] runs calls on worker threads and hands their results back
//!   to the thread that pumps it, exactly once.
//! - [`Session`] is the headless front end: handlers, display state and the
//!   operator log, built on the client and the dispatcher.
//! - [`format`] renders errors and exchanges for the operator log.

pub mod body;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;
pub mod urls;

pub use body::{ResponseBody, RAW_KEY};
pub use client::{ClientConfig, ResponseMetadata, RobotApiClient};
pub use dispatch::Dispatcher;
pub use error::ApiError;
pub use format::{format_api_error, format_error, format_success};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::{ConnectionStatus, LogEntry, Session, SessionState};
pub use transport::{Transport, TransportError, UreqTransport};
pub use types::{program_state_text, ProgramAction, RobotStateAction};
pub use urls::{base_url_for, ensure_http_scheme};
