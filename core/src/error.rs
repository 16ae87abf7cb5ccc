//! Error types for the controller API client.
//!
//! # Design
//! Callers only ever see two classes of failure. `HttpStatus` means the
//! controller answered and rejected the request; it carries everything needed
//! to show the rejection (code, final URL, headers, raw body). `Network` means
//! no usable answer arrived at all. Redirects and non-JSON bodies are not
//! errors and never surface here.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by `RobotApiClient` operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The controller returned a non-2xx status that was not resolved by
    /// following a redirect. `body` is the raw body, decoded lossily.
    #[error("HTTP {code} from {url}")]
    HttpStatus {
        code: u16,
        url: String,
        headers: Vec<(String, String)>,
        body: String,
    },

    /// The request never produced a response: DNS failure, refused or reset
    /// connection, timeout, or a URL the transport could not use.
    #[error("network error: {reason}")]
    Network { reason: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus { code, .. } => Some(*code),
            ApiError::Network { .. } => None,
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network {
            reason: err.to_string(),
        }
    }
}
