//! Normalized API errors
//!
//! Every failure the client reports, whether it came from the server, the
//! network, or a local check, is an [`ApiError`] carrying a message, a status
//! code (`0` when no response was received) and optional per-field messages.

use crate::envelope::ErrorBody;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Message used when no response was received
pub const NO_RESPONSE_MESSAGE: &str = "No response from server. Please check your connection.";
/// Message used when the server gave no usable message
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";
/// Message used after an unrecoverable 401
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Field name to messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error category, derived from the status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input rejected by schema checks, locally or by the server (400/422)
    Validation,
    /// Missing or expired session (401)
    Auth,
    /// Authenticated but not allowed (403)
    Forbidden,
    /// Resource does not exist (404)
    NotFound,
    /// Event full, duplicate registration and similar (409)
    Conflict,
    /// No response received (status 0)
    Network,
    /// 5xx or an unreadable response
    Server,
    /// Any other 4xx
    Client,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => ErrorKind::Network,
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Auth,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Client,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
        };
        f.write_str(name)
    }
}

/// A normalized API failure
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, or 0 when no response was received
    pub status_code: u16,
    /// Machine-readable code from the error envelope, if any
    pub code: Option<String>,
    pub field_errors: Option<FieldErrors>,
}

impl ApiError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::from_status(status_code),
            message: message.into(),
            status_code,
            code: None,
            field_errors: None,
        }
    }

    /// No response was received (connection failure or timeout)
    pub fn network() -> Self {
        Self::new(0, NO_RESPONSE_MESSAGE)
    }

    /// The session could not be recovered
    pub fn unauthorized() -> Self {
        Self::new(401, SESSION_EXPIRED_MESSAGE)
    }

    /// Local schema check failure
    pub fn validation(field_errors: FieldErrors) -> Self {
        let message = field_errors
            .values()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "Validation failed".to_string());
        Self {
            field_errors: Some(field_errors),
            ..Self::new(400, message)
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(409, message)
    }

    /// A 2xx response whose payload did not have the expected shape
    pub fn unexpected_payload(status_code: u16, err: &serde_json::Error) -> Self {
        log::debug!("Unexpected payload (status {}): {}", status_code, err);
        Self {
            kind: ErrorKind::Server,
            ..Self::new(status_code, GENERIC_ERROR_MESSAGE)
        }
    }

    /// Normalize a non-success response
    ///
    /// Known body shapes surface their `message`/`errors` verbatim; anything
    /// else falls back to a generic message for the status.
    pub fn from_response(status_code: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::from_error_body(status_code, parsed),
            Err(_) => Self::new(status_code, fallback_message(status_code)),
        }
    }

    pub(crate) fn from_error_body(status_code: u16, body: ErrorBody) -> Self {
        match body {
            ErrorBody::Envelope {
                message,
                status_code: body_status,
                code,
                errors,
            } => {
                // A 2xx carrying `success: false` relies on the envelope's status
                let status = match (status_code, body_status) {
                    (200..=299, Some(s)) => s,
                    (200..=299, None) => 400,
                    (s, _) => s,
                };
                Self {
                    kind: ErrorKind::from_status(status),
                    message: if message.trim().is_empty() {
                        fallback_message(status)
                    } else {
                        message
                    },
                    status_code: status,
                    code: code.and_then(|c| match c {
                        serde_json::Value::String(s) => Some(s),
                        serde_json::Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    }),
                    field_errors: errors.and_then(crate::envelope::decode_field_errors),
                }
            }
            ErrorBody::Legacy { error } => Self::new(status_code, error),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    /// First message for `field`, if the error carries one
    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.field_errors
            .as_ref()?
            .get(field)?
            .first()
            .map(String::as_str)
    }

    /// Message plus field details, one line per field, for notifications
    pub fn user_message(&self) -> String {
        let mut out = self.message.clone();
        if let Some(fields) = &self.field_errors {
            for (field, messages) in fields {
                for message in messages {
                    if *message != self.message {
                        out.push_str(&format!("\n  {}: {}", field, message));
                    }
                }
            }
        }
        out
    }
}

fn fallback_message(status_code: u16) -> String {
    match status_code {
        0 => NO_RESPONSE_MESSAGE.to_string(),
        401 => SESSION_EXPIRED_MESSAGE.to_string(),
        500..=599 => GENERIC_ERROR_MESSAGE.to_string(),
        s => format!("Request failed with status {}", s),
    }
}
