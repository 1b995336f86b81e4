//! Failure classification.
//!
//! Every request failure is reduced to one of a fixed set of [`ErrorKind`]s
//! plus a display message before any caller sees it.

use std::fmt;

use serde_json::Value;

use crate::transport::TransportErrorKind;

/// Message shown when the session credential is rejected.
pub const MSG_UNAUTHORIZED: &str = "Session expired. Please sign in again.";
/// Message shown on a 403.
pub const MSG_FORBIDDEN: &str = "Access denied.";
/// Message shown on a 5xx.
pub const MSG_SERVER_FAULT: &str = "Server error. Try again later.";
/// Message shown when no response was received.
pub const MSG_NETWORK: &str = "Network error. Check your connection.";
/// Fallback message for anything unclassifiable.
pub const MSG_UNKNOWN: &str = "An unexpected error occurred.";

/// Error kinds a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    ServerFault,
    NetworkUnreachable,
    ValidationFailed,
    Unknown,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::NotFound,
        ErrorKind::ServerFault,
        ErrorKind::NetworkUnreachable,
        ErrorKind::ValidationFailed,
        ErrorKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::ServerFault => "server_fault",
            Self::NetworkUnreachable => "network_unreachable",
            Self::ValidationFailed => "validation_failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure as observed below the classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    /// The server answered with a non-success status.
    Response {
        status: u16,
        path: String,
        body: Option<Value>,
    },
    /// No response arrived at all.
    NoResponse {
        path: String,
        kind: TransportErrorKind,
        detail: String,
    },
    /// The request could not be prepared, or a success body could not be decoded.
    Setup { detail: String },
}

/// Result of a request-level operation.
pub type ApiResult<T> = std::result::Result<T, ClassifiedError>;

/// A failure reduced to a kind and a display message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    /// Origin HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Request path the failure belongs to, when known.
    pub path: Option<String>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            path: None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::NetworkUnreachable
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Whether the error should be logged only, never shown.
    ///
    /// A 404 from a health probe is expected while the backend starts up.
    pub fn is_quiet(&self) -> bool {
        self.kind == ErrorKind::NotFound
            && self.path.as_deref().is_some_and(|p| p.contains("/health"))
    }
}

/// Classify a failure. Pure and total.
pub fn classify(failure: &Failure) -> ClassifiedError {
    match failure {
        Failure::Response { status, path, body } => classify_status(*status, path, body.as_ref()),
        Failure::NoResponse { path, .. } => ClassifiedError {
            kind: ErrorKind::NetworkUnreachable,
            message: MSG_NETWORK.to_string(),
            status: None,
            path: Some(path.clone()),
        },
        Failure::Setup { detail } => ClassifiedError {
            kind: ErrorKind::Unknown,
            message: if detail.is_empty() {
                MSG_UNKNOWN.to_string()
            } else {
                format!("{} ({})", MSG_UNKNOWN, detail)
            },
            status: None,
            path: None,
        },
    }
}

fn classify_status(status: u16, path: &str, body: Option<&Value>) -> ClassifiedError {
    let (kind, message) = match status {
        401 => (ErrorKind::Unauthorized, MSG_UNAUTHORIZED.to_string()),
        403 => (ErrorKind::Forbidden, MSG_FORBIDDEN.to_string()),
        404 => (ErrorKind::NotFound, format!("Endpoint not found: {}", path)),
        500..=599 => (ErrorKind::ServerFault, MSG_SERVER_FAULT.to_string()),
        400..=499 => match body.and_then(validation_message) {
            Some(message) => (ErrorKind::ValidationFailed, message),
            None => (ErrorKind::Unknown, MSG_UNKNOWN.to_string()),
        },
        _ => (
            ErrorKind::Unknown,
            body.and_then(payload_message)
                .unwrap_or_else(|| MSG_UNKNOWN.to_string()),
        ),
    };

    ClassifiedError {
        kind,
        message,
        status: Some(status),
        path: Some(path.to_string()),
    }
}

/// Message from a structured validation payload.
///
/// A payload is structured when it is a JSON object carrying `message` and/or
/// `errors`. `errors` may be a list of strings, a list of `{message}` objects,
/// or a field → message(s) map.
fn validation_message(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    if let Some(message) = payload_message(body) {
        return Some(message);
    }

    let errors = obj.get("errors")?;
    let first = match errors {
        Value::Array(items) => items.iter().find_map(error_text),
        Value::Object(fields) => fields.iter().find_map(|(field, v)| {
            let text = match v {
                Value::Array(items) => items.iter().find_map(error_text),
                other => error_text(other),
            }?;
            Some(format!("{}: {}", field, text))
        }),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };

    Some(first.unwrap_or_else(|| "Validation failed.".to_string()))
}

fn payload_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn error_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => v.get("message").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
