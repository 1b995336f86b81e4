//! Single-request HTTP transport.
//!
//! A [`Transport`] issues exactly one request and reports either a structured
//! response (any status) or a structured failure when no response arrived.
//! Caching, retries and auth all live above this layer.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Default timeout for ordinary API requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for health checks.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for file uploads.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Request class, used to pick a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestClass {
    /// Regular API traffic.
    #[default]
    Standard,
    /// Liveness probes; short timeout.
    Health,
    /// File uploads; long timeout.
    Upload,
}

/// Per-class timeout table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub standard: Duration,
    pub health: Duration,
    pub upload: Duration,
}

impl Timeouts {
    /// Timeout for a request class.
    pub fn for_class(&self, class: RequestClass) -> Duration {
        match class {
            RequestClass::Standard => self.standard,
            RequestClass::Health => self.health,
            RequestClass::Upload => self.upload,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            standard: DEFAULT_TIMEOUT,
            health: DEFAULT_HEALTH_TIMEOUT,
            upload: DEFAULT_UPLOAD_TIMEOUT,
        }
    }
}

/// One file in a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name reported to the server.
    pub file_name: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw file content.
    pub data: Bytes,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Multipart(Vec<FilePart>),
}

/// A fully described outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Path relative to the server root, e.g. `/api/auth/jobs`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Create a request with no query, headers or body.
    pub fn new(method: Method, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    /// Look up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }
}

/// A response received from the server, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON. An empty body decodes to `null`.
    pub fn json(&self) -> std::result::Result<Value, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }
}

/// Why no response was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Could not connect (DNS, refused, offline).
    Connect,
    /// The request exceeded its timeout.
    Timeout,
    /// The request could not be built or the body could not be read.
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Timeout => write!(f, "timeout"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Failure to obtain any response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() || err.is_request() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Issues a single HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a transport for the given server root.
    pub fn new(base_url: &str, user_agent: Option<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let user_agent =
            user_agent.unwrap_or_else(|| format!("bayline-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    /// Server root all paths are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the absolute URL for a request path.
    pub fn url(&self, path: &str) -> std::result::Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let url = self
            .url(&request.path)
            .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;

        let mut builder = self
            .http
            .request(request.method, url)
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Multipart(files)) => {
                let mut form = Form::new();
                for file in files {
                    let part = Part::bytes(file.data.to_vec())
                        .file_name(file.file_name)
                        .mime_str(&file.content_type)
                        .map_err(TransportError::from)?;
                    form = form.part(file.field, part);
                }
                builder.multipart(form)
            }
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let transport = ReqwestTransport::new("http://localhost:5000", None).unwrap();
        assert_eq!(transport.base_url().as_str(), "http://localhost:5000/");

        let url = transport.url("/api/auth/jobs").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/auth/jobs");
    }

    #[test]
    fn test_base_url_with_prefix() {
        let transport = ReqwestTransport::new("https://shop.example.com/console", None).unwrap();
        let url = transport.url("api/health").unwrap();
        assert_eq!(url.as_str(), "https://shop.example.com/console/api/health");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ReqwestTransport::new("not a url", None).is_err());
    }

    #[test]
    fn test_timeouts_for_class() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.for_class(RequestClass::Standard), DEFAULT_TIMEOUT);
        assert_eq!(timeouts.for_class(RequestClass::Health), DEFAULT_HEALTH_TIMEOUT);
        assert_eq!(timeouts.for_class(RequestClass::Upload), DEFAULT_UPLOAD_TIMEOUT);
    }

    #[test]
    fn test_set_header_replaces() {
        let mut req = HttpRequest::new(Method::GET, "/x", DEFAULT_TIMEOUT);
        req.set_header("Authorization", "Bearer a");
        req.set_header("authorization", "Bearer b");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer b"));
    }

    #[test]
    fn test_empty_body_is_null() {
        let resp = HttpResponse::new(204, Bytes::new());
        assert_eq!(resp.json().unwrap(), Value::Null);
        assert!(resp.is_success());
    }
}
