//! Authenticated request pipeline.
//!
//! Attaches the held bearer credential to each request and turns every
//! failure into a [`ClassifiedError`]. An authorization failure destroys the
//! credential the request was sent with, at most once per credential.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::classify::{ClassifiedError, Failure, classify};
use crate::session::Session;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportErrorKind};

/// Wraps a [`Transport`] with bearer auth and failure classification.
#[derive(Clone)]
pub struct AuthInterceptor {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
}

impl AuthInterceptor {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<Session>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send one request.
    ///
    /// `is_retry` marks a request re-issued after an earlier authorization
    /// failure; such a request never terminates the session again. Requests
    /// are never retried here.
    pub async fn send(
        &self,
        mut request: HttpRequest,
        is_retry: bool,
    ) -> Result<HttpResponse, ClassifiedError> {
        let snapshot = self.session.snapshot();
        if let Some(snap) = &snapshot {
            request.set_header("Authorization", format!("Bearer {}", snap.token));
        }

        let method = request.method.clone();
        let path = request.path.clone();
        trace!(%method, path = %path, authenticated = snapshot.is_some(), "Sending request");

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                let kind = e.kind;
                // A request that could not be built never reached the network.
                let failure = match kind {
                    TransportErrorKind::Other => Failure::Setup { detail: e.message },
                    _ => Failure::NoResponse {
                        path: path.clone(),
                        kind,
                        detail: e.message,
                    },
                };
                let mut err = classify(&failure);
                err.path.get_or_insert_with(|| path.clone());
                warn!(
                    %method,
                    path = %path,
                    transport = %kind,
                    kind = %err.kind,
                    "No response from server"
                );
                return Err(err);
            }
        };

        if response.is_success() {
            return Ok(response);
        }

        let body = serde_json::from_slice(&response.body).ok();
        let err = classify(&Failure::Response {
            status: response.status,
            path: path.clone(),
            body,
        });

        if err.is_unauthorized() && !is_retry {
            match &snapshot {
                Some(snap) => {
                    if self.session.terminate_if_current(snap.generation) {
                        warn!(path = %path, "Credential rejected, session terminated");
                    }
                }
                None => debug!(path = %path, "Unauthenticated request rejected"),
            }
        }

        if err.is_quiet() {
            debug!(path = %path, status = response.status, "Endpoint not found");
        } else {
            warn!(
                %method,
                path = %path,
                status = response.status,
                kind = %err.kind,
                "Request failed"
            );
        }

        Err(err)
    }
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor")
            .field("authenticated", &self.session.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ErrorKind;
    use crate::session::{MemorySessionStore, SessionCredential, SessionEvent};
    use crate::transport::{DEFAULT_TIMEOUT, TransportError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::Method;
    use serde_json::Value;
    use std::time::Duration;

    /// Replies with a fixed status after a delay and records auth headers.
    #[derive(Default)]
    struct FixedTransport {
        status: u16,
        offline: bool,
        malformed: bool,
        seen_auth: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen_auth
                .lock()
                .push(request.header("Authorization").map(str::to_string));
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.offline {
                return Err(TransportError::connect("network down"));
            }
            if self.malformed {
                return Err(TransportError::new(
                    TransportErrorKind::Other,
                    "builder error: invalid header value",
                ));
            }
            Ok(HttpResponse::new(self.status, "{}"))
        }
    }

    fn setup(
        transport: FixedTransport,
        token: Option<&str>,
    ) -> (AuthInterceptor, Arc<FixedTransport>) {
        let session = Arc::new(Session::new(Arc::new(MemorySessionStore::new())));
        if let Some(token) = token {
            session
                .establish(SessionCredential::new(token, Value::Null))
                .unwrap();
        }
        let transport = Arc::new(transport);
        (AuthInterceptor::new(transport.clone(), session), transport)
    }

    fn request() -> HttpRequest {
        HttpRequest::new(Method::GET, "/api/auth/jobs", DEFAULT_TIMEOUT)
    }

    #[tokio::test]
    async fn test_attaches_bearer_when_held() {
        let (interceptor, transport) = setup(
            FixedTransport {
                status: 200,
                ..Default::default()
            },
            Some("tok-123"),
        );
        interceptor.send(request(), false).await.unwrap();
        assert_eq!(
            transport.seen_auth.lock()[0].as_deref(),
            Some("Bearer tok-123")
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_when_absent() {
        let (interceptor, transport) = setup(
            FixedTransport {
                status: 200,
                ..Default::default()
            },
            None,
        );
        interceptor.send(request(), false).await.unwrap();
        assert_eq!(transport.seen_auth.lock()[0], None);
    }

    #[tokio::test]
    async fn test_concurrent_401s_terminate_once() {
        let (interceptor, _) = setup(
            FixedTransport {
                status: 401,
                ..Default::default()
            },
            Some("expired"),
        );
        let mut rx = interceptor.session().subscribe();

        let (a, b, c) = tokio::join!(
            interceptor.send(request(), false),
            interceptor.send(request(), false),
            interceptor.send(request(), false),
        );
        for result in [a, b, c] {
            assert_eq!(result.unwrap_err().kind, ErrorKind::Unauthorized);
        }
        assert!(!interceptor.session().is_authenticated());

        let mut terminated = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::Terminated { .. }) {
                terminated += 1;
            }
        }
        assert_eq!(terminated, 1);
    }

    #[tokio::test]
    async fn test_retry_attempt_keeps_session() {
        let (interceptor, _) = setup(
            FixedTransport {
                status: 401,
                ..Default::default()
            },
            Some("tok"),
        );
        let err = interceptor.send(request(), true).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(interceptor.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_no_response_is_network_unreachable() {
        let (interceptor, _) = setup(
            FixedTransport {
                offline: true,
                ..Default::default()
            },
            Some("tok"),
        );
        let err = interceptor.send(request(), false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkUnreachable);
        assert!(interceptor.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_malformed_request_is_unknown_not_network() {
        let (interceptor, _) = setup(
            FixedTransport {
                malformed: true,
                ..Default::default()
            },
            Some("tok"),
        );
        let err = interceptor.send(request(), false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(!err.is_network());
        assert_eq!(err.path.as_deref(), Some("/api/auth/jobs"));
        assert!(err.message.contains("invalid header value"));
    }

    #[tokio::test]
    async fn test_forbidden_keeps_session() {
        let (interceptor, _) = setup(
            FixedTransport {
                status: 403,
                ..Default::default()
            },
            Some("tok"),
        );
        let err = interceptor.send(request(), false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
        assert_eq!(err.status, Some(403));
        assert!(interceptor.session().is_authenticated());
    }
}
