//! Auth API.
//!
//! Auth calls are never queued offline. Login and registration establish the
//! session; logout always clears it locally, whatever the server says.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::classify::{ApiResult, Failure, classify};
use crate::client::{RequestOptions, ShopClient, decode_as};
use crate::session::{SessionCredential, TerminationReason};
use crate::types::{AuthResponse, ChangePasswordRequest, LoginRequest, RefreshResponse};

const LOGIN: &str = "/api/auth/login";
const REGISTER: &str = "/api/auth/register";
const REGISTER_WITH_CODE: &str = "/api/auth/register-with-code";
const ME: &str = "/api/auth/me";
const CHANGE_PASSWORD: &str = "/api/auth/change-password";
const LOGOUT: &str = "/api/auth/logout";
const REFRESH: &str = "/api/auth/refresh";

/// Auth API client.
pub struct AuthApi {
    client: ShopClient,
}

impl AuthApi {
    pub(crate) fn new(client: ShopClient) -> Self {
        Self { client }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Value> {
        let options = RequestOptions::new().json(body)?.no_queue();
        self.client.post(path, options).await?.completed()
    }

    fn establish(&self, token: String, user: Value) -> ApiResult<()> {
        let credential = SessionCredential::new(token, user);
        self.client.session().establish(credential).map_err(|e| {
            classify(&Failure::Setup {
                detail: format!("failed to store session: {}", e),
            })
        })?;
        // Cached reads belong to whoever was signed in before.
        self.client.cache().clear();
        Ok(())
    }

    async fn authenticate<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<AuthResponse> {
        let data = self.post(path, body).await?;
        let response: AuthResponse = decode_as(data, path)?;
        self.establish(response.token.clone(), response.user.clone())?;
        Ok(response)
    }

    /// Sign in and hold the returned credential.
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let response = self.authenticate(LOGIN, request).await?;
        info!(email = %request.email, "Signed in");
        Ok(response)
    }

    /// Create an account and sign in as it.
    pub async fn register<B: Serialize + ?Sized>(
        &self,
        registration: &B,
    ) -> ApiResult<AuthResponse> {
        self.authenticate(REGISTER, registration).await
    }

    /// Create an account from a shop invitation code and sign in as it.
    pub async fn register_with_code<B: Serialize + ?Sized>(
        &self,
        registration: &B,
    ) -> ApiResult<AuthResponse> {
        self.authenticate(REGISTER_WITH_CODE, registration).await
    }

    /// Current user profile, always fetched fresh.
    pub async fn me(&self) -> ApiResult<Value> {
        self.client.get(ME, RequestOptions::new().no_cache()).await
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> ApiResult<Value> {
        let options = RequestOptions::new().json(request)?.no_queue();
        self.client.put(CHANGE_PASSWORD, options).await?.completed()
    }

    /// End the session.
    ///
    /// The server is told when reachable; the local credential and cache are
    /// cleared regardless. Returns whether the server acknowledged.
    pub async fn logout(&self) -> bool {
        let acknowledged = if self.client.is_authenticated() {
            match self.post(LOGOUT, &json!({})).await {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, kind = %e.kind, "Remote logout failed, clearing locally");
                    false
                }
            }
        } else {
            false
        };

        self.client.session().clear(TerminationReason::Logout);
        self.client.cache().clear();
        acknowledged
    }

    /// Ask the server for a fresh token. A returned token replaces the held
    /// credential, keeping the known user when none is returned.
    pub async fn refresh(&self) -> ApiResult<RefreshResponse> {
        let data = self.post(REFRESH, &json!({})).await?;
        let response: RefreshResponse = decode_as(data, REFRESH)?;

        if let Some(token) = &response.token {
            let user = response
                .user
                .clone()
                .or_else(|| self.client.session().credential().map(|c| c.user))
                .unwrap_or(Value::Null);
            self.establish(token.clone(), user)?;
            info!("Session token refreshed");
        }
        Ok(response)
    }
}
