//! Request and response types for the shop console API.
//!
//! Business entities stay opaque JSON; only the payloads the client itself
//! inspects are typed here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Credentials for `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Response to login and registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The signed-in user.
    #[serde(default)]
    pub user: Value,
}

/// Request body for `PUT /api/auth/change-password`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Response to `POST /api/auth/refresh`. The token is absent when the server
/// only confirms the current one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Jobs
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for `PATCH /api/auth/jobs/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl JobStatusUpdate {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OBD-II
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for `POST /api/obd2/lookup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Obd2LookupRequest {
    pub codes: Vec<String>,
    /// Optional vehicle context (year, make, model).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// Response from `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Any further fields the server reports.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}
