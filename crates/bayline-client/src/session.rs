//! Session credential state and persistence.
//!
//! At most one credential is held at a time. Every change bumps a generation
//! counter so a request can later tell whether the credential it was sent
//! with is still the current one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Fixed file name of the persisted session within the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 64;

/// Bearer token plus the authenticated user's identity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub token: String,
    #[serde(default)]
    pub user: Value,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>, user: Value) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    /// Token with the middle masked, for display.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.token.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "****".to_string()
        }
    }
}

/// Token and generation captured when a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub token: String,
    pub generation: u64,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The server rejected the credential.
    Unauthorized,
    /// The user signed out.
    Logout,
    /// The application invalidated it explicitly.
    Invalidated,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Established,
    Terminated { reason: TerminationReason },
}

// ============================================================================
// SessionStore Trait
// ============================================================================

/// Durable storage for the session credential.
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    fn load(&self) -> Result<Option<SessionCredential>>;

    fn save(&self, credential: &SessionCredential) -> Result<()>;

    fn delete(&self) -> Result<()>;
}

// ============================================================================
// FileSessionStore
// ============================================================================

/// JSON file store, surviving restarts.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store at `<data_dir>/session.json`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::SessionStore(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let credential = serde_json::from_str(&content).map_err(|e| {
            Error::SessionStore(format!("failed to parse {}: {}", self.path.display(), e))
        })?;

        Ok(Some(credential))
    }

    fn save(&self, credential: &SessionCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::SessionStore(format!("failed to create session directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, json).map_err(|e| {
            Error::SessionStore(format!("failed to write {}: {}", self.path.display(), e))
        })?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| {
                Error::SessionStore(format!("failed to delete {}: {}", self.path.display(), e))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// MemorySessionStore
// ============================================================================

/// Volatile store for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    credential: RwLock<Option<SessionCredential>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: SessionCredential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<SessionCredential>> {
        Ok(self.credential.read().clone())
    }

    fn save(&self, credential: &SessionCredential) -> Result<()> {
        *self.credential.write() = Some(credential.clone());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.credential.write() = None;
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Default)]
struct SessionState {
    credential: Option<SessionCredential>,
    generation: u64,
}

/// Process-wide session state owned by one client context.
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(SessionState::default()),
            store,
            events,
        }
    }

    /// Load a persisted credential, if any. Returns whether one was found.
    pub fn rehydrate(&self) -> Result<bool> {
        let Some(credential) = self.store.load()? else {
            return Ok(false);
        };

        let mut state = self.state.lock();
        state.generation += 1;
        state.credential = Some(credential);
        info!(generation = state.generation, "Session rehydrated from store");
        Ok(true)
    }

    /// Hold a new credential, replacing any previous one, and persist it.
    pub fn establish(&self, credential: SessionCredential) -> Result<()> {
        self.store.save(&credential)?;
        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.credential = Some(credential);
            info!(generation = state.generation, "Session established");
        }
        let _ = self.events.send(SessionEvent::Established);
        Ok(())
    }

    /// Destroy the credential regardless of generation.
    ///
    /// Returns whether a credential was held.
    pub fn clear(&self, reason: TerminationReason) -> bool {
        let ended = {
            let mut state = self.state.lock();
            match state.credential.take() {
                Some(_) => {
                    state.generation += 1;
                    true
                }
                None => false,
            }
        };

        if ended {
            self.finish_termination(reason);
        }
        ended
    }

    /// Destroy the credential only if it is still the one from `generation`.
    ///
    /// Exactly one caller per generation observes `true`; only that caller's
    /// termination emits [`SessionEvent::Terminated`].
    pub fn terminate_if_current(&self, generation: u64) -> bool {
        let ended = {
            let mut state = self.state.lock();
            if state.generation == generation && state.credential.is_some() {
                state.credential = None;
                state.generation += 1;
                true
            } else {
                false
            }
        };

        if ended {
            self.finish_termination(TerminationReason::Unauthorized);
        } else {
            debug!(generation, "Credential already replaced or destroyed");
        }
        ended
    }

    fn finish_termination(&self, reason: TerminationReason) {
        if let Err(e) = self.store.delete() {
            warn!(error = %e, "Failed to delete persisted session");
        }
        info!(?reason, "Session terminated");
        let _ = self.events.send(SessionEvent::Terminated { reason });
    }

    /// Token and generation for an outgoing request.
    pub fn snapshot(&self) -> Option<CredentialSnapshot> {
        let state = self.state.lock();
        state.credential.as_ref().map(|c| CredentialSnapshot {
            token: c.token.clone(),
            generation: state.generation,
        })
    }

    /// Current credential, if any.
    pub fn credential(&self) -> Option<SessionCredential> {
        self.state.lock().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.lock().credential.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}
