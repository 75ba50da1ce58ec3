//! Session - the single owner of the sign-in triplet (token, email, level)
//!
//! Every outbound call reads the token from here and any call that comes
//! back unauthorized invalidates it here. Components that care (navigation,
//! menus) subscribe to [`SessionEvent`]s instead of re-reading storage.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use shared::models::{LoginResponse, STAFF_LEVEL_MAX};
use tokio::sync::broadcast;

use crate::{ClientError, ClientResult};

// ============================================================================
// Session data
// ============================================================================

/// Persisted session triplet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub token: Option<String>,
    pub email: Option<String>,
    pub level: Option<i32>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        self.token.is_none()
    }

    /// Expiry (unix seconds) of the stored token, if it carries one
    pub fn token_expires_at(&self) -> Option<u64> {
        self.token.as_deref().and_then(token_expires_at)
    }

    pub fn is_expired(&self, now_unix: u64) -> bool {
        self.token_expires_at().is_some_and(|exp| exp <= now_unix)
    }
}

/// Read the `exp` claim of a JWT without verifying it
///
/// Returns `None` for tokens that are not three dot-separated segments or
/// whose payload has no numeric `exp`.
pub fn token_expires_at(token: &str) -> Option<u64> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1].trim_end_matches('=')).ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).ok()?;
    payload.get("exp")?.as_u64()
}

// ============================================================================
// Events
// ============================================================================

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// An API call came back 401
    Unauthorized,
    /// The stored token had expired
    Expired,
    /// The user signed out
    SignedOut,
}

impl fmt::Display for InvalidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthorized => "unauthorized",
            Self::Expired => "expired",
            Self::SignedOut => "signed_out",
        })
    }
}

/// Change notification published by [`Session`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn {
        email: Option<String>,
    },
    Invalidated {
        reason: InvalidationReason,
        /// Navigation target, the login entry point
        redirect_to: String,
    },
}

// ============================================================================
// Stores
// ============================================================================

/// Persistence for the session triplet
pub trait SessionStore: Send + Sync + fmt::Debug {
    fn load(&self) -> ClientResult<Option<SessionData>>;
    fn save(&self, data: &SessionData) -> ClientResult<()>;
    fn clear(&self) -> ClientResult<()>;
}

/// Process-local store, forgotten on exit
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    data: RwLock<Option<SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: SessionData) -> Self {
        Self {
            data: RwLock::new(Some(data)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> ClientResult<Option<SessionData>> {
        Ok(self.data.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, data: &SessionData) -> ClientResult<()> {
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = Some(data.clone());
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> ClientResult<Option<SessionData>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ClientError::Store(format!("Failed to read session file: {}", e)))?;
        let data = serde_json::from_str(&content)
            .map_err(|e| ClientError::Store(format!("Failed to parse session file: {}", e)))?;
        Ok(Some(data))
    }

    fn save(&self, data: &SessionData) -> ClientResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::Store(format!("Failed to create directory: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, content)
            .map_err(|e| ClientError::Store(format!("Failed to write session file: {}", e)))?;
        Ok(())
    }

    fn clear(&self) -> ClientResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Store(format!(
                "Failed to remove session file: {}",
                e
            ))),
        }
    }
}

// ============================================================================
// Session
// ============================================================================

struct SessionInner {
    data: RwLock<SessionData>,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
    login_path: String,
    redirect: RwLock<Option<String>>,
}

/// Shared session handle
///
/// Cheap to clone; all clones see the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.snapshot();
        f.debug_struct("Session")
            .field("authenticated", &data.token.is_some())
            .field("email", &data.email)
            .field("level", &data.level)
            .finish()
    }
}

impl Session {
    /// Anonymous session backed by `store`
    pub fn new(store: Arc<dyn SessionStore>, login_path: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                data: RwLock::new(SessionData::default()),
                store,
                events,
                login_path: login_path.into(),
                redirect: RwLock::new(None),
            }),
        }
    }

    /// In-memory anonymous session
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), "/login")
    }

    /// Session loaded from `store`; an expired token is dropped and the
    /// store cleared
    pub fn restore(store: Arc<dyn SessionStore>, login_path: impl Into<String>) -> ClientResult<Self> {
        let session = Self::new(store, login_path);
        let Some(data) = session.inner.store.load()? else {
            return Ok(session);
        };

        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if data.is_expired(now) {
            tracing::info!(email = ?data.email, "Stored session expired, discarding");
            session.inner.store.clear()?;
            return Ok(session);
        }

        tracing::debug!(email = ?data.email, "Session restored");
        *session.write_data() = data;
        Ok(session)
    }

    fn write_data(&self) -> std::sync::RwLockWriteGuard<'_, SessionData> {
        self.inner.data.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> SessionData {
        self.inner
            .data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn token(&self) -> Option<String> {
        self.snapshot().token
    }

    pub fn email(&self) -> Option<String> {
        self.snapshot().email
    }

    pub fn level(&self) -> Option<i32> {
        self.snapshot().level
    }

    pub fn is_authenticated(&self) -> bool {
        !self.snapshot().is_empty()
    }

    /// Admin, owner or manager
    pub fn is_staff(&self) -> bool {
        self.level().is_some_and(|level| level <= STAFF_LEVEL_MAX)
    }

    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }

    /// Login entry point, carrying `return_to` so the user lands back there
    pub fn login_target(&self, return_to: Option<&str>) -> String {
        match return_to {
            Some(path) if !path.is_empty() => format!(
                "{}?redirect={}",
                self.inner.login_path,
                urlencoding::encode(path)
            ),
            _ => self.inner.login_path.clone(),
        }
    }

    /// Navigation target left by the last invalidation, consumed once
    pub fn take_redirect(&self) -> Option<String> {
        self.inner
            .redirect
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Store a fresh login
    ///
    /// `fallback_email` is used when the response does not echo the email.
    pub fn sign_in(&self, response: &LoginResponse, fallback_email: &str) -> ClientResult<()> {
        let data = SessionData {
            token: Some(response.access_token.clone()),
            email: response
                .user_email
                .clone()
                .or_else(|| Some(fallback_email.to_string())),
            level: response.level,
        };
        self.inner.store.save(&data)?;
        let email = data.email.clone();
        *self.write_data() = data;
        *self.inner.redirect.write().unwrap_or_else(|e| e.into_inner()) = None;

        tracing::info!(email = ?email, "Signed in");
        // No receivers is fine
        let _ = self.inner.events.send(SessionEvent::SignedIn { email });
        Ok(())
    }

    /// Tear the session down and publish the login target
    ///
    /// Never fails: a store error is logged and the in-memory session is
    /// cleared regardless.
    pub fn invalidate(&self, reason: InvalidationReason) -> String {
        let previous = std::mem::take(&mut *self.write_data());
        if let Err(e) = self.inner.store.clear() {
            tracing::error!(error = %e, "Failed to clear session store");
        }

        let redirect_to = self.inner.login_path.clone();
        *self.inner.redirect.write().unwrap_or_else(|e| e.into_inner()) = Some(redirect_to.clone());

        tracing::warn!(
            reason = %reason,
            email = ?previous.email,
            "Session invalidated"
        );
        let _ = self.inner.events.send(SessionEvent::Invalidated {
            reason,
            redirect_to: redirect_to.clone(),
        });
        redirect_to
    }

    pub fn sign_out(&self) -> String {
        self.invalidate(InvalidationReason::SignedOut)
    }
}
