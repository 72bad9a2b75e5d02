//! Session records and the storage seam behind the session cookie.

use async_trait::async_trait;
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use super::{config::IndieAuthConfig, error::SessionError};

const SESSION_ID_BYTES: usize = 32;

/// Per-visitor state. The only field the gate cares about is `logged_in`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    id: String,
    logged_in: bool,
    is_new: bool,
}

impl Session {
    /// Start a fresh, unauthenticated session with a random id.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn new() -> Result<Self, SessionError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(SessionError::Entropy)?;
        Ok(Self {
            id: Base64UrlUnpadded::encode_string(&bytes),
            logged_in: false,
            is_new: true,
        })
    }

    /// Rebuild a session a store already knows about.
    #[must_use]
    pub fn existing(id: impl Into<String>, logged_in: bool) -> Self {
        Self {
            id: id.into(),
            logged_in,
            is_new: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn logged_in(&self) -> bool {
        self.logged_in
    }

    /// True when the visitor does not hold a cookie for this session yet.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
    }
}

#[must_use]
pub fn is_authenticated(session: &Session) -> bool {
    session.logged_in
}

/// Backend holding session records keyed by the id carried in the cookie.
///
/// Expiry and persistence are up to the implementation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<Session>, SessionError>;
    async fn save(&self, session: &Session) -> Result<(), SessionError>;
}

/// Process-local store; sessions are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, bool>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<dyn SessionStore> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(id)
            .map(|logged_in| Session::existing(id, *logged_in)))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.logged_in);
        Ok(())
    }
}

/// Resolve the request's session, starting a new one when the cookie is
/// missing or unknown to the store.
///
/// Unknown ids are never adopted, so a visitor cannot pick their own id.
///
/// # Errors
/// Returns an error if the store fails or no id can be generated.
pub async fn load_session(
    store: &dyn SessionStore,
    headers: &HeaderMap,
    cookie_name: &str,
) -> Result<Session, SessionError> {
    if let Some(id) = extract_session_id(headers, cookie_name) {
        if let Some(session) = store.load(&id).await? {
            return Ok(session);
        }
    }
    Session::new()
}

/// Build the `HttpOnly` cookie carrying the session id.
pub fn session_cookie(
    config: &IndieAuthConfig,
    session: &Session,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        config.cookie_name(),
        session.id
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_id(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == cookie_name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
