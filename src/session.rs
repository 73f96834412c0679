use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, ConfigError, MAX_TTL_SECS};

/// Session key holding the signed identity token of the logged-in user.
pub const SESSION_TOKEN_KEY: &str = "session_token";

/// Opaque identifier handed to the client in the session cookie. It carries
/// no claim data; only the store can map it back to a principal.
pub type SessionId = String;

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    /// The session (or the requested key inside it) does not exist or has expired.
    #[error("session not found")]
    NotFound,

    /// The backing store failed.
    #[error("session store error: {0}")]
    Backend(String),
}

/// SessionStore
///
/// Server-side key/value storage bound to opaque session ids. Backends are
/// pluggable (memory, cache, database); every implementation must make the
/// operations on a single id linearizable, so that once `destroy` returns no
/// later `get`, `exists` or `put` on that id can observe or revive it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocates a new, empty session and returns its id.
    async fn create(&self) -> Result<SessionId, SessionError>;

    /// Writes `value` under `key`. Fails with `NotFound` on an absent or expired session.
    async fn put(&self, id: &str, key: &str, value: String) -> Result<(), SessionError>;

    /// Reads `key`. Fails with `NotFound` when the session or the key is absent.
    async fn get(&self, id: &str, key: &str) -> Result<String, SessionError>;

    async fn exists(&self, id: &str, key: &str) -> Result<bool, SessionError>;

    /// Removes the session. Idempotent.
    async fn destroy(&self, id: &str) -> Result<(), SessionError>;

    /// Evicts every expired session and returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

pub type SessionState = Arc<dyn SessionStore>;

#[derive(Debug)]
struct SessionRecord {
    data: HashMap<String, String>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// InMemorySessionStore
///
/// Process-local backend. A single `RwLock` over the whole map serialises
/// writers, which gives the per-id linearizability the trait requires.
/// A session expires `ttl` after its last successful write; reads do not
/// extend it.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let secs = config.session_ttl_secs;
        if !(1..=MAX_TTL_SECS).contains(&secs) {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_SECS",
                value: secs.to_string(),
            });
        }
        Ok(Self::new(Duration::seconds(secs)))
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, SessionError> {
        now.checked_add_signed(self.ttl).ok_or_else(|| {
            SessionError::Backend("session ttl overflows the clock".to_string())
        })
    }

    fn lookup<T>(
        &self,
        id: &str,
        read: impl FnOnce(&SessionRecord) -> T,
    ) -> Result<T, SessionError> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(id) {
                Some(record) if record.is_live(now) => return Ok(read(record)),
                None => return Err(SessionError::NotFound),
                Some(_) => {}
            }
        }
        // Expired: evict under the write lock, re-checking since the record may
        // have been refreshed or replaced in between.
        let mut sessions = self.sessions.write();
        if sessions.get(id).is_some_and(|r| !r.is_live(now)) {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "evicted expired session");
        }
        Err(SessionError::NotFound)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> Result<SessionId, SessionError> {
        let record = SessionRecord {
            data: HashMap::new(),
            expires_at: self.expiry_from(Utc::now())?,
        };
        let mut sessions = self.sessions.write();
        let mut id = Uuid::new_v4().simple().to_string();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4().simple().to_string();
        }
        sessions.insert(id.clone(), record);
        Ok(id)
    }

    async fn put(&self, id: &str, key: &str, value: String) -> Result<(), SessionError> {
        let now = Utc::now();
        let expires_at = self.expiry_from(now)?;
        let mut sessions = self.sessions.write();
        match sessions.get_mut(id) {
            Some(record) if record.is_live(now) => {
                record.data.insert(key.to_string(), value);
                record.expires_at = expires_at;
                Ok(())
            }
            Some(_) => {
                sessions.remove(id);
                Err(SessionError::NotFound)
            }
            None => Err(SessionError::NotFound),
        }
    }

    async fn get(&self, id: &str, key: &str) -> Result<String, SessionError> {
        self.lookup(id, |record| record.data.get(key).cloned())?
            .ok_or(SessionError::NotFound)
    }

    async fn exists(&self, id: &str, key: &str) -> Result<bool, SessionError> {
        match self.lookup(id, |record| record.data.contains_key(key)) {
            Ok(found) => Ok(found),
            Err(SessionError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.write().remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| record.is_live(now));
        Ok(before - sessions.len())
    }
}

// --- Cookies ---

/// Builds the cookie that hands the session id to the client.
pub fn session_cookie(config: &AppConfig, session_id: &str) -> Cookie<'static> {
    Cookie::build((config.session_cookie_name.clone(), session_id.to_string()))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(config.session_ttl_secs))
        .build()
}

/// Builds the removal cookie sent on logout.
pub fn clear_session_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((config.session_cookie_name.clone(), ""))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_after_expiry_does_not_revive() {
        let store = InMemorySessionStore::new(Duration::seconds(-1));
        let id = store.create().await.unwrap();
        assert_eq!(
            store.put(&id, SESSION_TOKEN_KEY, "t".into()).await,
            Err(SessionError::NotFound)
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn expired_sessions_are_purged() {
        let store = InMemorySessionStore::new(Duration::seconds(-1));
        store.create().await.unwrap();
        store.create().await.unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn overflowing_ttl_is_an_error_not_a_panic() {
        let store = InMemorySessionStore::new(Duration::MAX);
        assert!(matches!(store.create().await, Err(SessionError::Backend(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn out_of_range_config_ttl_is_rejected() {
        let config = AppConfig {
            session_ttl_secs: 1_000_000_000_000_000,
            ..AppConfig::default()
        };
        assert!(matches!(
            InMemorySessionStore::from_config(&config),
            Err(ConfigError::Invalid {
                var: "SESSION_TTL_SECS",
                ..
            })
        ));
    }

    #[test]
    fn session_cookie_is_hardened() {
        let config = AppConfig {
            cookie_secure: true,
            ..AppConfig::default()
        };
        let cookie = session_cookie(&config, "abc");
        assert_eq!(cookie.name(), "session_id");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }
}
