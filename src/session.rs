use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;

/// Name of the cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "facilita_session";

/// SessionClaims
///
/// Payload of the signed cookie token. The signature only proves the token was minted by
/// this server; whether the session is still alive is decided by the `SessionStore`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Session id, the key into the server-side store.
    pub sid: Uuid,
    /// The logged-in user.
    pub sub: i64,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: i64,
    expires_at: Instant,
}

/// SessionStore
///
/// Process-local session registry, built once in `main` and shared through `AppState`.
/// Logging out or deleting a user revokes the server-side entry, which a bare signed token
/// could not express. State is lost on restart.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// create
    ///
    /// Opens a session for `user_id` and returns the signed token to place in the cookie.
    pub async fn create(&self, user_id: i64) -> Result<String, AppError> {
        let sid = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = SessionClaims {
            sid,
            sub: user_id,
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("session token signing failed: {e}")))?;

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            sid,
            SessionEntry {
                user_id,
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(token)
    }

    /// resolve
    ///
    /// Returns the user behind a token, or `None` when the token is forged, malformed,
    /// expired, or its session was revoked. Expired entries are purged on sight.
    pub async fn resolve(&self, token: &str) -> Option<i64> {
        let claims = self.verify(token)?;

        let entry = self.sessions.read().await.get(&claims.sid).cloned()?;
        if entry.expires_at <= Instant::now() {
            self.sessions.write().await.remove(&claims.sid);
            return None;
        }
        (entry.user_id == claims.sub).then_some(entry.user_id)
    }

    /// Drops the session named by `token`, if any. Unknown or invalid tokens are ignored.
    pub async fn revoke(&self, token: &str) {
        if let Some(claims) = self.verify(token) {
            self.sessions.write().await.remove(&claims.sid);
        }
    }

    /// Drops every session belonging to `user_id`.
    pub async fn revoke_user(&self, user_id: i64) {
        self.sessions
            .write()
            .await
            .retain(|_, entry| entry.user_id != user_id);
    }

    pub async fn purge_expired(&self) {
        let now = Instant::now();
        self.sessions
            .write()
            .await
            .retain(|_, entry| entry.expires_at > now);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn verify(&self, token: &str) -> Option<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .ok()
    }
}
