use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use cookie::{Cookie, SameSite};

use crate::{
    error::AppError,
    models::{NewUser, User},
    repository::RepositoryState,
    session::{SESSION_COOKIE, SessionStore},
    visibility::Viewer,
};

/// AuthUser
///
/// The resolved identity of a logged-in request. Re-read from the repository on every
/// request, so role changes and deactivation take effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn viewer(&self) -> Viewer {
        if self.is_admin {
            Viewer::Admin(self.id)
        } else {
            Viewer::User(self.id)
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Requester
///
/// Identity context of any request, logged in or not. Public endpoints whose answer
/// depends on who is asking (listings, theme) take this extractor.
#[derive(Debug, Clone)]
pub enum Requester {
    Anonymous,
    User(AuthUser),
}

impl Requester {
    pub fn viewer(&self) -> Viewer {
        match self {
            Requester::Anonymous => Viewer::Anonymous,
            Requester::User(user) => user.viewer(),
        }
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Requester::Anonymous => None,
            Requester::User(user) => Some(user),
        }
    }
}

/// AdminUser
///
/// Extractor that only succeeds for administrators: 401 when anonymous, 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Requester Extractor Implementation
///
/// 1. No cookie, or a forged, expired or revoked token: anonymous.
/// 2. Valid session whose user no longer exists or was deactivated: the session is
///    dropped and the request rejected with 401.
///
/// The result is cached in the request extensions so the route-layer middleware and the
/// handler share one lookup.
impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<Requester>() {
            return Ok(cached.clone());
        }

        let Some(token) = session_token(&parts.headers) else {
            return Ok(Requester::Anonymous);
        };
        let sessions = SessionStore::from_ref(state);
        let Some(user_id) = sessions.resolve(&token).await else {
            return Ok(Requester::Anonymous);
        };

        let repo = RepositoryState::from_ref(state);
        let requester = match repo.get_user(user_id).await? {
            Some(user) if user.is_active => Requester::User(AuthUser::from(&user)),
            _ => {
                tracing::info!(user_id, "dropping session of missing or inactive user");
                sessions.revoke(&token).await;
                return Err(AppError::Unauthorized);
            }
        };

        parts.extensions.insert(requester.clone());
        Ok(requester)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Requester::from_request_parts(parts, state).await? {
            Requester::User(user) => Ok(user),
            Requester::Anonymous => Err(AppError::Unauthorized),
        }
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}

// --- Cookies ---

/// Reads the session token out of the `Cookie` header(s), if present.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// Builds the `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: String, ttl: Duration, secure: bool) -> String {
    let max_age = cookie::time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
        .to_string()
}

/// Builds the `Set-Cookie` value that deletes the session cookie.
pub fn clear_session_cookie() -> String {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie.to_string()
}

// --- Passwords ---

/// hash_password
///
/// Argon2id with a random salt, encoded as a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Constant-time check of `password` against a stored PHC hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// ensure_admin_account
///
/// Startup bootstrap: creates `username` as an administrator unless an account with that
/// name already exists. An existing account is left untouched.
pub async fn ensure_admin_account(
    repo: &RepositoryState,
    username: &str,
    password: &str,
) -> Result<(), AppError> {
    if repo.find_user_by_username(username).await?.is_some() {
        return Ok(());
    }
    repo.create_user(NewUser {
        username: username.to_string(),
        password_hash: hash_password(password)?,
        is_admin: true,
    })
    .await?;
    tracing::info!(username, "created bootstrap admin account");
    Ok(())
}
