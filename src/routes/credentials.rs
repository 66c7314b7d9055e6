use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Credential Router Module
///
/// The two endpoints that accept a password from an unauthenticated client. `create_router`
/// wraps this router in the auth rate limiter to slow down credential stuffing.
pub fn credential_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/login
        // Sets the session cookie on success.
        .route("/auth/login", post(handlers::auth::login))
        // POST /auth/register
        // Self-service signup; always creates a regular user.
        .route("/auth/register", post(handlers::auth::register))
}
