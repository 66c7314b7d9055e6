use crate::{AppState, handlers, storage::MAX_UPLOAD_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

// Multipart framing overhead on top of the file itself.
const UPLOAD_BODY_SLACK: usize = 1024 * 1024;

/// Authenticated Router Module
///
/// Routes for any logged-in user. `create_router` puts `auth_middleware` in front of the
/// whole router, so anonymous requests are rejected with 401 before reaching a handler.
///
/// Ownership is checked inside the link and schedule handlers: a regular user may change
/// only their own records, an administrator any record.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session ---
        // GET /auth/me
        .route("/auth/me", get(handlers::auth::me))
        // POST /auth/change-password
        // Requires the current password.
        .route(
            "/auth/change-password",
            post(handlers::auth::change_password),
        )
        // --- Links ---
        .route("/links", post(handlers::links::create_link))
        // PATCH/DELETE /links/{id}
        // Owner or admin; admin-only fields are rejected for regular users.
        .route(
            "/links/{id}",
            patch(handlers::links::update_link).delete(handlers::links::delete_link),
        )
        // --- Schedules ---
        .route("/schedules", post(handlers::schedules::create_schedule))
        .route(
            "/schedules/{id}",
            patch(handlers::schedules::update_schedule)
                .delete(handlers::schedules::delete_schedule),
        )
        // --- Files ---
        // POST /upload
        // Multipart upload of a single `file` field. The body limit sits just above the
        // file limit so oversized uploads fail while streaming with 413.
        .route(
            "/upload",
            post(handlers::files::upload_file)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize + UPLOAD_BODY_SLACK)),
        )
        .route("/files/info/{name}", get(handlers::files::file_info))
        // POST /theme
        // Stores the caller's theme blob; `null` clears it.
        .route("/theme", post(handlers::theme::set_theme))
}
