use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Admin Router Module
///
/// Catalog maintenance, user management, statistics and upload housekeeping. The whole
/// router sits behind `admin_middleware` (401 for anonymous, 403 for regular users), and
/// every handler additionally extracts `AdminUser`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Statistics ---
        .route("/links/stats", get(handlers::links::link_stats))
        .route("/schedules/stats", get(handlers::schedules::schedule_stats))
        // GET /users/stats
        // Dashboard counters across users, links, schedules, categories and colors.
        .route("/users/stats", get(handlers::users::user_stats))
        // --- Categories ---
        .route("/categories", post(handlers::categories::create_category))
        .route(
            "/categories/{id}",
            patch(handlers::categories::update_category)
                .delete(handlers::categories::delete_category),
        )
        // --- Colors ---
        // POST /colors
        // Values are unique; creating a default color clears the previous default.
        .route("/colors", post(handlers::colors::create_color))
        .route(
            "/colors/{id}",
            patch(handlers::colors::update_color).delete(handlers::colors::delete_color),
        )
        // --- Users ---
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        // DELETE /users/{id}
        // Cascades to the user's links and schedules. Deleting oneself is refused.
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // --- Files ---
        .route("/files", get(handlers::files::list_files))
        .route(
            "/files/{name}",
            axum::routing::delete(handlers::files::delete_file),
        )
}
