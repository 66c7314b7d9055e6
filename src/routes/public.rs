use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without logging in. Reads of links and schedules still go through
/// the visibility predicate, so an anonymous visitor only ever sees public records outside
/// admin-only categories.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/logout
        // Always succeeds; a missing or stale cookie is simply cleared.
        .route("/auth/logout", post(handlers::auth::logout))
        // --- Links & Schedules ---
        // GET /links?category_id=...&search=...
        .route("/links", get(handlers::links::list_links))
        .route("/links/{id}", get(handlers::links::get_link))
        // POST /links/{id}/click
        // Anyone who can see the link may count a click.
        .route("/links/{id}/click", post(handlers::links::track_click))
        .route("/schedules", get(handlers::schedules::list_schedules))
        .route("/schedules/{id}", get(handlers::schedules::get_schedule))
        .route(
            "/schedules/{id}/download",
            post(handlers::schedules::track_download),
        )
        // --- Catalog ---
        // GET /categories
        // Admin-only categories are filtered out for everyone but administrators.
        .route("/categories", get(handlers::categories::list_categories))
        .route("/categories/{id}", get(handlers::categories::get_category))
        .route("/colors", get(handlers::colors::list_colors))
        .route("/colors/palette", get(handlers::colors::get_palette))
        .route("/colors/validate", post(handlers::colors::validate_color))
        .route("/colors/{id}", get(handlers::colors::get_color))
        // GET /files/{name}
        // Serves uploaded bytes. The storage layer rejects names escaping the upload root.
        .route("/files/{name}", get(handlers::files::serve_file))
        // GET /theme
        // Falls back to the first administrator's theme for anonymous visitors.
        .route("/theme", get(handlers::theme::get_theme))
}
