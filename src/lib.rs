use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, header},
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod session;
pub mod storage;
pub mod validation;
pub mod visibility;

// Module for routing segregation (Public, Credentials, Authenticated, Admin).
pub mod routes;
use auth::{AdminUser, AuthUser};
use config::Env;
use error::ErrorDetail;
use rate_limit::{RateLimiter, rate_limit_middleware};
use routes::{admin, authenticated, credentials, public};
use session::SessionStore;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalDiskStorage, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::logout, handlers::auth::register,
        handlers::auth::me, handlers::auth::change_password,
        handlers::links::list_links, handlers::links::get_link, handlers::links::create_link,
        handlers::links::update_link, handlers::links::delete_link, handlers::links::track_click,
        handlers::links::link_stats,
        handlers::schedules::list_schedules, handlers::schedules::get_schedule,
        handlers::schedules::create_schedule, handlers::schedules::update_schedule,
        handlers::schedules::delete_schedule, handlers::schedules::track_download,
        handlers::schedules::schedule_stats,
        handlers::categories::list_categories, handlers::categories::get_category,
        handlers::categories::create_category, handlers::categories::update_category,
        handlers::categories::delete_category,
        handlers::colors::list_colors, handlers::colors::get_color, handlers::colors::get_palette,
        handlers::colors::validate_color, handlers::colors::create_color,
        handlers::colors::update_color, handlers::colors::delete_color,
        handlers::users::list_users, handlers::users::get_user, handlers::users::create_user,
        handlers::users::update_user, handlers::users::delete_user, handlers::users::user_stats,
        handlers::files::upload_file, handlers::files::serve_file, handlers::files::file_info,
        handlers::files::list_files, handlers::files::delete_file,
        handlers::theme::get_theme, handlers::theme::set_theme
    ),
    components(
        schemas(
            models::Category, models::Color, models::Link, models::Schedule,
            models::LoginRequest, models::ChangePasswordRequest,
            models::CreateCategoryRequest, models::CategoryPatch,
            models::CreateColorRequest, models::ColorPatch, models::ValidateColorRequest,
            models::CreateUserRequest, models::UserPatch,
            models::CreateLinkRequest, models::LinkPatch,
            models::CreateScheduleRequest, models::SchedulePatch, models::ThemeRequest,
            models::MessageResponse, models::MeResponse, models::UserResponse,
            models::ThemeResponse, models::ClickResponse, models::DownloadResponse,
            models::ColorValidation, models::ColorPalette,
            models::LinkStats, models::ScheduleStats, models::UserStats,
            models::UploadResponse, models::FileInfo, models::FileListResponse, error::FieldError,
        )
    ),
    tags(
        (name = "facilita", description = "Intranet links, schedules and uploads API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single shared container of services and configuration, cloned into every request.
/// All members are cheap `Arc` handles.
#[derive(Clone)]
pub struct AppState {
    /// Persistence, Postgres in production and in-memory in tests.
    pub repo: RepositoryState,
    /// Upload store rooted at `config.upload_dir`.
    pub storage: StorageState,
    pub sessions: SessionStore,
    /// Budget for every `/api` request.
    pub api_limiter: RateLimiter,
    /// Tighter budget for login and registration.
    pub auth_limiter: RateLimiter,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the session store and both rate limiters from `config`.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        let ttl = Duration::from_secs(config.session_ttl_hours.saturating_mul(3600));
        Self {
            repo,
            storage,
            sessions: SessionStore::new(&config.session_secret, ttl),
            api_limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
            auth_limiter: RateLimiter::per_minute(config.auth_rate_limit_per_minute),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Extractors depend on the pieces they need rather than on the whole AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(app_state: &AppState) -> SessionStore {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards `authenticated_routes`. Extracting `AuthUser` rejects anonymous requests and
/// stale sessions with 401 before the handler runs. The resolved identity is cached in
/// the request extensions, so the handler's own extractor does not hit the store again.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Guards `admin_routes`: 401 when anonymous, 403 for regular users.
async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// expose_error_detail
///
/// Local environment only. Copies the hidden cause of a 500 (`ErrorDetail`) into the JSON
/// body as `detail`. Production responses never carry it.
async fn expose_error_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };

    let body = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut json) => {
            if let Some(object) = json.as_object_mut() {
                object.insert("detail".into(), serde_json::Value::String(detail));
            }
            serde_json::to_vec(&json).unwrap_or_else(|_| bytes.to_vec())
        }
        Err(_) => bytes.to_vec(),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

/// create_router
///
/// Assembles the `/api` surface from the four access-level routers, applies scoped and
/// global middleware, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. API Router Assembly
    let api = Router::new()
        // Public Routes: visibility is enforced per record.
        .merge(public::public_routes())
        // Credential Routes: stricter per-IP budget.
        .merge(
            credentials::credential_routes().route_layer(middleware::from_fn_with_state(
                state.auth_limiter.clone(),
                rate_limit_middleware,
            )),
        )
        // Authenticated Routes: any live session.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        // Admin Routes: administrators only.
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), admin_middleware)),
        )
        // General rate limit across the whole API.
        .layer(middleware::from_fn_with_state(
            state.api_limiter.clone(),
            rate_limit_middleware,
        ));

    let mut router = Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        .nest("/api", api)
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state.clone());

    if state.config.env == Env::Local {
        router = router.layer(middleware::from_fn(expose_error_detail));
    }

    // 3. Response Hardening
    let router = router
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ));

    // 4. Observability and Correlation Layers
    router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// spawn_housekeeping
///
/// Periodically drops expired sessions and idle rate-limit entries so the process-local
/// maps do not grow without bound.
pub fn spawn_housekeeping(state: &AppState) -> tokio::task::JoinHandle<()> {
    let sessions = state.sessions.clone();
    let limiters = [state.api_limiter.clone(), state.auth_limiter.clone()];
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sessions.purge_expired().await;
            for limiter in &limiters {
                limiter.purge_stale().await;
            }
        }
    })
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span, correlating every log line of a request through its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
