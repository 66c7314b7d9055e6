use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{
        AuthUser, clear_session_cookie, hash_password, session_cookie, session_token,
        verify_password,
    },
    config::Env,
    error::{AppError, AppJson},
    models::{
        ChangePasswordRequest, LoginRequest, MeResponse, MessageResponse, NewUser,
        RegisterRequest, UserChanges,
    },
    validation::{Violations, check_password, normalize_username},
};

/// login
///
/// [Public Route, rate limited] Verifies credentials and opens a session. Unknown users,
/// wrong passwords and deactivated accounts all answer the same 401.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = MessageResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = payload.username.trim().to_lowercase();
    let user = match state.repo.find_user_by_username(&username).await? {
        Some(user) if user.is_active && verify_password(&payload.password, &user.password_hash) => {
            user
        }
        _ => {
            tracing::warn!(username = %username, "failed login attempt");
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = state.sessions.create(user.id).await?;
    state.repo.record_login(user.id).await?;
    tracing::info!(user_id = user.id, "user logged in");

    let cookie = session_cookie(
        token,
        state.sessions.ttl(),
        state.config.env == Env::Production,
    );
    Ok(([(header::SET_COOKIE, cookie)], Json(MessageResponse::new("ok"))))
}

/// logout
///
/// [Public Route] Drops the server-side session, if any, and always clears the cookie.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token).await;
    }
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(MessageResponse::new("logged out")),
    )
}

/// register
///
/// [Public Route, rate limited] Self-service signup. Always creates a regular user and
/// does not log them in.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Account created", body = MeResponse),
        (status = 400, description = "Invalid input or username taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<MeResponse>), AppError> {
    let mut violations = Violations::new();
    let username = normalize_username(&payload.username)
        .inspect_err(|msg| violations.push("username", msg))
        .unwrap_or_default();
    if let Err(msg) = check_password(&payload.password) {
        violations.push("password", msg);
    }
    violations.finish()?;

    let user = state
        .repo
        .create_user(NewUser {
            username,
            password_hash: hash_password(&payload.password)?,
            is_admin: false,
        })
        .await?;
    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(MeResponse::from(user))))
}

/// me
///
/// [Authenticated Route] The current user's profile and theme.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MeResponse>, AppError> {
    let record = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(MeResponse::from(record)))
}

/// change_password
///
/// [Authenticated Route] Requires the current password. A wrong old password is reported
/// as a field error, not a 401, so the session is not mistaken for expired.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong old password or weak new password")
    )
)]
pub async fn change_password(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let record = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let mut violations = Violations::new();
    violations.check(
        "old_password",
        verify_password(&payload.old_password, &record.password_hash),
        "is incorrect",
    );
    if let Err(msg) = check_password(&payload.new_password) {
        violations.push("new_password", msg);
    }
    violations.finish()?;

    state
        .repo
        .update_user(
            user.id,
            UserChanges {
                password_hash: Some(hash_password(&payload.new_password)?),
                ..Default::default()
            },
        )
        .await?;
    tracing::info!(user_id = user.id, "password changed");
    Ok(Json(MessageResponse::new("password changed")))
}
