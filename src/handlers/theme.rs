use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::{AuthUser, Requester},
    error::{AppError, AppJson},
    models::{ThemeRequest, ThemeResponse, UserChanges},
};

/// get_theme
///
/// [Public Route] A logged-in user gets their own theme (`null` until they save one).
/// Anonymous visitors get the theme of the first administrator, so the login page matches
/// the organization's branding.
#[utoipa::path(
    get,
    path = "/api/theme",
    responses((status = 200, description = "Theme blob or null", body = ThemeResponse))
)]
pub async fn get_theme(
    requester: Requester,
    State(state): State<AppState>,
) -> Result<Json<ThemeResponse>, AppError> {
    let theme = match requester.user() {
        Some(user) => state
            .repo
            .get_user(user.id)
            .await?
            .and_then(|record| record.theme),
        None => state.repo.first_admin_theme().await?,
    };
    Ok(Json(ThemeResponse { theme }))
}

/// set_theme
///
/// [Authenticated Route] Stores the blob verbatim; `null` clears it.
#[utoipa::path(
    post,
    path = "/api/theme",
    request_body = ThemeRequest,
    responses(
        (status = 200, description = "Theme saved", body = ThemeResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn set_theme(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<ThemeRequest>,
) -> Result<Json<ThemeResponse>, AppError> {
    let updated = state
        .repo
        .update_user(
            user.id,
            UserChanges {
                theme: Some(payload.theme),
                ..Default::default()
            },
        )
        .await?;
    tracing::debug!(user_id = user.id, "theme saved");
    Ok(Json(ThemeResponse {
        theme: updated.theme,
    }))
}
