use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::AdminUser,
    error::{AppError, AppJson},
    models::{
        Color, ColorPalette, ColorPatch, ColorValidation, CreateColorRequest, MessageResponse,
        NewColor, ValidateColorRequest,
    },
    validation::{MAX_COLOR_NAME_LEN, Violations, is_hex_color},
};

// Values are stored uppercase so `#abcdef` and `#ABCDEF` collide on the unique index.
fn color_value(v: &mut Violations, raw: &str) -> String {
    v.hex_color("value", raw).to_ascii_uppercase()
}

/// palette
///
/// Buckets active colors by keywords in their name. Unnamed colors are custom.
pub fn palette(colors: Vec<Color>) -> ColorPalette {
    let mut palette = ColorPalette::default();
    for color in colors.into_iter().filter(|c| c.is_active) {
        let name = color.name.as_deref().unwrap_or_default().to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| name.contains(w));
        let bucket = if has(&["primary", "main", "blue"]) {
            &mut palette.primary
        } else if has(&["secondary", "accent", "green"]) {
            &mut palette.secondary
        } else if has(&["gray", "grey", "black", "white"]) {
            &mut palette.neutral
        } else {
            &mut palette.custom
        };
        bucket.push(color);
    }
    palette
}

// --- Public ---

/// list_colors
///
/// [Public Route] The whole palette, ordered by `sort_order` then name.
#[utoipa::path(
    get,
    path = "/api/colors",
    responses((status = 200, description = "All colors", body = [Color]))
)]
pub async fn list_colors(State(state): State<AppState>) -> Result<Json<Vec<Color>>, AppError> {
    Ok(Json(state.repo.list_colors().await?))
}

/// get_color
///
/// [Public Route] One color by id.
#[utoipa::path(
    get,
    path = "/api/colors/{id}",
    params(("id" = i64, Path, description = "Color id")),
    responses(
        (status = 200, description = "Color", body = Color),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_color(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Color>, AppError> {
    state
        .repo
        .get_color(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("color"))
}

/// get_palette
///
/// [Public Route] Active colors grouped for the color picker.
#[utoipa::path(
    get,
    path = "/api/colors/palette",
    responses((status = 200, description = "Grouped palette", body = ColorPalette))
)]
pub async fn get_palette(State(state): State<AppState>) -> Result<Json<ColorPalette>, AppError> {
    let colors = state.repo.list_colors().await?;
    Ok(Json(palette(colors)))
}

/// validate_color
///
/// [Public Route] Checks a `#RRGGBB` value without storing anything.
#[utoipa::path(
    post,
    path = "/api/colors/validate",
    request_body = ValidateColorRequest,
    responses((status = 200, description = "Validation result", body = ColorValidation))
)]
pub async fn validate_color(AppJson(payload): AppJson<ValidateColorRequest>) -> Json<ColorValidation> {
    let value = payload.value.trim().to_string();
    Json(ColorValidation {
        valid: is_hex_color(&value),
        value,
    })
}

// --- Admin ---

/// create_color
///
/// [Admin Route] A duplicate value answers 400 `conflict`. Creating a default color takes
/// the flag away from the previous one.
#[utoipa::path(
    post,
    path = "/api/colors",
    request_body = CreateColorRequest,
    responses(
        (status = 201, description = "Color created", body = Color),
        (status = 400, description = "Invalid or duplicate value")
    )
)]
pub async fn create_color(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateColorRequest>,
) -> Result<(StatusCode, Json<Color>), AppError> {
    let mut v = Violations::new();
    let value = color_value(&mut v, &payload.value);
    let name = v.optional_text("name", payload.name, MAX_COLOR_NAME_LEN);
    let description = v.optional_text("description", payload.description, usize::MAX);
    v.finish()?;

    let color = state
        .repo
        .create_color(NewColor {
            name,
            value,
            description,
            is_default: payload.is_default,
            sort_order: payload.sort_order,
        })
        .await?;
    tracing::info!(color_id = color.id, value = %color.value, "color created");
    Ok((StatusCode::CREATED, Json(color)))
}

/// update_color
///
/// [Admin Route] Partial update. Marking a color default clears the flag elsewhere.
#[utoipa::path(
    patch,
    path = "/api/colors/{id}",
    params(("id" = i64, Path, description = "Color id")),
    request_body = ColorPatch,
    responses(
        (status = 200, description = "Color updated", body = Color),
        (status = 400, description = "Invalid or duplicate value"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_color(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<ColorPatch>,
) -> Result<Json<Color>, AppError> {
    let mut v = Violations::new();
    let cleaned = ColorPatch {
        value: patch.value.map(|value| color_value(&mut v, &value)),
        name: patch
            .name
            .map(|n| v.optional_text("name", n, MAX_COLOR_NAME_LEN)),
        description: patch
            .description
            .map(|d| v.optional_text("description", d, usize::MAX)),
        ..patch
    };
    v.finish()?;

    let color = state.repo.update_color(id, cleaned).await?;
    tracing::info!(color_id = id, "color updated");
    Ok(Json(color))
}

/// delete_color
///
/// [Admin Route] Removes one color.
#[utoipa::path(
    delete,
    path = "/api/colors/{id}",
    params(("id" = i64, Path, description = "Color id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_color(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.repo.delete_color(id).await?;
    tracing::info!(color_id = id, "color deleted");
    Ok(Json(MessageResponse::new("color deleted")))
}
