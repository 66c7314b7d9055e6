use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AdminUser, Requester},
    error::{AppError, AppJson},
    models::{Category, CategoryPatch, CreateCategoryRequest, MessageResponse, NewCategory},
    validation::{MAX_CATEGORY_NAME_LEN, Violations},
};

const MAX_ICON_LEN: usize = 50;

// --- Public ---

/// list_categories
///
/// [Public Route] Admin-only categories are listed for administrators only.
#[utoipa::path(
    get,
    path = "/api/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(
    requester: Requester,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let is_admin = requester.viewer().is_admin();
    Ok(Json(state.repo.list_categories(is_admin).await?))
}

/// get_category
///
/// [Public Route] One category. An admin-only category reads as 404 for non-admins.
#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Missing, or admin-only and requester is not an admin")
    )
)]
pub async fn get_category(
    requester: Requester,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, AppError> {
    let is_admin = requester.viewer().is_admin();
    state
        .repo
        .get_category(id)
        .await?
        .filter(|c| is_admin || !c.admin_only)
        .map(Json)
        .ok_or_else(|| AppError::not_found("category"))
}

// --- Admin ---

/// create_category
///
/// [Admin Route] Names are unique; a taken name answers 400 `conflict`.
#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Validation error or duplicate name")
    )
)]
pub async fn create_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let mut v = Violations::new();
    let name = v.required_text("name", &payload.name, MAX_CATEGORY_NAME_LEN);
    let color = v.optional_hex_color("color", payload.color);
    let icon = v.optional_text("icon", payload.icon, MAX_ICON_LEN);
    let description = v.optional_text("description", payload.description, usize::MAX);
    v.finish()?;

    let category = state
        .repo
        .create_category(NewCategory {
            name,
            color,
            icon,
            description,
            admin_only: payload.admin_only,
            sort_order: payload.sort_order,
        })
        .await?;
    tracing::info!(category_id = category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Admin Route] Partial update; `null` clears a nullable field. Renaming onto a taken
/// name answers 400 `conflict`.
#[utoipa::path(
    patch,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryPatch,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<CategoryPatch>,
) -> Result<Json<Category>, AppError> {
    let mut v = Violations::new();
    let cleaned = CategoryPatch {
        name: patch
            .name
            .map(|n| v.required_text("name", &n, MAX_CATEGORY_NAME_LEN)),
        color: patch.color.map(|c| v.optional_hex_color("color", c)),
        icon: patch.icon.map(|i| v.optional_text("icon", i, MAX_ICON_LEN)),
        description: patch
            .description
            .map(|d| v.optional_text("description", d, usize::MAX)),
        ..patch
    };
    v.finish()?;

    let category = state.repo.update_category(id, cleaned).await?;
    tracing::info!(category_id = id, "category updated");
    Ok(Json(category))
}

/// delete_category
///
/// [Admin Route] Links and schedules in the category survive, uncategorized.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_category(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    state.repo.delete_category(id).await?;
    tracing::info!(category_id = id, "category deleted");
    Ok(Json(MessageResponse::new("category deleted")))
}
