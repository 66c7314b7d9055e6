use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser, Requester},
    error::{AppError, AppJson},
    models::{
        ClickResponse, CreateLinkRequest, Link, LinkPatch, LinkStats, MessageResponse, NewLink,
    },
    repository::ListFilter,
    validation::{MAX_TITLE_LEN, Violations},
    visibility::Viewer,
};

const TARGET_REQUIRED: &str = "either url or file_url is required";

/// Loads a link the viewer is allowed to see. Invisible links are indistinguishable from
/// missing ones.
async fn visible_link(state: &AppState, viewer: Viewer, id: i64) -> Result<Link, AppError> {
    state
        .repo
        .get_link(id)
        .await?
        .filter(|link| viewer.can_see(link.user_id, link.category_admin_only))
        .ok_or_else(|| AppError::not_found("link"))
}

// --- Handlers ---

/// list_links
///
/// [Public Route] Every link the requester may see, ordered by `sort_order` then title.
/// Only admins get the owner's username.
#[utoipa::path(
    get,
    path = "/api/links",
    params(ListFilter),
    responses((status = 200, description = "Visible links", body = [Link]))
)]
pub async fn list_links(
    requester: Requester,
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<Link>>, AppError> {
    let viewer = requester.viewer();
    let links = state.repo.list_links(viewer, &filter).await?;
    Ok(Json(
        links
            .into_iter()
            .map(|link| link.redacted(viewer.is_admin()))
            .collect(),
    ))
}

/// get_link
///
/// [Public Route] One link, subject to the same visibility rules as the listing.
#[utoipa::path(
    get,
    path = "/api/links/{id}",
    params(("id" = i64, Path, description = "Link id")),
    responses(
        (status = 200, description = "Link", body = Link),
        (status = 404, description = "Missing or not visible")
    )
)]
pub async fn get_link(
    requester: Requester,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Link>, AppError> {
    let viewer = requester.viewer();
    let link = visible_link(&state, viewer, id).await?;
    Ok(Json(link.redacted(viewer.is_admin())))
}

/// create_link
///
/// [Authenticated Route] The requester becomes the owner. Admins may instead name an
/// owner via `user_id` (`null` for a public link) and may attach an uploaded file through
/// `file_url`. A regular user's `user_id` is ignored; their `file_url` gets 403.
#[utoipa::path(
    post,
    path = "/api/links",
    request_body = CreateLinkRequest,
    responses(
        (status = 201, description = "Link created", body = Link),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admin-only field supplied")
    )
)]
pub async fn create_link(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateLinkRequest>,
) -> Result<(StatusCode, Json<Link>), AppError> {
    if !user.is_admin && payload.file_url.is_some() {
        return Err(AppError::forbidden("only administrators may attach files to links"));
    }

    let mut v = Violations::new();
    let title = v.required_text("title", &payload.title, MAX_TITLE_LEN);
    let url = v.optional_url("url", payload.url);
    let file_url = v.optional_url("file_url", payload.file_url);
    let image_url = v.optional_url("image_url", payload.image_url);
    let color = v.optional_hex_color("color", payload.color);
    let description = v.optional_text("description", payload.description, usize::MAX);
    if url.is_none() && file_url.is_none() {
        v.push("url", TARGET_REQUIRED);
    }
    v.finish()?;

    let owner = match payload.user_id {
        Some(owner) if user.is_admin => owner,
        _ => Some(user.id),
    };
    let link = state
        .repo
        .create_link(NewLink {
            title,
            url,
            file_url,
            description,
            color,
            image_url,
            is_public: payload.is_public,
            is_favorite: payload.is_favorite,
            sort_order: payload.sort_order,
            user_id: owner,
            category_id: payload.category_id,
        })
        .await?;

    tracing::info!(link_id = link.id, user_id = user.id, "link created");
    Ok((StatusCode::CREATED, Json(link.redacted(user.is_admin))))
}

/// update_link
///
/// [Authenticated Route] Partial update by the owner or an admin. After applying the
/// patch the link must still have a `url` or a `file_url`. Only admins may reassign
/// `user_id`; from anyone else it is ignored.
#[utoipa::path(
    patch,
    path = "/api/links/{id}",
    params(("id" = i64, Path, description = "Link id")),
    request_body = LinkPatch,
    responses(
        (status = 200, description = "Link updated", body = Link),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_link(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<LinkPatch>,
) -> Result<Json<Link>, AppError> {
    let existing = state
        .repo
        .get_link(id)
        .await?
        .ok_or_else(|| AppError::not_found("link"))?;
    user.viewer().authorize_change(existing.user_id)?;

    if !user.is_admin && patch.file_url.is_some() {
        return Err(AppError::forbidden("only administrators may change file_url"));
    }

    let mut v = Violations::new();
    let cleaned = LinkPatch {
        title: patch
            .title
            .map(|t| v.required_text("title", &t, MAX_TITLE_LEN)),
        url: patch.url.map(|u| v.optional_url("url", u)),
        file_url: patch.file_url.map(|u| v.optional_url("file_url", u)),
        image_url: patch.image_url.map(|u| v.optional_url("image_url", u)),
        color: patch.color.map(|c| v.optional_hex_color("color", c)),
        description: patch
            .description
            .map(|d| v.optional_text("description", d, usize::MAX)),
        user_id: patch.user_id.filter(|_| user.is_admin),
        ..patch
    };

    let url_after = cleaned.url.clone().unwrap_or(existing.url);
    let file_url_after = cleaned.file_url.clone().unwrap_or(existing.file_url);
    if url_after.is_none() && file_url_after.is_none() {
        v.push("url", TARGET_REQUIRED);
    }
    v.finish()?;

    let link = state.repo.update_link(id, cleaned).await?;
    tracing::info!(link_id = id, user_id = user.id, "link updated");
    Ok(Json(link.redacted(user.is_admin)))
}

/// delete_link
///
/// [Authenticated Route] Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/links/{id}",
    params(("id" = i64, Path, description = "Link id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_link(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let existing = state
        .repo
        .get_link(id)
        .await?
        .ok_or_else(|| AppError::not_found("link"))?;
    user.viewer().authorize_change(existing.user_id)?;

    state.repo.delete_link(id).await?;
    tracing::info!(link_id = id, user_id = user.id, "link deleted");
    Ok(Json(MessageResponse::new("link deleted")))
}

/// track_click
///
/// [Public Route] Counts a click on a visible link and returns the new total.
#[utoipa::path(
    post,
    path = "/api/links/{id}/click",
    params(("id" = i64, Path, description = "Link id")),
    responses(
        (status = 200, description = "Click recorded", body = ClickResponse),
        (status = 404, description = "Missing or not visible")
    )
)]
pub async fn track_click(
    requester: Requester,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ClickResponse>, AppError> {
    visible_link(&state, requester.viewer(), id).await?;
    let click_count = state.repo.increment_link_clicks(id).await?;
    Ok(Json(ClickResponse { click_count }))
}

/// link_stats
///
/// [Admin Route] Totals across all links.
#[utoipa::path(
    get,
    path = "/api/links/stats",
    responses((status = 200, description = "Link statistics", body = LinkStats))
)]
pub async fn link_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<LinkStats>, AppError> {
    Ok(Json(state.repo.link_stats().await?))
}
