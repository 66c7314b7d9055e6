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
        CreateScheduleRequest, DownloadResponse, MessageResponse, NewSchedule, Schedule,
        SchedulePatch, ScheduleStats,
    },
    repository::ListFilter,
    validation::{MAX_TITLE_LEN, MAX_URL_LEN, Violations},
    visibility::Viewer,
};

const MAX_FILE_NAME_LEN: usize = 255;
const MAX_FILE_TYPE_LEN: usize = 100;

async fn visible_schedule(
    state: &AppState,
    viewer: Viewer,
    id: i64,
) -> Result<Schedule, AppError> {
    state
        .repo
        .get_schedule(id)
        .await?
        .filter(|s| viewer.can_see(s.user_id, s.category_admin_only))
        .ok_or_else(|| AppError::not_found("schedule"))
}

fn required_file_url(v: &mut Violations, value: &str) -> String {
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() {
        v.push("file_url", "is required");
    } else if trimmed.len() > MAX_URL_LEN {
        v.push("file_url", &format!("must be at most {MAX_URL_LEN} characters"));
    }
    trimmed
}

fn check_file_size(v: &mut Violations, size: Option<i64>) {
    if size.is_some_and(|s| s < 0) {
        v.push("file_size", "must not be negative");
    }
}

// --- Handlers ---

/// list_schedules
///
/// [Public Route] Visible schedules, same rules and ordering as links.
#[utoipa::path(
    get,
    path = "/api/schedules",
    params(ListFilter),
    responses((status = 200, description = "Visible schedules", body = [Schedule]))
)]
pub async fn list_schedules(
    requester: Requester,
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<Schedule>>, AppError> {
    let viewer = requester.viewer();
    let schedules = state.repo.list_schedules(viewer, &filter).await?;
    Ok(Json(
        schedules
            .into_iter()
            .map(|s| s.redacted(viewer.is_admin()))
            .collect(),
    ))
}

/// get_schedule
///
/// [Public Route] One schedule, subject to the listing's visibility rules.
#[utoipa::path(
    get,
    path = "/api/schedules/{id}",
    params(("id" = i64, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Schedule", body = Schedule),
        (status = 404, description = "Missing or not visible")
    )
)]
pub async fn get_schedule(
    requester: Requester,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Schedule>, AppError> {
    let viewer = requester.viewer();
    let schedule = visible_schedule(&state, viewer, id).await?;
    Ok(Json(schedule.redacted(viewer.is_admin())))
}

/// create_schedule
///
/// [Authenticated Route] `title` and `file_url` are required. Ownership follows the link
/// rules: the requester by default, any user (or none) when an admin says so. A regular
/// user's `user_id` is ignored.
#[utoipa::path(
    post,
    path = "/api/schedules",
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Schedule created", body = Schedule),
        (status = 400, description = "Validation error")
    )
)]
pub async fn create_schedule(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<Schedule>), AppError> {
    let mut v = Violations::new();
    let title = v.required_text("title", &payload.title, MAX_TITLE_LEN);
    let file_url = required_file_url(&mut v, &payload.file_url);
    let description = v.optional_text("description", payload.description, usize::MAX);
    let file_name = v.optional_text("file_name", payload.file_name, MAX_FILE_NAME_LEN);
    let file_type = v.optional_text("file_type", payload.file_type, MAX_FILE_TYPE_LEN);
    check_file_size(&mut v, payload.file_size);
    v.finish()?;

    let schedule = state
        .repo
        .create_schedule(NewSchedule {
            title,
            file_url,
            description,
            file_name,
            file_size: payload.file_size,
            file_type,
            sort_order: payload.sort_order,
            user_id: match payload.user_id {
                Some(owner) if user.is_admin => owner,
                _ => Some(user.id),
            },
            category_id: payload.category_id,
        })
        .await?;

    tracing::info!(schedule_id = schedule.id, user_id = user.id, "schedule created");
    Ok((StatusCode::CREATED, Json(schedule.redacted(user.is_admin))))
}

/// update_schedule
///
/// [Authenticated Route] Owner or admin. `is_active` is admin-only (403 otherwise), and a
/// regular user's `user_id` is ignored.
#[utoipa::path(
    patch,
    path = "/api/schedules/{id}",
    params(("id" = i64, Path, description = "Schedule id")),
    request_body = SchedulePatch,
    responses(
        (status = 200, description = "Schedule updated", body = Schedule),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_schedule(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<SchedulePatch>,
) -> Result<Json<Schedule>, AppError> {
    let existing = state
        .repo
        .get_schedule(id)
        .await?
        .ok_or_else(|| AppError::not_found("schedule"))?;
    user.viewer().authorize_change(existing.user_id)?;

    if !user.is_admin && patch.is_active.is_some() {
        return Err(AppError::forbidden("only administrators may change is_active"));
    }

    let mut v = Violations::new();
    if let Some(size) = patch.file_size {
        check_file_size(&mut v, size);
    }
    let cleaned = SchedulePatch {
        title: patch
            .title
            .map(|t| v.required_text("title", &t, MAX_TITLE_LEN)),
        file_url: patch.file_url.map(|u| required_file_url(&mut v, &u)),
        description: patch
            .description
            .map(|d| v.optional_text("description", d, usize::MAX)),
        file_name: patch
            .file_name
            .map(|n| v.optional_text("file_name", n, MAX_FILE_NAME_LEN)),
        file_type: patch
            .file_type
            .map(|t| v.optional_text("file_type", t, MAX_FILE_TYPE_LEN)),
        user_id: patch.user_id.filter(|_| user.is_admin),
        ..patch
    };
    v.finish()?;

    let schedule = state.repo.update_schedule(id, cleaned).await?;
    tracing::info!(schedule_id = id, user_id = user.id, "schedule updated");
    Ok(Json(schedule.redacted(user.is_admin)))
}

/// delete_schedule
///
/// [Authenticated Route] Owner or admin only.
#[utoipa::path(
    delete,
    path = "/api/schedules/{id}",
    params(("id" = i64, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_schedule(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let existing = state
        .repo
        .get_schedule(id)
        .await?
        .ok_or_else(|| AppError::not_found("schedule"))?;
    user.viewer().authorize_change(existing.user_id)?;

    state.repo.delete_schedule(id).await?;
    tracing::info!(schedule_id = id, user_id = user.id, "schedule deleted");
    Ok(Json(MessageResponse::new("schedule deleted")))
}

/// track_download
///
/// [Public Route] Counts a download of a visible schedule.
#[utoipa::path(
    post,
    path = "/api/schedules/{id}/download",
    params(("id" = i64, Path, description = "Schedule id")),
    responses(
        (status = 200, description = "Download recorded", body = DownloadResponse),
        (status = 404, description = "Missing or not visible")
    )
)]
pub async fn track_download(
    requester: Requester,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DownloadResponse>, AppError> {
    visible_schedule(&state, requester.viewer(), id).await?;
    let download_count = state.repo.increment_schedule_downloads(id).await?;
    Ok(Json(DownloadResponse { download_count }))
}

/// schedule_stats
///
/// [Admin Route] Totals across all schedules.
#[utoipa::path(
    get,
    path = "/api/schedules/stats",
    responses((status = 200, description = "Schedule statistics", body = ScheduleStats))
)]
pub async fn schedule_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ScheduleStats>, AppError> {
    Ok(Json(state.repo.schedule_stats().await?))
}
