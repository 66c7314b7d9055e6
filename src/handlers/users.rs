use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AdminUser, hash_password},
    error::{AppError, AppJson},
    models::{
        CreateUserRequest, MessageResponse, NewUser, UserChanges, UserPatch, UserResponse,
        UserStats,
    },
    validation::{Violations, check_password, normalize_username},
};

// Every route in this module sits behind the admin route layer and also extracts
// `AdminUser`, so none of them trusts the router alone.

/// list_users
///
/// [Admin Route] Every account, ordered by username.
#[utoipa::path(
    get,
    path = "/api/users",
    responses((status = 200, description = "All users, by username", body = [UserResponse]))
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// get_user
///
/// [Admin Route] One account by id.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_user(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    state
        .repo
        .get_user(id)
        .await?
        .map(|user| Json(UserResponse::from(user)))
        .ok_or_else(|| AppError::not_found("user"))
}

/// create_user
///
/// [Admin Route] Unlike self-registration, the admin may create other administrators.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input or username taken")
    )
)]
pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let mut v = Violations::new();
    let username = normalize_username(&payload.username)
        .inspect_err(|msg| v.push("username", msg))
        .unwrap_or_default();
    if let Err(msg) = check_password(&payload.password) {
        v.push("password", msg);
    }
    v.finish()?;

    let user = state
        .repo
        .create_user(NewUser {
            username,
            password_hash: hash_password(&payload.password)?,
            is_admin: payload.is_admin,
        })
        .await?;
    tracing::info!(user_id = user.id, created_by = admin.id, "user created");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// update_user
///
/// [Admin Route] Partial update. An admin cannot deactivate or demote their own account,
/// which would lock them out mid-session. Deactivating someone ends their sessions.
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Invalid input or operation"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UserPatch>,
) -> Result<Json<UserResponse>, AppError> {
    if id == admin.id {
        if patch.is_active == Some(false) {
            return Err(AppError::InvalidOperation(
                "Cannot deactivate your own account".into(),
            ));
        }
        if patch.is_admin == Some(false) {
            return Err(AppError::InvalidOperation(
                "Cannot remove your own admin rights".into(),
            ));
        }
    }

    let mut v = Violations::new();
    let username = patch.username.as_deref().and_then(|raw| {
        normalize_username(raw)
            .inspect_err(|msg| v.push("username", msg))
            .ok()
    });
    if let Some(Err(msg)) = patch.password.as_deref().map(check_password) {
        v.push("password", msg);
    }
    v.finish()?;

    let password_hash = patch.password.as_deref().map(hash_password).transpose()?;
    let user = state
        .repo
        .update_user(
            id,
            UserChanges {
                username,
                password_hash,
                is_admin: patch.is_admin,
                is_active: patch.is_active,
                theme: patch.theme,
            },
        )
        .await?;

    if !user.is_active {
        state.sessions.revoke_user(id).await;
    }
    tracing::info!(user_id = id, updated_by = admin.id, "user updated");
    Ok(Json(UserResponse::from(user)))
}

/// delete_user
///
/// [Admin Route] Removes the account together with its links and schedules.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 400, description = "Attempt to delete own account"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if id == admin.id {
        return Err(AppError::InvalidOperation(
            "Cannot delete your own account".into(),
        ));
    }

    state.repo.delete_user(id).await?;
    state.sessions.revoke_user(id).await;
    tracing::info!(user_id = id, deleted_by = admin.id, "user deleted");
    Ok(Json(MessageResponse::new("user deleted")))
}

/// user_stats
///
/// [Admin Route] Account counts by role and status, plus catalog totals.
#[utoipa::path(
    get,
    path = "/api/users/stats",
    responses((status = 200, description = "Dashboard counters", body = UserStats))
)]
pub async fn user_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<UserStats>, AppError> {
    Ok(Json(state.repo.user_stats().await?))
}
