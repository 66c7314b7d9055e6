use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::AppError,
    models::{FileInfo, FileListResponse, MessageResponse, UploadResponse},
};

const FILE_FIELD: &str = "file";

// The body limit layer surfaces as a multipart error carrying 413.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadRejected {
            message: "file exceeds the 16 MiB upload limit".into(),
            too_large: true,
        }
    } else {
        AppError::invalid(FILE_FIELD, &err.body_text())
    }
}

/// upload_file
///
/// [Authenticated Route] Reads the multipart field `file` and hands it to the storage
/// service. Other fields are ignored. The stored name may carry a `_N` suffix when the
/// sanitized name was already taken.
#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content_type = "multipart/form-data", description = "Single field `file`"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file or disallowed type"),
        (status = 413, description = "File larger than 16 MiB")
    )
)]
pub async fn upload_file(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| AppError::invalid(FILE_FIELD, "no file selected"))?;
        let data = field.bytes().await.map_err(multipart_error)?;

        let stored = state.storage.store(&original_name, &data).await?;
        tracing::info!(
            user_id = user.id,
            filename = %stored.filename,
            size = stored.size,
            "file uploaded"
        );

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "file uploaded".into(),
                url: stored.url(),
                filename: stored.filename,
                original_name: stored.original_name,
                size: stored.size,
                content_type: stored.content_type,
                category: stored.category,
            }),
        ));
    }

    Err(AppError::invalid(FILE_FIELD, "no file provided"))
}

/// serve_file
///
/// [Public Route] Streams a stored file back with a content type derived from its
/// extension. Names resolving outside the upload root answer 403.
#[utoipa::path(
    get,
    path = "/api/files/{name}",
    params(("name" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "File contents"),
        (status = 403, description = "Path outside the upload directory"),
        (status = 404, description = "Not found")
    )
)]
pub async fn serve_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (data, content_type) = state.storage.read(&name).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

/// file_info
///
/// [Authenticated Route] Size, type and category of one stored upload.
#[utoipa::path(
    get,
    path = "/api/files/info/{name}",
    params(("name" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "File metadata", body = FileInfo),
        (status = 404, description = "Not found")
    )
)]
pub async fn file_info(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FileInfo>, AppError> {
    Ok(Json(state.storage.info(&name).await?))
}

/// list_files
///
/// [Admin Route] Every stored upload, newest first.
#[utoipa::path(
    get,
    path = "/api/files",
    responses((status = 200, description = "Stored files", body = FileListResponse))
)]
pub async fn list_files(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, AppError> {
    let files = state.storage.list().await?;
    Ok(Json(FileListResponse { files }))
}

/// delete_file
///
/// [Admin Route] Removes a stored upload from disk.
#[utoipa::path(
    delete,
    path = "/api/files/{name}",
    params(("name" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_file(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.storage.delete(&name).await?;
    tracing::info!(filename = %name, deleted_by = admin.id, "file deleted");
    Ok(Json(MessageResponse::new("file deleted")))
}
