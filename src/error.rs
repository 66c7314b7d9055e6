use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::repository::RepoError;
use crate::storage::StorageError;

/// FieldError
///
/// One violated input rule, reported back to the client inside a `validation_error` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// AppError
///
/// The single error type returned by every handler. Each variant maps to exactly one HTTP
/// status and a stable machine-readable `error` code, so the frontend can branch on the code
/// rather than parse messages.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidOperation(String),

    #[error("{message}")]
    PayloadRejected { message: String, too_large: bool },

    #[error("too many requests, try again later")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(String),
}

/// ErrorDetail
///
/// Carries the underlying cause of an `Internal` error as a response extension. Only the
/// local-environment middleware in `lib.rs` copies it into the body.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// AppJson
///
/// Drop-in replacement for `Json` as a body extractor. Malformed JSON, a missing content
/// type or a missing required field answer with a `validation_error` body instead of
/// axum's plain-text 400/415/422.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::invalid("body", &rejection.body_text())
    }
}

impl AppError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: &str, message: &str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn forbidden(message: &str) -> Self {
        AppError::Forbidden(message.to_string())
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadRejected { too_large: true, .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::PayloadRejected { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidOperation(_) => "invalid_operation",
            AppError::PayloadRejected { .. } => "payload_rejected",
            AppError::RateLimited => "too_many_requests",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            AppError::Internal(detail) => {
                tracing::error!("internal error: {}", detail);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": self.code(),
            "message": message,
            "status": status.as_u16(),
        });
        if let AppError::Validation(fields) = &self {
            body["fields"] = json!(fields);
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::Internal(detail) = self {
            response.extensions_mut().insert(ErrorDetail(detail));
        }
        response
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::not_found("record"),
            RepoError::Conflict(message) => AppError::Conflict(message),
            RepoError::MissingReference(field) => {
                AppError::invalid(&field, "references a record that does not exist")
            }
            RepoError::Database(detail) => AppError::Internal(detail),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName => AppError::invalid("file", "invalid filename"),
            StorageError::NotAllowed(_) => AppError::PayloadRejected {
                message: err.to_string(),
                too_large: false,
            },
            StorageError::TooLarge { .. } => AppError::PayloadRejected {
                message: err.to_string(),
                too_large: true,
            },
            StorageError::NotFound => AppError::not_found("file"),
            StorageError::Traversal => AppError::forbidden("access denied"),
            StorageError::Io(detail) => AppError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::PayloadRejected { message: "big".into(), too_large: true }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::PayloadRejected { message: "type".into(), too_large: false }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_internal_detail_stays_out_of_body() {
        let response = AppError::Internal("relation \"links\" does not exist".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = response.extensions().get::<ErrorDetail>().map(|d| d.0.clone());
        assert_eq!(detail.as_deref(), Some("relation \"links\" does not exist"));
    }

    #[test]
    fn test_repo_errors_translate() {
        assert!(matches!(AppError::from(RepoError::NotFound), AppError::NotFound(_)));
        assert!(matches!(
            AppError::from(RepoError::MissingReference("category_id".into())),
            AppError::Validation(fields) if fields[0].field == "category_id"
        ));
    }
}
