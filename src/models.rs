use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Records (Mapped to Database) ---

/// User
///
/// Account record from the `users` table. Never serialized directly: the password hash must
/// not leave the server, so responses go through `UserResponse` or `MeResponse`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    // Stored lowercase; unique.
    pub username: String,
    // Argon2id PHC string.
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
    // Opaque frontend theme blob.
    pub theme: Option<Value>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category
///
/// Grouping for links and schedules. `admin_only` hides every attached record from
/// non-admin viewers who do not own it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub admin_only: bool,
    pub is_active: bool,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Color
///
/// Entry of the shared palette. At most one color is the default.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Color {
    pub id: i64,
    pub name: Option<String>,
    // `#RRGGBB`, unique.
    pub value: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub is_active: bool,
    pub sort_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Link
///
/// A bookmark. At least one of `url` / `file_url` is always set. Rows are read joined with
/// their category and owner, so `category`, `user` and `category_admin_only` come along.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Link {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub file_url: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub is_public: bool,
    pub is_favorite: bool,
    pub click_count: i64,
    pub sort_order: i32,
    // NULL owner means the link is public.
    pub user_id: Option<i64>,
    pub category_id: Option<i64>,
    // Joined category name.
    #[serde(rename = "category")]
    pub category_name: Option<String>,
    // Joined owner username; only admins get to see it.
    #[serde(rename = "user", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip)]
    #[ts(skip)]
    pub category_admin_only: Option<bool>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Schedule
///
/// A downloadable file (timetable, roster, ...) with the same ownership and category
/// semantics as `Link`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Schedule {
    pub id: i64,
    pub title: String,
    pub file_url: String,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub is_active: bool,
    pub download_count: i64,
    pub sort_order: i32,
    pub user_id: Option<i64>,
    pub category_id: Option<i64>,
    #[serde(rename = "category")]
    pub category_name: Option<String>,
    #[serde(rename = "user", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip)]
    #[ts(skip)]
    pub category_admin_only: Option<bool>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Link {
    /// Strips the owner annotation for non-admin viewers.
    pub fn redacted(mut self, is_admin: bool) -> Self {
        if !is_admin {
            self.owner = None;
        }
        self
    }
}

impl Schedule {
    pub fn redacted(mut self, is_admin: bool) -> Self {
        if !is_admin {
            self.owner = None;
        }
        self
    }
}

// --- Absent vs. null in patch payloads ---

/// double_option
///
/// Deserializes a nullable patch field so that an absent key stays `None` (via
/// `#[serde(default)]`) while an explicit `null` becomes `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// --- Request Payloads (Input Schemas) ---

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Registration uses the same shape as login.
pub type RegisterRequest = LoginRequest;

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub admin_only: bool,
    #[serde(default)]
    pub sort_order: i32,
}

/// CategoryPatch
///
/// Allow-listed fields for `PATCH /categories/{id}`. Nullable columns use a double option:
/// `None` leaves the column alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CategoryPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub icon: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub admin_only: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateColorRequest {
    pub value: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ColorPatch {
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,
    pub value: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub is_default: Option<bool>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ValidateColorRequest {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Object>)]
    pub theme: Option<Option<Value>>,
}

/// CreateLinkRequest
///
/// `user_id` and `file_url` are admin-only inputs. An absent `user_id` makes the requester
/// the owner; an admin sending `"user_id": null` creates a public link. Non-admins have
/// `user_id` ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateLinkRequest {
    pub title: String,
    pub url: Option<String>,
    pub file_url: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub user_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LinkPatch {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub file_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub category_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub image_url: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_public: Option<bool>,
    pub is_favorite: Option<bool>,
    pub sort_order: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub user_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub title: String,
    pub file_url: String,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub user_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SchedulePatch {
    pub title: Option<String>,
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub file_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub file_size: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub file_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub category_id: Option<Option<i64>>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub user_id: Option<Option<i64>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ThemeRequest {
    #[schema(value_type = Option<Object>)]
    pub theme: Option<Value>,
}

// --- Validated Inserts (Repository Inputs) ---

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// UserChanges
///
/// `UserPatch` after validation, with the password already hashed.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub is_admin: Option<bool>,
    pub is_active: Option<bool>,
    pub theme: Option<Option<Value>>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub admin_only: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct NewColor {
    pub name: Option<String>,
    pub value: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub title: String,
    pub url: Option<String>,
    pub file_url: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub is_public: bool,
    pub is_favorite: bool,
    pub sort_order: i32,
    pub user_id: Option<i64>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSchedule {
    pub title: String,
    pub file_url: String,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub sort_order: i32,
    pub user_id: Option<i64>,
    pub category_id: Option<i64>,
}

// --- Responses (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// MeResponse
///
/// Output of `GET /auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    #[schema(value_type = Option<Object>)]
    pub theme: Option<Value>,
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            theme: user.theme,
        }
    }
}

/// UserResponse
///
/// Admin view of an account.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub is_active: bool,
    #[schema(value_type = Option<Object>)]
    pub theme: Option<Value>,
    #[ts(type = "string | null")]
    pub last_login: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            is_active: user.is_active,
            theme: user.theme,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ThemeResponse {
    #[schema(value_type = Option<Object>)]
    pub theme: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ClickResponse {
    pub click_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DownloadResponse {
    pub download_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ColorValidation {
    pub value: String,
    pub valid: bool,
}

/// ColorPalette
///
/// Active colors grouped by name keywords for the frontend color picker.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ColorPalette {
    pub primary: Vec<Color>,
    pub secondary: Vec<Color>,
    pub neutral: Vec<Color>,
    pub custom: Vec<Color>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LinkStats {
    pub total_links: i64,
    pub active_links: i64,
    pub public_links: i64,
    pub user_links: i64,
    pub total_clicks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScheduleStats {
    pub total_schedules: i64,
    pub active_schedules: i64,
    pub public_schedules: i64,
    pub user_schedules: i64,
    pub total_downloads: i64,
}

/// UserStats
///
/// Admin dashboard counters.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserStats {
    pub total_users: i64,
    pub admin_users: i64,
    pub active_users: i64,
    pub total_links: i64,
    pub total_schedules: i64,
    pub total_categories: i64,
    pub total_colors: i64,
}

/// UploadResponse
///
/// Returned by `POST /upload`. `url` is what links and schedules store in `file_url`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub message: String,
    pub url: String,
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
    pub category: String,
    #[ts(type = "string")]
    pub created: DateTime<Utc>,
    #[ts(type = "string")]
    pub modified: DateTime<Utc>,
    pub url: String,
}

/// FileListResponse
///
/// Body of `GET /files`, newest upload first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FileListResponse {
    pub files: Vec<FileInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: LinkPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.color, None);

        let patch: LinkPatch = serde_json::from_str(r##"{"color": "#112233"}"##).unwrap();
        assert_eq!(patch.color, Some(Some("#112233".to_string())));
    }

    #[test]
    fn test_link_serializes_camel_case_without_owner() {
        let link = Link {
            id: 1,
            title: "Intranet".into(),
            url: Some("https://intra.example".into()),
            category_admin_only: Some(true),
            owner: Some("alice".into()),
            ..Default::default()
        }
        .redacted(false);
        let json = serde_json::to_value(&link).unwrap();
        assert!(json.get("fileUrl").is_some());
        assert!(json.get("clickCount").is_some());
        assert!(json.get("user").is_none());
        assert!(json.get("categoryAdminOnly").is_none());
    }
}
