use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{
    Category, CategoryPatch, Color, ColorPatch, Link, LinkPatch, LinkStats, NewCategory, NewColor,
    NewLink, NewSchedule, NewUser, Schedule, SchedulePatch, ScheduleStats, User, UserChanges,
    UserStats,
};
use crate::visibility::Viewer;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

pub const DUPLICATE_USERNAME: &str = "username already exists";
pub const DUPLICATE_CATEGORY: &str = "a category with this name already exists";
pub const DUPLICATE_COLOR: &str = "a color with this value already exists";

/// RepoError
///
/// Persistence failures in the vocabulary the handlers care about. Driver errors are
/// classified once, in `From<sqlx::Error>`, so no handler ever inspects SQLSTATE codes.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    /// A foreign key names a row that does not exist. Carries the offending field.
    #[error("{0} references a missing record")]
    MissingReference(String),

    #[error("database error: {0}")]
    Database(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// ListFilter
///
/// Query parameters accepted by the link and schedule listings. Filters only ever narrow
/// the set the viewer is allowed to see.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilter {
    /// Only records in this category.
    pub category_id: Option<i64>,
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
}

impl ListFilter {
    /// The search term, trimmed; blank searches are ignored.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations. Handlers work against
/// `Arc<dyn Repository>` and never know whether Postgres or the in-memory store is behind it.
///
/// **Send + Sync + async_trait** are required to make the trait object safely shareable
/// across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    // Usernames are stored lowercase; callers pass the normalized form.
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // Ordered by username.
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<User>;
    // Cascades to the user's links and schedules.
    async fn delete_user(&self, id: i64) -> RepoResult<()>;
    async fn record_login(&self, id: i64) -> RepoResult<()>;
    // Theme of the earliest-created admin; fallback for anonymous visitors.
    async fn first_admin_theme(&self) -> RepoResult<Option<Value>>;
    async fn user_stats(&self) -> RepoResult<UserStats>;

    // --- Categories ---
    async fn list_categories(&self, include_admin_only: bool) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn create_category(&self, category: NewCategory) -> RepoResult<Category>;
    async fn update_category(&self, id: i64, patch: CategoryPatch) -> RepoResult<Category>;
    // Dependent links and schedules lose their category.
    async fn delete_category(&self, id: i64) -> RepoResult<()>;

    // --- Colors ---
    async fn list_colors(&self) -> RepoResult<Vec<Color>>;
    async fn get_color(&self, id: i64) -> RepoResult<Option<Color>>;
    // Marking a color default clears the flag everywhere else.
    async fn create_color(&self, color: NewColor) -> RepoResult<Color>;
    async fn update_color(&self, id: i64, patch: ColorPatch) -> RepoResult<Color>;
    async fn delete_color(&self, id: i64) -> RepoResult<()>;

    // --- Links ---
    // Applies the visibility predicate for `viewer`, then the filter.
    async fn list_links(&self, viewer: Viewer, filter: &ListFilter) -> RepoResult<Vec<Link>>;
    async fn get_link(&self, id: i64) -> RepoResult<Option<Link>>;
    async fn create_link(&self, link: NewLink) -> RepoResult<Link>;
    async fn update_link(&self, id: i64, patch: LinkPatch) -> RepoResult<Link>;
    async fn delete_link(&self, id: i64) -> RepoResult<()>;
    // Atomic; returns the new count.
    async fn increment_link_clicks(&self, id: i64) -> RepoResult<i64>;
    async fn link_stats(&self) -> RepoResult<LinkStats>;

    // --- Schedules ---
    async fn list_schedules(&self, viewer: Viewer, filter: &ListFilter)
    -> RepoResult<Vec<Schedule>>;
    async fn get_schedule(&self, id: i64) -> RepoResult<Option<Schedule>>;
    async fn create_schedule(&self, schedule: NewSchedule) -> RepoResult<Schedule>;
    async fn update_schedule(&self, id: i64, patch: SchedulePatch) -> RepoResult<Schedule>;
    async fn delete_schedule(&self, id: i64) -> RepoResult<()>;
    async fn increment_schedule_downloads(&self, id: i64) -> RepoResult<i64>;
    async fn schedule_stats(&self) -> RepoResult<ScheduleStats>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Generic Record Access ---

/// Record
///
/// Static description of a table, shared by the generic fetch/list/delete helpers of both
/// repository implementations.
pub trait Record: Clone + Send + Sync + Unpin + 'static {
    /// Table name, for writes.
    const TABLE: &'static str;
    /// Alias of the main table inside `SELECT`.
    const ALIAS: &'static str;
    /// `SELECT ... FROM ...` yielding one fully-annotated row per record, no `WHERE`.
    const SELECT: &'static str;
    /// Canonical listing order.
    const ORDER_BY: &'static str;

    fn id(&self) -> i64;
}

impl Record for User {
    const TABLE: &'static str = "users";
    const ALIAS: &'static str = "u";
    const SELECT: &'static str = "SELECT u.id, u.username, u.password_hash, u.is_admin, \
        u.is_active, u.theme, u.last_login, u.created_at, u.updated_at FROM users u";
    const ORDER_BY: &'static str = "u.username ASC, u.id ASC";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Category {
    const TABLE: &'static str = "categories";
    const ALIAS: &'static str = "c";
    const SELECT: &'static str = "SELECT c.id, c.name, c.color, c.icon, c.description, \
        c.admin_only, c.is_active, c.sort_order, c.created_at, c.updated_at FROM categories c";
    const ORDER_BY: &'static str = "c.sort_order ASC, c.name ASC, c.id ASC";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Color {
    const TABLE: &'static str = "colors";
    const ALIAS: &'static str = "co";
    const SELECT: &'static str = "SELECT co.id, co.name, co.value, co.description, \
        co.is_default, co.is_active, co.sort_order, co.created_at, co.updated_at FROM colors co";
    const ORDER_BY: &'static str = "co.sort_order ASC, co.name ASC, co.id ASC";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Link {
    const TABLE: &'static str = "links";
    const ALIAS: &'static str = "l";
    const SELECT: &'static str = "SELECT l.id, l.title, l.url, l.file_url, l.description, \
        l.color, l.image_url, l.is_active, l.is_public, l.is_favorite, l.click_count, \
        l.sort_order, l.user_id, l.category_id, c.name AS category_name, u.username AS owner, \
        c.admin_only AS category_admin_only, l.created_at, l.updated_at \
        FROM links l \
        LEFT JOIN categories c ON c.id = l.category_id \
        LEFT JOIN users u ON u.id = l.user_id";
    const ORDER_BY: &'static str = "l.sort_order ASC, l.title ASC, l.id ASC";

    fn id(&self) -> i64 {
        self.id
    }
}

impl Record for Schedule {
    const TABLE: &'static str = "schedules";
    const ALIAS: &'static str = "s";
    const SELECT: &'static str = "SELECT s.id, s.title, s.file_url, s.description, \
        s.file_name, s.file_size, s.file_type, s.is_active, s.download_count, s.sort_order, \
        s.user_id, s.category_id, c.name AS category_name, u.username AS owner, \
        c.admin_only AS category_admin_only, s.created_at, s.updated_at \
        FROM schedules s \
        LEFT JOIN categories c ON c.id = s.category_id \
        LEFT JOIN users u ON u.id = s.user_id";
    const ORDER_BY: &'static str = "s.sort_order ASC, s.title ASC, s.id ASC";

    fn id(&self) -> i64 {
        self.id
    }
}
