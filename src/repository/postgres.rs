use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, postgres::PgRow};

use super::{
    DUPLICATE_CATEGORY, DUPLICATE_COLOR, DUPLICATE_USERNAME, ListFilter, Record, RepoError,
    RepoResult, Repository,
};
use crate::models::{
    Category, CategoryPatch, Color, ColorPatch, Link, LinkPatch, LinkStats, NewCategory, NewColor,
    NewLink, NewSchedule, NewUser, Schedule, SchedulePatch, ScheduleStats, User, UserChanges,
    UserStats,
};
use crate::visibility::Viewer;

/// PostgresRepository
///
/// The production implementation of `Repository`, backed by a `PgPool`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// migrate
    ///
    /// Applies the embedded `migrations/` directory. Safe to run on every startup.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn fetch_by_id<T>(&self, id: i64) -> RepoResult<Option<T>>
    where
        T: Record + for<'r> FromRow<'r, PgRow>,
    {
        let sql = format!("{} WHERE {}.id = $1", T::SELECT, T::ALIAS);
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn fetch_required<T>(&self, id: i64) -> RepoResult<T>
    where
        T: Record + for<'r> FromRow<'r, PgRow>,
    {
        self.fetch_by_id(id).await?.ok_or(RepoError::NotFound)
    }

    async fn list_all<T>(&self) -> RepoResult<Vec<T>>
    where
        T: Record + for<'r> FromRow<'r, PgRow>,
    {
        let sql = format!("{} ORDER BY {}", T::SELECT, T::ORDER_BY);
        Ok(sqlx::query_as::<_, T>(&sql).fetch_all(&self.pool).await?)
    }

    async fn delete_by_id<T: Record>(&self, id: i64) -> RepoResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    /// Runs a built `UPDATE` and re-reads the annotated record.
    async fn apply_update<T>(&self, id: i64, update: Assignments<'_>) -> RepoResult<T>
    where
        T: Record + for<'r> FromRow<'r, PgRow>,
    {
        let mut builder = update.finish(id);
        let result = builder.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.fetch_required(id).await
    }
}

// --- SQL Helpers ---

/// Assignments
///
/// Builds `UPDATE <table> SET updated_at = NOW(), col = $n, ...` from optional values, so
/// patch structs translate into exactly the columns the client sent.
struct Assignments<'a> {
    builder: QueryBuilder<'a, Postgres>,
}

impl<'a> Assignments<'a> {
    fn new(table: &str) -> Self {
        Self {
            builder: QueryBuilder::new(format!("UPDATE {table} SET updated_at = NOW()")),
        }
    }

    fn set<T>(mut self, column: &str, value: Option<T>) -> Self
    where
        T: 'a + sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send,
    {
        if let Some(value) = value {
            self.builder.push(", ").push(column).push(" = ").push_bind(value);
        }
        self
    }

    fn finish(mut self, id: i64) -> QueryBuilder<'a, Postgres> {
        self.builder.push(" WHERE id = ").push_bind(id);
        self.builder
    }
}

fn push_list_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter, alias: &str) {
    if let Some(category_id) = filter.category_id {
        builder
            .push(format!(" AND {alias}.category_id = "))
            .push_bind(category_id);
    }
    if let Some(term) = filter.search_term() {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(format!(" AND ({alias}.title ILIKE "))
            .push_bind(pattern.clone())
            .push(format!(" OR {alias}.description ILIKE "))
            .push_bind(pattern)
            .push(")");
    }
}

// Backslash is Postgres' default LIKE escape character.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn conflict_message(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_username_key") => DUPLICATE_USERNAME,
        Some("categories_name_key") => DUPLICATE_CATEGORY,
        Some("colors_value_key") => DUPLICATE_COLOR,
        _ => "record already exists",
    }
    .to_string()
}

fn reference_field(constraint: Option<&str>) -> String {
    match constraint {
        Some(c) if c.contains("category_id") => "category_id",
        Some(c) if c.contains("user_id") => "user_id",
        _ => "reference",
    }
    .to_string()
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return RepoError::Conflict(conflict_message(db.constraint()));
            }
            if db.is_foreign_key_violation() {
                return RepoError::MissingReference(reference_field(db.constraint()));
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return RepoError::NotFound;
        }
        tracing::error!("database error: {:?}", err);
        RepoError::Database(err.to_string())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        self.fetch_by_id(id).await
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("{} WHERE u.username = $1", User::SELECT);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.list_all().await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password_hash, is_admin) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await?;
        self.fetch_required(id).await
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<User> {
        let update = Assignments::new(User::TABLE)
            .set("username", changes.username)
            .set("password_hash", changes.password_hash)
            .set("is_admin", changes.is_admin)
            .set("is_active", changes.is_active)
            .set("theme", changes.theme);
        self.apply_update(id, update).await
    }

    async fn delete_user(&self, id: i64) -> RepoResult<()> {
        self.delete_by_id::<User>(id).await
    }

    async fn record_login(&self, id: i64) -> RepoResult<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn first_admin_theme(&self) -> RepoResult<Option<Value>> {
        let theme: Option<Option<Value>> = sqlx::query_scalar(
            "SELECT theme FROM users WHERE is_admin ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(theme.flatten())
    }

    async fn user_stats(&self) -> RepoResult<UserStats> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE is_admin) AS admin_users,
                (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM links) AS total_links,
                (SELECT COUNT(*) FROM schedules) AS total_schedules,
                (SELECT COUNT(*) FROM categories) AS total_categories,
                (SELECT COUNT(*) FROM colors) AS total_colors
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    // --- Categories ---

    async fn list_categories(&self, include_admin_only: bool) -> RepoResult<Vec<Category>> {
        let mut builder = QueryBuilder::<Postgres>::new(Category::SELECT);
        if !include_admin_only {
            builder.push(" WHERE c.admin_only = FALSE");
        }
        builder.push(" ORDER BY ").push(Category::ORDER_BY);
        Ok(builder
            .build_query_as::<Category>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        self.fetch_by_id(id).await
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO categories (name, color, icon, description, admin_only, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(category.name)
        .bind(category.color)
        .bind(category.icon)
        .bind(category.description)
        .bind(category.admin_only)
        .bind(category.sort_order)
        .fetch_one(&self.pool)
        .await?;
        self.fetch_required(id).await
    }

    async fn update_category(&self, id: i64, patch: CategoryPatch) -> RepoResult<Category> {
        let update = Assignments::new(Category::TABLE)
            .set("name", patch.name)
            .set("color", patch.color)
            .set("icon", patch.icon)
            .set("description", patch.description)
            .set("admin_only", patch.admin_only)
            .set("is_active", patch.is_active)
            .set("sort_order", patch.sort_order);
        self.apply_update(id, update).await
    }

    async fn delete_category(&self, id: i64) -> RepoResult<()> {
        // ON DELETE SET NULL detaches links and schedules.
        self.delete_by_id::<Category>(id).await
    }

    // --- Colors ---

    async fn list_colors(&self) -> RepoResult<Vec<Color>> {
        self.list_all().await
    }

    async fn get_color(&self, id: i64) -> RepoResult<Option<Color>> {
        self.fetch_by_id(id).await
    }

    async fn create_color(&self, color: NewColor) -> RepoResult<Color> {
        let mut tx = self.pool.begin().await?;
        if color.is_default {
            sqlx::query("UPDATE colors SET is_default = FALSE, updated_at = NOW() WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO colors (name, value, description, is_default, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(color.name)
        .bind(color.value)
        .bind(color.description)
        .bind(color.is_default)
        .bind(color.sort_order)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        self.fetch_required(id).await
    }

    async fn update_color(&self, id: i64, patch: ColorPatch) -> RepoResult<Color> {
        let mut tx = self.pool.begin().await?;
        if patch.is_default == Some(true) {
            sqlx::query(
                "UPDATE colors SET is_default = FALSE, updated_at = NOW() WHERE is_default AND id <> $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        let mut builder = Assignments::new(Color::TABLE)
            .set("name", patch.name)
            .set("value", patch.value)
            .set("description", patch.description)
            .set("is_default", patch.is_default)
            .set("is_active", patch.is_active)
            .set("sort_order", patch.sort_order)
            .finish(id);
        let result = builder.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await?;
        self.fetch_required(id).await
    }

    async fn delete_color(&self, id: i64) -> RepoResult<()> {
        self.delete_by_id::<Color>(id).await
    }

    // --- Links ---

    async fn list_links(&self, viewer: Viewer, filter: &ListFilter) -> RepoResult<Vec<Link>> {
        let mut builder = QueryBuilder::<Postgres>::new(Link::SELECT);
        builder.push(" WHERE TRUE");
        viewer.push_filter(&mut builder, "l.user_id", "c.admin_only");
        push_list_filter(&mut builder, filter, Link::ALIAS);
        builder.push(" ORDER BY ").push(Link::ORDER_BY);
        Ok(builder.build_query_as::<Link>().fetch_all(&self.pool).await?)
    }

    async fn get_link(&self, id: i64) -> RepoResult<Option<Link>> {
        self.fetch_by_id(id).await
    }

    async fn create_link(&self, link: NewLink) -> RepoResult<Link> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO links (
                title, url, file_url, description, color, image_url,
                is_public, is_favorite, sort_order, user_id, category_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(link.title)
        .bind(link.url)
        .bind(link.file_url)
        .bind(link.description)
        .bind(link.color)
        .bind(link.image_url)
        .bind(link.is_public)
        .bind(link.is_favorite)
        .bind(link.sort_order)
        .bind(link.user_id)
        .bind(link.category_id)
        .fetch_one(&self.pool)
        .await?;
        self.fetch_required(id).await
    }

    async fn update_link(&self, id: i64, patch: LinkPatch) -> RepoResult<Link> {
        let update = Assignments::new(Link::TABLE)
            .set("title", patch.title)
            .set("url", patch.url)
            .set("file_url", patch.file_url)
            .set("description", patch.description)
            .set("category_id", patch.category_id)
            .set("color", patch.color)
            .set("image_url", patch.image_url)
            .set("is_active", patch.is_active)
            .set("is_public", patch.is_public)
            .set("is_favorite", patch.is_favorite)
            .set("sort_order", patch.sort_order)
            .set("user_id", patch.user_id);
        self.apply_update(id, update).await
    }

    async fn delete_link(&self, id: i64) -> RepoResult<()> {
        self.delete_by_id::<Link>(id).await
    }

    async fn increment_link_clicks(&self, id: i64) -> RepoResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE links SET click_count = click_count + 1 WHERE id = $1 RETURNING click_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        count.ok_or(RepoError::NotFound)
    }

    async fn link_stats(&self) -> RepoResult<LinkStats> {
        let stats = sqlx::query_as::<_, LinkStats>(
            r#"
            SELECT
                COUNT(*) AS total_links,
                COUNT(*) FILTER (WHERE is_active) AS active_links,
                COUNT(*) FILTER (WHERE user_id IS NULL) AS public_links,
                COUNT(*) FILTER (WHERE user_id IS NOT NULL) AS user_links,
                COALESCE(SUM(click_count), 0)::BIGINT AS total_clicks
            FROM links
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    // --- Schedules ---

    async fn list_schedules(
        &self,
        viewer: Viewer,
        filter: &ListFilter,
    ) -> RepoResult<Vec<Schedule>> {
        let mut builder = QueryBuilder::<Postgres>::new(Schedule::SELECT);
        builder.push(" WHERE TRUE");
        viewer.push_filter(&mut builder, "s.user_id", "c.admin_only");
        push_list_filter(&mut builder, filter, Schedule::ALIAS);
        builder.push(" ORDER BY ").push(Schedule::ORDER_BY);
        Ok(builder
            .build_query_as::<Schedule>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_schedule(&self, id: i64) -> RepoResult<Option<Schedule>> {
        self.fetch_by_id(id).await
    }

    async fn create_schedule(&self, schedule: NewSchedule) -> RepoResult<Schedule> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO schedules (
                title, file_url, description, file_name, file_size, file_type,
                sort_order, user_id, category_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(schedule.title)
        .bind(schedule.file_url)
        .bind(schedule.description)
        .bind(schedule.file_name)
        .bind(schedule.file_size)
        .bind(schedule.file_type)
        .bind(schedule.sort_order)
        .bind(schedule.user_id)
        .bind(schedule.category_id)
        .fetch_one(&self.pool)
        .await?;
        self.fetch_required(id).await
    }

    async fn update_schedule(&self, id: i64, patch: SchedulePatch) -> RepoResult<Schedule> {
        let update = Assignments::new(Schedule::TABLE)
            .set("title", patch.title)
            .set("file_url", patch.file_url)
            .set("description", patch.description)
            .set("file_name", patch.file_name)
            .set("file_size", patch.file_size)
            .set("file_type", patch.file_type)
            .set("category_id", patch.category_id)
            .set("sort_order", patch.sort_order)
            .set("is_active", patch.is_active)
            .set("user_id", patch.user_id);
        self.apply_update(id, update).await
    }

    async fn delete_schedule(&self, id: i64) -> RepoResult<()> {
        self.delete_by_id::<Schedule>(id).await
    }

    async fn increment_schedule_downloads(&self, id: i64) -> RepoResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE schedules SET download_count = download_count + 1 WHERE id = $1 RETURNING download_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        count.ok_or(RepoError::NotFound)
    }

    async fn schedule_stats(&self) -> RepoResult<ScheduleStats> {
        let stats = sqlx::query_as::<_, ScheduleStats>(
            r#"
            SELECT
                COUNT(*) AS total_schedules,
                COUNT(*) FILTER (WHERE is_active) AS active_schedules,
                COUNT(*) FILTER (WHERE user_id IS NULL) AS public_schedules,
                COUNT(*) FILTER (WHERE user_id IS NOT NULL) AS user_schedules,
                COALESCE(SUM(download_count), 0)::BIGINT AS total_downloads
            FROM schedules
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
