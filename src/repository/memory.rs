use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

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

/// Table
///
/// One in-memory table: rows by id plus the id sequence. Ids are never reused.
struct Table<T> {
    rows: BTreeMap<i64, T>,
    last_id: i64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<T: Record> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(i64) -> T) -> T {
        self.last_id += 1;
        let row = build(self.last_id);
        self.rows.insert(row.id(), row.clone());
        row
    }

    fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    fn get_mut(&mut self, id: i64) -> RepoResult<&mut T> {
        self.rows.get_mut(&id).ok_or(RepoError::NotFound)
    }

    fn remove(&mut self, id: i64) -> RepoResult<T> {
        self.rows.remove(&id).ok_or(RepoError::NotFound)
    }

    fn contains(&self, id: i64) -> bool {
        self.rows.contains_key(&id)
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// All rows, cloned and sorted with `order`.
    fn sorted(&self, order: impl FnMut(&T, &T) -> Ordering) -> Vec<T> {
        let mut rows: Vec<T> = self.rows.values().cloned().collect();
        rows.sort_by(order);
        rows
    }
}

#[derive(Default)]
struct Store {
    users: Table<User>,
    categories: Table<Category>,
    colors: Table<Color>,
    links: Table<Link>,
    schedules: Table<Schedule>,
}

impl Store {
    fn check_category(&self, id: Option<i64>) -> RepoResult<()> {
        match id {
            Some(id) if !self.categories.contains(id) => {
                Err(RepoError::MissingReference("category_id".into()))
            }
            _ => Ok(()),
        }
    }

    fn check_user(&self, id: Option<i64>) -> RepoResult<()> {
        match id {
            Some(id) if !self.users.contains(id) => Err(RepoError::MissingReference("user_id".into())),
            _ => Ok(()),
        }
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    // Fills the joined columns the Postgres SELECT would produce.
    fn annotate_link(&self, mut link: Link) -> Link {
        let category = link.category_id.and_then(|id| self.categories.get(id));
        link.category_name = category.map(|c| c.name.clone());
        link.category_admin_only = category.map(|c| c.admin_only);
        link.owner = link
            .user_id
            .and_then(|id| self.users.get(id))
            .map(|u| u.username.clone());
        link
    }

    fn annotate_schedule(&self, mut schedule: Schedule) -> Schedule {
        let category = schedule.category_id.and_then(|id| self.categories.get(id));
        schedule.category_name = category.map(|c| c.name.clone());
        schedule.category_admin_only = category.map(|c| c.admin_only);
        schedule.owner = schedule
            .user_id
            .and_then(|id| self.users.get(id))
            .map(|u| u.username.clone());
        schedule
    }

    fn clear_default_color(&mut self, except: Option<i64>) {
        for color in self.colors.rows.values_mut() {
            if color.is_default && Some(color.id) != except {
                color.is_default = false;
                color.updated_at = Utc::now();
            }
        }
    }
}

fn matches_filter(
    filter: &ListFilter,
    category_id: Option<i64>,
    title: &str,
    description: Option<&str>,
) -> bool {
    if filter.category_id.is_some() && filter.category_id != category_id {
        return false;
    }
    match filter.search_term() {
        Some(term) => {
            let term = term.to_lowercase();
            title.to_lowercase().contains(&term)
                || description.is_some_and(|d| d.to_lowercase().contains(&term))
        }
        None => true,
    }
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// InMemoryRepository
///
/// `Repository` backed by process memory, with the same uniqueness, reference, cascade and
/// visibility semantics as the Postgres schema. Used by the router tests and for running
/// the service without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- Users ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .sorted(|a, b| a.username.cmp(&b.username).then(a.id.cmp(&b.id))))
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.username_taken(&user.username, None) {
            return Err(RepoError::Conflict(DUPLICATE_USERNAME.into()));
        }
        let now = Utc::now();
        Ok(store.users.insert_with(|id| User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            is_admin: user.is_admin,
            is_active: true,
            theme: None,
            last_login: None,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if let Some(username) = &changes.username {
            if store.username_taken(username, Some(id)) {
                return Err(RepoError::Conflict(DUPLICATE_USERNAME.into()));
            }
        }
        let user = store.users.get_mut(id)?;
        apply(&mut user.username, changes.username);
        apply(&mut user.password_hash, changes.password_hash);
        apply(&mut user.is_admin, changes.is_admin);
        apply(&mut user.is_active, changes.is_active);
        apply(&mut user.theme, changes.theme);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> RepoResult<()> {
        let mut store = self.store.write().await;
        store.users.remove(id)?;
        store.links.rows.retain(|_, l| l.user_id != Some(id));
        store.schedules.rows.retain(|_, s| s.user_id != Some(id));
        Ok(())
    }

    async fn record_login(&self, id: i64) -> RepoResult<()> {
        let mut store = self.store.write().await;
        if let Ok(user) = store.users.get_mut(id) {
            user.last_login = Some(Utc::now());
        }
        Ok(())
    }

    async fn first_admin_theme(&self) -> RepoResult<Option<Value>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .iter()
            .filter(|u| u.is_admin)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .and_then(|u| u.theme.clone()))
    }

    async fn user_stats(&self) -> RepoResult<UserStats> {
        let store = self.store.read().await;
        let count = |pred: fn(&User) -> bool| store.users.iter().filter(|u| pred(u)).count() as i64;
        Ok(UserStats {
            total_users: store.users.rows.len() as i64,
            admin_users: count(|u| u.is_admin),
            active_users: count(|u| u.is_active),
            total_links: store.links.rows.len() as i64,
            total_schedules: store.schedules.rows.len() as i64,
            total_categories: store.categories.rows.len() as i64,
            total_colors: store.colors.rows.len() as i64,
        })
    }

    // --- Categories ---

    async fn list_categories(&self, include_admin_only: bool) -> RepoResult<Vec<Category>> {
        let store = self.store.read().await;
        let mut categories = store.categories.sorted(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.cmp(&b.name))
                .then(a.id.cmp(&b.id))
        });
        if !include_admin_only {
            categories.retain(|c| !c.admin_only);
        }
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        Ok(self.store.read().await.categories.get(id).cloned())
    }

    async fn create_category(&self, category: NewCategory) -> RepoResult<Category> {
        let mut store = self.store.write().await;
        if store.categories.iter().any(|c| c.name == category.name) {
            return Err(RepoError::Conflict(DUPLICATE_CATEGORY.into()));
        }
        let now = Utc::now();
        Ok(store.categories.insert_with(|id| Category {
            id,
            name: category.name,
            color: category.color,
            icon: category.icon,
            description: category.description,
            admin_only: category.admin_only,
            is_active: true,
            sort_order: category.sort_order,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn update_category(&self, id: i64, patch: CategoryPatch) -> RepoResult<Category> {
        let mut store = self.store.write().await;
        if let Some(name) = &patch.name {
            if store.categories.iter().any(|c| &c.name == name && c.id != id) {
                return Err(RepoError::Conflict(DUPLICATE_CATEGORY.into()));
            }
        }
        let category = store.categories.get_mut(id)?;
        apply(&mut category.name, patch.name);
        apply(&mut category.color, patch.color);
        apply(&mut category.icon, patch.icon);
        apply(&mut category.description, patch.description);
        apply(&mut category.admin_only, patch.admin_only);
        apply(&mut category.is_active, patch.is_active);
        apply(&mut category.sort_order, patch.sort_order);
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: i64) -> RepoResult<()> {
        let mut store = self.store.write().await;
        store.categories.remove(id)?;
        for link in store.links.rows.values_mut() {
            if link.category_id == Some(id) {
                link.category_id = None;
            }
        }
        for schedule in store.schedules.rows.values_mut() {
            if schedule.category_id == Some(id) {
                schedule.category_id = None;
            }
        }
        Ok(())
    }

    // --- Colors ---

    async fn list_colors(&self) -> RepoResult<Vec<Color>> {
        let store = self.store.read().await;
        // Postgres sorts NULL names last.
        Ok(store.colors.sorted(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.is_none().cmp(&b.name.is_none()))
                .then_with(|| a.name.cmp(&b.name))
                .then(a.id.cmp(&b.id))
        }))
    }

    async fn get_color(&self, id: i64) -> RepoResult<Option<Color>> {
        Ok(self.store.read().await.colors.get(id).cloned())
    }

    async fn create_color(&self, color: NewColor) -> RepoResult<Color> {
        let mut store = self.store.write().await;
        if store.colors.iter().any(|c| c.value == color.value) {
            return Err(RepoError::Conflict(DUPLICATE_COLOR.into()));
        }
        if color.is_default {
            store.clear_default_color(None);
        }
        let now = Utc::now();
        Ok(store.colors.insert_with(|id| Color {
            id,
            name: color.name,
            value: color.value,
            description: color.description,
            is_default: color.is_default,
            is_active: true,
            sort_order: color.sort_order,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn update_color(&self, id: i64, patch: ColorPatch) -> RepoResult<Color> {
        let mut store = self.store.write().await;
        if !store.colors.contains(id) {
            return Err(RepoError::NotFound);
        }
        if let Some(value) = &patch.value {
            if store.colors.iter().any(|c| &c.value == value && c.id != id) {
                return Err(RepoError::Conflict(DUPLICATE_COLOR.into()));
            }
        }
        if patch.is_default == Some(true) {
            store.clear_default_color(Some(id));
        }
        let color = store.colors.get_mut(id)?;
        apply(&mut color.name, patch.name);
        apply(&mut color.value, patch.value);
        apply(&mut color.description, patch.description);
        apply(&mut color.is_default, patch.is_default);
        apply(&mut color.is_active, patch.is_active);
        apply(&mut color.sort_order, patch.sort_order);
        color.updated_at = Utc::now();
        Ok(color.clone())
    }

    async fn delete_color(&self, id: i64) -> RepoResult<()> {
        self.store.write().await.colors.remove(id).map(|_| ())
    }

    // --- Links ---

    async fn list_links(&self, viewer: Viewer, filter: &ListFilter) -> RepoResult<Vec<Link>> {
        let store = self.store.read().await;
        Ok(store
            .links
            .sorted(|a, b| {
                a.sort_order
                    .cmp(&b.sort_order)
                    .then_with(|| a.title.cmp(&b.title))
                    .then(a.id.cmp(&b.id))
            })
            .into_iter()
            .map(|link| store.annotate_link(link))
            .filter(|l| viewer.can_see(l.user_id, l.category_admin_only))
            .filter(|l| matches_filter(filter, l.category_id, &l.title, l.description.as_deref()))
            .collect())
    }

    async fn get_link(&self, id: i64) -> RepoResult<Option<Link>> {
        let store = self.store.read().await;
        Ok(store.links.get(id).cloned().map(|l| store.annotate_link(l)))
    }

    async fn create_link(&self, link: NewLink) -> RepoResult<Link> {
        let mut store = self.store.write().await;
        store.check_category(link.category_id)?;
        store.check_user(link.user_id)?;
        let now = Utc::now();
        let created = store.links.insert_with(|id| Link {
            id,
            title: link.title,
            url: link.url,
            file_url: link.file_url,
            description: link.description,
            color: link.color,
            image_url: link.image_url,
            is_active: true,
            is_public: link.is_public,
            is_favorite: link.is_favorite,
            click_count: 0,
            sort_order: link.sort_order,
            user_id: link.user_id,
            category_id: link.category_id,
            created_at: now,
            updated_at: now,
            ..Default::default()
        });
        Ok(store.annotate_link(created))
    }

    async fn update_link(&self, id: i64, patch: LinkPatch) -> RepoResult<Link> {
        let mut store = self.store.write().await;
        store.check_category(patch.category_id.flatten())?;
        store.check_user(patch.user_id.flatten())?;
        let link = store.links.get_mut(id)?;
        apply(&mut link.title, patch.title);
        apply(&mut link.url, patch.url);
        apply(&mut link.file_url, patch.file_url);
        apply(&mut link.description, patch.description);
        apply(&mut link.category_id, patch.category_id);
        apply(&mut link.color, patch.color);
        apply(&mut link.image_url, patch.image_url);
        apply(&mut link.is_active, patch.is_active);
        apply(&mut link.is_public, patch.is_public);
        apply(&mut link.is_favorite, patch.is_favorite);
        apply(&mut link.sort_order, patch.sort_order);
        apply(&mut link.user_id, patch.user_id);
        link.updated_at = Utc::now();
        let updated = link.clone();
        Ok(store.annotate_link(updated))
    }

    async fn delete_link(&self, id: i64) -> RepoResult<()> {
        self.store.write().await.links.remove(id).map(|_| ())
    }

    async fn increment_link_clicks(&self, id: i64) -> RepoResult<i64> {
        let mut store = self.store.write().await;
        let link = store.links.get_mut(id)?;
        link.click_count += 1;
        Ok(link.click_count)
    }

    async fn link_stats(&self) -> RepoResult<LinkStats> {
        let store = self.store.read().await;
        let links: Vec<&Link> = store.links.iter().collect();
        Ok(LinkStats {
            total_links: links.len() as i64,
            active_links: links.iter().filter(|l| l.is_active).count() as i64,
            public_links: links.iter().filter(|l| l.user_id.is_none()).count() as i64,
            user_links: links.iter().filter(|l| l.user_id.is_some()).count() as i64,
            total_clicks: links.iter().map(|l| l.click_count).sum(),
        })
    }

    // --- Schedules ---

    async fn list_schedules(
        &self,
        viewer: Viewer,
        filter: &ListFilter,
    ) -> RepoResult<Vec<Schedule>> {
        let store = self.store.read().await;
        Ok(store
            .schedules
            .sorted(|a, b| {
                a.sort_order
                    .cmp(&b.sort_order)
                    .then_with(|| a.title.cmp(&b.title))
                    .then(a.id.cmp(&b.id))
            })
            .into_iter()
            .map(|schedule| store.annotate_schedule(schedule))
            .filter(|s| viewer.can_see(s.user_id, s.category_admin_only))
            .filter(|s| matches_filter(filter, s.category_id, &s.title, s.description.as_deref()))
            .collect())
    }

    async fn get_schedule(&self, id: i64) -> RepoResult<Option<Schedule>> {
        let store = self.store.read().await;
        Ok(store
            .schedules
            .get(id)
            .cloned()
            .map(|s| store.annotate_schedule(s)))
    }

    async fn create_schedule(&self, schedule: NewSchedule) -> RepoResult<Schedule> {
        let mut store = self.store.write().await;
        store.check_category(schedule.category_id)?;
        store.check_user(schedule.user_id)?;
        let now = Utc::now();
        let created = store.schedules.insert_with(|id| Schedule {
            id,
            title: schedule.title,
            file_url: schedule.file_url,
            description: schedule.description,
            file_name: schedule.file_name,
            file_size: schedule.file_size,
            file_type: schedule.file_type,
            is_active: true,
            download_count: 0,
            sort_order: schedule.sort_order,
            user_id: schedule.user_id,
            category_id: schedule.category_id,
            created_at: now,
            updated_at: now,
            ..Default::default()
        });
        Ok(store.annotate_schedule(created))
    }

    async fn update_schedule(&self, id: i64, patch: SchedulePatch) -> RepoResult<Schedule> {
        let mut store = self.store.write().await;
        store.check_category(patch.category_id.flatten())?;
        store.check_user(patch.user_id.flatten())?;
        let schedule = store.schedules.get_mut(id)?;
        apply(&mut schedule.title, patch.title);
        apply(&mut schedule.file_url, patch.file_url);
        apply(&mut schedule.description, patch.description);
        apply(&mut schedule.file_name, patch.file_name);
        apply(&mut schedule.file_size, patch.file_size);
        apply(&mut schedule.file_type, patch.file_type);
        apply(&mut schedule.category_id, patch.category_id);
        apply(&mut schedule.sort_order, patch.sort_order);
        apply(&mut schedule.is_active, patch.is_active);
        apply(&mut schedule.user_id, patch.user_id);
        schedule.updated_at = Utc::now();
        let updated = schedule.clone();
        Ok(store.annotate_schedule(updated))
    }

    async fn delete_schedule(&self, id: i64) -> RepoResult<()> {
        self.store.write().await.schedules.remove(id).map(|_| ())
    }

    async fn increment_schedule_downloads(&self, id: i64) -> RepoResult<i64> {
        let mut store = self.store.write().await;
        let schedule = store.schedules.get_mut(id)?;
        schedule.download_count += 1;
        Ok(schedule.download_count)
    }

    async fn schedule_stats(&self) -> RepoResult<ScheduleStats> {
        let store = self.store.read().await;
        let schedules: Vec<&Schedule> = store.schedules.iter().collect();
        Ok(ScheduleStats {
            total_schedules: schedules.len() as i64,
            active_schedules: schedules.iter().filter(|s| s.is_active).count() as i64,
            public_schedules: schedules.iter().filter(|s| s.user_id.is_none()).count() as i64,
            user_schedules: schedules.iter().filter(|s| s.user_id.is_some()).count() as i64,
            total_downloads: schedules.iter().map(|s| s.download_count).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, is_admin: bool) -> NewUser {
        NewUser {
            username: name.into(),
            password_hash: "hash".into(),
            is_admin,
        }
    }

    fn new_category(name: &str, admin_only: bool) -> NewCategory {
        NewCategory {
            name: name.into(),
            color: None,
            icon: None,
            description: None,
            admin_only,
            sort_order: 0,
        }
    }

    #[tokio::test]
    async fn test_username_conflict() {
        let repo = InMemoryRepository::new();
        repo.create_user(new_user("alice", false)).await.unwrap();
        let err = repo.create_user(new_user("alice", false)).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let repo = InMemoryRepository::new();
        let alice = repo.create_user(new_user("alice", false)).await.unwrap();
        repo.create_link(NewLink {
            title: "Mine".into(),
            url: Some("https://a.example".into()),
            user_id: Some(alice.id),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.create_link(NewLink {
            title: "Public".into(),
            url: Some("https://b.example".into()),
            ..Default::default()
        })
        .await
        .unwrap();

        repo.delete_user(alice.id).await.unwrap();
        let remaining = repo
            .list_links(Viewer::Admin(0), &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Public");
    }

    #[tokio::test]
    async fn test_delete_category_detaches_links() {
        let repo = InMemoryRepository::new();
        let staff = repo.create_category(new_category("Staff", true)).await.unwrap();
        let link = repo
            .create_link(NewLink {
                title: "Payroll".into(),
                url: Some("https://pay.example".into()),
                category_id: Some(staff.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(link.category_name.as_deref(), Some("Staff"));

        let hidden = repo.list_links(Viewer::Anonymous, &ListFilter::default()).await.unwrap();
        assert!(hidden.is_empty());

        repo.delete_category(staff.id).await.unwrap();
        let visible = repo.list_links(Viewer::Anonymous, &ListFilter::default()).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].category_id, None);
    }

    #[tokio::test]
    async fn test_missing_reference() {
        let repo = InMemoryRepository::new();
        let err = repo
            .create_link(NewLink {
                title: "Broken".into(),
                url: Some("https://x.example".into()),
                category_id: Some(42),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::MissingReference(field) if field == "category_id"));
    }

    #[tokio::test]
    async fn test_single_default_color() {
        let repo = InMemoryRepository::new();
        let blue = repo
            .create_color(NewColor {
                name: Some("Blue".into()),
                value: "#0000FF".into(),
                description: None,
                is_default: true,
                sort_order: 0,
            })
            .await
            .unwrap();
        let green = repo
            .create_color(NewColor {
                name: Some("Green".into()),
                value: "#00FF00".into(),
                description: None,
                is_default: false,
                sort_order: 1,
            })
            .await
            .unwrap();

        repo.update_color(
            green.id,
            ColorPatch {
                is_default: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let blue = repo.get_color(blue.id).await.unwrap().unwrap();
        assert!(!blue.is_default);
        let defaults = repo.list_colors().await.unwrap().into_iter().filter(|c| c.is_default).count();
        assert_eq!(defaults, 1);
    }

    #[tokio::test]
    async fn test_filters_narrow_listing() {
        let repo = InMemoryRepository::new();
        let docs = repo.create_category(new_category("Docs", false)).await.unwrap();
        for (title, category) in [("Cafeteria menu", None), ("Handbook", Some(docs.id))] {
            repo.create_link(NewLink {
                title: title.into(),
                url: Some("https://x.example".into()),
                category_id: category,
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let by_search = ListFilter {
            search: Some("MENU".into()),
            ..Default::default()
        };
        let found = repo.list_links(Viewer::Anonymous, &by_search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Cafeteria menu");

        let by_category = ListFilter {
            category_id: Some(docs.id),
            ..Default::default()
        };
        let found = repo.list_links(Viewer::Anonymous, &by_category).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Handbook");
    }

    #[tokio::test]
    async fn test_counters_increment() {
        let repo = InMemoryRepository::new();
        let link = repo
            .create_link(NewLink {
                title: "Clicky".into(),
                url: Some("https://c.example".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(repo.increment_link_clicks(link.id).await.unwrap(), 1);
        assert_eq!(repo.increment_link_clicks(link.id).await.unwrap(), 2);
        assert!(matches!(repo.increment_link_clicks(999).await, Err(RepoError::NotFound)));
        assert_eq!(repo.link_stats().await.unwrap().total_clicks, 2);
    }
}
