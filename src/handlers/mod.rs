//! HTTP handlers, one module per resource.
//!
//! Handlers resolve identity through the `Requester` / `AuthUser` / `AdminUser` extractors,
//! validate and sanitize input, enforce ownership, and delegate persistence to the
//! `Repository`. Every failure is an `AppError`.

pub mod auth;
pub mod categories;
pub mod colors;
pub mod files;
pub mod links;
pub mod schedules;
pub mod theme;
pub mod users;
