/// Router Module Index
///
/// Splits the `/api` surface by access level so the guard for each group is applied once,
/// as a route layer, instead of being remembered handler by handler. Handlers still take
/// the matching extractor (`Requester`, `AuthUser`, `AdminUser`), so a route registered in
/// the wrong module fails closed.

/// Routes open to anonymous visitors. Handlers filter records through the visibility rules.
pub mod public;

/// Login and registration, kept apart so they can carry the stricter rate limiter.
pub mod credentials;

/// Routes that need a live session.
pub mod authenticated;

/// Routes restricted to administrators.
pub mod admin;
