//! Router Module Index
//!
//! Routes are split by access level; `create_router` attaches the
//! authentication layer to everything outside `public`.

/// Routes open to anonymous callers.
pub mod public;

/// Routes for any authenticated user.
pub mod authenticated;

/// Authority and menu administration, nested under `/admin`.
pub mod admin;
