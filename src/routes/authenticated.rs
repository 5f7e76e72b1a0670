use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every handler here receives a validated `AuthUser` through the
/// authentication layer applied in `create_router`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me/menus
        // The caller's navigation tree, resolved from their authority's grants.
        .route("/me/menus", get(handlers::get_my_menus))
}
