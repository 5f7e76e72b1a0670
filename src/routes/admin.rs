use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Admin Router Module
///
/// Authority and menu administration. Nested under `/admin` and wrapped in
/// the same authentication layer as the authenticated routes.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Authorities ---
        .route(
            "/authorities",
            get(handlers::list_authorities).post(handlers::create_authority),
        )
        // GET /admin/authorities/all
        // Unpaged, for rendering the role hierarchy.
        .route("/authorities/all", get(handlers::all_authorities))
        .route(
            "/authorities/{id}",
            get(handlers::get_authority)
                .put(handlers::update_authority)
                .delete(handlers::delete_authority),
        )
        // GET/PUT /admin/authorities/{id}/menus
        // The permission editor: read the grant matrix, replace the grant set.
        .route(
            "/authorities/{id}/menus",
            get(handlers::get_authority_menus).put(handlers::replace_authority_menus),
        )
        // --- Menus ---
        .route("/menus", post(handlers::create_menu).get(handlers::list_menus))
        .route("/menus/tree", get(handlers::menu_tree))
        .route(
            "/menus/{id}",
            get(handlers::get_menu)
                .put(handlers::update_menu)
                .delete(handlers::delete_menu),
        )
}
