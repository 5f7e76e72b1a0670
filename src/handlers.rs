use crate::{
    AppState, authority,
    auth::AuthUser,
    error::Error,
    grants, menu,
    models::{
        Authority, AuthorityId, CreateAuthorityRequest, CreateMenuRequest, GrantMatrix, MenuEntry,
        MenuFilter, MenuId, MenuNode, Page, Pagination, ReplaceGrantsRequest,
        UpdateAuthorityRequest, UpdateMenuRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;

// --- Query Structs ---

/// AuthorityQuery
///
/// Paging and name filter for GET /admin/authorities.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct AuthorityQuery {
    /// 1-based page number (default 1).
    pub page: Option<i64>,
    /// Rows per page (default 10, max 100).
    pub page_size: Option<i64>,
    /// Case-insensitive substring match on the authority name.
    pub name: Option<String>,
}

/// MenuQuery
///
/// Paging and substring filters for GET /admin/menus.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct MenuQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub title: Option<String>,
    pub path: Option<String>,
}

// --- Navigation ---

/// get_my_menus
///
/// [Authenticated Route] The navigation tree for the caller's authority, as
/// decided by the menu resolver (explicit grants, root, or bootstrap).
#[utoipa::path(
    get,
    path = "/me/menus",
    responses(
        (status = 200, description = "Menu tree", body = [MenuNode]),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn get_my_menus(
    AuthUser { authority_id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<MenuNode>>, Error> {
    Ok(Json(state.resolver.resolve(authority_id).await?))
}

// --- Authorities ---

/// list_authorities
///
/// [Admin Route] One page of authorities, optionally filtered by name.
#[utoipa::path(
    get,
    path = "/admin/authorities",
    params(AuthorityQuery),
    responses((status = 200, description = "Authority page", body = Page<Authority>))
)]
pub async fn list_authorities(
    State(state): State<AppState>,
    Query(query): Query<AuthorityQuery>,
) -> Result<Json<Page<Authority>>, Error> {
    let paging = Pagination::new(query.page, query.page_size);
    let page = authority::list(state.repo.as_ref(), query.name.as_deref(), paging).await?;
    Ok(Json(page))
}

/// all_authorities
///
/// [Admin Route] Every authority, unpaged. Used to render the role tree.
#[utoipa::path(
    get,
    path = "/admin/authorities/all",
    responses((status = 200, description = "All authorities", body = [Authority]))
)]
pub async fn all_authorities(State(state): State<AppState>) -> Result<Json<Vec<Authority>>, Error> {
    Ok(Json(authority::all(state.repo.as_ref()).await?))
}

/// create_authority
///
/// [Admin Route] Creates a role under an optional existing parent.
#[utoipa::path(
    post,
    path = "/admin/authorities",
    request_body = CreateAuthorityRequest,
    responses(
        (status = 201, description = "Created", body = Authority),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Parent not found"),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn create_authority(
    State(state): State<AppState>,
    Json(payload): Json<CreateAuthorityRequest>,
) -> Result<(StatusCode, Json<Authority>), Error> {
    let created = authority::create(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_authority
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/admin/authorities/{id}",
    params(("id" = i64, Path, description = "Authority ID")),
    responses(
        (status = 200, description = "Authority", body = Authority),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_authority(
    State(state): State<AppState>,
    Path(id): Path<AuthorityId>,
) -> Result<Json<Authority>, Error> {
    Ok(Json(authority::get(state.repo.as_ref(), id).await?))
}

/// update_authority
///
/// [Admin Route] Partial update. A new parent is checked for existence and
/// for closing a loop in the hierarchy.
#[utoipa::path(
    put,
    path = "/admin/authorities/{id}",
    params(("id" = i64, Path, description = "Authority ID")),
    request_body = UpdateAuthorityRequest,
    responses(
        (status = 200, description = "Updated", body = Authority),
        (status = 400, description = "Invalid input or cyclic parent"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Code already in use")
    )
)]
pub async fn update_authority(
    State(state): State<AppState>,
    Path(id): Path<AuthorityId>,
    Json(payload): Json<UpdateAuthorityRequest>,
) -> Result<Json<Authority>, Error> {
    Ok(Json(authority::update(state.repo.as_ref(), id, payload).await?))
}

/// delete_authority
///
/// [Admin Route] Refused with 409 while users or child authorities reference it.
#[utoipa::path(
    delete,
    path = "/admin/authorities/{id}",
    params(("id" = i64, Path, description = "Authority ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Still referenced")
    )
)]
pub async fn delete_authority(
    State(state): State<AppState>,
    Path(id): Path<AuthorityId>,
) -> Result<StatusCode, Error> {
    authority::delete(state.repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// get_authority_menus
///
/// [Admin Route] The permission-editor view of one authority.
#[utoipa::path(
    get,
    path = "/admin/authorities/{id}/menus",
    params(("id" = i64, Path, description = "Authority ID")),
    responses(
        (status = 200, description = "Grant matrix", body = GrantMatrix),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_authority_menus(
    State(state): State<AppState>,
    Path(id): Path<AuthorityId>,
) -> Result<Json<GrantMatrix>, Error> {
    Ok(Json(grants::grant_matrix(state.repo.as_ref(), id).await?))
}

/// replace_authority_menus
///
/// [Admin Route] Replaces the authority's grants with exactly `menu_ids`.
/// Rejected with 400 when the set exceeds the parent's grants.
#[utoipa::path(
    put,
    path = "/admin/authorities/{id}/menus",
    params(("id" = i64, Path, description = "Authority ID")),
    request_body = ReplaceGrantsRequest,
    responses(
        (status = 204, description = "Replaced"),
        (status = 400, description = "Exceeds parent grants"),
        (status = 404, description = "Authority or menu not found")
    )
)]
pub async fn replace_authority_menus(
    State(state): State<AppState>,
    Path(id): Path<AuthorityId>,
    Json(payload): Json<ReplaceGrantsRequest>,
) -> Result<StatusCode, Error> {
    grants::replace(state.repo.as_ref(), id, payload.menu_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Menus ---

/// list_menus
///
/// [Admin Route] One page of menu entries, filtered by title and path.
#[utoipa::path(
    get,
    path = "/admin/menus",
    params(MenuQuery),
    responses((status = 200, description = "Menu page", body = Page<MenuEntry>))
)]
pub async fn list_menus(
    State(state): State<AppState>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<Page<MenuEntry>>, Error> {
    let filter = MenuFilter {
        title: query.title,
        path: query.path,
    };
    let paging = Pagination::new(query.page, query.page_size);
    Ok(Json(menu::list(state.repo.as_ref(), filter, paging).await?))
}

/// menu_tree
///
/// [Admin Route] The complete catalogue as a forest.
#[utoipa::path(
    get,
    path = "/admin/menus/tree",
    responses((status = 200, description = "Menu tree", body = [MenuNode]))
)]
pub async fn menu_tree(State(state): State<AppState>) -> Result<Json<Vec<MenuNode>>, Error> {
    Ok(Json(menu::tree(state.repo.as_ref()).await?))
}

/// create_menu
///
/// [Admin Route]
#[utoipa::path(
    post,
    path = "/admin/menus",
    request_body = CreateMenuRequest,
    responses(
        (status = 201, description = "Created", body = MenuEntry),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Parent not found")
    )
)]
pub async fn create_menu(
    State(state): State<AppState>,
    Json(payload): Json<CreateMenuRequest>,
) -> Result<(StatusCode, Json<MenuEntry>), Error> {
    let created = menu::create(state.repo.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// get_menu
///
/// [Admin Route]
#[utoipa::path(
    get,
    path = "/admin/menus/{id}",
    params(("id" = i64, Path, description = "Menu ID")),
    responses(
        (status = 200, description = "Menu entry", body = MenuEntry),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_menu(
    State(state): State<AppState>,
    Path(id): Path<MenuId>,
) -> Result<Json<MenuEntry>, Error> {
    Ok(Json(menu::get(state.repo.as_ref(), id).await?))
}

/// update_menu
///
/// [Admin Route] Partial update; the merged entry is re-validated.
#[utoipa::path(
    put,
    path = "/admin/menus/{id}",
    params(("id" = i64, Path, description = "Menu ID")),
    request_body = UpdateMenuRequest,
    responses(
        (status = 200, description = "Updated", body = MenuEntry),
        (status = 400, description = "Invalid input or cyclic parent"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_menu(
    State(state): State<AppState>,
    Path(id): Path<MenuId>,
    Json(payload): Json<UpdateMenuRequest>,
) -> Result<Json<MenuEntry>, Error> {
    Ok(Json(menu::update(state.repo.as_ref(), id, payload).await?))
}

/// delete_menu
///
/// [Admin Route] Refused with 409 while the entry has children.
#[utoipa::path(
    delete,
    path = "/admin/menus/{id}",
    params(("id" = i64, Path, description = "Menu ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Has children")
    )
)]
pub async fn delete_menu(
    State(state): State<AppState>,
    Path(id): Path<MenuId>,
) -> Result<StatusCode, Error> {
    menu::delete(state.repo.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
