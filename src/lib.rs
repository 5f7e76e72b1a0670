use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authorization core.
pub mod authority;
pub mod error;
pub mod grants;
pub mod menu;
pub mod models;
pub mod resolver;
pub mod tree;

// Persistence.
pub mod memory;
pub mod repository;

// Request layer.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{Error, Result};
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};
pub use resolver::{MenuPolicy, MenuResolver};

/// ApiDoc
///
/// OpenAPI document for every routed handler, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_my_menus,
        handlers::list_authorities, handlers::all_authorities, handlers::create_authority,
        handlers::get_authority, handlers::update_authority, handlers::delete_authority,
        handlers::get_authority_menus, handlers::replace_authority_menus,
        handlers::list_menus, handlers::menu_tree, handlers::create_menu,
        handlers::get_menu, handlers::update_menu, handlers::delete_menu
    ),
    components(
        schemas(
            models::Authority, models::MenuEntry, models::MenuKind, models::MenuNode,
            models::GrantMatrix, models::CreateAuthorityRequest, models::UpdateAuthorityRequest,
            models::CreateMenuRequest, models::UpdateMenuRequest, models::ReplaceGrantsRequest,
        )
    ),
    tags(
        (name = "console-rbac", description = "Authority hierarchy and menu permission API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply cloneable state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
    pub resolver: MenuResolver,
}

impl AppState {
    /// Wires the resolver to the repository with the configured menu policy.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let resolver = MenuResolver::new(repo.clone(), config.menu_policy());
        Self {
            repo,
            config,
            resolver,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless an `AuthUser` can be extracted.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Authenticates like `auth_middleware`, then admits only users acting under
/// the configured root authority (403 otherwise).
async fn admin_middleware(
    State(state): State<AppState>,
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response> {
    let root = state.resolver.policy().root_authority_id;
    if auth_user.authority_id != root {
        tracing::warn!(
            user_id = auth_user.user_id,
            authority_id = auth_user.authority_id,
            "rejected admin request from non-root authority"
        );
        return Err(Error::Forbidden(format!(
            "authority {} may not administer the console",
            auth_user.authority_id
        )));
    }
    Ok(next.run(request).await)
}

/// create_router
///
/// Assembles the routes, the authentication layer, and the observability
/// stack around them.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                admin_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, carrying method, URI and the `x-request-id` so every
/// log line of the request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
