use axum::{
    Router,
    extract::{FromRef, Request},
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

// Core application services and components.
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod queries;
pub mod remote;
pub mod storage;
pub mod views;

// Module for routing segregation (Public, Authenticated, API).
pub mod routes;
use auth::CurrentUser;
use routes::{api, authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthContext, AuthState};
pub use cache::QueryCache;
pub use config::AppConfig;
pub use remote::{DummyJsonClient, MockRemoteApi, RemoteApiState};
pub use storage::{FileSessionStore, MemorySessionStore, SessionStoreState};

/// ApiDoc
///
/// OpenAPI document for the JSON API, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_queries, handlers::get_query, handlers::invalidate_query,
        handlers::invalidate_all_queries,
        handlers::get_session, handlers::create_session, handlers::delete_session
    ),
    components(
        schemas(
            cache::QuerySnapshot, cache::QueryStatus, error::FetchError, error::ErrorResponse,
            handlers::InvalidationSummary,
            models::User, models::Address, models::Company, models::LoginRequest,
        )
    ),
    tags(
        (name = "dummyjson-portal", description = "Query cache and session API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container for everything that lives as long as the application session:
/// the remote data cache, the Auth Context, upstream access and configuration. Built once
/// in `main` (or by a test) and injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Upstream REST API access.
    pub api: RemoteApiState,
    /// Remote data cache shared by all pages.
    pub cache: QueryCache,
    /// Holder of the Current User.
    pub auth: AuthState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the session-lifetime services from their dependencies.
    pub fn new(api: RemoteApiState, sessions: SessionStoreState, config: AppConfig) -> Self {
        let cache = QueryCache::new(config.stale_time, config.gc_time);
        let auth = std::sync::Arc::new(AuthContext::new(api.clone(), sessions));
        Self {
            api,
            cache,
            auth,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for QueryCache {
    fn from_ref(app_state: &AppState) -> QueryCache {
        app_state.cache.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// require_user
///
/// Guard for the authenticated routes. `CurrentUser` rejects anonymous requests with a
/// redirect to the index page before the handler runs.
async fn require_user(_user: CurrentUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the full routing structure, applies global and scoped middleware, and
/// registers the application state.
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
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), require_user)),
        )
        .nest("/api", api::api_routes())
        .fallback(handlers::not_found)
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
/// Opens the per-request span, tagged with the `x-request-id` so every log line of one
/// request can be correlated.
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
