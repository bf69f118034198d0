use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// API Router Module
///
/// JSON endpoints, nested under `/api`. Documented in the OpenAPI document served at
/// `/api-docs/openapi.json`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // GET /api/queries
        // Keys currently held by the remote data cache.
        .route("/queries", get(handlers::list_queries))
        // POST /api/queries/invalidate
        // Marks every cached query stale.
        .route("/queries/invalidate", post(handlers::invalidate_all_queries))
        // GET /api/queries/{key}
        // Snapshot of one query without triggering a fetch.
        .route("/queries/{key}", get(handlers::get_query))
        // POST /api/queries/{key}/invalidate
        // Marks a query stale; the next page visit refetches it.
        .route("/queries/{key}/invalidate", post(handlers::invalidate_query))
        // GET/POST/DELETE /api/session
        // Read, create (login) and delete (logout) the Current User.
        .route(
            "/session",
            get(handlers::get_session)
                .post(handlers::create_session)
                .delete(handlers::delete_session),
        )
}
