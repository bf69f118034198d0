use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Pages that only make sense with a logged-in user. The router is wrapped in a guard
/// layer (see `create_router`) that redirects anonymous visitors to the index page; the
/// handlers additionally take the `CurrentUser` extractor to read the user.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /profile
        // Full profile of the Current User.
        .route("/profile", get(handlers::get_profile))
}
