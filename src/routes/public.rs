use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Pages every visitor can see. Each list page depends on one query key and renders the
/// loading, error or ready state of that query.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe. Never touches the upstream API.
        .route("/health", get(|| async { "ok" }))
        // GET /
        // Landing page with links to every section.
        .route("/", get(handlers::index))
        // GET /posts, /products, /users, /recipes
        // List pages backed by the remote data cache.
        .route("/posts", get(handlers::get_posts))
        .route("/products", get(handlers::get_products))
        .route("/users", get(handlers::get_users))
        .route("/recipes", get(handlers::get_recipes))
        // GET/POST /login
        // Login form and its submission. Credentials are verified upstream.
        .route("/login", get(handlers::get_login).post(handlers::post_login))
        // POST /logout
        // Clears the Current User. Idempotent.
        .route("/logout", post(handlers::post_logout))
}
