use crate::{
    AppState,
    auth::CurrentUser,
    cache::QuerySnapshot,
    error::{ApiError, ApiResult, AuthError, ErrorResponse},
    models::{LoginRequest, PostsResponse, ProductsResponse, RecipesResponse, User, UsersResponse},
    queries::{Listing, fetch_listing},
    views::{self, Envelope, ViewState},
};
use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

// --- Page Handlers ---

/// index
///
/// [Public Page] Landing page with links to every section.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let user = state.auth.current_user();
    let body = views::render_index(user.as_deref());
    Html(views::layout("Home", user.as_deref(), &body, false))
}

/// render_listing_page
///
/// Shared flow of every list page: register as an observer of the page's query key,
/// resolve it within the render budget, and render the resulting view state. When the
/// budget runs out the page shows skeletons; the fetch keeps running and fills the cache
/// for the next visit. An error state answers with 502 so it is visible in access logs.
async fn render_listing_page<E: Envelope>(state: &AppState, listing: Listing) -> Response {
    let _observer = state.cache.observe(listing.key());

    let api = state.api.clone();
    let resolved = tokio::time::timeout(
        state.config.render_budget,
        state
            .cache
            .resolve(listing.key(), move || fetch_listing(api, listing)),
    )
    .await
    .ok();

    if resolved.is_none() {
        tracing::debug!(key = listing.key(), "render budget elapsed, serving loading state");
    }

    let view = views::view_state::<E>(listing, resolved.as_ref());
    let status = match view {
        ViewState::Error { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    let loading = matches!(view, ViewState::Loading { .. });

    let user = state.auth.current_user();
    let body = views::render_listing(listing, &view);
    let page = views::layout(listing.title(), user.as_deref(), &body, loading);

    (status, Html(page)).into_response()
}

/// [Public Page] GET /posts
pub async fn get_posts(State(state): State<AppState>) -> Response {
    render_listing_page::<PostsResponse>(&state, Listing::Posts).await
}

/// [Public Page] GET /products
pub async fn get_products(State(state): State<AppState>) -> Response {
    render_listing_page::<ProductsResponse>(&state, Listing::Products).await
}

/// [Public Page] GET /users
pub async fn get_users(State(state): State<AppState>) -> Response {
    render_listing_page::<UsersResponse>(&state, Listing::Users).await
}

/// [Public Page] GET /recipes
pub async fn get_recipes(State(state): State<AppState>) -> Response {
    render_listing_page::<RecipesResponse>(&state, Listing::Recipes).await
}

/// get_profile
///
/// [Authenticated Page] Full profile of the Current User. The `CurrentUser` extractor
/// redirects to the index page when nobody is logged in.
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Html<String> {
    let body = views::render_profile(&user);
    Html(views::layout("Profile", Some(&user), &body, false))
}

/// get_login
///
/// [Public Page] Login form. Already logged-in users go straight to their profile.
pub async fn get_login(State(state): State<AppState>) -> Response {
    if state.auth.current_user().is_some() {
        return Redirect::to("/profile").into_response();
    }
    Html(views::layout("Login", None, &views::render_login(None, ""), false)).into_response()
}

/// post_login
///
/// [Public Page] Form submission of the login page. Success redirects to the profile;
/// failure re-renders the form with the reason and leaves the session untouched.
pub async fn post_login(State(state): State<AppState>, Form(form): Form<LoginRequest>) -> Response {
    match state.auth.login(&form.username, &form.password).await {
        Ok(_) => Redirect::to("/profile").into_response(),
        Err(err) => {
            let (status, message) = match &err {
                AuthError::MissingCredentials => (StatusCode::BAD_REQUEST, err.to_string()),
                AuthError::Rejected { reason } => (StatusCode::UNAUTHORIZED, reason.clone()),
                AuthError::Upstream(_) => (
                    StatusCode::BAD_GATEWAY,
                    "Login is unavailable right now, please try again later".to_string(),
                ),
            };
            let body = views::render_login(Some(&message), &form.username);
            (status, Html(views::layout("Login", None, &body, false))).into_response()
        }
    }
}

/// [Public Page] POST /logout
pub async fn post_logout(State(state): State<AppState>) -> Redirect {
    state.auth.logout().await;
    Redirect::to("/")
}

/// Fallback for unknown routes.
pub async fn not_found(State(state): State<AppState>) -> Response {
    let user = state.auth.current_user();
    let page = views::layout("Not Found", user.as_deref(), &views::render_not_found(), false);
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

// --- JSON API Handlers ---

/// list_queries
///
/// Keys currently held by the remote data cache.
#[utoipa::path(
    get,
    path = "/api/queries",
    responses((status = 200, description = "Cached query keys", body = [String]))
)]
pub async fn list_queries(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.cache.keys())
}

/// get_query
///
/// Current snapshot of one query, without triggering a fetch.
#[utoipa::path(
    get,
    path = "/api/queries/{key}",
    params(("key" = String, Path, description = "Query key, e.g. \"products\"")),
    responses(
        (status = 200, description = "Snapshot", body = QuerySnapshot),
        (status = 404, description = "Unknown key", body = ErrorResponse)
    )
)]
pub async fn get_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<QuerySnapshot>> {
    state
        .cache
        .peek(&key)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no cached query for '{key}'")))
}

/// invalidate_query
///
/// Marks a query stale so the next page visit refetches it.
#[utoipa::path(
    post,
    path = "/api/queries/{key}/invalidate",
    params(("key" = String, Path, description = "Query key")),
    responses(
        (status = 204, description = "Invalidated"),
        (status = 404, description = "Unknown key", body = ErrorResponse)
    )
)]
pub async fn invalidate_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    if state.cache.invalidate(&key) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("no cached query for '{key}'")))
    }
}

/// InvalidationSummary
#[derive(Debug, Serialize, ToSchema)]
pub struct InvalidationSummary {
    /// Number of cached queries marked stale.
    pub invalidated: usize,
}

/// invalidate_all_queries
///
/// Marks every cached query stale, e.g. after the upstream data changed wholesale.
#[utoipa::path(
    post,
    path = "/api/queries/invalidate",
    responses((status = 200, description = "All queries invalidated", body = InvalidationSummary))
)]
pub async fn invalidate_all_queries(State(state): State<AppState>) -> Json<InvalidationSummary> {
    let invalidated = state.cache.invalidate_all();
    tracing::info!(invalidated, "invalidated all cached queries");
    Json(InvalidationSummary { invalidated })
}

/// get_session
///
/// The Current User, if any.
#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Logged in", body = User),
        (status = 401, description = "Nobody is logged in", body = ErrorResponse)
    )
)]
pub async fn get_session(State(state): State<AppState>) -> ApiResult<Json<User>> {
    state
        .auth
        .current_user()
        .map(|user| Json(user.as_ref().clone()))
        .ok_or_else(|| ApiError::Unauthorized("nobody is logged in".to_string()))
}

/// create_session
///
/// Logs in with upstream credentials and returns the resulting user.
#[utoipa::path(
    post,
    path = "/api/session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = User),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "Rejected", body = ErrorResponse),
        (status = 502, description = "Upstream unavailable", body = ErrorResponse)
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<User>> {
    let user = state.auth.login(&payload.username, &payload.password).await?;
    Ok(Json(user.as_ref().clone()))
}

/// delete_session
///
/// Logs out. Idempotent.
#[utoipa::path(
    delete,
    path = "/api/session",
    responses((status = 204, description = "Logged out"))
)]
pub async fn delete_session(State(state): State<AppState>) -> StatusCode {
    state.auth.logout().await;
    StatusCode::NO_CONTENT
}
