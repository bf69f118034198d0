use dummyjson_portal::{
    AppConfig, AppState, create_router,
    remote::{DummyJsonClient, RemoteApiState},
    storage::{FileSessionStore, SessionStoreState},
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub struct TestApp {
    pub address: String,
    pub state: AppState,
}

/// Serves the full application on a random local port, talking to `upstream` over HTTP and
/// persisting sessions under `sessions_dir`.
async fn spawn_app(upstream: &MockServer, sessions_dir: &TempDir) -> TestApp {
    let config = AppConfig {
        api_base_url: upstream.uri(),
        session_file: sessions_dir.path().join("session.json"),
        upstream_timeout: Some(Duration::from_secs(5)),
        ..AppConfig::default()
    };

    let api = Arc::new(DummyJsonClient::new(&config).expect("Failed to build client"))
        as RemoteApiState;
    let sessions =
        Arc::new(FileSessionStore::new(config.session_file.clone())) as SessionStoreState;

    let state = AppState::new(api, sessions, config);
    state.auth.restore().await;
    let router = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address, state }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

async fn mount_login(upstream: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "username": "emilys",
            "email": "emily.johnson@x.dummyjson.com",
            "firstName": "Emily",
            "lastName": "Johnson",
            "birthDate": "1996-5-30",
            "accessToken": "access",
            "refreshToken": "refresh"
        })))
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn test_health_check() {
    let upstream = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = spawn_app(&upstream, &dir).await;

    let response = client()
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let upstream = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = spawn_app(&upstream, &dir).await;

    let response = client()
        .get(format!("{}/health", app.address))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_posts_page_fetches_upstream_once() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "posts": [{"id": 1, "title": "Hello", "body": "World", "userId": 5,
                               "tags": ["intro"], "reactions": {"likes": 3, "dislikes": 0}}],
                    "total": 1
                }))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let dir = TempDir::new().unwrap();
    let app = spawn_app(&upstream, &dir).await;
    let client = client();
    let url = format!("{}/posts", app.address);

    let (first, second) = tokio::join!(client.get(&url).send(), client.get(&url).send());
    let first = first.expect("req fail");
    let second = second.expect("req fail");

    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 200);
    assert!(first.text().await.unwrap().contains("Hello"));

    // MockServer verifies `expect(1)` when dropped.
}

#[tokio::test]
async fn test_upstream_outage_renders_error_page() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&upstream)
        .await;

    let dir = TempDir::new().unwrap();
    let app = spawn_app(&upstream, &dir).await;

    let response = client()
        .get(format!("{}/products", app.address))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), 502);
    assert!(response.text().await.unwrap().contains("Error loading products"));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let upstream = MockServer::start().await;
    mount_login(&upstream).await;

    let dir = TempDir::new().unwrap();
    let app = spawn_app(&upstream, &dir).await;
    let client = client();

    // 1. Nobody is logged in yet
    let res = client
        .get(format!("{}/api/session", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 401);

    // 2. Log in through the JSON API
    let res = client
        .post(format!("{}/api/session", app.address))
        .json(&json!({"username": "emilys", "password": "emilyspass"}))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 200);
    let user: Value = res.json().await.unwrap();
    assert_eq!(user["firstName"], "Emily");

    // 3. The profile page is now reachable
    let res = client
        .get(format!("{}/profile", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 200);
    let html = res.text().await.unwrap();
    assert!(html.contains("Emily Johnson"));
    assert!(html.contains("May 30, 1996"));

    // 4. Log out and lose access again
    let res = client
        .delete(format!("{}/api/session", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 204);

    let res = client
        .get(format!("{}/profile", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 303);
    assert_eq!(res.headers()["location"], "/");
    assert!(app.state.auth.current_user().is_none());
}

#[tokio::test]
async fn test_persisted_session_survives_restart() {
    let upstream = MockServer::start().await;
    mount_login(&upstream).await;
    let dir = TempDir::new().unwrap();

    let first = spawn_app(&upstream, &dir).await;
    let res = client()
        .post(format!("{}/login", first.address))
        .form(&[("username", "emilys"), ("password", "emilyspass")])
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 303);

    // A fresh application session restores the user from disk.
    let second = spawn_app(&upstream, &dir).await;
    assert_eq!(
        second.state.auth.current_user().map(|u| u.username.clone()),
        Some("emilys".to_string())
    );

    let res = client()
        .get(format!("{}/profile", second.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let upstream = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let app = spawn_app(&upstream, &dir).await;

    let res = client()
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(res.status(), 200);

    let doc: Value = res.json().await.unwrap();
    assert!(doc["paths"]["/api/session"].is_object());
    assert!(doc["paths"]["/api/queries/{key}"].is_object());
}
