use dummyjson_portal::{
    error::{AuthError, FetchError},
    models::LoginRequest,
    remote::{DummyJsonClient, RemoteApi},
};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

fn client_for(server: &MockServer) -> DummyJsonClient {
    DummyJsonClient::with_base_url(&server.uri(), Some(Duration::from_secs(5))).unwrap()
}

fn credentials(password: &str) -> LoginRequest {
    LoginRequest {
        username: "emilys".to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_get_json_returns_body_as_is() {
    let server = MockServer::start().await;
    let body = json!({"products": [{"id": 1, "title": "Essence Mascara", "price": 9.99}], "total": 1});

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let fetched = client_for(&server).get_json("/products").await.unwrap();
    assert_eq!(fetched, body);
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).get_json("/posts").await.unwrap_err();
    assert_eq!(err, FetchError::Status { status: 503 });
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_json("/posts").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn test_unreachable_upstream_is_a_transport_error() {
    // Nothing listens on the discard port of localhost.
    let client =
        DummyJsonClient::with_base_url("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();

    let err = client.get_json("/posts").await.unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }));
}

#[tokio::test]
async fn test_login_forwards_credentials_and_decodes_user() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"username": "emilys", "password": "emilyspass"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "username": "emilys",
            "email": "emily.johnson@x.dummyjson.com",
            "firstName": "Emily",
            "lastName": "Johnson",
            "gender": "female",
            "image": "https://dummyjson.com/icon/emilys/128",
            "accessToken": "access",
            "refreshToken": "refresh"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user = client_for(&server)
        .login(&credentials("emilyspass"))
        .await
        .unwrap();

    assert_eq!(user.id, 1);
    assert_eq!(user.first_name, "Emily");
    assert_eq!(user.access_token.as_deref(), Some("access"));
}

#[tokio::test]
async fn test_login_rejection_carries_upstream_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid credentials"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .login(&credentials("wrong"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AuthError::Rejected {
            reason: "Invalid credentials".to_string()
        }
    );
}

#[tokio::test]
async fn test_login_server_error_is_an_upstream_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .login(&credentials("emilyspass"))
        .await
        .unwrap_err();

    assert_eq!(err, AuthError::Upstream(FetchError::Status { status: 500 }));
}
