use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    config::AppConfig,
    error::{AuthError, FetchError},
    models::{LoginRequest, UpstreamMessage, User},
};

// 1. RemoteApi Contract
/// RemoteApi
///
/// Abstract contract for every call the portal makes to the upstream REST API. Handlers,
/// the query cache fetchers and the Auth Context only ever see this trait, so the real
/// HTTP client (`DummyJsonClient`) and the in-process `MockRemoteApi` are interchangeable.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// GETs `path` (e.g. "/products") and returns the JSON body as-is.
    async fn get_json(&self, path: &str) -> Result<Value, FetchError>;

    /// Verifies credentials against the upstream authentication endpoint.
    async fn login(&self, credentials: &LoginRequest) -> Result<User, AuthError>;
}

/// RemoteApiState
///
/// The concrete type used to share upstream access across the application state.
pub type RemoteApiState = Arc<dyn RemoteApi>;

// 2. The Real Implementation
/// DummyJsonClient
///
/// reqwest-backed client for the public demo API. The inner `reqwest::Client` keeps its own
/// connection pool, so one instance is shared by the whole process.
#[derive(Clone)]
pub struct DummyJsonClient {
    client: reqwest::Client,
    base_url: String,
}

impl DummyJsonClient {
    /// Builds the client from the loaded configuration.
    pub fn new(config: &AppConfig) -> Result<Self, FetchError> {
        Self::with_base_url(&config.api_base_url, config.upstream_timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteApi for DummyJsonClient {
    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        let url = self.url(path);
        tracing::debug!(%url, "fetching upstream resource");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, status = status.as_u16(), "upstream returned an error status");
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(FetchError::from)
    }

    /// login
    ///
    /// POSTs the credentials to `/auth/login`. A 400/401 answer is a rejection carrying the
    /// upstream message; any other failure is reported as an upstream error.
    async fn login(&self, credentials: &LoginRequest) -> Result<User, AuthError> {
        let url = self.url("/auth/login");

        let response = self
            .client
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let reason = response
                .json::<UpstreamMessage>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Invalid credentials".to_string());
            return Err(AuthError::Rejected { reason });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            }
            .into());
        }

        let user = response.json::<User>().await.map_err(FetchError::from)?;
        Ok(user)
    }
}

// 3. The Mock Implementation (For Tests)
/// MockRemoteApi
///
/// In-process stand-in for the upstream API. Responses are registered per path, every call
/// is counted, and an optional delay simulates a slow network so tests can observe the
/// loading state and single-flight behaviour.
#[derive(Default)]
pub struct MockRemoteApi {
    responses: Mutex<HashMap<String, Result<Value, FetchError>>>,
    accounts: Mutex<Vec<(String, String, User)>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MockRemoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_response(self, path: &str, body: Value) -> Self {
        self.set_response(path, Ok(body));
        self
    }

    pub fn with_failure(self, path: &str, error: FetchError) -> Self {
        self.set_response(path, Err(error));
        self
    }

    /// Registers an account that `login` accepts.
    pub fn with_account(self, username: &str, password: &str, user: User) -> Self {
        self.accounts
            .lock()
            .push((username.to_string(), password.to_string(), user));
        self
    }

    /// Replaces the canned answer for `path`, e.g. to simulate a change between fetches.
    pub fn set_response(&self, path: &str, response: Result<Value, FetchError>) {
        self.responses.lock().insert(normalize(path), response);
    }

    /// How many times `path` was requested ("/auth/login" for logins).
    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().get(&normalize(path)).copied().unwrap_or(0)
    }

    fn record_call(&self, path: &str) {
        *self.calls.lock().entry(normalize(path)).or_insert(0) += 1;
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[async_trait]
impl RemoteApi for MockRemoteApi {
    async fn get_json(&self, path: &str) -> Result<Value, FetchError> {
        self.record_call(path);
        self.simulate_latency().await;

        let response = self.responses.lock().get(&normalize(path)).cloned();
        response.unwrap_or(Err(FetchError::Status { status: 404 }))
    }

    async fn login(&self, credentials: &LoginRequest) -> Result<User, AuthError> {
        self.record_call("/auth/login");
        self.simulate_latency().await;

        let accounts = self.accounts.lock();
        accounts
            .iter()
            .find(|(username, password, _)| {
                *username == credentials.username && *password == credentials.password
            })
            .map(|(_, _, user)| user.clone())
            .ok_or_else(|| AuthError::Rejected {
                reason: "Invalid credentials".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_joins_without_double_slash() {
        let client = DummyJsonClient::with_base_url("https://dummyjson.com/", None).unwrap();
        assert_eq!(client.url("/posts"), "https://dummyjson.com/posts");
        assert_eq!(client.url("products"), "https://dummyjson.com/products");
    }

    #[tokio::test]
    async fn mock_counts_calls_and_defaults_to_not_found() {
        let mock = MockRemoteApi::new().with_response("/posts", json!({"posts": []}));

        assert!(mock.get_json("posts").await.is_ok());
        assert_eq!(
            mock.get_json("/missing").await,
            Err(FetchError::Status { status: 404 })
        );
        assert_eq!(mock.calls("/posts"), 1);
    }

    #[tokio::test]
    async fn mock_login_rejects_unknown_credentials() {
        let mock = MockRemoteApi::new().with_account("emilys", "emilyspass", User::default());
        let bad = LoginRequest {
            username: "emilys".to_string(),
            password: "nope".to_string(),
        };

        assert!(matches!(
            mock.login(&bad).await,
            Err(AuthError::Rejected { .. })
        ));
    }
}
