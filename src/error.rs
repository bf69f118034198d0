use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// FetchError
///
/// Every way a single upstream fetch can fail. The variants carry plain strings so the
/// error can be cloned out of the cache to every waiter of a shared fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, timeout, reset).
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The upstream answered with a non-success status code.
    #[error("upstream returned status {status}")]
    Status { status: u16 },

    /// The body was not the JSON shape we expected.
    #[error("could not decode upstream response: {message}")]
    Decode { message: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode {
            message: err.to_string(),
        }
    }
}

/// AuthError
///
/// Reasons a login attempt can fail. None of them mutate the Auth Context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("username and password are required")]
    MissingCredentials,

    /// The upstream authentication endpoint refused the credentials.
    #[error("{reason}")]
    Rejected { reason: String },

    #[error(transparent)]
    Upstream(#[from] FetchError),
}

/// SessionError
///
/// Failures of the durable session side channel. These are logged, never surfaced to pages.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("session payload is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// ConfigError
///
/// Raised by `AppConfig::load` when the runtime environment cannot start safely.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
}

/// ApiError
///
/// Unified error type for the JSON API; converts into a status code plus an
/// `{error, message}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upstream failure: {0}")]
    Upstream(FetchError),
}

/// ErrorResponse
///
/// Body returned by every failing JSON API call.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine readable code, e.g. "not_found".
    pub error: String,
    /// Human readable message.
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::BadRequest(err.to_string()),
            AuthError::Rejected { reason } => ApiError::Unauthorized(reason),
            AuthError::Upstream(fetch) => ApiError::Upstream(fetch),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "API request failed");
        }

        let body = Json(ErrorResponse {
            error: code.to_string(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
