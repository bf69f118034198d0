use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::{
    error::AuthError,
    models::{LoginRequest, User},
    remote::RemoteApiState,
    storage::SessionStoreState,
};

/// AuthContext
///
/// Holds at most one Current User for the application session. The user is replaced
/// wholesale on login and cleared wholesale on logout; readers get a shared `Arc` and can
/// never mutate it. Every change is mirrored to the session store, but that mirror is a
/// side channel: its failures are logged and never change the outcome of an operation.
pub struct AuthContext {
    api: RemoteApiState,
    store: SessionStoreState,
    current: RwLock<Option<Arc<User>>>,
    /// Held across the in-memory swap and the store write, so memory and disk always
    /// change in the same order.
    transition: tokio::sync::Mutex<()>,
}

/// AuthState
///
/// The concrete type used to share the Auth Context across the application state.
pub type AuthState = Arc<AuthContext>;

impl AuthContext {
    pub fn new(api: RemoteApiState, store: SessionStoreState) -> Self {
        Self {
            api,
            store,
            current: RwLock::new(None),
            transition: tokio::sync::Mutex::new(()),
        }
    }

    /// restore
    ///
    /// Reloads a previously persisted user, typically once at startup. An unreadable or
    /// corrupt session is treated as "logged out".
    pub async fn restore(&self) -> Option<Arc<User>> {
        match self.store.load().await {
            Ok(Some(user)) => {
                tracing::info!(user_id = user.id, username = %user.username, "restored persisted session");
                let user = Arc::new(user);
                *self.current.write() = Some(user.clone());
                Some(user)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable persisted session");
                None
            }
        }
    }

    /// login
    ///
    /// Delegates verification to the upstream authentication endpoint. On success the
    /// returned user becomes the Current User; on failure the state is left untouched.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<Arc<User>, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let credentials = LoginRequest {
            username: identifier.to_string(),
            password: secret.to_string(),
        };

        let user = match self.api.login(&credentials).await {
            Ok(user) => Arc::new(user),
            Err(err) => {
                tracing::info!(username = identifier, error = %err, "login failed");
                return Err(err);
            }
        };

        let _transition = self.transition.lock().await;
        *self.current.write() = Some(user.clone());
        tracing::info!(user_id = user.id, username = %user.username, "user logged in");

        if let Err(err) = self.store.save(&user).await {
            tracing::warn!(error = %err, "could not persist session");
        }

        Ok(user)
    }

    /// logout
    ///
    /// Clears the Current User unconditionally. Idempotent.
    pub async fn logout(&self) {
        let _transition = self.transition.lock().await;
        if let Some(user) = self.current.write().take() {
            tracing::info!(user_id = user.id, "user logged out");
        }

        if let Err(err) = self.store.clear().await {
            tracing::warn!(error = %err, "could not clear persisted session");
        }
    }

    pub fn current_user(&self) -> Option<Arc<User>> {
        self.current.read().clone()
    }
}

/// CurrentUser Extractor
///
/// Resolves the logged-in user for pages that require one. When nobody is logged in the
/// request is redirected to the index page instead of reaching the handler.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        auth.current_user()
            .map(CurrentUser)
            .ok_or_else(|| Redirect::to("/"))
    }
}
