use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::error::ConfigError;

/// Public demo API used when nothing else is configured.
pub const DEFAULT_API_BASE_URL: &str = "https://dummyjson.com";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and shared
/// with handlers through `FromRef`, so every request sees the same settings.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which variables are mandatory.
    pub env: Env,
    // Base URL of the upstream REST API, without a trailing slash.
    pub api_base_url: String,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Where the logged-in user is persisted between restarts.
    pub session_file: PathBuf,
    // How long a successful query counts as fresh.
    pub stale_time: Duration,
    // How long an unobserved query is retained before garbage collection.
    pub gc_time: Duration,
    // Period of the background garbage collection sweep.
    pub gc_interval: Duration,
    // How long a page waits for its query before rendering the loading state.
    pub render_budget: Duration,
    // Optional per-request timeout for upstream calls. None keeps the client default.
    pub upstream_timeout: Option<Duration>,
}

/// Env
///
/// Runtime context: `Local` favours developer convenience, `Production` demands
/// explicit configuration and structured logs.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe values for tests and local runs; no environment access.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            session_file: PathBuf::from(".portal-session.json"),
            stale_time: Duration::from_secs(60),
            gc_time: Duration::from_secs(300),
            gc_interval: Duration::from_secs(60),
            render_budget: Duration::from_millis(1500),
            upstream_timeout: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Unparseable numbers fall back to
    /// their defaults with a warning; a missing `API_BASE_URL` in production is an error so
    /// the process refuses to start against an implicit upstream.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let api_base_url = match (&env, env::var("API_BASE_URL")) {
            (_, Ok(url)) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            (Env::Production, _) => return Err(ConfigError::Missing("API_BASE_URL")),
            (Env::Local, _) => defaults.api_base_url,
        };

        Ok(Self {
            env,
            api_base_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            session_file: env::var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            stale_time: read_number("STALE_TIME_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stale_time),
            gc_time: read_number("GC_TIME_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.gc_time),
            gc_interval: read_number("GC_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.gc_interval),
            render_budget: read_number("RENDER_BUDGET_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.render_budget),
            upstream_timeout: read_number("UPSTREAM_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

/// Parses a numeric variable, warning (not failing) on garbage.
fn read_number<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}
