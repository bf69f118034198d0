use dummyjson_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    remote::{DummyJsonClient, RemoteApiState},
    storage::{FileSessionStore, SessionStoreState},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: loads configuration, initialises logging, builds the session-lifetime
/// services (upstream client, query cache, Auth Context) and serves HTTP until shutdown.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and request-level logs from tower-http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dummyjson_portal=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    tracing::info!(upstream = %config.api_base_url, "using upstream API");

    // 4. Upstream Client
    let api = Arc::new(
        DummyJsonClient::new(&config).expect("FATAL: could not build the upstream HTTP client"),
    ) as RemoteApiState;

    // 5. Session Persistence
    let sessions = Arc::new(FileSessionStore::new(config.session_file.clone())) as SessionStoreState;

    // 6. Unified State Assembly
    let gc_interval = config.gc_interval;
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(api, sessions, config);

    // A session persisted by a previous run survives the restart.
    app_state.auth.restore().await;

    // Unobserved queries are dropped once their retention window elapses.
    let sweeper = app_state.cache.spawn_sweeper(gc_interval);

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: could not bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "HTTP server stopped unexpectedly");
    }

    sweeper.abort();
    tracing::info!("Shutdown complete");
}

/// Resolves on Ctrl+C, which ends the application session.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not install the Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
