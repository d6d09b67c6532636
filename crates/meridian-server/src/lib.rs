//! Meridian Server: HTTP control plane over the provisioning orchestrator
//!
//! Exposes create/delete, registry administration, statistics and the
//! pending-retry workflow under `/api`. Every route except `/api/health`
//! requires the `X-Api-Key` header.

pub mod api;
pub mod auth;
pub mod error;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::{header, Method},
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/create", post(api::users::create_user))
        .route("/deleteUser", delete(api::users::delete_user))
        .route("/getUsers", post(api::users::get_users))
        .route("/getInbounds", post(api::users::get_inbounds))
        .route(
            "/servers",
            get(api::servers::list_servers)
                .post(api::servers::add_servers)
                .put(api::servers::update_servers)
                .delete(api::servers::delete_servers),
        )
        .route("/stats", get(api::stats::stats))
        .route("/users", get(api::stats::list_users))
        .route("/users/count", get(api::stats::count_users))
        .route("/nodes/users", get(api::stats::nodes_with_users))
        .route("/cleanup", post(api::cleanup::run_cleanup))
        .route(
            "/cleanup/pending",
            get(api::cleanup::list_pending).delete(api::cleanup::remove_pending),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    let public = Router::new().route(
        "/health",
        get(|| async {
            Json(serde_json::json!({
                "status": "ok",
                "service": "meridian",
                "version": env!("CARGO_PKG_VERSION")
            }))
        }),
    );

    Router::new()
        .nest("/api", protected.merge(public))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static(auth::API_KEY_HEADER),
                ]),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until Ctrl-C or SIGTERM
pub async fn run_server(config: ServerConfig, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Meridian listening on http://{}", addr);
    tracing::info!("   Health: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
