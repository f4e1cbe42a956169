//! Sheet ETL API Server implementation
//!
//! HTTP API behind the browser upload page: clean an uploaded master sheet and
//! preview it, or clean and load it into the warehouse.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::cleaner::SheetCleaner;
use crate::config::Config;
use crate::loader::{LoadOptions, PostgresWarehouse, Warehouse, WarehouseLoader};

/// API Server configuration
#[derive(Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub version: String,
    pub preview_rows: usize,
    pub max_upload_bytes: usize,
    pub cleaner: SheetCleaner,
    pub loader: WarehouseLoader<Arc<dyn Warehouse>>,
}

impl AppState {
    pub fn new(config: &Config, warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            preview_rows: config.cleaner.preview_rows,
            max_upload_bytes: config.server.max_upload_bytes,
            cleaner: SheetCleaner::new(&config.cleaner),
            loader: WarehouseLoader::new(warehouse, LoadOptions::from(&config.warehouse)),
        }
    }

    /// State wired to the configured PostgreSQL warehouse
    pub fn postgres(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(PostgresWarehouse::new(config.warehouse.clone())),
        )
    }
}

/// Build the router (separate from `run_api_server` so it can be driven in tests)
pub fn build_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Core API endpoints
        .route("/api/v1/clean", post(handlers::clean))
        .route("/api/v1/load", post(handlers::load))
        // State and middleware
        .with_state(state)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(api: ApiConfig, config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState::postgres(&config));
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", api.host, api.port).parse()?;
    info!("Sheet ETL API Server starting on http://{}", addr);
    info!("   Endpoints: /api/v1/clean, /api/v1/load");
    info!("   Health: /health, Version: /version");
    info!(
        "   Warehouse: {}:{}/{}",
        config.warehouse.host, config.warehouse.port, config.warehouse.database
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Sheet ETL API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_config_address_format() {
        let config = ApiConfig {
            host: "192.168.1.100".to_string(),
            port: 9090,
        };
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse().unwrap();
        assert_eq!(addr.port(), 9090);
    }

    #[test]
    fn test_app_state_from_config() {
        let mut config = Config::default();
        config.cleaner.preview_rows = 3;
        let state = AppState::postgres(&config);
        assert_eq!(state.preview_rows, 3);
        assert_eq!(state.cleaner.required_sheets().len(), 6);
        assert!(!state.version.is_empty());
    }
}
