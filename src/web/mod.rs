//! Web layer module
//!
//! Read-only JSON API over the parsed channel and program tables. Handlers
//! are thin and delegate to [`Catalog`].

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::WebConfig, services::Catalog};

pub mod handlers;
pub mod responses;

pub use responses::{ApiError, ErrorBody, HealthResponse};

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &WebConfig, catalog: Catalog) -> Result<Self> {
        let app = Self::create_router(AppState {
            catalog: Arc::new(catalog),
        });
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/categories", get(handlers::list_categories))
            .route(
                "/categories/:category/channels",
                get(handlers::list_category_channels),
            )
            .route(
                "/channels/:channel/programs",
                get(handlers::list_channel_programs),
            )
            .fallback(handlers::not_found)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
}
