//! HTTP API server for the gaze relay

pub mod client_config;
pub mod health;
pub mod websocket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::db::DbPool;
use crate::router::EventRouter;

pub use client_config::ClientConfigResponse;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub db: DbPool,
    pub router: EventRouter,
    pub client_config: ClientConfigResponse,
    pub audio_dir: PathBuf,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    db: DbPool,
    router: EventRouter,
    port: u16,
    client_config: Option<ClientConfigResponse>,
    audio_dir: PathBuf,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(db: DbPool, router: EventRouter, port: u16) -> Self {
        Self {
            db,
            router,
            port,
            client_config: None,
            audio_dir: PathBuf::from("audio"),
        }
    }

    /// Set the values served on `/config`
    #[must_use]
    pub fn client_config(mut self, config: ClientConfigResponse) -> Self {
        self.client_config = Some(config);
        self
    }

    /// Set the directory published under `/audio`
    #[must_use]
    pub fn audio_dir(mut self, dir: PathBuf) -> Self {
        self.audio_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let port = self.port;
        let client_config = self.client_config.unwrap_or_else(|| ClientConfigResponse {
            socket_url: format!("ws://localhost:{port}/ws"),
            keyboard_layout: "english".to_string(),
            tts_params: Vec::new(),
        });

        let state = Arc::new(ApiState {
            db: self.db,
            router: self.router,
            client_config,
            audio_dir: self.audio_dir,
        });

        ApiServer { state, port }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let audio = ServeDir::new(&self.state.audio_dir);

        let router = Router::new()
            .merge(websocket::router(self.state.clone()))
            .merge(client_config::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()))
            .nest_service("/audio", audio);

        // CORS layer for cross-origin requests from the AAC front end
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        tokio::fs::create_dir_all(&self.state.audio_dir).await?;

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(
            port = self.port,
            audio_dir = %self.state.audio_dir.display(),
            "API server listening"
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
