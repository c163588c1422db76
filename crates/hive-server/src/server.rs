//! HTTP surface and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use hive_store::Database;

use crate::config::ServerConfig;
use crate::connection::ClientRegistry;
use crate::handlers;
use crate::methods::{MethodRegistry, RpcContext};
use crate::socket::ws_handler;

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub ctx: Arc<RpcContext>,
    pub registry: Arc<MethodRegistry>,
    pub clients: Arc<ClientRegistry>,
    pub started_at: Instant,
}

/// Wire services and handlers over one database.
pub fn build_state(config: ServerConfig, db: Database) -> AppState {
    let ctx = Arc::new(RpcContext::new(db, &config.token_secret));
    let mut registry = MethodRegistry::new(Duration::from_secs(config.request_timeout_secs));
    handlers::register_all(&mut registry);

    AppState {
        config: Arc::new(config),
        ctx,
        registry: Arc::new(registry),
        clients: Arc::new(ClientRegistry::new()),
        started_at: Instant::now(),
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "hive",
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "connections": state.clients.count(),
    }))
}

/// Bind and serve. Returns a handle carrying the bound address and a
/// graceful-shutdown trigger.
pub async fn start(state: AppState) -> Result<ServerHandle, std::io::Error> {
    let bind = (state.config.host.as_str(), state.config.port);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;

    info!(
        %addr,
        methods = state.registry.method_count(),
        "hive server started"
    );

    let shutdown = CancellationToken::new();
    let serve_token = shutdown.clone();
    let router = build_router(state);
    let task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { serve_token.cancelled().await })
            .await
            .ok();
    });

    Ok(ServerHandle {
        addr,
        shutdown,
        task,
    })
}

/// Handle for a running server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and wait for the serve loop to end.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.task.await;
    }
}
