use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::agent_core::Orchestrator;

pub mod chat;
pub mod db;
pub mod error;
pub mod tools;

pub use error::ApiError;

/// Shared by every handler.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat::chat))
        .route("/api/tools", post(tools::invoke_tool))
        .route("/api/db/tables", get(db::list_tables))
        .route("/api/db/tables/:table_name", get(db::table_content))
        .route("/api/db/tables/:table_name/structure", get(db::table_structure))
        .route("/api/db/query", post(db::run_query))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub struct Server {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Server {
    /// Bind `bind` and start serving in a background task.
    pub async fn start(bind: &str, state: AppState) -> Result<Self, std::io::Error> {
        let app = router(Arc::new(state));
        let listener = TcpListener::bind(bind).await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(error) = result {
                tracing::error!(%error, "server stopped with an error");
            }
        });

        Ok(Server {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(&mut self) -> Result<(), String> {
        if let Some(sender) = self.shutdown.take() {
            sender
                .send(())
                .map_err(|_| "failed to send server shutdown signal".to_string())
        } else {
            Ok(())
        }
    }

    /// Signal shutdown and wait for in-flight requests to drain.
    pub async fn stop(mut self) {
        let _ = self.shutdown();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = match state.orchestrator.router().gateway().ping().await {
        Ok(()) => "ok",
        Err(error) => {
            tracing::warn!(%error, "health check: database unreachable");
            "unavailable"
        }
    };
    Json(json!({
        "status": "ok",
        "model": state.orchestrator.default_model(),
        "database": database,
    }))
}
