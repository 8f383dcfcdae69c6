mod handlers;
mod router;
mod schemas;

use crate::k8s::watcher::ShutdownWatch;
use crate::resources::ChildRenderer;
use crate::snapshot::SnapshotRepo;
use anyhow::anyhow;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{debug, error, info};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct ApiState {
    pub snapshots: Arc<SnapshotRepo>,
    pub children: Arc<dyn ChildRenderer>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("uninitialized: have not yet synchronized with the route source")]
    Uninitialized,

    #[error("unable to render children: {0}")]
    Render(serde_json::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("API request failed: {}", self);
        let body = schemas::ErrorResponse {
            error: self.to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub struct Service {
    port: u16,
    state: ApiState,
}

impl Service {
    pub fn new(port: u16, state: ApiState) -> Self {
        Self { port, state }
    }

    pub async fn run(&self, mut shutdown: ShutdownWatch) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(format!("0.0.0.0:{}", self.port))
            .await
            .map_err(|e| anyhow!("error creating listener: {}", e))?;
        if let Ok(addr) = listener.local_addr() {
            info!("API server listening on {}", addr);
        }

        let app = router::new(self.state.clone());
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                if let Err(e) = shutdown.changed().await {
                    debug!("Error while waiting for API shutdown signal: {}", e);
                }
                info!("Shutting down API server");
            })
            .await
            .map_err(|e| anyhow!("error running API server: {}", e))
    }

    pub async fn start(&self, shutdown: ShutdownWatch) {
        if let Err(e) = self.run(shutdown).await {
            error!("Error running API web service: {}", e);
        }
    }
}
