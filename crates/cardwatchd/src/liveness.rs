//! Liveness endpoint
//!
//! `/health` answers with a small JSON document; every other path answers
//! with a plain-text banner. Both always return 200 while the process runs.

use std::future::Future;

use axum::extract::State;
use axum::routing::any;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
struct LivenessState {
    service_name: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: String,
}

/// Build the liveness router for `service_name`
pub fn router(service_name: impl Into<String>) -> Router {
    Router::new()
        .route("/health", any(health))
        .fallback(banner)
        .with_state(LivenessState {
            service_name: service_name.into(),
        })
}

/// Serve the liveness endpoint until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    service_name: String,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Liveness endpoint listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(service_name))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves once `true` is published or the sender is dropped
pub async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn health(State(state): State<LivenessState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: state.service_name,
    })
}

async fn banner(State(state): State<LivenessState>) -> String {
    format!("{} is running", state.service_name)
}
