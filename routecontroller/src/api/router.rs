use crate::api::{handlers, ApiState};
use axum::routing::{get, post};
use axum::Router;

pub fn new(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/routes", get(handlers::routes))
        .route("/sync", post(handlers::sync))
        .with_state(state)
}
