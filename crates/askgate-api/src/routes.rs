use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ask", post(handlers::ask))
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::ready))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
