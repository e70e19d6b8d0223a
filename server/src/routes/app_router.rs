use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ServerState;

use super::handlers::{process, review};

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        Router::new()
            .route("/", get(|| async { "Triage server" }))
            .nest(
                "/email",
                Router::new()
                    .route("/process", post(process::process_batch))
                    .route("/pending", get(review::get_pending))
                    .route("/:id", get(review::get_email))
                    .route("/:id/confirm", post(review::confirm))
                    .route("/:id/reject", post(review::reject))
                    .route(
                        "/:id/approve",
                        post(review::approve).delete(review::clear_approval),
                    )
                    .with_state(state.clone()),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
            .fallback(handler_404)
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
