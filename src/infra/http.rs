//! HTTP surface: every render request answers `200 OK` with a response envelope.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use tracing::warn;

use crate::{
    application::pipeline::RenderPipeline,
    domain::{
        envelope::ResponseEnvelope,
        error::ValidationError,
        request::RenderEvent,
    },
};

#[derive(Clone)]
pub struct HttpState {
    pub pipeline: Arc<RenderPipeline>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", post(render))
        .route("/render", post(render))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn render(
    State(state): State<HttpState>,
    payload: Result<Json<RenderEvent>, JsonRejection>,
) -> Json<ResponseEnvelope> {
    let envelope = match payload {
        Ok(Json(event)) => state.pipeline.handle_event(event).await,
        Err(rejection) => {
            warn!(
                target = "infra::http",
                op = "http::render",
                result = "rejected",
                status = rejection.status().as_u16(),
                error = %rejection.body_text(),
                "Malformed render request body"
            );
            ResponseEnvelope::failure(ValidationError::MalformedBody(rejection.body_text()).into())
        }
    };
    Json(envelope)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}
