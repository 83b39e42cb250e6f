use std::path::Path;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderValue, Method, header, header::InvalidHeaderValue},
    routing::{get, post},
};
use comms::{INFERENCE_ROUTE, InferenceResponse};
use tokio::task;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{context::AppContext, error::ServiceErr, inference::infer};

pub const LIVENESS: &str = "The Split Learning Inference ResNet18 Demo Server is up!";

/// Builds the HTTP surface of the server.
///
/// # Arguments
/// * `ctx` - The state shared by the handlers.
/// * `cors_origin` - The only origin allowed to call the server from a browser.
/// * `static_dir` - The directory served under `/static`.
/// * `max_body_bytes` - The largest inference request body accepted.
///
/// # Returns
/// The router or an error if `cors_origin` isn't a valid header value.
pub fn router(
    ctx: AppContext,
    cors_origin: &str,
    static_dir: &Path,
    max_body_bytes: usize,
) -> Result<Router, InvalidHeaderValue> {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(cors_origin)?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let router = Router::new()
        .route("/", get(liveness))
        .route(
            INFERENCE_ROUTE,
            post(inference).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(cors)
        .with_state(ctx);

    Ok(router)
}

async fn liveness() -> &'static str {
    LIVENESS
}

async fn inference(
    State(ctx): State<AppContext>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<InferenceResponse>, ServiceErr> {
    let body = body?;
    let response = task::spawn_blocking(move || infer(&ctx, &body)).await??;
    Ok(Json(response))
}
