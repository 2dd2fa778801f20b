//! HTTP routes of the model server.
//!
use std::sync::Arc;

use axum::{handler::HandlerWithoutStateExt, routing::get, Extension, Router};
use common::protocol::MODEL_STATUS_PATH;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir};

use crate::{
    endpoints::{healthcheck, index, model_file, model_status, not_found, panic_response},
    ServerState,
};

/// Build the router serving the page, the model status and the model bundle.
///
/// Unknown paths fall through to the static directory and end in a JSON 404.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let static_files =
        ServeDir::new(&state.static_dir).not_found_service(not_found.into_service());

    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route(MODEL_STATUS_PATH, get(model_status))
        .route("/my_model/*path", get(model_file))
        .fallback_service(static_files)
        .layer(Extension(state))
        .layer(CorsLayer::permissive())
        .layer(CatchPanicLayer::custom(panic_response))
}
