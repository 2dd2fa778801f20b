//! Endpoints of HTTP server.
//!
use std::{any::Any, path::Path as FsPath, sync::Arc};

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use common::protocol::{ErrorBody, StatusError, MODEL_DIR};

use crate::ServerState;

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

/// Main page of the front-end.
pub async fn index(Extension(state): Extension<Arc<ServerState>>) -> Response {
    let page = state.static_dir.join("index.html");

    match tokio::fs::read(&page).await {
        Ok(body) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response(),
        Err(err) => {
            log::warn!("Unable to read {}: {}", page.display(), err);
            not_found().await.into_response()
        }
    }
}

/// Report whether a usable model bundle exists on disk.
pub async fn model_status(Extension(state): Extension<Arc<ServerState>>) -> Response {
    match state.bundle.status() {
        Ok(status) => {
            log::debug!("Model status: {} ({:?})", status.exists, &status.files);
            Json(status).into_response()
        }
        Err(err) => {
            log::error!("Error checking model files: {}", err);
            let body = StatusError {
                exists: false,
                message: "Error checking model files".to_owned(),
                error: err.to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Serve a raw file of the model bundle.
pub async fn model_file(
    Extension(state): Extension<Arc<ServerState>>,
    Path(path): Path<String>,
) -> Response {
    let request_path = format!("/{}/{}", MODEL_DIR, path.trim_start_matches('/'));

    let file = match state.bundle.resolve(&path) {
        Some(file) => file,
        None => {
            log::info!("Model file {} not found", &request_path);
            let body = ErrorBody::new(
                "Model file not found",
                format!(
                    "Please ensure your model files are in the {} folder",
                    MODEL_DIR
                ),
            )
            .with_path(request_path);
            return (StatusCode::NOT_FOUND, Json(body)).into_response();
        }
    };

    match tokio::fs::read(&file).await {
        Ok(body) => (
            [
                (header::CONTENT_TYPE, content_type_for(&file)),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            body,
        )
            .into_response(),
        Err(err) => {
            log::error!("Unable to read {}: {}", file.display(), err);
            internal_error(err.to_string())
        }
    }
}

/// Fallback for every unknown route.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new(
            "Route not found",
            "The requested resource was not found",
        )),
    )
}

/// Turn a panic inside a handler into a JSON 500.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_owned()
    };
    log::error!("Handler panicked: {}", &message);

    internal_error(message)
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Something went wrong!", message)),
    )
        .into_response()
}

fn content_type_for(file: &FsPath) -> &'static str {
    match file.extension().and_then(|ext| ext.to_str()) {
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for(FsPath::new("model.json")), "application/json");
        assert_eq!(
            content_type_for(FsPath::new("weights.bin")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for(FsPath::new("model.onnx")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_panic_payloads() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = panic_response(Box::new(String::from("boom")));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = panic_response(Box::new(42_u8));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
