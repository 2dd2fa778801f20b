use std::{fs, sync::Arc};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{
    protocol::{ErrorBody, ModelStatus},
    Error,
};
use model_server::{bundle::ModelBundle, routes::build_router, ServerState};
use tower::ServiceExt; // for `oneshot`

/// Lay out a server root with a static dir and a model bundle holding `model_files`.
fn server_root(model_files: Option<&[&str]>) -> Result<(tempfile::TempDir, Router), Error> {
    let root = tempfile::tempdir()?;
    let static_dir = root.path().join("static");
    fs::create_dir(&static_dir)?;
    fs::write(static_dir.join("index.html"), "<html>classifier</html>")?;
    fs::write(static_dir.join("style.css"), "body {}")?;

    let model_dir = root.path().join("my_model");
    if let Some(files) = model_files {
        fs::create_dir(&model_dir)?;
        for file in files {
            fs::write(model_dir.join(file), format!("{{\"name\":\"{}\"}}", file))?;
        }
    }

    let state = Arc::new(ServerState::new(ModelBundle::new(model_dir), static_dir));
    Ok((root, build_router(state)))
}

async fn get(app: Router, uri: &str) -> Result<(StatusCode, header::HeaderMap, Vec<u8>), Error> {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = hyper::body::to_bytes(response.into_body()).await?;

    Ok((status, headers, body.to_vec()))
}

#[tokio::test]
async fn test_index_page() -> Result<(), Error> {
    let (_root, app) = server_root(None)?;

    let (status, _, body) = get(app, "/").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<html>classifier</html>");

    Ok(())
}

#[tokio::test]
async fn test_healthcheck() -> Result<(), Error> {
    let (_root, app) = server_root(None)?;

    let (status, _, body) = get(app, "/healthcheck").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"healthy");

    Ok(())
}

#[tokio::test]
async fn test_model_status_without_folder() -> Result<(), Error> {
    let (_root, app) = server_root(None)?;

    let (status, _, body) = get(app, "/api/model-status").await?;
    assert_eq!(status, StatusCode::OK);

    let value: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(value["exists"], false);
    assert_eq!(value["files"], serde_json::json!([]));
    assert!(value.get("missing").is_none());

    Ok(())
}

#[tokio::test]
async fn test_model_status_missing_metadata() -> Result<(), Error> {
    let (_root, app) = server_root(Some(&["model.json"]))?;

    let (status, _, body) = get(app, "/api/model-status").await?;
    assert_eq!(status, StatusCode::OK);

    let model_status: ModelStatus = serde_json::from_slice(&body)?;
    assert!(!model_status.exists);
    assert_eq!(model_status.missing, Some(vec!["metadata.json".to_owned()]));
    assert_eq!(model_status.files, vec!["model.json".to_owned()]);

    Ok(())
}

#[tokio::test]
async fn test_model_status_ready() -> Result<(), Error> {
    let (_root, app) = server_root(Some(&["model.json", "metadata.json", "weights.bin"]))?;

    let (_, _, body) = get(app, "/api/model-status").await?;

    let model_status: ModelStatus = serde_json::from_slice(&body)?;
    assert!(model_status.exists);
    assert_eq!(model_status.message, "Model files found and ready to use!");
    assert_eq!(model_status.missing, None);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_model_status_unreadable_folder() -> Result<(), Error> {
    // A file where the folder should be makes listing the folder fail
    let root = tempfile::tempdir()?;
    let model_dir = root.path().join("my_model");
    fs::write(&model_dir, "not a directory")?;
    let state = Arc::new(ServerState::new(
        ModelBundle::new(&model_dir),
        root.path(),
    ));

    let (status, _, body) = get(build_router(state), "/api/model-status").await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(value["exists"], false);
    assert_eq!(value["message"], "Error checking model files");
    assert!(value["error"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_model_file_served_with_open_cors() -> Result<(), Error> {
    let (_root, app) = server_root(Some(&["model.json", "metadata.json"]))?;

    let (status, headers, body) = get(app, "/my_model/model.json").await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(body, br#"{"name":"model.json"}"#);

    Ok(())
}

#[tokio::test]
async fn test_missing_model_file() -> Result<(), Error> {
    let (_root, app) = server_root(Some(&["model.json"]))?;

    let (status, _, body) = get(app, "/my_model/weights.bin").await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorBody = serde_json::from_slice(&body)?;
    assert_eq!(error.error, "Model file not found");
    assert_eq!(error.path.as_deref(), Some("/my_model/weights.bin"));

    Ok(())
}

#[tokio::test]
async fn test_model_file_traversal_is_rejected() -> Result<(), Error> {
    let (_root, app) = server_root(Some(&["model.json"]))?;

    let (status, _, _) = get(app, "/my_model/..%2Fstatic%2Findex.html").await?;

    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_static_assets_and_unknown_routes() -> Result<(), Error> {
    let (_root, app) = server_root(None)?;

    let (status, _, body) = get(app.clone(), "/style.css").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"body {}");

    let (status, _, body) = get(app, "/does/not/exist").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorBody = serde_json::from_slice(&body)?;
    assert_eq!(error.error, "Route not found");

    Ok(())
}
