//! Static asset and model bundle server.
pub mod bundle;
pub mod endpoints;
pub mod routes;

use std::path::PathBuf;

use bundle::ModelBundle;

/// State shared by all endpoints.
#[derive(Debug)]
pub struct ServerState {
    pub bundle: ModelBundle,
    pub static_dir: PathBuf,
}

impl ServerState {
    pub fn new(bundle: ModelBundle, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundle,
            static_dir: static_dir.into(),
        }
    }
}
