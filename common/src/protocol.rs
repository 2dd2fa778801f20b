//! Protocol definition for the model status endpoint.
//!
use serde::{Deserialize, Serialize};

/// Directory (relative to the server root) holding the model bundle.
pub const MODEL_DIR: &str = "my_model";
/// Model topology file of the bundle.
pub const MODEL_FILE: &str = "model.json";
/// Metadata file of the bundle, holding the class labels.
pub const METADATA_FILE: &str = "metadata.json";
/// Files that have to be present for the bundle to be usable.
pub const REQUIRED_FILES: [&str; 2] = [MODEL_FILE, METADATA_FILE];

/// Route answering whether a usable model bundle exists.
pub const MODEL_STATUS_PATH: &str = "/api/model-status";
/// Port of the model server if nothing else is configured.
pub const DEFAULT_PORT: u16 = 3000;

/// Answer of the model status endpoint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModelStatus {
    pub exists: bool,
    pub message: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

impl ModelStatus {
    pub fn folder_missing() -> Self {
        Self {
            exists: false,
            message: format!(
                "Model folder not found. Please create a \"{}\" folder with your exported Teachable Machine files.",
                MODEL_DIR
            ),
            files: Vec::new(),
            missing: None,
        }
    }

    pub fn files_missing(files: Vec<String>, missing: Vec<String>) -> Self {
        Self {
            exists: false,
            message: format!("Missing required model files: {}", missing.join(", ")),
            files,
            missing: Some(missing),
        }
    }

    pub fn ready(files: Vec<String>) -> Self {
        Self {
            exists: true,
            message: "Model files found and ready to use!".to_owned(),
            files,
            missing: None,
        }
    }
}

/// Body sent with a 500 when the bundle directory cannot be inspected.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct StatusError {
    pub exists: bool,
    pub message: String,
    pub error: String,
}

/// Generic error body of the server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}
