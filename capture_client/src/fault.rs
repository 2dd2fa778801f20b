//! Classification of everything that can go wrong in a session.
//!
use std::{fmt, time::Duration};

use thiserror::Error;

use crate::nn::MissingOnnxWeights;

/// Resource being acquired when a timeout or cancellation hit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Acquisition {
    Model,
    Camera,
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Acquisition::Model => f.write_str("model loading"),
            Acquisition::Camera => f.write_str("camera setup"),
        }
    }
}

/// Error raised somewhere in the session, tagged with its origin.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("model bundle unavailable: {0}")]
    Unavailable(String),
    #[error("unable to check model status: {0:#}")]
    StatusCheck(anyhow::Error),
    #[error("failed to load model: {0:#}")]
    ModelLoad(anyhow::Error),
    #[error("failed to set up camera: {0:#}")]
    CameraSetup(anyhow::Error),
    #[error("{what} timed out after {after:?}")]
    Timeout { what: Acquisition, after: Duration },
    #[error("{0} was cancelled")]
    Cancelled(Acquisition),
    #[error("failed to capture frame: {0:#}")]
    Capture(anyhow::Error),
    #[error("prediction failed: {0:#}")]
    Inference(anyhow::Error),
}

/// How far the effects of a fault reach.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Containment {
    /// No usable model: show the setup panel and refuse to start until rechecked.
    DisableStart,
    /// Acquisition failed: release whatever was acquired, start may be retried.
    RollbackSession,
    /// The running cycle cannot continue: tear the session down.
    HaltLoop,
    /// Report it and carry on with the next frame.
    DisplayOnly,
}

impl Fault {
    pub fn containment(&self) -> Containment {
        match self {
            Fault::Unavailable(_) | Fault::StatusCheck(_) => Containment::DisableStart,
            Fault::ModelLoad(_)
            | Fault::CameraSetup(_)
            | Fault::Timeout { .. }
            | Fault::Cancelled(_) => Containment::RollbackSession,
            Fault::Capture(_) => Containment::HaltLoop,
            Fault::Inference(_) => Containment::DisplayOnly,
        }
    }

    /// Text for the user, as opposed to the `Display` text meant for the log.
    pub fn user_message(&self) -> String {
        match self {
            Fault::Unavailable(message) => message.clone(),
            Fault::StatusCheck(_) => {
                "Unable to check model status. Please ensure the server is running.".to_owned()
            }
            Fault::ModelLoad(err) if err.is::<MissingOnnxWeights>() => {
                "The model bundle has no ONNX weights. List a .onnx file in the weightsManifest of model.json."
                    .to_owned()
            }
            Fault::ModelLoad(_)
            | Fault::CameraSetup(_)
            | Fault::Timeout { .. }
            | Fault::Cancelled(_) => {
                "Failed to initialize camera. Please check your model files and camera permissions."
                    .to_owned()
            }
            Fault::Capture(_) => "Camera stopped delivering frames.".to_owned(),
            Fault::Inference(_) => "Prediction failed".to_owned(),
        }
    }
}
