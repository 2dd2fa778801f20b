//! Wire types shared between `model_server` and `capture_client`.
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
