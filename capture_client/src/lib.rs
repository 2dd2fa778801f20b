//! Webcam classifier front-end: capture frames, classify them with a model
//! served by the model server and show the top prediction.
//!
pub mod display;
pub mod fault;
pub mod keys;
pub mod meter;
pub mod nn;
pub mod prediction;
pub mod scheduler;
pub mod sensors;
pub mod session;
pub mod status;
