//! Core library for hospital-readmission risk prediction
//!
//! This crate provides:
//! - A fixed-formula heuristic scorer that is always available
//! - ONNX inference for a trained classifier, loaded once at startup
//! - The prediction service dispatching between the two, with typed fallback
//! - Batch scoring of CSV uploads
//! - Health reporting and observability

pub mod batch;
pub mod error;
pub mod health;
pub mod loader;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod service;
pub mod state;

pub use error::{InferenceError, PredictError};
pub use health::HealthReport;
pub use loader::{ArtifactInfo, LoadResult, LoadedModel, ModelConfig, ModelLoader};
pub use models::*;
pub use observability::{AppMetrics, StructuredLogger};
pub use service::PredictionService;
pub use state::{ServingMode, ServingState};
