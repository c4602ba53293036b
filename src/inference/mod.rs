//! Inference module for evaluation and single-scene prediction
//!
//! This module provides:
//! - Held-out evaluation with skip-on-failure (`evaluate`)
//! - The loaded-once inference engine and its structured report (`predictor`)

pub mod evaluate;
pub mod predictor;

pub use evaluate::{evaluate, evaluate_pair, EvaluationReport};
pub use predictor::{
    reconstruct, HealthStatus, InferenceEngine, InferenceReport, InferenceResult,
    InferenceSummary, ThermalAnalysis,
};
