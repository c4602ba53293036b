//! Error Handling Module
//!
//! Defines the error taxonomy for the thermal super-resolution pipeline.
//! Uses thiserror for ergonomic error definitions.
//!
//! Per-sample failures (`Read`, `Dimension`, `MissingBands`) are recoverable at the
//! batch or evaluation-sample level. `Checkpoint` and `EmptyDataset` abort a run.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for thermal super-resolution operations
#[derive(Error, Debug)]
pub enum ThermalSrError {
    /// Raster could not be opened or decoded
    #[error("Failed to read raster at '{path}': {reason}")]
    Read { path: PathBuf, reason: String },

    /// Requested geometry does not fit the source data
    #[error("Dimension error: {0}")]
    Dimension(String),

    /// Raster does not carry the fixed band layout
    #[error("Raster has {found} bands, at least {required} are required")]
    MissingBands { required: usize, found: usize },

    /// A training batch failed and was skipped
    #[error("Batch {index} failed: {reason}")]
    Batch { index: usize, reason: String },

    /// A single inference call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Checkpoint could not be written or restored
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// No raster files matched the dataset naming convention
    #[error("No '{marker}' rasters found under {root}")]
    EmptyDataset { root: PathBuf, marker: String },

    /// A fidelity metric could not be computed
    #[error("Metric error: {0}")]
    Metric(String),

    /// A diagnostic panel could not be rendered or encoded
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ThermalSrError {
    /// Build a read error for a raster path
    pub fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Read {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure is scoped to one sample and may be skipped
    pub fn is_sample_scoped(&self) -> bool {
        matches!(
            self,
            Self::Read { .. }
                | Self::Dimension(_)
                | Self::MissingBands { .. }
                | Self::Batch { .. }
                | Self::Metric(_)
        )
    }
}

/// Convenience Result type for thermal super-resolution operations
pub type Result<T> = std::result::Result<T, ThermalSrError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| ThermalSrError::Config(format!("{}: {}", msg, e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ThermalSrError::Config(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ThermalSrError::Dimension("patch 128 exceeds 64x64".to_string());
        assert_eq!(format!("{}", err), "Dimension error: patch 128 exceeds 64x64");
    }

    #[test]
    fn test_read_error_mentions_path() {
        let err = ThermalSrError::read("/data/scene_all_bands.tif", "not a raster");
        let msg = format!("{}", err);
        assert!(msg.contains("scene_all_bands.tif"));
        assert!(msg.contains("not a raster"));
    }

    #[test]
    fn test_sample_scoped_classification() {
        assert!(ThermalSrError::Dimension("x".into()).is_sample_scoped());
        assert!(ThermalSrError::MissingBands { required: 11, found: 4 }.is_sample_scoped());
        assert!(!ThermalSrError::Checkpoint("disk full".into()).is_sample_scoped());
        assert!(!ThermalSrError::EmptyDataset {
            root: PathBuf::from("/data"),
            marker: "all_bands".into()
        }
        .is_sample_scoped());
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.context("Value was None");
        assert!(with_context.is_err());
    }
}
