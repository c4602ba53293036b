//! # Thermal Super-Resolution
//!
//! A Rust library for physics-aware super-resolution of Landsat TIRS thermal bands
//! guided by co-registered OLI optical bands, built on the Burn framework.
//!
//! ## Features
//!
//! - **Raster ingestion** of stacked 11-band scenes through GDAL with fixed band normalization
//! - **Dual-branch fusion network** encoding optical and degraded thermal input separately
//! - **Physics-aware training** with an L1 + total-variation objective
//! - **Deterministic evaluation** with PSNR, SSIM, RMSE and a confidence heuristic
//! - **Diagnostic rendering** of error maps, edge overlays, statistics and colour composites
//!
//! ## Modules
//!
//! - `dataset`: Raster loading, patch sampling, degradation and batching
//! - `model`: Fusion network and checkpointing
//! - `training`: Loss, training loop and the training entry point
//! - `inference`: Held-out evaluation and the inference engine
//! - `visualize`: Diagnostic panels encoded as PNG
//! - `utils`: Errors, logging and metrics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use thermal_sr::backend::{default_device, DefaultBackend};
//! use thermal_sr::{FusionNetConfig, InferenceEngine};
//!
//! let engine = InferenceEngine::<DefaultBackend>::load(
//!     "output/physics_aware_unet".as_ref(),
//!     &FusionNetConfig::new(),
//!     default_device(),
//! )?;
//! let report = engine.infer_report("LC08_scene_all_bands.tif");
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;
pub mod visualize;

// Re-export commonly used items for convenience
pub use dataset::{
    load_scene, BandStack, PatchPair, PatchSampler, PatchSource, RasterDataset,
    RasterPatchSource, SceneBands, ThermalBatch, ThermalBatcher,
};
pub use inference::{
    evaluate, EvaluationReport, HealthStatus, InferenceEngine, InferenceReport, InferenceResult,
};
pub use model::{FusionNet, FusionNetConfig};
pub use training::{run_training, EpochSummary, Trainer, TrainingConfig, TrainingState};
pub use utils::error::{Result, ThermalSrError};
pub use utils::metrics::MetricSet;
pub use visualize::Visualizations;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
