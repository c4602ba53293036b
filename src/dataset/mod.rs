//! Dataset module for stacked Landsat OLI/TIRS rasters
//!
//! This module provides:
//! - Raster loading and band normalization (`raster`)
//! - Random co-located patch sampling (`patch`)
//! - The thermal degradation operator (`degrade`)
//! - Dataset discovery and train/test splitting (`loader`)
//! - Batching into Burn tensors (`burn_dataset`)

pub mod burn_dataset;
pub mod degrade;
pub mod loader;
pub mod patch;
pub mod raster;

pub use burn_dataset::{ThermalBatch, ThermalBatcher};
pub use degrade::{degrade, downsample, DEGRADATION_FACTOR};
pub use loader::{PatchSource, RasterDataset, RasterPatchSource, DEFAULT_FILE_MARKER};
pub use patch::{PatchPair, PatchSampler, DEFAULT_PATCH_SIZE};
pub use raster::{load_scene, BandStack, SceneBands, REFLECTANCE_SCALE, THERMAL_SCALE};

/// Number of optical input bands
pub const OPTICAL_CHANNELS: usize = 3;

/// Number of thermal bands
pub const THERMAL_CHANNELS: usize = 2;
