//! Training Configuration
//!
//! Hyperparameters for the physics-aware training loop. Defaults: Adam at 1e-4,
//! batch size 2, 128x128 patches and a total-variation weight of 0.01.

use burn::config::Config;

use crate::dataset::{DEFAULT_FILE_MARKER, DEFAULT_PATCH_SIZE};
use crate::model::{FusionNetConfig, DEFAULT_CHECKPOINT_NAME};
use crate::training::loss::DEFAULT_TV_WEIGHT;
use crate::training::{DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_LEARNING_RATE};
use crate::utils::error::ThermalSrError;

/// Configuration for a training run
#[derive(Config, Debug)]
pub struct TrainingConfig {
    /// Network architecture
    pub model: FusionNetConfig,

    /// Number of passes over the training split
    #[config(default = "DEFAULT_EPOCHS")]
    pub epochs: usize,

    /// Patch pairs per batch
    #[config(default = "DEFAULT_BATCH_SIZE")]
    pub batch_size: usize,

    /// Side length of square training patches
    #[config(default = "DEFAULT_PATCH_SIZE")]
    pub patch_size: usize,

    /// Fixed Adam learning rate
    #[config(default = "DEFAULT_LEARNING_RATE")]
    pub learning_rate: f64,

    /// Weight of the total-variation term in the loss
    #[config(default = "DEFAULT_TV_WEIGHT")]
    pub tv_weight: f64,

    /// Share of discovered files used for training; the rest is held out
    #[config(default = 0.8)]
    pub train_fraction: f64,

    /// Seed for the split, batch shuffling and patch offsets
    #[config(default = 42)]
    pub seed: u64,

    /// Log the batch loss every this many batches
    #[config(default = 5)]
    pub log_interval: usize,

    /// File-name marker of stacked rasters
    #[config(default = "DEFAULT_FILE_MARKER.to_string()")]
    pub file_marker: String,

    /// Checkpoint file stem, overwritten after every epoch
    #[config(default = "DEFAULT_CHECKPOINT_NAME.to_string()")]
    pub checkpoint_name: String,
}

impl TrainingConfig {
    /// Reject settings the training loop cannot run with
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.epochs == 0 {
            return Err(ThermalSrError::Config("epochs must be greater than 0".into()));
        }
        if self.batch_size == 0 {
            return Err(ThermalSrError::Config("batch_size must be greater than 0".into()));
        }
        if self.patch_size < 2 {
            return Err(ThermalSrError::Config(format!(
                "patch_size {} is too small to degrade",
                self.patch_size
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ThermalSrError::Config("learning_rate must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(ThermalSrError::Config(format!(
                "train_fraction {} must lie in [0, 1]",
                self.train_fraction
            )));
        }
        if self.tv_weight < 0.0 {
            return Err(ThermalSrError::Config("tv_weight must not be negative".into()));
        }
        Ok(())
    }
}
