//! Model checkpointing.
//!
//! Parameters are written with Burn's named MessagePack recorder at full precision,
//! so a save/load cycle reproduces forward outputs exactly. A checkpoint path is a
//! file stem; the recorder appends its own extension.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::Backend,
};
use tracing::info;

use super::fusion::{FusionNet, FusionNetConfig};
use crate::utils::error::{Result, ThermalSrError};

/// Recorder used for every checkpoint
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// File actually written for a checkpoint stem
pub fn checkpoint_file(stem: &Path) -> PathBuf {
    let extension = <CheckpointRecorder as FileRecorder<burn::backend::NdArray>>::file_extension();
    stem.with_extension(extension)
}

/// Persist the full parameter set, overwriting any previous checkpoint at `stem`
pub fn save_checkpoint<B: Backend>(model: &FusionNet<B>, stem: &Path) -> Result<PathBuf> {
    if let Some(parent) = stem.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ThermalSrError::Checkpoint(format!("{:?}: {}", parent, e)))?;
        }
    }

    model
        .clone()
        .save_file(stem.to_path_buf(), &CheckpointRecorder::new())
        .map_err(|e| ThermalSrError::Checkpoint(format!("failed to save {:?}: {:?}", stem, e)))?;

    let written = checkpoint_file(stem);
    info!("Model saved as {}", written.display());
    Ok(written)
}

/// Build a fresh model from `config` and load parameters from `stem`
pub fn load_checkpoint<B: Backend>(
    config: &FusionNetConfig,
    stem: &Path,
    device: &B::Device,
) -> Result<FusionNet<B>> {
    let model = FusionNet::<B>::new(config, device)
        .load_file(stem.to_path_buf(), &CheckpointRecorder::new(), device)
        .map_err(|e| ThermalSrError::Checkpoint(format!("failed to load {:?}: {:?}", stem, e)))?;

    info!("Model loaded from {}", checkpoint_file(stem).display());
    Ok(model)
}
